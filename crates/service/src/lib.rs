/**
 * Blob network interface: content-addressed put/get/delete
 *  of ciphertext bytes, keyed by SHA-256.
 */
pub mod blobs;
/**
 * Change-notification fan-out for view consumers.
 */
pub mod changes;
/**
 * Handle configuration.
 */
pub mod config;
/**
 * The drive operations handle: list, create, upload, download,
 *  move, copy, delete, search, share, open-share.
 */
pub mod drive;
/**
 * The sync engine: one live relay subscription projected
 *  into the local index.
 */
pub mod engine;
/**
 * The error taxonomy surfaced by public operations.
 */
pub mod error;
/**
 * Relay network interface: publish, subscribe, query.
 */
pub mod relay;
/**
 * Signer interface: identity, event signing, and the sealed
 *  payload oracle.
 */
pub mod signer;
/**
 * In-memory doubles for tests: an echoing relay and a
 *  content-addressed blob store.
 */
pub mod testkit;

pub mod prelude {
    pub use crate::blobs::{BlobClient, BlobDescriptor};
    pub use crate::changes::{Change, ChangeKind};
    pub use crate::config::Config;
    pub use crate::drive::{
        decode_share_key, parse_share_link, Drive, SharedFileAccess,
    };
    pub use crate::engine::EngineState;
    pub use crate::error::DriveError;
    pub use crate::relay::{Filter, RelayClient};
    pub use crate::signer::{LocalSigner, Signer};
}
