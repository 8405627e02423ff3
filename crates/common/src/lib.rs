/**
 * Cryptographic types and operations.
 *  - Keypairs, Schnorr signatures, ECDH
 *  - Content encryption for file bytes
 *  - Sealed envelopes for metadata at rest
 *  - Password-locked key envelopes
 */
pub mod crypto;
/**
 * The signed event model: the two event kinds,
 *  canonical hashing, building, and validation.
 */
pub mod event;
/**
 * Drive items and the encrypted metadata body
 *  they are materialised from.
 */
pub mod item;
/**
 * bech32 string forms used at the sharing boundary:
 *  event pointers (`nevent`), private keys (`nsec`),
 *  and password-locked keys (`ncryptsec`).
 */
pub mod nip19;
/**
 * Textual POSIX-style path handling. Paths in drive
 *  metadata are absolute strings, never filesystem paths.
 */
pub mod path;

pub mod prelude {
    pub use crate::crypto::{ContentSecret, PublicKey, SecretKey};
    pub use crate::event::{Event, EventBuilder, Tag, DELETE_KIND, DRIVE_KIND};
    pub use crate::item::{DriveItem, FileMetadata, FolderMetadata, ItemContent};
    pub use crate::nip19::EventPointer;
}
