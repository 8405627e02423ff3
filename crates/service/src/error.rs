//! Errors surfaced by the public drive operations.
//!
//! Validation failures abort an operation before any side effect. A
//! broadcast failure is surfaced after the local index write has
//! already succeeded, so the event lives locally until republished.

use index::IndexError;

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    /// Non-absolute path, malformed share link, bad base64, bad TLV.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// No current signer identity.
    #[error("no signer identity is available")]
    NotLoggedIn,
    /// Referenced event id or path absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// Modifying an event not authored by the current identity, or a
    /// share recipient mismatch.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Seal/open failure, wrong password, or other key trouble.
    #[error("crypto failure: {0}")]
    Crypto(String),
    /// Key or tag failure decrypting downloaded content; sizes are the
    /// decoded key and nonce lengths, for diagnostics.
    #[error("decryption failed (key {key_len} bytes, nonce {nonce_len} bytes)")]
    DecryptionFailed { key_len: usize, nonce_len: usize },
    /// Blob transfer or relay publish failure.
    #[error("network failure: {0}")]
    Network(String),
    /// The local index failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    /// Operation invoked after `dispose()`.
    #[error("drive handle has been disposed")]
    Terminated,
}

impl DriveError {
    pub(crate) fn network(err: impl std::fmt::Display) -> Self {
        DriveError::Network(err.to_string())
    }

    pub(crate) fn crypto(err: impl std::fmt::Display) -> Self {
        DriveError::Crypto(err.to_string())
    }

    pub(crate) fn invalid(err: impl std::fmt::Display) -> Self {
        DriveError::InvalidArgument(err.to_string())
    }
}

impl From<crate::signer::SignerError> for DriveError {
    fn from(err: crate::signer::SignerError) -> Self {
        DriveError::Crypto(err.to_string())
    }
}

impl From<common::crypto::SecretError> for DriveError {
    fn from(err: common::crypto::SecretError) -> Self {
        DriveError::Crypto(err.to_string())
    }
}

impl From<common::event::EventError> for DriveError {
    fn from(err: common::event::EventError) -> Self {
        DriveError::Crypto(err.to_string())
    }
}

impl From<common::nip19::Nip19Error> for DriveError {
    fn from(err: common::nip19::Nip19Error) -> Self {
        DriveError::InvalidArgument(err.to_string())
    }
}
