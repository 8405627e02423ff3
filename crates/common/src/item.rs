//! Drive items and the metadata bodies they are materialised from.
//!
//! [`ItemContent`] is the JSON object carried (sealed) in a drive
//! event's content. [`DriveItem`] is the materialised view entry a
//! listing returns, pairing the decrypted body with the event identity
//! it came from.

use std::str::FromStr;

use mime::Mime;
use serde::{Deserialize, Serialize};

use crate::crypto::secret::{self, SecretError};
use crate::path;

/// The decrypted metadata body of a drive event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ItemContent {
    #[serde(rename = "file")]
    File {
        /// SHA-256 of the uploaded (possibly encrypted) bytes, hex.
        hash: String,
        /// Absolute, normalised drive path.
        path: String,
        /// Length of the uploaded bytes.
        size: u64,
        #[serde(
            rename = "file-type",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        file_type: Option<String>,
        #[serde(
            rename = "encryption-algorithm",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        encryption_algorithm: Option<String>,
        #[serde(
            rename = "decryption-key",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        decryption_key: Option<String>,
        #[serde(
            rename = "decryption-nonce",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        decryption_nonce: Option<String>,
    },
    #[serde(rename = "folder")]
    Folder {
        /// Absolute, normalised drive path.
        path: String,
    },
}

impl ItemContent {
    pub fn folder(path: &str) -> Self {
        ItemContent::Folder {
            path: path.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            ItemContent::File { path, .. } => path,
            ItemContent::Folder { path } => path,
        }
    }

    pub fn set_path(&mut self, new_path: &str) {
        match self {
            ItemContent::File { path, .. } => *path = new_path.to_string(),
            ItemContent::Folder { path } => *path = new_path.to_string(),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, ItemContent::File { .. })
    }

    /// The `type` discriminant as stored on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemContent::File { .. } => "file",
            ItemContent::Folder { .. } => "folder",
        }
    }

    /// The content hash, for files.
    pub fn content_hash(&self) -> Option<&str> {
        match self {
            ItemContent::File { hash, .. } => Some(hash),
            ItemContent::Folder { .. } => None,
        }
    }
}

/// Decryption parameters carried in file metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionInfo {
    /// Always `aes-gcm`.
    pub algorithm: String,
    /// Base64 of the 32-byte key.
    pub key: String,
    /// Base64 of the 12-byte nonce.
    pub nonce: String,
}

/// A file in the materialised view.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub path: String,
    pub created_at: u64,
    pub event_id: String,
    pub hash: String,
    pub size: u64,
    pub file_type: Option<String>,
    pub encryption: Option<EncryptionInfo>,
}

/// A folder in the materialised view.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderMetadata {
    pub path: String,
    pub created_at: u64,
    pub event_id: String,
}

/// An entry in the materialised view: a file or a folder.
#[derive(Debug, Clone, PartialEq)]
pub enum DriveItem {
    File(FileMetadata),
    Folder(FolderMetadata),
}

impl DriveItem {
    /// Materialise a view entry from an event identity and its body.
    ///
    /// # Errors
    ///
    /// This is the trust boundary for key material arriving in events:
    /// a file body naming an algorithm other than `aes-gcm`, or whose
    /// key/nonce do not decode to 32/12 bytes, is rejected.
    pub fn from_content(
        event_id: &str,
        created_at: u64,
        content: &ItemContent,
    ) -> Result<Self, SecretError> {
        match content {
            ItemContent::Folder { path } => Ok(DriveItem::Folder(FolderMetadata {
                path: path.clone(),
                created_at,
                event_id: event_id.to_string(),
            })),
            ItemContent::File {
                hash,
                path,
                size,
                file_type,
                encryption_algorithm,
                decryption_key,
                decryption_nonce,
            } => {
                let encryption = match (encryption_algorithm, decryption_key, decryption_nonce) {
                    (Some(algorithm), Some(key), Some(nonce)) => {
                        secret::ensure_algorithm(algorithm)?;
                        secret::ContentSecret::from_base64(key, nonce)?;
                        Some(EncryptionInfo {
                            algorithm: algorithm.clone(),
                            key: key.clone(),
                            nonce: nonce.clone(),
                        })
                    }
                    _ => None,
                };
                Ok(DriveItem::File(FileMetadata {
                    path: path.clone(),
                    created_at,
                    event_id: event_id.to_string(),
                    hash: hash.clone(),
                    size: *size,
                    file_type: file_type.clone(),
                    encryption,
                }))
            }
        }
    }

    pub fn path(&self) -> &str {
        match self {
            DriveItem::File(f) => &f.path,
            DriveItem::Folder(f) => &f.path,
        }
    }

    pub fn created_at(&self) -> u64 {
        match self {
            DriveItem::File(f) => f.created_at,
            DriveItem::Folder(f) => f.created_at,
        }
    }

    pub fn event_id(&self) -> &str {
        match self {
            DriveItem::File(f) => &f.event_id,
            DriveItem::Folder(f) => &f.event_id,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, DriveItem::File(_))
    }

    pub fn as_file(&self) -> Option<&FileMetadata> {
        match self {
            DriveItem::File(f) => Some(f),
            DriveItem::Folder(_) => None,
        }
    }
}

/// Guess a MIME type from a path's extension. Unknown extensions give
/// `None`; content sniffing is out of scope.
pub fn detect_mime(drive_path: &str) -> Option<Mime> {
    let name = path::basename(drive_path);
    mime_guess::from_path(&name).first()
}

/// Case-insensitive MIME comparison for list filters.
pub fn mime_matches(file_type: &str, wanted: &str) -> bool {
    file_type.eq_ignore_ascii_case(wanted)
}

/// Validate a caller-supplied MIME string.
pub fn parse_mime(value: &str) -> Option<Mime> {
    Mime::from_str(value).ok()
}

/// Total ciphertext size of the files under a folder, computed over a
/// scan result rather than by asking any service for siblings.
pub fn folder_size<'a, I>(items: I, folder_path: &str) -> u64
where
    I: IntoIterator<Item = &'a FileMetadata>,
{
    items
        .into_iter()
        .filter(|f| path::is_within(folder_path, &f.path))
        .map(|f| f.size)
        .sum()
}
