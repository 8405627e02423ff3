//! Upload and download.

mod common;

use service::prelude::*;
use sha2::{Digest, Sha256};

#[tokio::test]
async fn encrypted_upload_roundtrips() {
    let (_bench, drive) = common::setup_drive().await;

    let meta = drive
        .upload_file(
            "hello".as_bytes(),
            "/f.txt",
            Some("text/plain".to_string()),
            true,
        )
        .await
        .unwrap();

    assert_eq!(meta.path, "/f.txt");
    assert_eq!(meta.file_type.as_deref(), Some("text/plain"));
    // Ciphertext carries the 16-byte tag.
    assert_eq!(meta.size, 5 + 16);

    let encryption = meta.encryption.as_ref().unwrap();
    assert_eq!(encryption.algorithm, "aes-gcm");
    let bytes = drive
        .download_file(&meta.hash, Some(&encryption.key), Some(&encryption.nonce))
        .await
        .unwrap();
    assert_eq!(bytes, b"hello");
}

#[tokio::test]
async fn plaintext_upload_hashes_the_original_bytes() {
    let (bench, drive) = common::setup_drive().await;

    let meta = drive
        .upload_file(b"plain data", "/p.bin", None, false)
        .await
        .unwrap();
    assert_eq!(meta.size, 10);
    assert_eq!(meta.hash, hex::encode(Sha256::digest(b"plain data")));
    assert!(meta.encryption.is_none());
    assert!(bench.blobs.contains(&meta.hash));

    let bytes = drive.download_file(&meta.hash, None, None).await.unwrap();
    assert_eq!(bytes, b"plain data");
}

#[tokio::test]
async fn mime_is_detected_from_the_path() {
    let (_bench, drive) = common::setup_drive().await;

    let png = drive
        .upload_file(b"x", "/shot.png", None, true)
        .await
        .unwrap();
    assert_eq!(png.file_type.as_deref(), Some("image/png"));

    let unknown = drive
        .upload_file(b"x", "/README", None, true)
        .await
        .unwrap();
    assert_eq!(unknown.file_type, None);
}

#[tokio::test]
async fn download_validates_key_material() {
    let (_bench, drive) = common::setup_drive().await;

    let meta = drive
        .upload_file(b"secret", "/s", None, true)
        .await
        .unwrap();
    let encryption = meta.encryption.unwrap();

    // Truncated key: rejected with the observed sizes.
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    let short_key = BASE64.encode([0u8; 16]);
    let result = drive
        .download_file(&meta.hash, Some(&short_key), Some(&encryption.nonce))
        .await;
    assert!(matches!(
        result,
        Err(DriveError::DecryptionFailed {
            key_len: 16,
            nonce_len: 12
        })
    ));

    // Wrong (but well-formed) key: tag check fails.
    let wrong_key = BASE64.encode([7u8; 32]);
    let result = drive
        .download_file(&meta.hash, Some(&wrong_key), Some(&encryption.nonce))
        .await;
    assert!(matches!(result, Err(DriveError::DecryptionFailed { .. })));

    // Key without nonce is malformed input.
    let result = drive
        .download_file(&meta.hash, Some(&encryption.key), None)
        .await;
    assert!(matches!(result, Err(DriveError::InvalidArgument(_))));
}

#[tokio::test]
async fn uploads_to_the_same_path_stack_as_versions() {
    let (_bench, drive) = common::setup_drive().await;

    let v1 = drive
        .upload_file(b"one", "/doc.txt", None, true)
        .await
        .unwrap();
    let v2 = drive
        .upload_file(b"two", "/doc.txt", None, true)
        .await
        .unwrap();
    assert!(v2.created_at > v1.created_at);

    // The listing shows only the current version.
    let items = drive.list("/", &[], false).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].event_id(), v2.event_id);

    // The history keeps both, newest first.
    let versions = drive.get_file_versions("/doc.txt").await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].event_id, v2.event_id);
    assert_eq!(versions[1].event_id, v1.event_id);
}

#[tokio::test]
async fn missing_blob_is_a_network_failure() {
    let (_bench, drive) = common::setup_drive().await;
    let result = drive
        .download_file(&"00".repeat(32), None, None)
        .await;
    assert!(matches!(result, Err(DriveError::Network(_))));
}
