//! Sync across devices, change notifications, and handle lifecycle.

mod common;

use std::time::Duration;

use service::prelude::*;
use service::testkit::{eventually, TestBench};

#[tokio::test]
async fn a_second_device_converges_to_the_same_view() {
    let bench = TestBench::new();
    let key = ::common::crypto::SecretKey::generate();

    let device_a = bench.drive_with_key(key.clone()).await.unwrap();
    device_a.create_folder("/Documents").await.unwrap();
    device_a
        .upload_file(b"hello", "/Documents/hi.txt", None, true)
        .await
        .unwrap();
    device_a
        .upload_file(b"hello again", "/Documents/hi.txt", None, true)
        .await
        .unwrap();
    device_a.delete_by_path("/Documents/hi.txt").await.unwrap();

    // A fresh device with the same identity replays history.
    let device_b = bench.drive_with_key(key).await.unwrap();
    device_b.sync_now().await.unwrap();

    let view_a = device_a.list("/", &[], true).await.unwrap();
    let view_b = device_b.list("/", &[], true).await.unwrap();
    assert_eq!(view_a, view_b);
    assert_eq!(view_b.len(), 1);
    assert_eq!(view_b[0].path(), "/Documents");
}

#[tokio::test]
async fn live_engine_projects_remote_deletes() {
    let bench = TestBench::new();
    let key = ::common::crypto::SecretKey::generate();

    let device_a = bench.drive_with_key(key.clone()).await.unwrap();
    let device_b = bench.drive_with_key(key).await.unwrap();
    device_b.start().await.unwrap();

    device_a.create_folder("/gone-soon").await.unwrap();
    common::wait_for_count(&device_b, "/", 1).await;

    device_a.delete_by_path("/gone-soon").await.unwrap();
    common::wait_for_count(&device_b, "/", 0).await;
}

#[tokio::test]
async fn change_stream_reports_operations_in_order() {
    let (_bench, drive) = common::setup_drive().await;
    let mut changes = drive.subscribe_changes();

    drive.create_folder("/a").await.unwrap();
    drive.upload_file(b"x", "/a/f", None, true).await.unwrap();
    drive.delete_by_path("/a").await.unwrap();

    let first = changes.recv().await.unwrap();
    assert_eq!(first.kind, ChangeKind::Added);
    assert_eq!(first.path.as_deref(), Some("/a"));

    let second = changes.recv().await.unwrap();
    assert_eq!(second.kind, ChangeKind::Added);
    assert_eq!(second.path.as_deref(), Some("/a/f"));

    let third = changes.recv().await.unwrap();
    assert_eq!(third.kind, ChangeKind::Deleted);
    assert_eq!(third.path.as_deref(), Some("/a"));
}

#[tokio::test]
async fn share_emits_a_shared_change() {
    let (_bench, drive) = common::setup_drive().await;
    let meta = drive.upload_file(b"x", "/f", None, true).await.unwrap();

    let mut changes = drive.subscribe_changes();
    drive
        .share_with_user(&meta.event_id, &common::intruder_pubkey())
        .await
        .unwrap();

    let change = changes.recv().await.unwrap();
    assert_eq!(change.kind, ChangeKind::Shared);
    assert_eq!(change.path.as_deref(), Some("/f"));
}

#[tokio::test]
async fn engine_walks_its_lifecycle_states() {
    let (_bench, drive) = common::setup_drive().await;
    assert_eq!(drive.engine_state(), EngineState::Idle);

    drive.start().await.unwrap();
    assert_eq!(drive.engine_state(), EngineState::Live);

    drive.on_account_changed().await.unwrap();
    assert_eq!(drive.engine_state(), EngineState::Live);

    drive.stop().await;
    assert_eq!(drive.engine_state(), EngineState::Stopped);
}

#[tokio::test]
async fn disposed_handles_refuse_everything() {
    let (_bench, drive) = common::setup_drive().await;
    drive.start().await.unwrap();
    drive.dispose().await;

    assert!(matches!(
        drive.list("/", &[], false).await,
        Err(DriveError::Terminated)
    ));
    assert!(matches!(
        drive.create_folder("/x").await,
        Err(DriveError::Terminated)
    ));
    assert!(matches!(drive.sync_now().await, Err(DriveError::Terminated)));

    // The change stream is closed too.
    let mut changes = drive.subscribe_changes();
    assert!(matches!(
        changes.recv().await,
        Err(tokio::sync::broadcast::error::RecvError::Closed)
    ));
}

#[tokio::test]
async fn watermark_resumes_without_reprocessing() {
    let bench = TestBench::new();
    let key = ::common::crypto::SecretKey::generate();

    let drive = bench.drive_with_key(key.clone()).await.unwrap();
    drive.create_folder("/persisted").await.unwrap();
    drive.sync_now().await.unwrap();

    // Syncing again finds nothing new to apply.
    drive.sync_now().await.unwrap();
    let items = drive.list("/", &[], true).await.unwrap();
    assert_eq!(items.len(), 1);

    // The same holds for a live engine started afterwards.
    drive.start().await.unwrap();
    eventually(Duration::from_millis(300), || {
        let drive = drive.clone();
        async move {
            Ok(drive.list("/", &[], true).await.map_err(|e| e.to_string())?.len() == 1)
        }
    })
    .await
    .unwrap();
    drive.stop().await;
}
