//! Folder creation and listing.

mod common;

use service::prelude::*;

#[tokio::test]
async fn create_folder_appears_in_root_listing() {
    let (_bench, drive) = common::setup_drive().await;

    drive.create_folder("/Documents/").await.unwrap();

    let items = drive.list("/", &[], false).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].path(), "/Documents");
    assert!(!items[0].is_file());
}

#[tokio::test]
async fn listing_scopes_to_direct_children() {
    let (_bench, drive) = common::setup_drive().await;

    drive.create_folder("/a").await.unwrap();
    drive.create_folder("/a/b").await.unwrap();

    let items = drive.list("/a", &[], false).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].path(), "/a/b");

    // The root sees only /a without recursion, both with it.
    assert_eq!(drive.list("/", &[], false).await.unwrap().len(), 1);
    assert_eq!(drive.list("/", &[], true).await.unwrap().len(), 2);
}

#[tokio::test]
async fn create_folder_is_idempotent() {
    let (bench, drive) = common::setup_drive().await;

    let first = drive.create_folder("/dup").await.unwrap();
    let second = drive.create_folder("/dup").await.unwrap();
    assert_eq!(first.event_id, second.event_id);

    // Only one event was ever broadcast.
    assert_eq!(bench.relay.stored_events().len(), 1);
}

#[tokio::test]
async fn relative_paths_are_rejected_without_side_effects() {
    let (bench, drive) = common::setup_drive().await;

    let result = drive.create_folder("relative/path").await;
    assert!(matches!(result, Err(DriveError::InvalidArgument(_))));
    assert!(bench.relay.stored_events().is_empty());
    assert!(drive.list("/", &[], true).await.unwrap().is_empty());

    assert!(matches!(
        drive.list("no-slash", &[], false).await,
        Err(DriveError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn search_matches_names_paths_and_types() {
    let (_bench, drive) = common::setup_drive().await;

    drive.create_folder("/Photos").await.unwrap();
    drive
        .upload_file(b"img", "/Photos/holiday.png", None, true)
        .await
        .unwrap();
    drive
        .upload_file(b"txt", "/notes.txt", Some("text/plain".to_string()), true)
        .await
        .unwrap();

    let by_name = drive.search("holiday").await.unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].path(), "/Photos/holiday.png");

    // Case-insensitive, and folder paths match too.
    let by_path = drive.search("photos").await.unwrap();
    assert_eq!(by_path.len(), 2);

    let by_type = drive.search("text/plain").await.unwrap();
    assert_eq!(by_type.len(), 1);
    assert_eq!(by_type[0].path(), "/notes.txt");

    assert!(drive.search("nothing-here").await.unwrap().is_empty());
}

#[tokio::test]
async fn list_filters_by_mime_type() {
    let (_bench, drive) = common::setup_drive().await;

    drive
        .upload_file(b"a", "/a.png", Some("image/png".to_string()), true)
        .await
        .unwrap();
    drive
        .upload_file(b"b", "/b.txt", Some("text/plain".to_string()), true)
        .await
        .unwrap();
    drive.create_folder("/c").await.unwrap();

    let images = drive
        .list("/", &["IMAGE/PNG".to_string()], false)
        .await
        .unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].path(), "/a.png");
}
