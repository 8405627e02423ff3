//! Shared setup for the drive integration tests.

#![allow(dead_code)]

use std::time::Duration;

use service::testkit::{eventually, TestBench, TestDrive};

/// One user on a fresh network, engine not started.
pub async fn setup_drive() -> (TestBench, TestDrive) {
    let bench = TestBench::new();
    let drive = bench.drive().await.unwrap();
    (bench, drive)
}

/// Two users on one shared network, both engines live.
pub async fn setup_pair() -> (TestBench, TestDrive, TestDrive) {
    let bench = TestBench::new();
    let alice = bench.online_drive().await.unwrap();
    let bob = bench.online_drive().await.unwrap();
    (bench, alice, bob)
}

/// A private key that is nobody's identity on the bench, hex encoded.
pub fn intruder_key() -> String {
    ::common::crypto::SecretKey::generate().to_hex()
}

/// A public key that is nobody's identity on the bench, hex encoded.
pub fn intruder_pubkey() -> String {
    ::common::crypto::SecretKey::generate().public().to_hex()
}

/// Wait until a drive's listing at `scope` reaches `expected` entries.
pub async fn wait_for_count(drive: &TestDrive, scope: &str, expected: usize) {
    let drive = drive.clone();
    let scope = scope.to_string();
    eventually(Duration::from_secs(2), move || {
        let drive = drive.clone();
        let scope = scope.clone();
        async move {
            let items = drive
                .list(&scope, &[], true)
                .await
                .map_err(|e| e.to_string())?;
            Ok(items.len() == expected)
        }
    })
    .await
    .unwrap();
}
