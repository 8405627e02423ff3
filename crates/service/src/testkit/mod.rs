//! Test doubles and helpers.
//!
//! [`TestBench`] wires drives for several users onto one shared relay
//! and blob network, which is all the integration scenarios need.

mod blobs;
mod relay;

pub use blobs::{MemoryBlobError, MemoryBlobStore};
pub use relay::{MemoryRelay, MemoryRelayError};

use std::time::Duration;

use common::crypto::SecretKey;

use crate::config::Config;
use crate::drive::Drive;
use crate::error::DriveError;
use crate::signer::LocalSigner;

pub type TestDrive = Drive<LocalSigner, MemoryRelay, MemoryBlobStore>;

/// A shared relay and blob network for multi-user tests.
#[derive(Clone, Default)]
pub struct TestBench {
    pub relay: MemoryRelay,
    pub blobs: MemoryBlobStore,
}

impl TestBench {
    pub fn new() -> Self {
        Self::default()
    }

    /// A drive for a fresh identity, engine not started.
    pub async fn drive(&self) -> Result<TestDrive, DriveError> {
        self.drive_with_key(SecretKey::generate()).await
    }

    /// A drive for a specific identity, engine not started.
    pub async fn drive_with_key(&self, key: SecretKey) -> Result<TestDrive, DriveError> {
        Drive::new(
            LocalSigner::new(key),
            self.relay.clone(),
            self.blobs.clone(),
            Config::default(),
        )
        .await
    }

    /// A drive with the engine already live.
    pub async fn online_drive(&self) -> Result<TestDrive, DriveError> {
        let drive = self.drive().await?;
        drive.start().await?;
        Ok(drive)
    }
}

/// Poll a condition until it succeeds or times out. Useful for
/// eventual consistency across drives.
pub async fn eventually<F, Fut>(timeout: Duration, condition: F) -> Result<(), String>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<bool, String>>,
{
    let start = std::time::Instant::now();
    let poll_interval = Duration::from_millis(10);

    loop {
        match condition().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(err) => tracing::debug!("eventual condition check error: {}", err),
        }
        if start.elapsed() > timeout {
            return Err(format!("condition not met within timeout ({timeout:?})"));
        }
        tokio::time::sleep(poll_interval).await;
    }
}
