//! Discovery of Wave sensors by their advertised services.
//!
//! Backends push every advertisement they see into a channel. [`discover`]
//! consumes that channel and turns the stream into a single bounded wait:
//! it returns on the first advertisement whose services intersect the known
//! set, or gives up when the scan window elapses.

#[cfg(feature = "bluer")]
pub mod bluer;

use crate::address::DeviceAddress;
use futures::future::BoxFuture;
use log::debug;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Channel buffer size for advertisements.
pub const ADVERTISEMENT_CHANNEL_BUFFER_SIZE: usize = 64;

/// A single advertisement as seen by a scanner backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    pub address: DeviceAddress,
    /// Service identifiers listed in the advertisement
    pub services: Vec<Uuid>,
}

impl Advertisement {
    /// Whether any advertised service is in `known`.
    pub fn matches(&self, known: &[Uuid]) -> bool {
        self.services.iter().any(|uuid| known.contains(uuid))
    }
}

/// Result of a bounded discovery scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Found(DeviceAddress),
    NotFound,
}

/// Error type for scanner operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// Scanner abstraction to enable deterministic tests without Bluetooth hardware.
///
/// A scan stays active while the returned receiver is alive; dropping the
/// receiver stops it.
pub trait Scanner: Send + Sync {
    fn start_scan<'a>(
        &'a self,
        services: &'a [Uuid],
    ) -> BoxFuture<'a, Result<mpsc::Receiver<Advertisement>, ScanError>>;
}

/// Wait for the first advertisement matching one of `known`.
///
/// Returns as soon as a match arrives. Returns [`DiscoveryOutcome::NotFound`]
/// when `window` elapses or the backend closes the channel first.
pub async fn discover(
    advertisements: &mut mpsc::Receiver<Advertisement>,
    known: &[Uuid],
    window: Duration,
) -> DiscoveryOutcome {
    let first_match = async {
        while let Some(advertisement) = advertisements.recv().await {
            if advertisement.matches(known) {
                return Some(advertisement.address);
            }
            debug!("Ignoring advertisement from {}", advertisement.address);
        }
        None
    };

    match tokio::time::timeout(window, first_match).await {
        Ok(Some(address)) => DiscoveryOutcome::Found(address),
        Ok(None) | Err(_) => DiscoveryOutcome::NotFound,
    }
}

/// Start a scan on `scanner` and wait for the first matching device.
pub async fn scan_for_device(
    scanner: &dyn Scanner,
    known: &[Uuid],
    window: Duration,
) -> Result<DiscoveryOutcome, ScanError> {
    let mut advertisements = scanner.start_scan(known).await?;
    Ok(discover(&mut advertisements, known, window).await)
}
