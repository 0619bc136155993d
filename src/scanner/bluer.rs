//! BlueZ D-Bus backend for Wave discovery.
//!
//! This backend uses the `bluer` crate to communicate with the BlueZ daemon
//! via D-Bus. It requires the `bluetoothd` daemon to be running.

use super::{ADVERTISEMENT_CHANNEL_BUFFER_SIZE, Advertisement, ScanError, Scanner};
use bluer::{Adapter, AdapterEvent, Address, DiscoveryFilter, DiscoveryTransport, Session};
use futures::StreamExt;
use futures::future::BoxFuture;
use log::{debug, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Open a BlueZ session and power on the requested adapter.
///
/// The returned session must be kept alive for as long as the adapter is in
/// use.
pub async fn open_adapter(name: Option<&str>) -> Result<(Session, Adapter), ScanError> {
    let session = Session::new().await?;
    let adapter = match name {
        Some(name) => session.adapter(name)?,
        None => session.default_adapter().await?,
    };
    adapter.set_powered(true).await?;
    Ok((session, adapter))
}

/// Scanner backed by BlueZ device discovery.
#[derive(Clone)]
pub struct BluerScanner {
    adapter: Adapter,
}

impl BluerScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    async fn scan(&self, services: &[Uuid]) -> Result<mpsc::Receiver<Advertisement>, ScanError> {
        let filter = DiscoveryFilter {
            uuids: services.iter().copied().collect(),
            transport: DiscoveryTransport::Le,
            duplicate_data: false,
            ..Default::default()
        };
        if let Err(e) = self.adapter.set_discovery_filter(filter).await {
            warn!("Failed to set discovery filter: {}", e);
        }

        let events = self.adapter.discover_devices().await?;
        let adapter = self.adapter.clone();
        let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

        // The task owns the discovery stream; BlueZ stops discovering once it is dropped.
        tokio::spawn(async move {
            let mut events = Box::pin(events);
            loop {
                let event = tokio::select! {
                    event = events.next() => event,
                    _ = tx.closed() => break,
                };
                let Some(event) = event else { break };

                if let AdapterEvent::DeviceAdded(address) = event {
                    match read_advertisement(&adapter, address).await {
                        Ok(advertisement) => {
                            if tx.send(advertisement).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!("Skipping {}: {}", address, e),
                    }
                }
            }
            debug!("Discovery stopped");
        });

        Ok(rx)
    }
}

impl Scanner for BluerScanner {
    fn start_scan<'a>(
        &'a self,
        services: &'a [Uuid],
    ) -> BoxFuture<'a, Result<mpsc::Receiver<Advertisement>, ScanError>> {
        Box::pin(self.scan(services))
    }
}

async fn read_advertisement(
    adapter: &Adapter,
    address: Address,
) -> Result<Advertisement, ScanError> {
    let device = adapter.device(address)?;
    let services = device.uuids().await?.unwrap_or_default();

    Ok(Advertisement {
        address: address.into(),
        services: services.into_iter().collect(),
    })
}
