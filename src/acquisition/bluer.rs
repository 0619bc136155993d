//! BlueZ GATT client backend.

use super::{CharacteristicHandle, GattConnection, GattConnector, GattError};
use crate::address::DeviceAddress;
use bluer::gatt::remote::{Characteristic, Service};
use bluer::{Adapter, Device};
use futures::future::BoxFuture;
use log::{debug, warn};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use uuid::Uuid;

/// Upper bound on waiting for BlueZ to resolve remote services.
const SERVICE_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(10);
const SERVICE_RESOLUTION_POLL: Duration = Duration::from_millis(100);

impl From<bluer::Error> for GattError {
    fn from(err: bluer::Error) -> Self {
        GattError::Bluetooth(err.to_string())
    }
}

/// Connects to devices through a BlueZ adapter.
#[derive(Clone)]
pub struct BluerConnector {
    adapter: Adapter,
}

impl BluerConnector {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    async fn open(&self, address: DeviceAddress) -> Result<Box<dyn GattConnection>, GattError> {
        let device = self.adapter.device(address.into())?;
        if !device.is_connected().await? {
            device.connect().await?;
        }

        // Everything after the link is up happens on the connection, which
        // the caller always disconnects.
        Ok(Box::new(BluerConnection {
            device,
            services_resolved: false,
            located: Vec::new(),
        }))
    }
}

impl GattConnector for BluerConnector {
    fn connect(
        &self,
        address: DeviceAddress,
    ) -> BoxFuture<'_, Result<Box<dyn GattConnection>, GattError>> {
        Box::pin(self.open(address))
    }
}

/// Services are only listed once BlueZ has finished resolving them. On
/// timeout the connection is kept and the empty service list surfaces as a
/// missing service.
async fn wait_for_services(device: &Device) -> Result<(), GattError> {
    let deadline = Instant::now() + SERVICE_RESOLUTION_TIMEOUT;
    while !device.is_services_resolved().await? {
        if Instant::now() >= deadline {
            warn!("Services of {} not resolved in time", device.address());
            break;
        }
        sleep(SERVICE_RESOLUTION_POLL).await;
    }
    Ok(())
}

struct BluerConnection {
    device: Device,
    services_resolved: bool,
    /// Characteristics handed out as handles, indexed by handle value
    located: Vec<Characteristic>,
}

impl BluerConnection {
    async fn find_service(&mut self, uuid: Uuid) -> Result<Option<Service>, GattError> {
        if !self.services_resolved {
            wait_for_services(&self.device).await?;
            self.services_resolved = true;
        }
        for service in self.device.services().await? {
            if service.uuid().await? == uuid {
                return Ok(Some(service));
            }
        }
        Ok(None)
    }

    async fn exposes(&mut self, service: Uuid) -> Result<bool, GattError> {
        Ok(self.find_service(service).await?.is_some())
    }

    async fn close(&self) -> Result<(), GattError> {
        self.device.disconnect().await?;
        Ok(())
    }

    async fn locate(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Option<CharacteristicHandle>, GattError> {
        let Some(service) = self.find_service(service).await? else {
            return Ok(None);
        };

        for candidate in service.characteristics().await? {
            if candidate.uuid().await? == characteristic {
                self.located.push(candidate);
                return Ok(Some(CharacteristicHandle(self.located.len() - 1)));
            }
        }
        Ok(None)
    }

    async fn read_located(
        &self,
        handle: CharacteristicHandle,
    ) -> Result<Option<Vec<u8>>, GattError> {
        let Some(characteristic) = self.located.get(handle.0) else {
            return Ok(None);
        };
        let value = characteristic.read().await?;
        debug!("Read {} bytes from {}", value.len(), characteristic.uuid().await?);
        Ok((!value.is_empty()).then_some(value))
    }
}

impl GattConnection for BluerConnection {
    fn has_service(&mut self, service: Uuid) -> BoxFuture<'_, Result<bool, GattError>> {
        Box::pin(self.exposes(service))
    }

    fn characteristic(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> BoxFuture<'_, Result<Option<CharacteristicHandle>, GattError>> {
        Box::pin(self.locate(service, characteristic))
    }

    fn read(
        &mut self,
        handle: CharacteristicHandle,
    ) -> BoxFuture<'_, Result<Option<Vec<u8>>, GattError>> {
        Box::pin(self.read_located(handle))
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<(), GattError>> {
        Box::pin(self.close())
    }
}
