//! Reading acquisition over a GATT connection.
//!
//! [`acquire`] owns the connection for the duration of one read: it
//! connects, identifies the device generation from its services, runs the
//! read procedure for exactly that generation, and disconnects on every
//! path before returning.

#[cfg(feature = "bluer")]
pub mod bluer;

use crate::address::DeviceAddress;
use crate::decoder::{self, WavePlusRecord, WaveRegisters};
use crate::reading::DecodedReading;
use crate::sensor::{
    DeviceVariant, WAVE_HUMIDITY, WAVE_PLUS_CURRENT_VALUES, WAVE_PLUS_SERVICE,
    WAVE_RADON_LONG_TERM, WAVE_RADON_SHORT_TERM, WAVE_SERVICE, WAVE_TEMPERATURE,
};
use futures::future::BoxFuture;
use log::{info, warn};
use thiserror::Error;
use uuid::Uuid;

/// Transport-level GATT failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GattError {
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// Errors returned by [`acquire`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AcquireError {
    #[error("connecting to {address} failed: {source}")]
    ConnectFailed {
        address: DeviceAddress,
        source: GattError,
    },
    #[error("{0} exposes neither a Wave nor a Wave Plus service")]
    ServiceNotFound(DeviceAddress),
    #[error("characteristic {0} is missing")]
    CharacteristicMissing(Uuid),
    #[error("reading characteristic {characteristic} failed: {source}")]
    ReadFailed {
        characteristic: Uuid,
        source: GattError,
    },
    #[error("characteristic {characteristic} returned a malformed value ({len} bytes)")]
    MalformedValue { characteristic: Uuid, len: usize },
    #[error("service discovery failed: {0}")]
    Gatt(#[from] GattError),
}

/// Opaque reference to a characteristic located on an open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicHandle(pub usize);

/// An open GATT connection to a single device.
pub trait GattConnection: Send {
    /// Whether the device exposes `service`.
    fn has_service(&mut self, service: Uuid) -> BoxFuture<'_, Result<bool, GattError>>;

    /// Locate a characteristic of `service`, `None` when absent.
    fn characteristic(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> BoxFuture<'_, Result<Option<CharacteristicHandle>, GattError>>;

    /// Read a characteristic value, `None` when the device returned no data.
    fn read(
        &mut self,
        handle: CharacteristicHandle,
    ) -> BoxFuture<'_, Result<Option<Vec<u8>>, GattError>>;

    fn disconnect(&mut self) -> BoxFuture<'_, Result<(), GattError>>;
}

/// Opens GATT connections by device address.
pub trait GattConnector: Send + Sync {
    fn connect(
        &self,
        address: DeviceAddress,
    ) -> BoxFuture<'_, Result<Box<dyn GattConnection>, GattError>>;
}

/// The four Wave registers, in [`WaveRegisters`] field order.
const WAVE_REGISTERS: [Uuid; 4] = [
    WAVE_TEMPERATURE,
    WAVE_HUMIDITY,
    WAVE_RADON_SHORT_TERM,
    WAVE_RADON_LONG_TERM,
];

/// Connect to `address`, read the current values and decode them.
///
/// The connection is closed before returning, whether the read succeeded
/// or not. A disconnect failure is logged and does not change the result.
pub async fn acquire(
    connector: &dyn GattConnector,
    address: DeviceAddress,
) -> Result<DecodedReading, AcquireError> {
    let mut connection = connector
        .connect(address)
        .await
        .map_err(|source| AcquireError::ConnectFailed { address, source })?;

    let result = read_connected(connection.as_mut(), address).await;

    if let Err(e) = connection.disconnect().await {
        warn!("Failed to disconnect from {}: {}", address, e);
    }

    result
}

async fn read_connected(
    connection: &mut dyn GattConnection,
    address: DeviceAddress,
) -> Result<DecodedReading, AcquireError> {
    let variant = detect_variant(connection, address).await?;
    info!("{} is a {}", address, variant);
    read_variant(connection, variant).await
}

/// Probe for the Wave service first, then the Wave Plus service.
pub async fn detect_variant(
    connection: &mut dyn GattConnection,
    address: DeviceAddress,
) -> Result<DeviceVariant, AcquireError> {
    for variant in DeviceVariant::PROBE_ORDER {
        if connection.has_service(variant.service()).await? {
            return Ok(variant);
        }
    }
    Err(AcquireError::ServiceNotFound(address))
}

/// Run the read procedure for `variant` and nothing else.
pub async fn read_variant(
    connection: &mut dyn GattConnection,
    variant: DeviceVariant,
) -> Result<DecodedReading, AcquireError> {
    match variant {
        DeviceVariant::Wave => read_wave(connection).await,
        DeviceVariant::WavePlus => read_wave_plus(connection).await,
    }
}

async fn find(
    connection: &mut dyn GattConnection,
    service: Uuid,
    characteristic: Uuid,
) -> Result<CharacteristicHandle, AcquireError> {
    connection
        .characteristic(service, characteristic)
        .await?
        .ok_or(AcquireError::CharacteristicMissing(characteristic))
}

async fn read_value(
    connection: &mut dyn GattConnection,
    handle: CharacteristicHandle,
    characteristic: Uuid,
) -> Result<Vec<u8>, AcquireError> {
    connection
        .read(handle)
        .await
        .map_err(|source| AcquireError::ReadFailed {
            characteristic,
            source,
        })?
        .ok_or(AcquireError::CharacteristicMissing(characteristic))
}

async fn read_register(
    connection: &mut dyn GattConnection,
    handle: CharacteristicHandle,
    characteristic: Uuid,
) -> Result<u16, AcquireError> {
    let value = read_value(connection, handle, characteristic).await?;
    match value.as_slice() {
        [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
        _ => Err(AcquireError::MalformedValue {
            characteristic,
            len: value.len(),
        }),
    }
}

async fn read_wave(connection: &mut dyn GattConnection) -> Result<DecodedReading, AcquireError> {
    // Every handle must be present before anything is read.
    let mut handles = [CharacteristicHandle(0); 4];
    for (handle, uuid) in handles.iter_mut().zip(WAVE_REGISTERS) {
        *handle = find(connection, WAVE_SERVICE, uuid).await?;
    }

    let mut raw = [0u16; 4];
    for ((value, handle), uuid) in raw.iter_mut().zip(handles).zip(WAVE_REGISTERS) {
        *value = read_register(connection, handle, uuid).await?;
    }

    let [temperature, humidity, radon_short_term, radon_long_term] = raw;
    Ok(decoder::decode_wave(&WaveRegisters {
        temperature,
        humidity,
        radon_short_term,
        radon_long_term,
    }))
}

async fn read_wave_plus(
    connection: &mut dyn GattConnection,
) -> Result<DecodedReading, AcquireError> {
    let handle = find(connection, WAVE_PLUS_SERVICE, WAVE_PLUS_CURRENT_VALUES).await?;
    let value = read_value(connection, handle, WAVE_PLUS_CURRENT_VALUES).await?;

    let record = WavePlusRecord::parse(&value).map_err(|_| AcquireError::MalformedValue {
        characteristic: WAVE_PLUS_CURRENT_VALUES,
        len: value.len(),
    })?;
    Ok(decoder::decode_wave_plus(&record))
}
