//! Airthings Wave radio service layout.
//!
//! Two hardware generations are supported. Each advertises its own primary
//! service and exposes a different set of characteristics:
//!
//! - **Wave** (first generation): four independent registers, temperature
//!   and humidity use the standard 16-bit environmental sensing
//!   characteristics, the radon averages use vendor characteristics.
//! - **Wave Plus**: one vendor characteristic holding a packed record with
//!   every measurement.
//!
//! All identifiers are fixed by the vendor and not configurable.

use std::fmt;
use uuid::Uuid;

/// Expand a 16-bit assigned number into a full 128-bit UUID using the
/// Bluetooth base UUID `0000xxxx-0000-1000-8000-00805f9b34fb`.
pub const fn short_uuid(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5f9b_34fb)
}

/// Primary service of the first-generation Wave.
pub const WAVE_SERVICE: Uuid = Uuid::from_u128(0xb42e1f6e_ade7_11e4_89d3_123b93f75cba);

/// Primary service of the Wave Plus.
pub const WAVE_PLUS_SERVICE: Uuid = Uuid::from_u128(0xb42e1c08_ade7_11e4_89d3_123b93f75cba);

/// Temperature, signed centi-degrees Celsius (GATT assigned number 0x2A6E).
pub const WAVE_TEMPERATURE: Uuid = short_uuid(0x2a6e);

/// Relative humidity, centi-percent (GATT assigned number 0x2A6F).
pub const WAVE_HUMIDITY: Uuid = short_uuid(0x2a6f);

/// Radon short-term (24 hour) average in Bq/m3.
pub const WAVE_RADON_SHORT_TERM: Uuid = Uuid::from_u128(0xb42e01aa_ade7_11e4_89d3_123b93f75cba);

/// Radon long-term average in Bq/m3.
pub const WAVE_RADON_LONG_TERM: Uuid = Uuid::from_u128(0xb42e0a4c_ade7_11e4_89d3_123b93f75cba);

/// Packed current-values record of the Wave Plus.
pub const WAVE_PLUS_CURRENT_VALUES: Uuid =
    Uuid::from_u128(0xb42e2a68_ade7_11e4_89d3_123b93f75cba);

/// Every service identifier the discovery scan looks for.
pub const KNOWN_SERVICES: [Uuid; 2] = [WAVE_SERVICE, WAVE_PLUS_SERVICE];

/// Hardware generation of a discovered sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceVariant {
    /// First-generation Wave (four separate registers).
    Wave,
    /// Wave Plus (single packed record).
    WavePlus,
}

impl DeviceVariant {
    /// Variants in the order acquisition probes for their service.
    pub const PROBE_ORDER: [DeviceVariant; 2] = [DeviceVariant::Wave, DeviceVariant::WavePlus];

    /// The primary service identifying this variant.
    pub fn service(self) -> Uuid {
        match self {
            DeviceVariant::Wave => WAVE_SERVICE,
            DeviceVariant::WavePlus => WAVE_PLUS_SERVICE,
        }
    }
}

impl fmt::Display for DeviceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceVariant::Wave => write!(f, "Wave"),
            DeviceVariant::WavePlus => write!(f, "Wave Plus"),
        }
    }
}
