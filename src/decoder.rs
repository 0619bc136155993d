//! Register decoding for both Wave generations.
//!
//! Everything here is pure: raw register values go in, formatted strings in
//! physical units come out. Detecting missing or short buffers is the job of
//! acquisition; the only fallible step is [`WavePlusRecord::parse`], which
//! checks the record length before any field is read.

use crate::reading::{CoreValues, DecodedReading, ExtendedValues};
use thiserror::Error;

/// Conversion from Bq/m3 (the device's native unit) to pCi/L.
pub const BQ_PER_PCI_L: f64 = 37.0;

/// Number of bytes occupied by the fields of a Wave Plus record.
pub const WAVE_PLUS_RECORD_LEN: usize = 16;

/// Errors raised while interpreting raw register buffers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    /// The Wave Plus record is shorter than its fixed layout
    #[error("record too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
}

/// The four independent registers of a first-generation Wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaveRegisters {
    pub temperature: u16,
    pub humidity: u16,
    pub radon_short_term: u16,
    pub radon_long_term: u16,
}

/// The packed current-values record of a Wave Plus.
///
/// Layout (all multi-byte fields little-endian `u16`):
///
/// | offset | field |
/// |---|---|
/// | 0 | firmware version |
/// | 1 | humidity, half-percent |
/// | 2 | ambient light |
/// | 3 | unused |
/// | 4..6 | radon short-term average, Bq/m3 |
/// | 6..8 | radon long-term average, Bq/m3 |
/// | 8..10 | temperature, centi-degrees |
/// | 10..12 | pressure, 1/50 hPa |
/// | 12..14 | CO2, ppm |
/// | 14..16 | VOC, ppb |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WavePlusRecord {
    pub version: u8,
    pub humidity: u8,
    pub ambient_light: u8,
    pub radon_short_term: u16,
    pub radon_long_term: u16,
    pub temperature: u16,
    pub pressure: u16,
    pub co2: u16,
    pub voc: u16,
}

fn le_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

impl WavePlusRecord {
    /// Read the record from fixed byte offsets.
    ///
    /// Bytes past the documented layout are ignored.
    pub fn parse(data: &[u8]) -> Result<Self, RecordError> {
        if data.len() < WAVE_PLUS_RECORD_LEN {
            return Err(RecordError::TooShort {
                expected: WAVE_PLUS_RECORD_LEN,
                actual: data.len(),
            });
        }

        Ok(WavePlusRecord {
            version: data[0],
            humidity: data[1],
            ambient_light: data[2],
            radon_short_term: le_u16(data, 4),
            radon_long_term: le_u16(data, 6),
            temperature: le_u16(data, 8),
            pressure: le_u16(data, 10),
            co2: le_u16(data, 12),
            voc: le_u16(data, 14),
        })
    }
}

/// Shortest round-trip representation that always carries a decimal point.
fn format_default(value: f64) -> String {
    format!("{value:?}")
}

/// Wave temperature: the register is a signed value in centi-degrees.
pub fn wave_temperature(raw: u16) -> String {
    format!("{:.2}", f64::from(raw as i16) / 100.0)
}

/// Wave humidity: unsigned centi-percent.
pub fn wave_humidity(raw: u16) -> String {
    format!("{:.2}", f64::from(raw) / 100.0)
}

/// Radon average converted from Bq/m3 to pCi/L.
pub fn wave_radon(raw: u16) -> String {
    format_default(f64::from(raw) / BQ_PER_PCI_L)
}

/// Wave Plus humidity: half-percent steps.
pub fn wave_plus_humidity(raw: u8) -> String {
    format!("{:.2}", f64::from(raw) / 2.0)
}

/// Wave Plus temperature: centi-degrees, read without sign reinterpretation.
pub fn wave_plus_temperature(raw: u16) -> String {
    format!("{:.2}", f64::from(raw) / 100.0)
}

/// Wave Plus pressure in hPa.
pub fn wave_plus_pressure(raw: u16) -> String {
    format!("{:.1}", f64::from(raw) / 50.0)
}

/// Decode the four Wave registers.
pub fn decode_wave(registers: &WaveRegisters) -> DecodedReading {
    DecodedReading::Wave(CoreValues {
        temperature: wave_temperature(registers.temperature),
        humidity: wave_humidity(registers.humidity),
        radon_short_term: wave_radon(registers.radon_short_term),
        radon_long_term: wave_radon(registers.radon_long_term),
    })
}

/// Decode a Wave Plus record.
///
/// Radon, light, version and gas values are published as raw integers.
pub fn decode_wave_plus(record: &WavePlusRecord) -> DecodedReading {
    DecodedReading::WavePlus(
        CoreValues {
            temperature: wave_plus_temperature(record.temperature),
            humidity: wave_plus_humidity(record.humidity),
            radon_short_term: record.radon_short_term.to_string(),
            radon_long_term: record.radon_long_term.to_string(),
        },
        ExtendedValues {
            pressure: wave_plus_pressure(record.pressure),
            co2: record.co2.to_string(),
            voc: record.voc.to_string(),
            ambient_light: record.ambient_light.to_string(),
            firmware_version: record.version.to_string(),
        },
    )
}
