//! Decoded sensor readings.

use crate::sensor::DeviceVariant;
use std::fmt;

/// A named physical quantity reported by the sensor.
///
/// Each quantity is published under a fixed topic suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Temperature,
    Humidity,
    /// Radon short-term (24 hour) average
    RadonShortTerm,
    /// Radon long-term (lifetime) average
    RadonLongTerm,
    Pressure,
    Co2,
    Voc,
    AmbientLight,
    FirmwareVersion,
}

impl Quantity {
    /// Topic suffix appended to the configured namespace.
    pub fn topic_suffix(self) -> &'static str {
        match self {
            Quantity::Temperature => "temperature",
            Quantity::Humidity => "humidity",
            Quantity::RadonShortTerm => "radon24hour",
            Quantity::RadonLongTerm => "radonLifetime",
            Quantity::Pressure => "pressure",
            Quantity::Co2 => "co2",
            Quantity::Voc => "voc",
            Quantity::AmbientLight => "ambientlight",
            Quantity::FirmwareVersion => "version",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic_suffix())
    }
}

/// Values shared by both device generations, formatted for publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreValues {
    pub temperature: String,
    pub humidity: String,
    pub radon_short_term: String,
    pub radon_long_term: String,
}

/// Values only the Wave Plus reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedValues {
    pub pressure: String,
    pub co2: String,
    pub voc: String,
    pub ambient_light: String,
    pub firmware_version: String,
}

/// One complete set of formatted values from a single acquisition.
///
/// The shape of each variant guarantees that a reading is always fully
/// populated for the device generation it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedReading {
    Wave(CoreValues),
    WavePlus(CoreValues, ExtendedValues),
}

impl DecodedReading {
    pub fn variant(&self) -> DeviceVariant {
        match self {
            DecodedReading::Wave(_) => DeviceVariant::Wave,
            DecodedReading::WavePlus(..) => DeviceVariant::WavePlus,
        }
    }

    pub fn core(&self) -> &CoreValues {
        match self {
            DecodedReading::Wave(core) | DecodedReading::WavePlus(core, _) => core,
        }
    }

    pub fn extended(&self) -> Option<&ExtendedValues> {
        match self {
            DecodedReading::Wave(_) => None,
            DecodedReading::WavePlus(_, extended) => Some(extended),
        }
    }

    /// Look up the formatted value of a single quantity.
    pub fn get(&self, quantity: Quantity) -> Option<&str> {
        self.values()
            .into_iter()
            .find(|(q, _)| *q == quantity)
            .map(|(_, value)| value)
    }

    /// All values in publish order: the mandatory set first, then the Wave
    /// Plus extensions when present.
    pub fn values(&self) -> Vec<(Quantity, &str)> {
        let core = self.core();
        let mut values = vec![
            (Quantity::Temperature, core.temperature.as_str()),
            (Quantity::Humidity, core.humidity.as_str()),
            (Quantity::RadonShortTerm, core.radon_short_term.as_str()),
            (Quantity::RadonLongTerm, core.radon_long_term.as_str()),
        ];

        if let Some(ext) = self.extended() {
            values.extend([
                (Quantity::Pressure, ext.pressure.as_str()),
                (Quantity::Co2, ext.co2.as_str()),
                (Quantity::Voc, ext.voc.as_str()),
                (Quantity::FirmwareVersion, ext.firmware_version.as_str()),
                (Quantity::AmbientLight, ext.ambient_light.as_str()),
            ]);
        }

        values
    }
}
