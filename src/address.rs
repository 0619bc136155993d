//! Radio address of a discovered sensor.
//!
//! Kept independent of the Bluetooth library so discovery results can be
//! produced and compared in tests without a radio stack.

use std::fmt;

/// A 6-byte Bluetooth device address, most significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceAddress(pub [u8; 6]);

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[cfg(feature = "bluer")]
impl From<bluer::Address> for DeviceAddress {
    fn from(addr: bluer::Address) -> Self {
        Self(addr.0)
    }
}

#[cfg(feature = "bluer")]
impl From<DeviceAddress> for bluer::Address {
    fn from(addr: DeviceAddress) -> Self {
        bluer::Address(addr.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_uppercase_colon_separated() {
        let addr = DeviceAddress([0x98, 0x07, 0x2d, 0x0a, 0x1b, 0x2c]);
        assert_eq!(addr.to_string(), "98:07:2D:0A:1B:2C");
    }

    #[test]
    fn test_display_pads_octets() {
        let addr = DeviceAddress([0x00, 0x01, 0x0A, 0x10, 0xF0, 0xFF]);
        assert_eq!(addr.to_string(), "00:01:0A:10:F0:FF");
    }

    #[cfg(feature = "bluer")]
    #[test]
    fn test_bluer_address_round_trip() {
        let addr = DeviceAddress([0x98, 0x07, 0x2d, 0x0a, 0x1b, 0x2c]);
        let bluer_addr: bluer::Address = addr.into();
        assert_eq!(DeviceAddress::from(bluer_addr), addr);
    }
}
