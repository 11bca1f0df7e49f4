use crate::base::{Error, Result};
use crate::utils::{decode_angle, decode_speed, encode_angle, encode_speed};
use std::fmt;

/// Number of bits the address occupies in request and response headers.
pub const ADDRESS_LENGTH: u32 = 4;

/// Bus address of a rotary table axis or accessory.
///
/// Addresses occupy the high nibble of the frame header, so only values 0 to 15 exist.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(u8);

impl Address {
    /// Address every device listens to; nobody answers it.
    pub const BROADCAST: Address = Address(0xF);

    /// Address of the power converter accessory.
    pub const CONVERTER: Address = Address(0xE);

    /// Creates an address, rejecting values that do not fit the 4-bit field.
    pub fn new(address: u8) -> Result<Address> {
        if address >> ADDRESS_LENGTH != 0 {
            return Err(Error::InvalidAddress { address });
        }
        Ok(Address(address))
    }

    /// Address held in the high nibble of a header byte.
    #[inline]
    pub(crate) fn from_header(header: u8) -> Address {
        Address(header >> ADDRESS_LENGTH)
    }

    /// Numeric value of the address.
    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Returns `true` for the broadcast address.
    #[inline]
    pub fn is_broadcast(self) -> bool {
        self == Address::BROADCAST
    }
}

impl TryFrom<u8> for Address {
    type Error = Error;

    fn try_from(address: u8) -> Result<Address> {
        Address::new(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A target or reported turntable angle.
///
/// Holds the wire representation, so every `Angle` is already normalized to [0, 360) and
/// rounded to 1/8 degree.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Angle {
    raw: u16,
}

impl Angle {
    /// Home position.
    pub const ZERO: Angle = Angle { raw: 0 };

    /// Normalizes and rounds `degrees` into an encodable angle.
    pub fn from_degrees(degrees: f64) -> Result<Angle> {
        Ok(Angle {
            raw: encode_angle(degrees)?,
        })
    }

    /// Wraps a fixed-point word as received from the device.
    #[inline]
    pub fn from_raw(raw: u16) -> Angle {
        Angle { raw }
    }

    /// Angle in degrees.
    #[inline]
    pub fn degrees(&self) -> f64 {
        decode_angle(self.raw.to_be_bytes())
    }

    /// Fixed-point word as sent on the wire.
    #[inline]
    pub fn raw(&self) -> u16 {
        self.raw
    }
}

/// Fixed-point layout of rotational speeds: the step size and the largest accepted magnitude.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SpeedFormat {
    /// Size of one speed step in rpm.
    pub precision: f64,
    /// Largest magnitude in rpm accepted before encoding.
    pub max_rpm: f64,
}

impl SpeedFormat {
    /// Number of distinct speed steps on each side of zero.
    pub const SPEED_MAX: f64 = 128.0;

    pub fn new(precision: f64, max_rpm: f64) -> SpeedFormat {
        SpeedFormat { precision, max_rpm }
    }

    /// Format with the given step size and the matching maximum of `SPEED_MAX` steps.
    pub fn with_precision(precision: f64) -> SpeedFormat {
        SpeedFormat::new(precision, SpeedFormat::SPEED_MAX * precision)
    }
}

impl Default for SpeedFormat {
    fn default() -> Self {
        SpeedFormat::with_precision(0.25)
    }
}

/// A signed rotational speed already rounded to its format's precision.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RotationalSpeed {
    steps: i8,
    precision: f64,
}

impl RotationalSpeed {
    /// Validates and rounds `rpm` according to `format`.
    pub fn new(rpm: f64, format: &SpeedFormat) -> Result<RotationalSpeed> {
        Ok(RotationalSpeed {
            steps: encode_speed(rpm, format)?,
            precision: format.precision,
        })
    }

    /// Interprets a wire byte with the given format.
    #[inline]
    pub fn from_raw(byte: u8, format: &SpeedFormat) -> RotationalSpeed {
        RotationalSpeed {
            steps: byte as i8,
            precision: format.precision,
        }
    }

    /// Speed in rpm; negative values turn the other way.
    #[inline]
    pub fn rpm(&self) -> f64 {
        decode_speed(self.steps as u8, self.precision)
    }

    /// Signed step count as sent on the wire.
    #[inline]
    pub fn raw(&self) -> u8 {
        self.steps as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_range() {
        for a in 0..=15u8 {
            assert_eq!(Address::new(a).unwrap().value(), a);
        }
        assert!(matches!(
            Address::new(16),
            Err(Error::InvalidAddress { address: 16 })
        ));
        assert!(Address::try_from(0xF).unwrap().is_broadcast());
        assert!(!Address::CONVERTER.is_broadcast());
    }

    #[test]
    fn angle_is_normalized_on_construction() {
        assert_eq!(Angle::from_degrees(361.0).unwrap().degrees(), 1.0);
        assert_eq!(Angle::from_degrees(-270.0).unwrap().degrees(), 90.0);
        assert_eq!(Angle::from_degrees(90.123).unwrap().degrees(), 90.125);
        assert_eq!(Angle::from_degrees(0.0).unwrap(), Angle::ZERO);
    }

    #[test]
    fn speed_keeps_rounded_value() {
        let format = SpeedFormat::new(0.5, 256.0);
        assert_eq!(RotationalSpeed::new(10.0, &format).unwrap().rpm(), 10.0);
        assert_eq!(RotationalSpeed::new(-1.76, &format).unwrap().rpm(), -2.0);
        assert_eq!(RotationalSpeed::new(-16.0, &format).unwrap().raw(), 0xE0);
        assert!(RotationalSpeed::new(1000.0, &format).is_err());
    }

    #[test]
    fn default_format() {
        let format = SpeedFormat::default();
        assert_eq!(format.precision, 0.25);
        assert_eq!(format.max_rpm, 32.0);
    }
}
