//! Fixed-point helpers for the quantities carried in rotary table frames.
//!
//! Angles travel as unsigned Q9.7 big-endian words, speeds as a signed byte counting
//! multiples of the configured rpm precision, and the converter voltage as an unsigned
//! Q4.4 byte.

use crate::base::{Error, Result};
use crate::types::SpeedFormat;
use byteorder::{BigEndian, ByteOrder};
use log::trace;

/// Number of fractional bits in the angle word.
pub const ANGLE_FRACTION_BITS: u32 = 7;

/// Angular resolution the controller accepts, in degrees.
pub const ANGLE_PRECISION: f64 = 0.125;

/// Number of fractional bits in the converter voltage byte.
pub const VOLTAGE_FRACTION_BITS: u32 = 4;

const FULL_TURN: f64 = 360.0;

/// Rounds `value` to the nearest multiple of `precision`.
///
/// A remainder below half the precision rounds down, anything else rounds up, so exact
/// ties land on the larger multiple.
pub fn round_to(value: f64, precision: f64) -> f64 {
    round_steps(value, precision) * precision
}

/// Number of `precision` steps nearest to `value`, with the tie rule of [`round_to`].
///
/// Counting steps directly avoids converting back to the physical unit, which loses a
/// step for precisions that are not exact binary fractions.
pub fn round_steps(value: f64, precision: f64) -> f64 {
    let scaled = value / precision;
    let floor = scaled.floor();
    if scaled - floor < 0.5 {
        floor
    } else {
        floor + 1.0
    }
}

/// Normalizes `degrees` into [0, 360) and rounds it to [`ANGLE_PRECISION`].
///
/// A value that rounds up to a full turn wraps to 0.
pub fn normalize_angle(degrees: f64) -> Result<f64> {
    if !degrees.is_finite() {
        return Err(Error::OutOfRange {
            value: degrees,
            max: FULL_TURN,
        });
    }
    let rounded = round_to(degrees.rem_euclid(FULL_TURN), ANGLE_PRECISION);
    Ok(if rounded >= FULL_TURN { 0.0 } else { rounded })
}

/// Encodes an angle in degrees as the fixed-point word sent on the wire.
pub fn encode_angle(degrees: f64) -> Result<u16> {
    let normalized = normalize_angle(degrees)?;
    let raw = (normalized * f64::from(1u32 << ANGLE_FRACTION_BITS)) as u16;
    trace!("Encoded angle {} deg -> {:04X}", degrees, raw);
    Ok(raw)
}

/// Decodes a big-endian angle word into degrees.
pub fn decode_angle(bytes: [u8; 2]) -> f64 {
    f64::from(BigEndian::read_u16(&bytes)) / f64::from(1u32 << ANGLE_FRACTION_BITS)
}

/// Encodes a rotational speed as a signed count of `format.precision` steps.
///
/// The magnitude is rounded to the nearest step count and the sign restored afterwards, so
/// ties move away from zero. The step count itself is range-checked: a speed at the
/// configured maximum can still overflow the signed byte.
///
/// # Arguments
///
/// * `rpm` - Speed in rpm; negative values turn the other way.
/// * `format` - Step size and largest accepted magnitude.
pub fn encode_speed(rpm: f64, format: &SpeedFormat) -> Result<i8> {
    // written negated so NaN is rejected as well
    if !(rpm.abs() <= format.max_rpm) {
        return Err(Error::OutOfRange {
            value: rpm,
            max: format.max_rpm,
        });
    }
    let steps = round_steps(rpm.abs(), format.precision) as i64;
    let encoded = if rpm.is_sign_negative() { -steps } else { steps };
    let byte = i8::try_from(encoded).map_err(|_| Error::EncodingOverflow {
        value: rpm,
        encoded,
    })?;
    trace!("Encoded speed {} rpm -> {} steps", rpm, byte);
    Ok(byte)
}

/// Decodes a wire speed byte into rpm.
pub fn decode_speed(byte: u8, precision: f64) -> f64 {
    f64::from(byte as i8) * precision
}

/// Decodes the converter supply voltage byte into volts.
pub fn decode_voltage(byte: u8) -> f64 {
    f64::from(byte) / f64::from(1u32 << VOLTAGE_FRACTION_BITS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_breaks_ties_upwards() {
        assert_eq!(round_to(90.123, 0.125), 90.125);
        assert_eq!(round_to(90.21, 0.125), 90.25);
        assert_eq!(round_to(90.0625, 0.125), 90.125);
        assert_eq!(round_to(90.0624, 0.125), 90.0);
    }

    #[test]
    fn angles_are_normalized_before_encoding() {
        assert_eq!(normalize_angle(361.0).unwrap(), 1.0);
        assert_eq!(normalize_angle(-270.0).unwrap(), 90.0);
        assert_eq!(normalize_angle(-89.378).unwrap(), 270.625);
        assert_eq!(normalize_angle(359.99).unwrap(), 0.0);
        assert!(normalize_angle(f64::NAN).is_err());
    }

    #[test]
    fn angle_words() {
        assert_eq!(encode_angle(0.375).unwrap(), 0x0030);
        assert_eq!(encode_angle(-89.378).unwrap(), 0x8750);
        assert_eq!(decode_angle([0x91, 0xD0]), 291.625);
        assert_eq!(decode_angle([0x29, 0xA0]), 83.25);
    }

    #[test]
    fn angle_values_survive_the_wire_rounded() {
        for &(degrees, expected) in &[(0.0, 0.0), (12.3, 12.25), (180.0625, 180.125), (359.5, 359.5)] {
            let raw = encode_angle(degrees).unwrap();
            assert_eq!(decode_angle(raw.to_be_bytes()), expected);
        }
    }

    #[test]
    fn speed_rounding_is_symmetric() {
        let format = SpeedFormat::new(0.5, 256.0);
        assert_eq!(encode_speed(10.0, &format).unwrap(), 20);
        assert_eq!(encode_speed(-1.5, &format).unwrap(), -3);
        assert_eq!(encode_speed(-1.76, &format).unwrap(), -4);
        assert_eq!(encode_speed(-16.2, &format).unwrap(), -32);
        assert_eq!(encode_speed(1.25, &format).unwrap(), 3);
        assert_eq!(encode_speed(-1.25, &format).unwrap(), -3);
    }

    #[test]
    fn speed_steps_with_decimal_precision() {
        let format = SpeedFormat::new(0.1, 12.8);
        for steps in -127i8..=127 {
            let rpm = f64::from(steps) * 0.1;
            assert_eq!(encode_speed(rpm, &format).unwrap(), steps, "rpm {}", rpm);
        }
        assert_eq!(encode_speed(4.3, &format).unwrap(), 43);
        assert_eq!(encode_speed(4.34, &format).unwrap(), 43);
        assert_eq!(encode_speed(-4.36, &format).unwrap(), -44);
    }

    #[test]
    fn speed_limits() {
        let format = SpeedFormat::default();
        assert!(matches!(
            encode_speed(40.0, &format),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            encode_speed(f64::NAN, &format),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            encode_speed(32.0, &format),
            Err(Error::EncodingOverflow { encoded: 128, .. })
        ));
        assert_eq!(encode_speed(-32.0, &format).unwrap(), -128);
        assert_eq!(encode_speed(31.75, &format).unwrap(), 127);

        let wide = SpeedFormat::new(0.5, 256.0);
        assert!(matches!(
            encode_speed(100.0, &wide),
            Err(Error::EncodingOverflow { encoded: 200, .. })
        ));
    }

    #[test]
    fn speed_and_voltage_bytes() {
        assert_eq!(decode_speed(0xD1, 0.5), -23.5);
        assert_eq!(decode_speed(0x14, 0.25), 5.0);
        assert_eq!(decode_voltage(0x72), 7.125);
        assert_eq!(decode_voltage(0xFF), 15.9375);
    }
}
