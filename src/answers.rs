use crate::base::{Error, Result};
use crate::checksum::Checksum;
use crate::types::{Address, Angle, RotationalSpeed, SpeedFormat};
use crate::utils::decode_voltage;
use byteorder::{BigEndian, ByteOrder};

/// Preamble byte opening every request and response frame.
pub const ROTARY_TABLE_PREAMBLE: u8 = 0x5D;

/// Size of a response frame: preamble, payload and CRC.
pub const RESPONSE_LENGTH: usize = 9;

/// Size of the response payload.
pub const RESPONSE_PAYLOAD_LENGTH: usize = RESPONSE_LENGTH - 2;

/// Response type reported by the power converter.
pub const ROTARY_TABLE_ANS_TYPE_CONVERTER_STATUS: u8 = 0xE;

/// Response type reported by a turntable axis.
pub const ROTARY_TABLE_ANS_TYPE_MOTOR_STATUS: u8 = 0xF;

pub const ROTARY_TABLE_STATUS_MOTOR_OK: u8 = 0x1;
pub const ROTARY_TABLE_STATUS_ROTATING: u8 = 0x1 << 1;
pub const ROTARY_TABLE_STATUS_ENABLED: u8 = 0x1 << 2;
pub const ROTARY_TABLE_STATUS_CRC_VALID: u8 = 0x1 << 3;

pub const ROTARY_TABLE_CONVERTER_VOLTAGE_OK: u8 = 0x1;

/// A raw 9-byte response frame.
///
/// Integrity is not enforced on construction; check [`Response::is_valid`] before trusting
/// any decoded field.
#[derive(Debug, Copy, Clone)]
pub struct Response {
    preamble: u8,
    payload: [u8; RESPONSE_PAYLOAD_LENGTH],
    crc: u8,
}

impl Response {
    /// Splits a response frame into preamble, payload and CRC.
    pub fn from_bytes(data: &[u8]) -> Result<Response> {
        if data.len() != RESPONSE_LENGTH {
            return Err(Error::LengthError {
                expected: RESPONSE_LENGTH,
                actual: data.len(),
            });
        }
        let mut payload = [0; RESPONSE_PAYLOAD_LENGTH];
        payload.copy_from_slice(&data[1..RESPONSE_LENGTH - 1]);
        Ok(Response {
            preamble: data[0],
            payload,
            crc: data[RESPONSE_LENGTH - 1],
        })
    }

    #[inline]
    pub fn preamble(&self) -> u8 {
        self.preamble
    }

    #[inline]
    pub fn payload(&self) -> &[u8; RESPONSE_PAYLOAD_LENGTH] {
        &self.payload
    }

    #[inline]
    pub fn crc(&self) -> u8 {
        self.crc
    }

    /// Address of the reporting device.
    #[inline]
    pub fn address(&self) -> Address {
        Address::from_header(self.payload[0])
    }

    /// Response type code from the low nibble of the first payload byte.
    #[inline]
    pub fn response_type(&self) -> u8 {
        self.payload[0] & 0xF
    }

    /// CRC recomputed over preamble and payload.
    pub fn calc_crc(&self) -> u8 {
        let mut checksum = Checksum::new();
        checksum.push_slice(&[self.preamble]);
        checksum.push_slice(&self.payload);
        checksum.checksum()
    }

    /// `true` when both the preamble and the CRC match.
    pub fn is_valid(&self) -> bool {
        self.preamble == ROTARY_TABLE_PREAMBLE && self.calc_crc() == self.crc
    }
}

impl PartialEq for Response {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
    }
}

/// Status report of a turntable axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MotorStatus {
    response: Response,
    format: SpeedFormat,
}

impl MotorStatus {
    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn is_valid(&self) -> bool {
        self.response.is_valid()
    }

    pub fn address(&self) -> Address {
        self.response.address()
    }

    pub fn status(&self) -> u8 {
        self.response.payload[1]
    }

    pub fn is_motor_ok(&self) -> bool {
        self.status() & ROTARY_TABLE_STATUS_MOTOR_OK != 0
    }

    pub fn is_rotating(&self) -> bool {
        self.status() & ROTARY_TABLE_STATUS_ROTATING != 0
    }

    pub fn is_enabled(&self) -> bool {
        self.status() & ROTARY_TABLE_STATUS_ENABLED != 0
    }

    /// Whether the device accepted the CRC of the last request it received.
    pub fn is_crc_valid(&self) -> bool {
        self.status() & ROTARY_TABLE_STATUS_CRC_VALID != 0
    }

    /// Current position in degrees.
    pub fn current_angle(&self) -> f64 {
        Angle::from_raw(BigEndian::read_u16(&self.response.payload[2..4])).degrees()
    }

    /// Target position in degrees.
    pub fn target_angle(&self) -> f64 {
        Angle::from_raw(BigEndian::read_u16(&self.response.payload[4..6])).degrees()
    }

    /// Current speed in rpm.
    pub fn rpm(&self) -> f64 {
        RotationalSpeed::from_raw(self.response.payload[6], &self.format).rpm()
    }
}

/// Status report of the power converter accessory.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ConverterStatus {
    response: Response,
}

impl ConverterStatus {
    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn is_valid(&self) -> bool {
        self.response.is_valid()
    }

    pub fn address(&self) -> Address {
        self.response.address()
    }

    pub fn status(&self) -> u8 {
        self.response.payload[1]
    }

    pub fn is_voltage_ok(&self) -> bool {
        self.status() & ROTARY_TABLE_CONVERTER_VOLTAGE_OK != 0
    }

    /// Supply voltage in volts.
    pub fn voltage(&self) -> f64 {
        decode_voltage(self.response.payload[2])
    }

    /// Reserved bytes, passed through uninterpreted.
    pub fn reserved_data(&self) -> &[u8] {
        &self.response.payload[3..]
    }
}

/// A response classified by its type code.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ResponseVariant {
    MotorStatus(MotorStatus),
    ConverterStatus(ConverterStatus),
    Generic(Response),
}

impl ResponseVariant {
    /// Selects the variant from the response type code. Integrity is not checked here.
    pub fn classify(response: Response, format: &SpeedFormat) -> ResponseVariant {
        match response.response_type() {
            ROTARY_TABLE_ANS_TYPE_MOTOR_STATUS => ResponseVariant::MotorStatus(MotorStatus {
                response,
                format: *format,
            }),
            ROTARY_TABLE_ANS_TYPE_CONVERTER_STATUS => {
                ResponseVariant::ConverterStatus(ConverterStatus { response })
            }
            _ => ResponseVariant::Generic(response),
        }
    }

    pub fn response(&self) -> &Response {
        match self {
            ResponseVariant::MotorStatus(status) => &status.response,
            ResponseVariant::ConverterStatus(status) => &status.response,
            ResponseVariant::Generic(response) => response,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.response().is_valid()
    }

    pub fn address(&self) -> Address {
        self.response().address()
    }

    pub fn response_type(&self) -> u8 {
        self.response().response_type()
    }
}
