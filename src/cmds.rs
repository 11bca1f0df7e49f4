use crate::base::Result;
use crate::types::{Address, Angle, RotationalSpeed, SpeedFormat, ADDRESS_LENGTH};

// Commands without body

/// Command code to query the motor status of an axis. Answered with a motor status response.
pub const ROTARY_TABLE_CMD_GET_STATUS: u8 = 0x0;

/// Command code to take the current position as the new home (0 degree) position.
pub const ROTARY_TABLE_CMD_SET_HOME: u8 = 0x1;

/// Command code to stop any motion and hold the current position.
pub const ROTARY_TABLE_CMD_HALT: u8 = 0x2;

/// Command code to de-energize the motor so the table can be turned by hand.
pub const ROTARY_TABLE_CMD_DISABLE: u8 = 0x3;

/// Command code to query the power converter. Answered with a converter status response.
pub const ROTARY_TABLE_CMD_GET_CONVERTER_STATUS: u8 = 0x5;

// Commands with body

/// Command code to rotate to an absolute angle. Body is the angle word and the speed byte.
pub const ROTARY_TABLE_CMD_ROTATE: u8 = 0x4;

/// Size of every request body in bytes.
pub const REQUEST_BODY_LENGTH: usize = 3;

/// A request to a rotary table controller.
///
/// Values are validated when built, so any `Request` can be framed without further checks.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Request {
    GetStatus { address: Address },
    SetHome { address: Address },
    Halt { address: Address },
    Disable { address: Address },
    GetConverterStatus { address: Address },
    Rotate {
        address: Address,
        angle: Angle,
        speed: RotationalSpeed,
    },
}

impl Request {
    pub fn get_status(address: u8) -> Result<Request> {
        Ok(Request::GetStatus {
            address: Address::new(address)?,
        })
    }

    pub fn set_home(address: u8) -> Result<Request> {
        Ok(Request::SetHome {
            address: Address::new(address)?,
        })
    }

    pub fn halt(address: u8) -> Result<Request> {
        Ok(Request::Halt {
            address: Address::new(address)?,
        })
    }

    pub fn disable(address: u8) -> Result<Request> {
        Ok(Request::Disable {
            address: Address::new(address)?,
        })
    }

    pub fn get_converter_status(address: u8) -> Result<Request> {
        Ok(Request::GetConverterStatus {
            address: Address::new(address)?,
        })
    }

    /// Builds a rotate request; `degrees` is normalized and rounded, `rpm` is range-checked
    /// against `format`.
    pub fn rotate(address: u8, degrees: f64, rpm: f64, format: &SpeedFormat) -> Result<Request> {
        Ok(Request::Rotate {
            address: Address::new(address)?,
            angle: Angle::from_degrees(degrees)?,
            speed: RotationalSpeed::new(rpm, format)?,
        })
    }

    /// The addressed device.
    pub fn address(&self) -> Address {
        match *self {
            Request::GetStatus { address }
            | Request::SetHome { address }
            | Request::Halt { address }
            | Request::Disable { address }
            | Request::GetConverterStatus { address }
            | Request::Rotate { address, .. } => address,
        }
    }

    /// 4-bit command code of this request.
    pub fn command(&self) -> u8 {
        match self {
            Request::GetStatus { .. } => ROTARY_TABLE_CMD_GET_STATUS,
            Request::SetHome { .. } => ROTARY_TABLE_CMD_SET_HOME,
            Request::Halt { .. } => ROTARY_TABLE_CMD_HALT,
            Request::Disable { .. } => ROTARY_TABLE_CMD_DISABLE,
            Request::GetConverterStatus { .. } => ROTARY_TABLE_CMD_GET_CONVERTER_STATUS,
            Request::Rotate { .. } => ROTARY_TABLE_CMD_ROTATE,
        }
    }

    /// Header byte: address in the high nibble, command code in the low one.
    #[inline]
    pub fn header(&self) -> u8 {
        (self.address().value() << ADDRESS_LENGTH) | self.command()
    }

    /// Request body. Zero for every command but rotate.
    pub fn body(&self) -> [u8; REQUEST_BODY_LENGTH] {
        match self {
            Request::Rotate { angle, speed, .. } => {
                let [hi, lo] = angle.raw().to_be_bytes();
                [hi, lo, speed.raw()]
            }
            _ => [0; REQUEST_BODY_LENGTH],
        }
    }
}
