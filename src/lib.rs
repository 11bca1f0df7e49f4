//! # Rotary Table Driver
//!
//! `rotary_table` drives motorized turntables over their compact binary serial protocol:
//! 6-byte addressed request frames and 9-byte response frames, both closed by a CRC-8.
//! On top of the protocol it provides an angle-sweep controller that rotates the table
//! through a list of angles and hands each stop to an external measurement.

extern crate byteorder;
extern crate crc;
extern crate ctrlc;
extern crate log;
extern crate serialport;

mod answers;
pub mod base;
mod checksum;
mod cmds;
mod internals;
mod protocol;
pub mod scan;
pub mod serial;
#[cfg(test)]
mod testing;
pub mod types;
pub mod utils;

pub use crate::answers::{
    ConverterStatus, MotorStatus, Response, ResponseVariant, RESPONSE_LENGTH,
    ROTARY_TABLE_ANS_TYPE_CONVERTER_STATUS, ROTARY_TABLE_ANS_TYPE_MOTOR_STATUS,
    ROTARY_TABLE_PREAMBLE,
};
pub use crate::base::{Channel, Error, Result, SerialLink};
pub use crate::checksum::{crc8, Checksum};
pub use crate::cmds::*;
pub use crate::internals::{DEFAULT_ANGLE_STEP, DEFAULT_RESPONSE_TIMEOUT};
pub use crate::protocol::{
    decode_response, encode_request, parse_response, RotaryTableProtocol, REQUEST_LENGTH,
};
pub use crate::scan::{
    angle_points, CancelFlag, Collaborators, Instrument, Monitor, Operator, ScanConfig,
    ScanController, ScanOutcome, ScanState, Store,
};
pub use crate::types::{Address, Angle, RotationalSpeed, SpeedFormat};

use crate::internals::DEFAULT_POLL_INTERVAL;
use log::{debug, trace, warn};
use std::thread;
use std::time::Duration;

/// Represents a connection to and control interface for rotary table controllers.
///
/// Several axes (and the power converter) may share one link; every method takes the
/// address it talks to.
///
/// It requires a `Channel` for communication.
#[derive(Debug)]
pub struct RotaryTable<T: ?Sized> {
    channel: Channel<T>,
}

impl<T: ?Sized> RotaryTable<T>
where
    T: SerialLink,
{
    /// Constructs a new `RotaryTable` using an existing `Channel`.
    pub fn new(channel: Channel<T>) -> RotaryTable<T> {
        trace!("Creating new RotaryTable");
        RotaryTable { channel }
    }

    /// Constructs a new `RotaryTable` directly from a link, with the default speed format
    /// and response timeout.
    ///
    /// # Example
    /// ```ignore
    /// # use rotary_table::{serial, RotaryTable};
    /// let port = serial::open_port("/dev/ttyUSB0", &serial::SerialSettings::rs_converter())?;
    /// let mut table = RotaryTable::with_stream(port);
    /// ```
    pub fn with_stream(stream: Box<T>) -> RotaryTable<T> {
        RotaryTable::new(Channel::new(RotaryTableProtocol::new(), stream))
    }

    /// Speed format used to encode and decode speeds.
    pub fn speed_format(&self) -> &SpeedFormat {
        self.channel.protocol().speed_format()
    }

    /// Sends a raw request. See [`Channel::send`].
    pub fn send(&mut self, request: &Request) -> Result<Option<ResponseVariant>> {
        self.channel.send(request)
    }

    /// Queries the motor status of the axis at `address`.
    ///
    /// A corrupted motor status report is returned as is; a corrupted report of any other
    /// type fails with `InvalidResponse`.
    pub fn get_status(&mut self, address: Address) -> Result<MotorStatus> {
        match self.send(&Request::GetStatus { address })? {
            Some(ResponseVariant::MotorStatus(status)) => Ok(status),
            Some(other) if !other.is_valid() => Err(Error::InvalidResponse {
                address: address.value(),
            }),
            Some(other) => {
                warn!(
                    "Unexpected response to status query: type {:X}",
                    other.response_type()
                );
                Err(Error::UnexpectedResponse {
                    expected: ROTARY_TABLE_ANS_TYPE_MOTOR_STATUS,
                    actual: other.response_type(),
                })
            }
            None => Err(Error::InvalidAddress {
                address: address.value(),
            }),
        }
    }

    /// Queries the power converter accessory.
    pub fn get_converter_status(&mut self) -> Result<ConverterStatus> {
        let address = Address::CONVERTER;
        match self.send(&Request::GetConverterStatus { address })? {
            Some(ResponseVariant::ConverterStatus(status)) => Ok(status),
            Some(other) => Err(Error::UnexpectedResponse {
                expected: ROTARY_TABLE_ANS_TYPE_CONVERTER_STATUS,
                actual: other.response_type(),
            }),
            None => Err(Error::InvalidAddress {
                address: address.value(),
            }),
        }
    }

    /// Takes the current position as home.
    pub fn set_home(&mut self, address: Address) -> Result<Option<ResponseVariant>> {
        debug!("Setting home of axis {}", address);
        self.send(&Request::SetHome { address })
    }

    /// Stops motion and holds the position.
    pub fn halt(&mut self, address: Address) -> Result<Option<ResponseVariant>> {
        debug!("Halting axis {}", address);
        self.send(&Request::Halt { address })
    }

    /// De-energizes the motor.
    pub fn disable(&mut self, address: Address) -> Result<Option<ResponseVariant>> {
        debug!("Disabling axis {}", address);
        self.send(&Request::Disable { address })
    }

    /// Starts a rotation to an absolute angle. Returns as soon as the command is accepted;
    /// use [`RotaryTable::wait_until_stopped`] to wait for standstill.
    ///
    /// Both values are validated before anything is sent.
    ///
    /// # Arguments
    ///
    /// * `address` - The axis to rotate.
    /// * `degrees` - Target angle relative to home, normalized into [0, 360).
    /// * `rpm` - Rotational speed; its sign selects the direction.
    pub fn rotate(
        &mut self,
        address: Address,
        degrees: f64,
        rpm: f64,
    ) -> Result<Option<ResponseVariant>> {
        let request = Request::Rotate {
            address,
            angle: Angle::from_degrees(degrees)?,
            speed: RotationalSpeed::new(rpm, self.speed_format())?,
        };
        debug!(
            "Rotating axis {} to {} deg at {} rpm",
            address, degrees, rpm
        );
        self.send(&request)
    }

    /// Polls the axis status every `DEFAULT_POLL_INTERVAL` until it stops rotating.
    pub fn wait_until_stopped(&mut self, address: Address) -> Result<MotorStatus> {
        self.wait_until_stopped_with(address, || {
            thread::sleep(DEFAULT_POLL_INTERVAL);
            Ok(())
        })
    }

    /// Polls the axis status until a valid report says it no longer rotates, calling
    /// `pause` between polls. An error from `pause` ends the wait.
    ///
    /// Reports failing their integrity check are logged and polled again.
    pub fn wait_until_stopped_with<F>(
        &mut self,
        address: Address,
        mut pause: F,
    ) -> Result<MotorStatus>
    where
        F: FnMut() -> Result<()>,
    {
        loop {
            let status = match self.get_status(address) {
                Ok(status) => Some(status),
                Err(Error::InvalidResponse { .. }) => None,
                Err(e) => return Err(e),
            };
            match status {
                Some(status) if status.is_valid() && !status.is_rotating() => {
                    trace!(
                        "Axis {} stopped at {} deg",
                        address,
                        status.current_angle()
                    );
                    return Ok(status);
                }
                Some(status) if status.is_valid() => trace!(
                    "Axis {} rotating, at {} deg",
                    address,
                    status.current_angle()
                ),
                _ => warn!("Ignoring corrupted status report from axis {}", address),
            }
            pause()?;
        }
    }
}

/// Sleeps `duration` in one go; used where no cancellation applies.
pub(crate) fn sleep(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{converter_status_frame, motor_status_frame, MockLink};
    use std::cell::Cell;
    use std::rc::Rc;

    fn table(link: &MockLink) -> RotaryTable<MockLink> {
        RotaryTable::new(Channel::with_timeout(
            RotaryTableProtocol::new(),
            Box::new(link.clone()),
            Duration::from_millis(20),
        ))
    }

    #[test]
    fn get_status_requires_motor_status() {
        let link = MockLink::new(|_| Some(converter_status_frame(0x01, 0xC0)));
        let mut table = table(&link);

        assert!(matches!(
            table.get_status(Address::new(1).unwrap()),
            Err(Error::UnexpectedResponse {
                expected: 0xF,
                actual: 0xE
            })
        ));
    }

    #[test]
    fn converter_status_is_read_from_converter_address() {
        let link = MockLink::new(|_| Some(converter_status_frame(0x01, 0xC0)));
        let mut table = table(&link);

        let status = table.get_converter_status().unwrap();
        assert!(status.is_voltage_ok());
        assert_eq!(status.voltage(), 12.0);
        assert_eq!(link.frames()[0][1], 0xE5);
    }

    #[test]
    fn rotate_validates_before_sending() {
        let link = MockLink::new(|_| None);
        let mut table = table(&link);

        assert!(matches!(
            table.rotate(Address::new(1).unwrap(), 90.0, 100.0),
            Err(Error::OutOfRange { .. })
        ));
        assert!(link.frames().is_empty());
    }

    #[test]
    fn wait_until_stopped_polls_through_glitches() {
        let polls = Rc::new(Cell::new(0));
        let counter = polls.clone();
        let link = MockLink::new(move |frame| {
            let n = counter.get();
            counter.set(n + 1);
            let address = frame[1] >> 4;
            Some(match n {
                0 => motor_status_frame(address, 0x07, 0x0100),
                1 => {
                    let mut corrupted = motor_status_frame(address, 0x05, 0x0200);
                    corrupted[8] ^= 0x01;
                    corrupted
                }
                _ => motor_status_frame(address, 0x05, 0x0300),
            })
        });
        let mut table = table(&link);

        let mut pauses = 0;
        let status = table
            .wait_until_stopped_with(Address::new(2).unwrap(), || {
                pauses += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(status.current_angle(), 6.0);
        assert_eq!(polls.get(), 3);
        assert_eq!(pauses, 2);
    }
}
