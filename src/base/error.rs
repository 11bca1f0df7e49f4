use std::error;
use std::fmt;
use std::io;
use std::time::Duration;

/// Represents errors that can occur during rotary table operations.
#[derive(Debug)]
pub enum Error {
    /// The address does not fit into the 4-bit address field.
    InvalidAddress { address: u8 },

    /// The physical value exceeds the configured maximum magnitude.
    OutOfRange { value: f64, max: f64 },

    /// The physical value is in range but its fixed-point step count does not fit the wire field.
    EncodingOverflow { value: f64, encoded: i64 },

    /// A received buffer does not have the expected frame length.
    LengthError { expected: usize, actual: usize },

    /// No byte arrived from the addressed device before the read timeout.
    NoResponse { address: u8 },

    /// A well-formed response of another kind than requested was received.
    UnexpectedResponse { expected: u8, actual: u8 },

    /// A response failed its preamble or CRC check where integrity is required.
    InvalidResponse { address: u8 },

    /// The power converter reports a supply voltage outside the accepted band.
    UnsafeSupply { voltage: f64 },

    /// The motor did not report standstill within the configured motion timeout.
    MotionTimeout { address: u8, elapsed: Duration },

    /// The operation was interrupted by a cancellation request.
    Cancelled,

    /// The execution of operation failed. Contains a description of the failure.
    OperationFail { description: String },

    /// An I/O error occurred while communicating with the underlying stream (e.g., serial port).
    IoError(io::Error),
}

impl Error {
    /// Wraps a failure reported by an external collaborator (instrument, storage, operator).
    pub fn operation_fail(description: impl Into<String>) -> Error {
        Error::OperationFail {
            description: description.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidAddress { address } => {
                write!(f, "invalid address {}: must be lower than 16", address)
            }
            Error::OutOfRange { value, max } => {
                write!(f, "value {} out of range: magnitude must not exceed {}", value, max)
            }
            Error::EncodingOverflow { value, encoded } => write!(
                f,
                "value {} encodes to {} which does not fit a signed byte",
                value, encoded
            ),
            Error::LengthError { expected, actual } => write!(
                f,
                "invalid frame length: expected {} bytes, got {}",
                expected, actual
            ),
            Error::NoResponse { address } => {
                write!(f, "no response from rotary table with address {}", address)
            }
            Error::UnexpectedResponse { expected, actual } => write!(
                f,
                "unexpected response type: expected {:X}, got {:X}",
                expected, actual
            ),
            Error::InvalidResponse { address } => {
                write!(f, "response from address {} failed integrity check", address)
            }
            Error::UnsafeSupply { voltage } => {
                write!(f, "unsafe supply voltage: {:.2} V", voltage)
            }
            Error::MotionTimeout { address, elapsed } => write!(
                f,
                "rotary table with address {} still rotating after {:?}",
                address, elapsed
            ),
            Error::Cancelled => write!(f, "operation cancelled"),
            Error::OperationFail { description } => write!(f, "operation failed: {}", description),
            Error::IoError(err) => write!(f, "io error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Error::IoError(err.into())
    }
}

/// A specialized `Result` type for rotary table operations.
pub type Result<T> = std::result::Result<T, Error>;
