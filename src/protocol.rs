use crate::answers::{Response, ResponseVariant, ROTARY_TABLE_PREAMBLE};
use crate::base::Result;
use crate::checksum::crc8;
use crate::cmds::Request;
use crate::types::SpeedFormat;
use log::{error, trace};
use std::io::Write;

/// Size of a request frame: preamble, header, 3-byte body and CRC.
pub const REQUEST_LENGTH: usize = 6;

/// Builds the wire frame of `request`.
pub fn encode_request(request: &Request) -> [u8; REQUEST_LENGTH] {
    let body = request.body();
    let mut frame = [
        ROTARY_TABLE_PREAMBLE,
        request.header(),
        body[0],
        body[1],
        body[2],
        0,
    ];
    frame[REQUEST_LENGTH - 1] = crc8(&frame[..REQUEST_LENGTH - 1]);
    frame
}

/// Splits a received frame. Fails only on a length mismatch; integrity is reported by
/// [`Response::is_valid`].
pub fn decode_response(data: &[u8]) -> Result<Response> {
    Response::from_bytes(data)
}

/// Decodes a received frame and selects its typed variant from the response type code.
pub fn parse_response(data: &[u8], format: &SpeedFormat) -> Result<ResponseVariant> {
    Ok(ResponseVariant::classify(decode_response(data)?, format))
}

/// The rotary table host protocol.
///
/// Encodes requests into frames and decodes response frames, interpreting speed fields with
/// the configured [`SpeedFormat`].
#[derive(Debug, Clone, PartialEq)]
pub struct RotaryTableProtocol {
    speed_format: SpeedFormat,
}

impl RotaryTableProtocol {
    /// Creates a protocol instance using the default speed format.
    pub fn new() -> RotaryTableProtocol {
        RotaryTableProtocol::with_speed_format(SpeedFormat::default())
    }

    pub fn with_speed_format(speed_format: SpeedFormat) -> RotaryTableProtocol {
        trace!(
            "Creating new RotaryTableProtocol with speed format {:?}",
            speed_format
        );
        RotaryTableProtocol { speed_format }
    }

    pub fn speed_format(&self) -> &SpeedFormat {
        &self.speed_format
    }

    /// Encodes `request` and writes the frame to `dest`.
    ///
    /// Returns the number of bytes written.
    pub fn write_to(&self, request: &Request, dest: &mut impl Write) -> Result<usize> {
        let frame = encode_request(request);
        trace!("Writing request frame {:02X?}", frame);
        match dest.write_all(&frame) {
            Ok(()) => Ok(frame.len()),
            Err(err) => {
                error!("IO error during write_all: {}", err);
                Err(err.into())
            }
        }
    }

    /// Decodes a response frame into its typed variant.
    pub fn parse(&self, data: &[u8]) -> Result<ResponseVariant> {
        trace!("Parsing response frame {:02X?}", data);
        parse_response(data, &self.speed_format)
    }
}

impl Default for RotaryTableProtocol {
    fn default() -> Self {
        Self::new()
    }
}
