use crate::answers::{ResponseVariant, RESPONSE_LENGTH};
use crate::base::error::{Error, Result};
use crate::base::traits::SerialLink;
use crate::cmds::Request;
use crate::internals::DEFAULT_RESPONSE_TIMEOUT;
use crate::protocol::RotaryTableProtocol;
use log::{debug, error, trace, warn};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Channel exchanges request and response frames with rotary table controllers over a link.
///
/// Every request waits for its response (or the timeout) before the next one may be sent.
/// The channel owns the link; dropping the channel releases it.
///
/// # Examples
/// ```ignore
/// let mut channel = Channel::new(RotaryTableProtocol::new(), serial_port);
///
/// let status = channel.send(&Request::get_status(0)?)?;
/// ```
#[derive(Debug)]
pub struct Channel<T: ?Sized> {
    protocol: RotaryTableProtocol,
    stream: Box<T>,
    timeout: Duration,
}

impl<T: ?Sized> Channel<T>
where
    T: SerialLink,
{
    /// Create a new `Channel` with the default response timeout
    pub fn new(protocol: RotaryTableProtocol, stream: Box<T>) -> Channel<T> {
        Channel::with_timeout(protocol, stream, DEFAULT_RESPONSE_TIMEOUT)
    }

    /// Create a new `Channel` waiting at most `timeout` for each response
    pub fn with_timeout(
        protocol: RotaryTableProtocol,
        stream: Box<T>,
        timeout: Duration,
    ) -> Channel<T> {
        trace!("Creating new Channel with response timeout {:?}", timeout);
        Channel {
            protocol,
            stream,
            timeout,
        }
    }

    pub fn protocol(&self) -> &RotaryTableProtocol {
        &self.protocol
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request and wait for its response
    ///
    /// Returns `Ok(None)` for requests to the broadcast address, which nobody answers.
    /// A response that fails its integrity check is still returned; the caller decides.
    ///
    /// # Arguments
    ///
    /// * `request` - The request to frame and send. Its address selects the answering device.
    ///
    /// # Example
    /// ```ignore
    /// match channel.send(&Request::get_status(2)?)? {
    ///     Some(ResponseVariant::MotorStatus(status)) => println!("{}", status.current_angle()),
    ///     _ => {}
    /// }
    /// ```
    pub fn send(&mut self, request: &Request) -> Result<Option<ResponseVariant>> {
        let address = request.address();
        debug!(
            "Channel send: address={}, cmd={:X}",
            address,
            request.command()
        );

        let result = self.exchange(request);

        // hand the medium back to the receiver whatever the outcome
        if let Err(e) = self.stream.release_direction() {
            error!("Failed to release link direction: {}", e);
            if result.is_ok() {
                return Err(e.into());
            }
        }
        result
    }

    fn exchange(&mut self, request: &Request) -> Result<Option<ResponseVariant>> {
        let address = request.address();

        trace!("Discarding stale input");
        self.stream.clear_input()?;

        let written = self.protocol.write_to(request, &mut self.stream)?;
        self.stream.flush()?;
        trace!("Wrote {} bytes for request", written);

        if address.is_broadcast() {
            trace!("Broadcast request, not waiting for a response");
            return Ok(None);
        }

        let data = self.read_response()?;
        if data.is_empty() {
            warn!(
                "No response from address {} within {:?}",
                address, self.timeout
            );
            return Err(Error::NoResponse {
                address: address.value(),
            });
        }

        let response = self.protocol.parse(&data)?;
        if !response.is_valid() {
            warn!(
                "Response from address {} failed integrity check: {:02X?}",
                address, data
            );
        }
        Ok(Some(response))
    }

    /// Reads until a whole response frame arrived or the timeout elapsed.
    fn read_response(&mut self) -> Result<Vec<u8>> {
        let start = Instant::now();
        let mut data = Vec::with_capacity(RESPONSE_LENGTH);
        let mut buf = [0u8; RESPONSE_LENGTH];

        while data.len() < RESPONSE_LENGTH {
            if start.elapsed() >= self.timeout {
                trace!(
                    "Response timeout reached with {} bytes received",
                    data.len()
                );
                break;
            }

            let wanted = RESPONSE_LENGTH - data.len();
            match self.stream.read(&mut buf[..wanted]) {
                Ok(0) => trace!("Stream read returned 0 bytes"),
                Ok(n) => {
                    trace!("Read {} bytes from stream", n);
                    data.extend_from_slice(&buf[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    trace!("Stream read timed out");
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    error!("IO error reading from stream: {}", e);
                    return Err(e.into());
                }
            }
        }
        Ok(data)
    }
}

impl<T: ?Sized> Drop for Channel<T> {
    fn drop(&mut self) {
        debug!("Releasing rotary table link");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{motor_status_frame, MockLink};

    fn channel(link: &MockLink) -> Channel<MockLink> {
        Channel::with_timeout(
            RotaryTableProtocol::new(),
            Box::new(link.clone()),
            Duration::from_millis(20),
        )
    }

    #[test]
    fn send_returns_typed_response() {
        let link = MockLink::new(|frame| Some(motor_status_frame(frame[1] >> 4, 0x05, 0x2D00)));
        let mut channel = channel(&link);

        let response = channel.send(&Request::get_status(2).unwrap()).unwrap();
        match response {
            Some(ResponseVariant::MotorStatus(status)) => {
                assert!(status.is_valid());
                assert_eq!(status.address().value(), 2);
                assert_eq!(status.current_angle(), 90.0);
            }
            other => panic!("expected motor status, got {:?}", other),
        }
        assert_eq!(link.frames(), vec![vec![0x5D, 0x20, 0x00, 0x00, 0x00, 0xC0]]);
        assert_eq!(link.releases(), 1);
    }

    #[test]
    fn stale_input_is_discarded_before_request() {
        let link = MockLink::new(|frame| Some(motor_status_frame(frame[1] >> 4, 0x01, 0)));
        link.push_input(&[0xAA, 0xBB, 0xCC]);
        let mut channel = channel(&link);

        let response = channel.send(&Request::get_status(4).unwrap()).unwrap();
        assert!(response.unwrap().is_valid());
        assert_eq!(link.clears(), 1);
    }

    #[test]
    fn broadcast_does_not_wait() {
        let link = MockLink::new(|_| None);
        let mut channel = Channel::with_timeout(
            RotaryTableProtocol::new(),
            Box::new(link.clone()),
            Duration::from_secs(60),
        );

        let started = Instant::now();
        let response = channel.send(&Request::halt(15).unwrap()).unwrap();
        assert!(response.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(link.frames().len(), 1);
        assert_eq!(link.releases(), 1);
    }

    #[test]
    fn silence_is_no_response() {
        let link = MockLink::new(|_| None);
        let mut channel = channel(&link);

        let result = channel.send(&Request::get_status(3).unwrap());
        assert!(matches!(result, Err(Error::NoResponse { address: 3 })));
        // the request is not repeated
        assert_eq!(link.frames().len(), 1);
        assert_eq!(link.releases(), 1);
    }

    #[test]
    fn partial_frame_is_length_error() {
        let link = MockLink::new(|_| Some(vec![0x5D, 0x2F, 0x00]));
        let mut channel = channel(&link);

        let result = channel.send(&Request::get_status(2).unwrap());
        assert!(matches!(
            result,
            Err(Error::LengthError {
                expected: 9,
                actual: 3
            })
        ));
    }

    #[test]
    fn corrupted_response_is_returned_invalid() {
        let link = MockLink::new(|frame| {
            let mut data = motor_status_frame(frame[1] >> 4, 0x01, 0);
            data[8] ^= 0xFF;
            Some(data)
        });
        let mut channel = channel(&link);

        let response = channel.send(&Request::get_status(2).unwrap()).unwrap();
        assert!(!response.unwrap().is_valid());
    }

    #[test]
    fn response_split_across_reads() {
        let link = MockLink::new(|frame| Some(motor_status_frame(frame[1] >> 4, 0x01, 0)));
        link.set_chunk_size(2);
        let mut channel = channel(&link);

        let response = channel.send(&Request::get_status(6).unwrap()).unwrap();
        assert!(response.unwrap().is_valid());
    }
}
