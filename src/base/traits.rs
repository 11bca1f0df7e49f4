use std::io;

/// A duplex byte link to the turntable controller.
///
/// On top of plain `Read + Write` the transaction discipline needs two side channels of the
/// physical link: dropping stale input before a request, and handing the shared medium back
/// to receive mode once an exchange is over (half-duplex RS-485 transceivers).
pub trait SerialLink: io::Read + io::Write {
    /// Discards any bytes already buffered on the input side.
    fn clear_input(&mut self) -> io::Result<()>;

    /// Asserts the direction signal line that releases the transmitter.
    fn release_direction(&mut self) -> io::Result<()>;
}

