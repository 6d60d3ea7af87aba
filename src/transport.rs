/// Trait for reader communication backends.
/// Implement this trait for different byte channels (serial port, TCP socket, etc.)
pub trait Transport {
    /// Error type for transport operations
    type Error: std::fmt::Debug;

    /// Write data to the channel
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read available bytes with a timeout in milliseconds.
    ///
    /// A timeout that delivers nothing reads as `Ok(0)`, not an error.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Close the channel. Idempotent; subsequent reads and writes fail.
    fn close(&mut self) -> Result<(), Self::Error>;
}
