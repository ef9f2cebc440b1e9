pub mod i2c;
pub use self::i2c::I2cInterface;

/// Largest number of bytes one read transaction on the bus may return.
pub const MAX_BURST_LENGTH: usize = 32;

/// Byte the module clocks out when its transmit buffer is empty.
pub const NO_DATA_SENTINEL: u8 = 0xFF;

/// A method of communicating with the device
pub trait DeviceInterface {
    /// Interface associated error type
    type InterfaceError;

    /// Address the device without transferring data, to check
    /// that it is present and responding.
    fn probe(&mut self) -> Result<(), Self::InterfaceError>;

    /// Number of bytes queued in the device's transmit buffer.
    /// A transport failure is an error; an empty buffer is `Ok(0)`.
    fn available_bytes(&mut self) -> Result<u16, Self::InterfaceError>;

    /// Issue one read transaction against the data stream, filling
    /// `buffer` completely. `buffer` must not exceed `MAX_BURST_LENGTH`
    /// bytes; reassembling longer messages out of repeated bounded
    /// transactions is the caller's job.
    fn read_stream(&mut self, buffer: &mut [u8]) -> Result<(), Self::InterfaceError>;

    /// Write a fully serialized message in one transaction.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::InterfaceError>;
}
