use embedded_hal as hal;

use super::{DeviceInterface, NO_DATA_SENTINEL};
use crate::Error;
use hal::blocking::i2c::{Write, WriteRead};

/// Factory-default 7-bit DDC address of the SAM-M8Q
pub const DEFAULT_I2C_ADDRESS: u8 = 0x42;

/// High byte of the bytes-available count; reading two bytes from here
/// also returns the low byte at 0xFE
const REG_BYTES_AVAILABLE_HIGH: u8 = 0xFD;
/// Data stream register; reads consume the module's transmit buffer
const REG_DATA_STREAM: u8 = 0xFF;

/// This encapsulates the I2C (DDC) port of the receiver.
///
/// The module exposes a byte count register pair and a single data
/// stream register; everything else travels as UBX or NMEA bytes
/// through the stream.
pub struct I2cInterface<I2C> {
    /// the i2c bus to use when communicating
    i2c: I2C,
    /// 7-bit device address
    address: u8,
}

impl<I2C, CommE> I2cInterface<I2C>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Give back the owned bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

/// Decode the bytes-available register pair.
///
/// The sentinel in either byte means the module has nothing queued (it
/// clocks out 0xFF when idle); the top bit of the high byte is reserved
/// and masked off. The count is big-endian.
fn decode_available(msb: u8, lsb: u8) -> u16 {
    if msb == NO_DATA_SENTINEL || lsb == NO_DATA_SENTINEL {
        return 0;
    }
    u16::from_be_bytes([msb & 0x7F, lsb])
}

impl<I2C, CommE> DeviceInterface for I2cInterface<I2C>
where
    I2C: Write<Error = CommE> + WriteRead<Error = CommE>,
{
    type InterfaceError = Error<CommE>;

    fn probe(&mut self) -> Result<(), Self::InterfaceError> {
        self.i2c.write(self.address, &[]).map_err(Error::Comm)
    }

    fn available_bytes(&mut self) -> Result<u16, Self::InterfaceError> {
        let mut count = [0u8; 2];
        self.i2c
            .write_read(self.address, &[REG_BYTES_AVAILABLE_HIGH], &mut count)
            .map_err(Error::Comm)?;
        Ok(decode_available(count[0], count[1]))
    }

    fn read_stream(&mut self, buffer: &mut [u8]) -> Result<(), Self::InterfaceError> {
        self.i2c
            .write_read(self.address, &[REG_DATA_STREAM], buffer)
            .map_err(Error::Comm)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::InterfaceError> {
        self.i2c.write(self.address, bytes).map_err(Error::Comm)
    }
}
