/*
Copyright (c) 2022 AmbaSat Ltd
LICENSE: BSD3 (see LICENSE file)
*/

#![no_std]

use embedded_hal as hal;

mod interface;
pub use interface::i2c::DEFAULT_I2C_ADDRESS;
pub use interface::{DeviceInterface, I2cInterface, MAX_BURST_LENGTH, NO_DATA_SENTINEL};

pub mod messages;
pub use messages::{NavFields, UbxFrame};

mod sentence;
pub use sentence::SentenceParser;

use hal::blocking::delay::DelayMs;
use crate::messages::{
    CLASS_CFG, CLASS_NAV, CLASS_RXM, MAX_FRAME_LENGTH, MAX_MESSAGE_LENGTH, MSG_ID_CFG_PRT,
    MSG_ID_NAV_PVT, MSG_ID_RXM_PMREQ,
};

/// Errors in this crate
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<CommE> {
    /// Sensor communication error
    Comm(CommE),

    /// The module has no buffered data, or the stream ran dry mid-frame
    NoData,

    /// The stream did not begin with the UBX sync pair
    OutOfSync,

    /// No matching frame arrived before the deadline
    Timeout,

    /// Payload length outside what the frame layout allows
    Malformed,
}

/// Monotonic millisecond counter used for timeout bookkeeping.
///
/// Elapsed time is computed with wrapping subtraction, so a 32-bit
/// counter rollover mid-wait does not cut a timeout short.
pub trait MonotonicClock {
    fn now_ms(&mut self) -> u32;
}

/// Protocols the receiver can speak on a port. The discriminants are
/// the CFG-PRT protocol mask values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Protocol {
    UbxOnly = 0x01,
    NmeaOnly = 0x02,
    NmeaUbx = 0x03,
}

/// How long `read_data` waits for a polled NAV-PVT response
const NAV_PVT_TIMEOUT_MS: u32 = 1000;
/// Poll interval while waiting for that response
const NAV_PVT_INTERVAL_MS: u32 = 50;

pub fn new_i2c_driver<I2C, CommE, NMEA>(
    i2c: I2C,
    parser: NMEA,
) -> SamM8q<I2cInterface<I2C>, NMEA>
where
    I2C: hal::blocking::i2c::Write<Error = CommE>
        + hal::blocking::i2c::WriteRead<Error = CommE>,
    NMEA: SentenceParser,
    CommE: core::fmt::Debug,
{
    let iface = interface::I2cInterface::new(i2c, DEFAULT_I2C_ADDRESS);
    SamM8q::new_with_interface(iface, parser)
}

pub struct SamM8q<DI, NMEA> {
    /// the device interface
    di: DI,
    /// the sentence parser fed by the NMEA read path
    nmea: NMEA,
    /// protocol configured on the output port; selects the `read_data` path
    protocol: Protocol,
    /// The last decoded navigation solution
    nav: NavFields,
}

impl<DI, NMEA, CommE> SamM8q<DI, NMEA>
where
    DI: DeviceInterface<InterfaceError = Error<CommE>>,
    NMEA: SentenceParser,
    CommE: core::fmt::Debug,
{
    pub fn new_with_interface(device_interface: DI, parser: NMEA) -> Self {
        Self {
            di: device_interface,
            nmea: parser,
            // the DDC port outputs NMEA from the factory
            protocol: Protocol::NmeaOnly,
            nav: NavFields::default(),
        }
    }

    /// Check that the module answers on the bus and reset the last
    /// navigation solution to its no-fix defaults.
    pub fn begin(&mut self) -> Result<(), Error<CommE>> {
        self.di.probe()?;
        self.nav = NavFields::default();
        Ok(())
    }

    /// The last decoded navigation solution.
    pub fn last_fields(&self) -> NavFields {
        self.nav
    }

    /// Poll the receiver once and refresh the navigation solution,
    /// over whichever protocol the output port is configured for.
    pub fn read_data(
        &mut self,
        clock: &mut impl MonotonicClock,
        delay_source: &mut impl DelayMs<u32>,
    ) -> Result<(), Error<CommE>> {
        match self.protocol {
            Protocol::NmeaOnly | Protocol::NmeaUbx => self.relay_sentences(),
            Protocol::UbxOnly => self.poll_nav_pvt(clock, delay_source),
        }
    }

    /// Configure the protocols the receiver accepts and emits on its
    /// DDC port, and switch the driver's read path to `output`.
    ///
    /// Fire-and-forget: the receiver's ACK-ACK is not awaited.
    pub fn set_communication(
        &mut self,
        input: Protocol,
        output: Protocol,
    ) -> Result<(), Error<CommE>> {
        let mut payload = [0u8; 20];
        // mode field: 7-bit slave address in bits 7..1
        payload[4] = DEFAULT_I2C_ADDRESS << 1;
        payload[12] = input as u8;
        payload[14] = output as u8;
        let frame = UbxFrame::new(CLASS_CFG, MSG_ID_CFG_PRT, &payload)?;
        self.write_frame(&frame)?;
        self.protocol = output;
        Ok(())
    }

    /// Put the receiver into backup mode for `duration_ms` milliseconds
    /// (0 means until an external wakeup). No response is expected.
    pub fn power_off(&mut self, duration_ms: u32) -> Result<(), Error<CommE>> {
        let mut payload = [0u8; 8];
        payload[..4].copy_from_slice(&duration_ms.to_le_bytes());
        // flags: backup
        payload[4] = 0x02;
        let frame = UbxFrame::new(CLASS_RXM, MSG_ID_RXM_PMREQ, &payload)?;
        self.write_frame(&frame)
    }

    /// Serialize and transmit one frame in a single write transaction.
    pub fn write_frame(&mut self, frame: &UbxFrame) -> Result<(), Error<CommE>> {
        let mut wire = [0u8; MAX_FRAME_LENGTH];
        let len = frame.serialize(&mut wire);
        self.di.write_all(&wire[..len])
    }

    /// Keep reading frames until one matches the (class, id) already set
    /// in `frame`, or until `timeout_ms` elapses.
    ///
    /// Mismatched frames, frames with bad checksums and transient read
    /// failures are all discarded; only the deadline ends the wait.
    pub fn wait_for_message(
        &mut self,
        frame: &mut UbxFrame,
        timeout_ms: u32,
        interval_ms: u32,
        clock: &mut impl MonotonicClock,
        delay_source: &mut impl DelayMs<u32>,
    ) -> Result<(), Error<CommE>> {
        let desired_class = frame.class;
        let desired_id = frame.id;

        let start = clock.now_ms();
        while clock.now_ms().wrapping_sub(start) < timeout_ms {
            if self.read_frame(frame).is_ok()
                && frame.class == desired_class
                && frame.id == desired_id
                && frame.verify_checksum()
            {
                return Ok(());
            }
            delay_source.delay_ms(interval_ms);
        }
        Err(Error::Timeout)
    }

    /// Read one UBX frame off the bus into `frame`, reassembling it
    /// from bounded read transactions.
    ///
    /// There is no resynchronization scan: if the stream does not start
    /// on a sync pair this fails with `OutOfSync` and leaves `frame`
    /// untouched. Callers polling a live stream should expect and
    /// discard such failures.
    pub fn read_frame(&mut self, frame: &mut UbxFrame) -> Result<(), Error<CommE>> {
        let available = self.di.available_bytes()?;
        if available == 0 {
            return Err(Error::NoData);
        }
        let mut stream = BurstCursor::new(&mut self.di, available);

        let sync1 = stream.next_byte()?;
        let sync2 = stream.next_byte()?;
        if !messages::sync_valid(sync1, sync2) {
            return Err(Error::OutOfSync);
        }

        frame.class = stream.next_byte()?;
        frame.id = stream.next_byte()?;
        let len_lo = stream.next_byte()?;
        let len_hi = stream.next_byte()?;
        let length = u16::from_le_bytes([len_lo, len_hi]);
        if length as usize > MAX_MESSAGE_LENGTH {
            return Err(Error::Malformed);
        }
        frame.length = length;
        for i in 0..length as usize {
            frame.payload[i] = stream.next_byte()?;
        }
        frame.ck_a = stream.next_byte()?;
        frame.ck_b = stream.next_byte()?;
        Ok(())
    }

    /// NMEA read path: forward up to one burst of raw stream bytes into
    /// the sentence parser, then refresh the navigation solution from
    /// the parser's state.
    fn relay_sentences(&mut self) -> Result<(), Error<CommE>> {
        let available = self.di.available_bytes()? as usize;
        let take = available.min(MAX_BURST_LENGTH);
        if take > 0 {
            let mut chunk = [0u8; MAX_BURST_LENGTH];
            self.di.read_stream(&mut chunk[..take])?;
            for &byte in &chunk[..take] {
                // idle filler must never reach the parser
                if byte != NO_DATA_SENTINEL {
                    self.nmea.process(byte);
                }
            }
        }
        if self.nmea.is_valid() {
            self.nav.fix_type = 1;
            self.nav.latitude = self.nmea.latitude();
            self.nav.longitude = self.nmea.longitude();
            self.nav.altitude = self.nmea.altitude();
            self.nav.speed = self.nmea.speed();
            self.nav.num_satellites = self.nmea.num_satellites();
        } else {
            self.nav.fix_type = 0;
        }
        Ok(())
    }

    /// UBX read path: poll NAV-PVT and decode the response payload.
    fn poll_nav_pvt(
        &mut self,
        clock: &mut impl MonotonicClock,
        delay_source: &mut impl DelayMs<u32>,
    ) -> Result<(), Error<CommE>> {
        let mut frame = UbxFrame::poll(CLASS_NAV, MSG_ID_NAV_PVT);
        self.write_frame(&frame)?;
        self.wait_for_message(
            &mut frame,
            NAV_PVT_TIMEOUT_MS,
            NAV_PVT_INTERVAL_MS,
            clock,
            delay_source,
        )?;
        self.nav = NavFields::from_nav_pvt(frame.payload())?;
        Ok(())
    }
}

/// Pulls single bytes out of repeated bounded read transactions.
///
/// The bus delivers at most `MAX_BURST_LENGTH` bytes per transaction, so
/// any frame longer than one burst has to be reassembled: whenever the
/// current chunk is exhausted, a new transaction is issued for the next
/// `min(remaining, MAX_BURST_LENGTH)` bytes.
struct BurstCursor<'a, DI> {
    di: &'a mut DI,
    chunk: [u8; MAX_BURST_LENGTH],
    pos: usize,
    len: usize,
    /// stream bytes the module still advertises but we have not read
    remaining: usize,
}

impl<'a, DI, CommE> BurstCursor<'a, DI>
where
    DI: DeviceInterface<InterfaceError = Error<CommE>>,
{
    fn new(di: &'a mut DI, available: u16) -> Self {
        Self {
            di,
            chunk: [0; MAX_BURST_LENGTH],
            pos: 0,
            len: 0,
            remaining: available as usize,
        }
    }

    fn next_byte(&mut self) -> Result<u8, Error<CommE>> {
        if self.pos == self.len {
            if self.remaining == 0 {
                return Err(Error::NoData);
            }
            let take = self.remaining.min(MAX_BURST_LENGTH);
            self.di.read_stream(&mut self.chunk[..take])?;
            self.remaining -= take;
            self.len = take;
            self.pos = 0;
        }
        let byte = self.chunk[self.pos];
        self.pos += 1;
        Ok(byte)
    }
}
