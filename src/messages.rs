use crate::Error;

/// First UBX frame marker byte
pub const SYNC_CHAR_1: u8 = 0xB5;
/// Second UBX frame marker byte
pub const SYNC_CHAR_2: u8 = 0x62;

/// Largest payload the driver will frame or accept
pub const MAX_MESSAGE_LENGTH: usize = 256;
/// Wire overhead: sync pair, class, id, length (2), checksum (2)
pub const FRAME_OVERHEAD: usize = 8;
/// Largest serialized frame
pub const MAX_FRAME_LENGTH: usize = MAX_MESSAGE_LENGTH + FRAME_OVERHEAD;

pub const CLASS_NAV: u8 = 0x01;
pub const CLASS_RXM: u8 = 0x02;
pub const CLASS_ACK: u8 = 0x05;
pub const CLASS_CFG: u8 = 0x06;
pub const CLASS_MON: u8 = 0x0A;

/// NAV-PVT: navigation position/velocity/time solution
pub const MSG_ID_NAV_PVT: u8 = 0x07;
/// ACK-ACK: message acknowledged
pub const MSG_ID_ACK_ACK: u8 = 0x01;
/// ACK-NAK: message rejected
pub const MSG_ID_ACK_NAK: u8 = 0x00;
/// CFG-PRT: I/O port protocol configuration
pub const MSG_ID_CFG_PRT: u8 = 0x00;
/// CFG-MSG: per-message output rate
pub const MSG_ID_CFG_MSG: u8 = 0x01;
/// CFG-RATE: navigation/measurement rate
pub const MSG_ID_CFG_RATE: u8 = 0x08;
/// RXM-PMREQ: requested power management task
pub const MSG_ID_RXM_PMREQ: u8 = 0x41;

/// Check that a pair of bytes is the UBX frame boundary marker
pub fn sync_valid(byte1: u8, byte2: u8) -> bool {
    byte1 == SYNC_CHAR_1 && byte2 == SYNC_CHAR_2
}

/// A single UBX frame.
///
/// The checksum bytes are only meaningful after `update_checksum`
/// (for frames built locally) or after a full read off the bus.
#[derive(Clone, Debug)]
pub struct UbxFrame {
    pub class: u8,
    pub id: u8,
    /// Payload length in bytes, little-endian on the wire
    pub length: u16,
    pub payload: [u8; MAX_MESSAGE_LENGTH],
    pub ck_a: u8,
    pub ck_b: u8,
}

impl UbxFrame {
    /// Build a frame around the given payload and compute its checksum.
    pub fn new<E>(class: u8, id: u8, payload: &[u8]) -> Result<Self, Error<E>> {
        if payload.len() > MAX_MESSAGE_LENGTH {
            return Err(Error::Malformed);
        }
        let mut frame = Self::poll(class, id);
        frame.length = payload.len() as u16;
        frame.payload[..payload.len()].copy_from_slice(payload);
        frame.update_checksum();
        Ok(frame)
    }

    /// An empty-payload frame, as used to poll the receiver for a message.
    pub fn poll(class: u8, id: u8) -> Self {
        let mut frame = Self {
            class,
            id,
            length: 0,
            payload: [0; MAX_MESSAGE_LENGTH],
            ck_a: 0,
            ck_b: 0,
        };
        frame.update_checksum();
        frame
    }

    /// The valid portion of the payload buffer.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.length as usize]
    }

    /// 8-bit Fletcher checksum over class, id, both length bytes and the
    /// payload, in that order. Both accumulators wrap at 256.
    pub fn checksum(&self) -> (u8, u8) {
        let mut ck_a: u8 = 0;
        let mut ck_b: u8 = 0;
        let mut add = |byte: u8| {
            ck_a = ck_a.wrapping_add(byte);
            ck_b = ck_b.wrapping_add(ck_a);
        };
        add(self.class);
        add(self.id);
        add((self.length & 0xFF) as u8);
        add((self.length >> 8) as u8);
        for &byte in self.payload() {
            add(byte);
        }
        (ck_a, ck_b)
    }

    /// Recompute and store the checksum bytes.
    pub fn update_checksum(&mut self) {
        let (ck_a, ck_b) = self.checksum();
        self.ck_a = ck_a;
        self.ck_b = ck_b;
    }

    /// Whether the stored checksum bytes match the frame contents.
    pub fn verify_checksum(&self) -> bool {
        self.checksum() == (self.ck_a, self.ck_b)
    }

    /// Serialized size of this frame on the wire.
    pub fn wire_len(&self) -> usize {
        self.length as usize + FRAME_OVERHEAD
    }

    /// Write the frame into `out` in wire order. `out` must hold at least
    /// `wire_len()` bytes. Returns the number of bytes written.
    pub fn serialize(&self, out: &mut [u8]) -> usize {
        let len = self.length as usize;
        out[0] = SYNC_CHAR_1;
        out[1] = SYNC_CHAR_2;
        out[2] = self.class;
        out[3] = self.id;
        out[4] = (self.length & 0xFF) as u8;
        out[5] = (self.length >> 8) as u8;
        out[6..6 + len].copy_from_slice(self.payload());
        out[6 + len] = self.ck_a;
        out[7 + len] = self.ck_b;
        len + FRAME_OVERHEAD
    }

    /// Parse one serialized frame from the start of `buf`.
    pub fn parse<E>(buf: &[u8]) -> Result<Self, Error<E>> {
        if buf.len() < FRAME_OVERHEAD {
            return Err(Error::Malformed);
        }
        if !sync_valid(buf[0], buf[1]) {
            return Err(Error::OutOfSync);
        }
        let length = u16::from_le_bytes([buf[4], buf[5]]) as usize;
        if length > MAX_MESSAGE_LENGTH || buf.len() < length + FRAME_OVERHEAD {
            return Err(Error::Malformed);
        }
        let mut frame = Self {
            class: buf[2],
            id: buf[3],
            length: length as u16,
            payload: [0; MAX_MESSAGE_LENGTH],
            ck_a: buf[6 + length],
            ck_b: buf[7 + length],
        };
        frame.payload[..length].copy_from_slice(&buf[6..6 + length]);
        Ok(frame)
    }
}

// NAV-PVT payload offsets used by the field extractor
const OFFSET_FIX_TYPE: usize = 20;
const OFFSET_NUM_SATELLITES: usize = 23;
const OFFSET_LONGITUDE: usize = 24;
const OFFSET_LATITUDE: usize = 28;
const OFFSET_ALTITUDE: usize = 36;
const OFFSET_SPEED: usize = 60;
/// Shortest payload the extractor can decode without overrunning
pub const MIN_NAV_PVT_LENGTH: usize = OFFSET_SPEED + 4;

/// The decoded navigation solution kept by the driver.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NavFields {
    /// GNSS fix type, 0 = no fix
    pub fix_type: u8,
    /// Height above mean sea level (mm)
    pub altitude: i32,
    /// Latitude (1e-7 degrees)
    pub latitude: i32,
    /// Longitude (1e-7 degrees)
    pub longitude: i32,
    /// Navigation system identifier; not reported by NAV-PVT, kept at 0
    pub nav_system: i32,
    /// Number of satellites used in the solution
    pub num_satellites: u8,
    /// Ground speed (mm/s)
    pub speed: i32,
}

impl NavFields {
    /// Decode a NAV-PVT payload at the fixed field offsets.
    ///
    /// The receiver sends 92-byte NAV-PVT payloads; anything shorter than
    /// the last offset read here is rejected rather than read out of
    /// bounds.
    pub fn from_nav_pvt<E>(payload: &[u8]) -> Result<Self, Error<E>> {
        if payload.len() < MIN_NAV_PVT_LENGTH {
            return Err(Error::Malformed);
        }
        Ok(Self {
            fix_type: payload[OFFSET_FIX_TYPE],
            altitude: extract_u32(payload, OFFSET_ALTITUDE) as i32,
            latitude: extract_u32(payload, OFFSET_LATITUDE) as i32,
            longitude: extract_u32(payload, OFFSET_LONGITUDE) as i32,
            nav_system: 0,
            num_satellites: payload[OFFSET_NUM_SATELLITES],
            speed: extract_u32(payload, OFFSET_SPEED) as i32,
        })
    }
}

/// Assemble a 32-bit value from two little-endian 16-bit half-words.
fn extract_u32(payload: &[u8], index: usize) -> u32 {
    let low = u16::from_le_bytes([payload[index], payload[index + 1]]);
    let high = u16::from_le_bytes([payload[index + 2], payload[index + 3]]);
    (low as u32) | ((high as u32) << 16)
}
