//! Frame encoding/decoding
//!
//! Implements the fixed-header binary frame used by the scanner.
//!
//! Frame format:
//! - 1 byte: Start marker (0x7E)
//! - 1 byte: Length of the body that follows (always 4)
//! - 1 byte: Reserved (0x00)
//! - 1 byte: Device address (0x0A)
//! - 1 byte: Command code
//! - 1 byte: Payload
//! - 2 bytes: Checksum (big-endian) over every byte after the start marker
//!
//! The checksum is the byte sum modulo 256 XOR-ed with [`CHECKSUM_XOR`].

use byteorder::{BigEndian, ByteOrder};

use super::{FrameError, Malformation};

/// First byte of every frame
pub const START_MARKER: u8 = 0x7E;

/// Reserved byte following the length
pub const RESERVED: u8 = 0x00;

/// Scanner bus address
pub const DEVICE_ADDRESS: u8 = 0x0A;

/// Body length: reserved, address, command, payload
pub const BODY_LEN: u8 = 4;

/// Constant folded into every checksum
pub const CHECKSUM_XOR: u16 = 0xA55A;

/// Total encoded size of a frame
pub const FRAME_LEN: usize = 2 + BODY_LEN as usize + 2;

/// Shortest byte sequence `decode` will inspect further
pub const MIN_FRAME_LEN: usize = 5;

/// A protocol frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Body length byte
    pub length: u8,
    /// Reserved byte, zero on the wire
    pub reserved: u8,
    /// Device address
    pub address: u8,
    /// Command code
    pub command: u8,
    /// Single payload byte
    pub payload: u8,
    /// Checksum as transmitted
    pub checksum: u16,
}

impl Frame {
    /// Create a frame addressed to the scanner
    pub fn new(command: u8, payload: u8) -> Self {
        let mut frame = Self {
            length: BODY_LEN,
            reserved: RESERVED,
            address: DEVICE_ADDRESS,
            command,
            payload,
            checksum: 0,
        };
        frame.checksum = checksum(&frame.header_bytes()[1..]);
        frame
    }

    /// Decode a frame from the front of `data`.
    ///
    /// Trailing bytes after the frame are ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < MIN_FRAME_LEN {
            return Err(Malformation::TooShort { len: data.len() }.into());
        }

        if data[0] != START_MARKER {
            return Err(Malformation::BadStartMarker(data[0]).into());
        }

        let declared = data[1] as usize;
        let available = data.len() - 2;
        if declared != BODY_LEN as usize || available < declared + 2 {
            return Err(Malformation::LengthMismatch {
                declared,
                available,
            }
            .into());
        }

        let body_end = 2 + declared;
        let expected = checksum(&data[1..body_end]);
        let actual = BigEndian::read_u16(&data[body_end..body_end + 2]);
        if expected != actual {
            return Err(Malformation::ChecksumMismatch { expected, actual }.into());
        }

        Ok(Self {
            length: data[1],
            reserved: data[2],
            address: data[3],
            command: data[4],
            payload: data[5],
            checksum: actual,
        })
    }

    /// Encode the frame to raw bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FRAME_LEN);
        bytes.extend_from_slice(&self.header_bytes());

        let mut crc_bytes = [0u8; 2];
        BigEndian::write_u16(&mut crc_bytes, self.checksum);
        bytes.extend_from_slice(&crc_bytes);

        bytes
    }

    fn header_bytes(&self) -> [u8; 6] {
        [
            START_MARKER,
            self.length,
            self.reserved,
            self.address,
            self.command,
            self.payload,
        ]
    }
}

/// Build the bytes of a complete frame
pub fn encode(command: u8, payload: u8) -> Vec<u8> {
    Frame::new(command, payload).to_bytes()
}

/// Validate and decode a frame
pub fn decode(data: &[u8]) -> Result<Frame, FrameError> {
    Frame::from_bytes(data)
}

/// Find the first well-formed frame in a buffer that may carry line noise
/// ahead of it.
pub fn scan(data: &[u8]) -> Option<Frame> {
    data.iter()
        .enumerate()
        .filter(|(_, b)| **b == START_MARKER)
        .find_map(|(i, _)| Frame::from_bytes(&data[i..]).ok())
}

/// Byte sum modulo 256, folded with [`CHECKSUM_XOR`]
pub fn checksum(bytes: &[u8]) -> u16 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum as u16 ^ CHECKSUM_XOR
}
