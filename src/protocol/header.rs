use bytes::Bytes;

use super::buffer::{ByteBuffer, NumberFormat};

/// Size of the standard header in bytes
pub const HEADER_SIZE: usize = 9;

/// Trailing bytes reserved by the transport for signal reporting
pub const SIGNAL_SIZE: usize = 4;

/// Largest raw buffer the radio transport carries
pub const MAX_RAW_PACKET: usize = 32;

/// Largest packet (header + payload) that still leaves room for the signal word
pub const MAX_PACKET_SIZE: usize = MAX_RAW_PACKET - SIGNAL_SIZE;

const TYPE_OFFSET: usize = 0;
const TIMESTAMP_OFFSET: usize = 1;
const ORIGIN_OFFSET: usize = 5;

/// Decoded header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    /// Payload variant tag
    pub packet_type: u8,
    /// Sender-local clock in milliseconds
    pub timestamp: u32,
    /// Sender's origin identifier
    pub origin_id: u32,
}

impl PacketHeader {
    /// Parses the header at the start of a raw buffer
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < HEADER_SIZE {
            return None;
        }
        let buf = ByteBuffer::from_slice(&raw[..HEADER_SIZE]);
        Some(PacketHeader {
            packet_type: buf.get_u8(TYPE_OFFSET),
            timestamp: buf.get_u32(TIMESTAMP_OFFSET),
            origin_id: buf.get_u32(ORIGIN_OFFSET),
        })
    }
}

/// Reads the signal strength the transport stored in the last 4 bytes
pub fn signal_of(raw: &[u8]) -> i32 {
    match raw.len().checked_sub(SIGNAL_SIZE) {
        Some(start) => ByteBuffer::from_slice(&raw[start..]).get_i32(0),
        None => 0,
    }
}

/// A fixed-size packet: header followed by variant-specific fields
///
/// ```text
///  0       1               5               9
/// +-------+---------------+---------------+------------------ - -+
/// | type  | timestamp u32 | origin id u32 | payload fields        |
/// +-------+---------------+---------------+------------------ - -+
/// ```
///
/// Field accessors take offsets relative to the end of the header. Every raw
/// radio buffer additionally ends with 4 bytes the transport overwrites with
/// the received signal strength.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    buf: ByteBuffer,
    packet_size: usize,
}

impl Frame {
    /// Creates a zero-filled frame with the type byte written
    pub fn new(packet_type: u8, payload_len: usize) -> Self {
        let packet_size = HEADER_SIZE + payload_len;
        let mut buf = ByteBuffer::zeroed(packet_size);
        buf.set_u8(TYPE_OFFSET, packet_type);
        Frame { buf, packet_size }
    }

    /// Adopts a received buffer
    ///
    /// Returns `None` when the buffer is shorter than the packet size or its
    /// type byte is not `packet_type`. The whole buffer is kept so the trailing
    /// signal word stays readable.
    pub fn adopt(raw: &[u8], packet_type: u8, payload_len: usize) -> Option<Self> {
        let packet_size = HEADER_SIZE + payload_len;
        if raw.len() < packet_size || raw[TYPE_OFFSET] != packet_type {
            return None;
        }
        Some(Frame {
            buf: ByteBuffer::from_slice(raw),
            packet_size,
        })
    }

    /// Header plus payload length
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Type byte, always read back from the buffer
    pub fn packet_type(&self) -> u8 {
        self.buf.get_u8(TYPE_OFFSET)
    }

    pub fn timestamp(&self) -> u32 {
        self.buf.get_u32(TIMESTAMP_OFFSET)
    }

    pub fn set_timestamp(&mut self, timestamp: u32) {
        self.buf.set_u32(TIMESTAMP_OFFSET, timestamp);
    }

    pub fn origin_id(&self) -> u32 {
        self.buf.get_u32(ORIGIN_OFFSET)
    }

    pub fn set_origin_id(&mut self, origin_id: u32) {
        self.buf.set_u32(ORIGIN_OFFSET, origin_id);
    }

    /// All header fields at once
    pub fn header(&self) -> PacketHeader {
        PacketHeader {
            packet_type: self.packet_type(),
            timestamp: self.timestamp(),
            origin_id: self.origin_id(),
        }
    }

    /// Signal strength reported by the transport, or 0 for locally built frames
    pub fn signal(&self) -> i32 {
        if self.buf.len() >= self.packet_size + SIGNAL_SIZE {
            signal_of(self.buf.as_slice())
        } else {
            0
        }
    }

    /// Wire bytes of exactly `packet_size` length
    pub fn to_bytes(&self) -> Bytes {
        self.buf.to_bytes(self.packet_size)
    }

    pub fn get_u8(&self, offset: usize) -> u8 {
        self.buf.get_u8(HEADER_SIZE + offset)
    }

    pub fn set_u8(&mut self, offset: usize, value: u8) {
        self.buf.set_u8(HEADER_SIZE + offset, value);
    }

    pub fn get_u16(&self, offset: usize) -> u16 {
        self.buf.get_u16(HEADER_SIZE + offset)
    }

    pub fn set_u16(&mut self, offset: usize, value: u16) {
        self.buf.set_u16(HEADER_SIZE + offset, value);
    }

    pub fn get_i16(&self, offset: usize) -> i16 {
        self.buf.get_i16(HEADER_SIZE + offset)
    }

    pub fn set_i16(&mut self, offset: usize, value: i16) {
        self.buf.set_i16(HEADER_SIZE + offset, value);
    }

    pub fn get_u32(&self, offset: usize) -> u32 {
        self.buf.get_u32(HEADER_SIZE + offset)
    }

    pub fn set_u32(&mut self, offset: usize, value: u32) {
        self.buf.set_u32(HEADER_SIZE + offset, value);
    }

    pub fn get_i32(&self, offset: usize) -> i32 {
        self.buf.get_i32(HEADER_SIZE + offset)
    }

    pub fn set_i32(&mut self, offset: usize, value: i32) {
        self.buf.set_i32(HEADER_SIZE + offset, value);
    }

    pub fn get_bit(&self, offset: usize, format: NumberFormat, bit: u32) -> u8 {
        self.buf.get_bit(HEADER_SIZE + offset, format, bit)
    }

    pub fn set_bit(&mut self, offset: usize, format: NumberFormat, bit: u32, on: bool) {
        self.buf.set_bit(HEADER_SIZE + offset, format, bit, on);
    }

    pub fn toggle_bit(&mut self, offset: usize, format: NumberFormat, bit: u32) {
        self.buf.toggle_bit(HEADER_SIZE + offset, format, bit);
    }
}
