use std::fmt;

use bytes::{Bytes, BytesMut};

/// Numeric formats understood by the accessors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberFormat {
    Int8LE,
    UInt8LE,
    Int16LE,
    UInt16LE,
    Int32LE,
    UInt32LE,
    Float32LE,
}

impl NumberFormat {
    /// Width of the format in bytes
    pub const fn size(self) -> usize {
        match self {
            NumberFormat::Int8LE | NumberFormat::UInt8LE => 1,
            NumberFormat::Int16LE | NumberFormat::UInt16LE => 2,
            NumberFormat::Int32LE | NumberFormat::UInt32LE | NumberFormat::Float32LE => 4,
        }
    }

    /// Width of the format in bits
    pub const fn bits(self) -> u32 {
        (self.size() * 8) as u32
    }
}

/// Backing storage for a packet
///
/// Out-of-range accesses never fault: reads yield zero and writes are dropped.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct ByteBuffer {
    data: BytesMut,
}

impl ByteBuffer {
    /// Creates a zero-filled buffer
    pub fn zeroed(len: usize) -> Self {
        ByteBuffer {
            data: BytesMut::zeroed(len),
        }
    }

    /// Copies an existing byte slice
    pub fn from_slice(bytes: &[u8]) -> Self {
        ByteBuffer {
            data: BytesMut::from(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Copies the first `len` bytes (or fewer) into an immutable buffer
    pub fn to_bytes(&self, len: usize) -> Bytes {
        let end = len.min(self.data.len());
        Bytes::copy_from_slice(&self.data[..end])
    }

    fn window(&self, offset: usize, width: usize) -> Option<&[u8]> {
        let end = offset.checked_add(width)?;
        self.data.get(offset..end)
    }

    fn window_mut(&mut self, offset: usize, width: usize) -> Option<&mut [u8]> {
        let end = offset.checked_add(width)?;
        self.data.get_mut(offset..end)
    }

    fn read<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        if let Some(window) = self.window(offset, N) {
            out.copy_from_slice(window);
        }
        out
    }

    fn write<const N: usize>(&mut self, offset: usize, bytes: [u8; N]) {
        if let Some(window) = self.window_mut(offset, N) {
            window.copy_from_slice(&bytes);
        }
    }

    pub fn get_u8(&self, offset: usize) -> u8 {
        u8::from_le_bytes(self.read(offset))
    }

    pub fn get_i8(&self, offset: usize) -> i8 {
        i8::from_le_bytes(self.read(offset))
    }

    pub fn get_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes(self.read(offset))
    }

    pub fn get_i16(&self, offset: usize) -> i16 {
        i16::from_le_bytes(self.read(offset))
    }

    pub fn get_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.read(offset))
    }

    pub fn get_i32(&self, offset: usize) -> i32 {
        i32::from_le_bytes(self.read(offset))
    }

    pub fn get_f32(&self, offset: usize) -> f32 {
        f32::from_le_bytes(self.read(offset))
    }

    pub fn set_u8(&mut self, offset: usize, value: u8) {
        self.write(offset, value.to_le_bytes());
    }

    pub fn set_i8(&mut self, offset: usize, value: i8) {
        self.write(offset, value.to_le_bytes());
    }

    pub fn set_u16(&mut self, offset: usize, value: u16) {
        self.write(offset, value.to_le_bytes());
    }

    pub fn set_i16(&mut self, offset: usize, value: i16) {
        self.write(offset, value.to_le_bytes());
    }

    pub fn set_u32(&mut self, offset: usize, value: u32) {
        self.write(offset, value.to_le_bytes());
    }

    pub fn set_i32(&mut self, offset: usize, value: i32) {
        self.write(offset, value.to_le_bytes());
    }

    pub fn set_f32(&mut self, offset: usize, value: f32) {
        self.write(offset, value.to_le_bytes());
    }

    /// Raw bits of the value at `offset`, zero-extended to 32 bits
    fn read_raw(&self, offset: usize, format: NumberFormat) -> Option<u32> {
        let window = self.window(offset, format.size())?;
        let mut raw = [0u8; 4];
        raw[..window.len()].copy_from_slice(window);
        Some(u32::from_le_bytes(raw))
    }

    fn write_raw(&mut self, offset: usize, format: NumberFormat, raw: u32) {
        let width = format.size();
        if let Some(window) = self.window_mut(offset, width) {
            window.copy_from_slice(&raw.to_le_bytes()[..width]);
        }
    }

    /// Reads a single bit; indices outside the format width read as 0
    pub fn get_bit(&self, offset: usize, format: NumberFormat, bit: u32) -> u8 {
        if bit >= format.bits() {
            return 0;
        }
        match self.read_raw(offset, format) {
            Some(raw) => ((raw >> bit) & 1) as u8,
            None => 0,
        }
    }

    /// Sets or clears a single bit; indices outside the format width are ignored
    pub fn set_bit(&mut self, offset: usize, format: NumberFormat, bit: u32, on: bool) {
        if bit >= format.bits() {
            return;
        }
        if let Some(raw) = self.read_raw(offset, format) {
            let raw = if on { raw | (1 << bit) } else { raw & !(1 << bit) };
            self.write_raw(offset, format, raw);
        }
    }

    /// Flips a single bit; indices outside the format width are ignored
    pub fn toggle_bit(&mut self, offset: usize, format: NumberFormat, bit: u32) {
        if bit >= format.bits() {
            return;
        }
        if let Some(raw) = self.read_raw(offset, format) {
            self.write_raw(offset, format, raw ^ (1 << bit));
        }
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteBuffer({})", hex::encode(&self.data))
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
