//! Helpers for building DEFLATE bit streams by hand in tests.

/// LSB-first bit writer mirroring [`crate::bit_cursor::BitCursor`].
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bit(&mut self, bit: u32) {
        if self.bit == 0 {
            self.bytes.push(0);
        }
        if let Some(last) = self.bytes.last_mut() {
            *last |= ((bit & 1) as u8) << self.bit;
        }
        self.bit = (self.bit + 1) % 8;
    }

    /// Writes `n` bits of `value`, least significant first.
    pub fn write_bits(&mut self, value: u32, n: u8) {
        for i in 0..n {
            self.write_bit(value >> i);
        }
    }

    /// Writes a Huffman code, most significant bit first.
    pub fn write_code(&mut self, code: u32, len: u8) {
        for shift in (0..len).rev() {
            self.write_bit(code >> shift);
        }
    }

    pub fn align(&mut self) {
        self.bit = 0;
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.align();
        self.bytes.extend_from_slice(bytes);
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
