use crate::error::{InflateError, Result};

/// Random access to the bytes a [`BitCursor`] walks over.
pub trait ByteSource {
    fn byte_at(&self, index: usize) -> Result<u8>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounds-checked source: reading past the end is an [`InflateError::OutOfRange`].
#[derive(Debug, Clone, Copy)]
pub struct CheckedSource<'a> {
    bytes: &'a [u8],
}

impl<'a> CheckedSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl ByteSource for CheckedSource<'_> {
    #[inline]
    fn byte_at(&self, index: usize) -> Result<u8> {
        self.bytes
            .get(index)
            .copied()
            .ok_or(InflateError::OutOfRange { position: index })
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// Raw source for input already known to be well formed. There is no
/// recoverable error path: reading past the end panics.
#[derive(Debug, Clone, Copy)]
pub struct UncheckedSource<'a> {
    bytes: &'a [u8],
}

impl<'a> UncheckedSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl ByteSource for UncheckedSource<'_> {
    #[inline]
    fn byte_at(&self, index: usize) -> Result<u8> {
        Ok(self.bytes[index])
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// Which [`ByteSource`] a decode runs over.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SafetyPolicy {
    #[default]
    Checked,
    Unchecked,
}

/// Order in which the bits of each byte are handed out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    /// Bit 0 first (DEFLATE).
    #[default]
    LsbFirst,
    /// Bit 7 first (JPEG entropy coded segments).
    MsbFirst,
}

/// Sequential bit reader over a [`ByteSource`].
///
/// The position is a byte index plus a bit index in `0..8`; stepping past
/// bit 7 moves on to bit 0 of the next byte.
#[derive(Debug, Clone)]
pub struct BitCursor<S> {
    source: S,
    order: BitOrder,
    byte: usize,
    bit: u8,
}

impl<S: ByteSource> BitCursor<S> {
    pub fn new(source: S) -> Self {
        Self::with_order(source, BitOrder::LsbFirst)
    }

    pub fn with_order(source: S, order: BitOrder) -> Self {
        Self {
            source,
            order,
            byte: 0,
            bit: 0,
        }
    }

    #[inline]
    pub fn next_bit(&mut self) -> Result<u8> {
        let byte = self.source.byte_at(self.byte)?;
        let bit = match self.order {
            BitOrder::LsbFirst => (byte >> self.bit) & 1,
            BitOrder::MsbFirst => (byte >> (7 - self.bit)) & 1,
        };
        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            self.byte += 1;
        }
        Ok(bit)
    }

    /// Reads `n` bits, the first one read being the least significant.
    pub fn read_bits(&mut self, n: u8) -> Result<u32> {
        debug_assert!(n <= 32);
        let mut value = 0u32;
        for i in 0..n {
            value |= u32::from(self.next_bit()?) << i;
        }
        Ok(value)
    }

    /// Reads `n` bits, the first one read being the most significant.
    pub fn read_bits_reversed(&mut self, n: u8) -> Result<u32> {
        debug_assert!(n <= 32);
        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | u32::from(self.next_bit()?);
        }
        Ok(value)
    }

    /// Drops whatever is left of the current byte.
    pub fn align_to_byte(&mut self) {
        if self.bit != 0 {
            self.bit = 0;
            self.byte += 1;
        }
    }

    /// Reads a raw byte, aligning first.
    pub fn read_byte(&mut self) -> Result<u8> {
        self.align_to_byte();
        let byte = self.source.byte_at(self.byte)?;
        self.byte += 1;
        Ok(byte)
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes([self.read_byte()?, self.read_byte()?]))
    }

    pub fn position(&self) -> (usize, u8) {
        (self.byte, self.bit)
    }

    /// Number of source bytes touched so far, counting a partially read byte.
    pub fn bytes_consumed(&self) -> usize {
        self.byte + usize::from(self.bit != 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        bit_cursor::{BitCursor, BitOrder, ByteSource, CheckedSource, UncheckedSource},
        error::InflateError,
    };

    #[test]
    fn lsb_first_accumulation() {
        let bytes = [0b1011_0100, 0b1100_1010];
        let mut cursor = BitCursor::new(CheckedSource::new(&bytes));
        assert_eq!(cursor.read_bits(4).unwrap(), 0b0100);
        assert_eq!(cursor.read_bits(4).unwrap(), 0b1011);
        assert_eq!(cursor.read_bits(8).unwrap(), 0b1100_1010);
        assert_eq!(cursor.position(), (2, 0));
    }

    #[test]
    fn reversed_read_puts_first_bit_on_top() {
        // First five bits in LSB-first order are 1, 0, 0, 1, 1.
        let bytes = [0b0001_1001];
        let mut cursor = BitCursor::new(CheckedSource::new(&bytes));
        assert_eq!(cursor.read_bits_reversed(5).unwrap(), 0b10011);
        assert_eq!(cursor.position(), (0, 5));
    }

    #[test]
    fn msb_first_order() {
        let bytes = [0b1010_0000];
        let mut cursor = BitCursor::with_order(CheckedSource::new(&bytes), BitOrder::MsbFirst);
        assert_eq!(cursor.next_bit().unwrap(), 1);
        assert_eq!(cursor.next_bit().unwrap(), 0);
        assert_eq!(cursor.read_bits_reversed(2).unwrap(), 0b10);
    }

    #[test]
    fn align_and_raw_bytes() {
        let bytes = [0xff, 0x34, 0x12, 0x99];
        let mut cursor = BitCursor::new(CheckedSource::new(&bytes));
        cursor.next_bit().unwrap();
        assert_eq!(cursor.bytes_consumed(), 1);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x1234);
        cursor.align_to_byte();
        assert_eq!(cursor.position(), (3, 0));
        assert_eq!(cursor.read_byte().unwrap(), 0x99);
        assert_eq!(cursor.bytes_consumed(), 4);
    }

    #[test]
    fn checked_source_reports_out_of_range() {
        let bytes = [0x01];
        let mut cursor = BitCursor::new(CheckedSource::new(&bytes));
        cursor.read_bits(8).unwrap();
        assert_eq!(
            cursor.next_bit(),
            Err(InflateError::OutOfRange { position: 1 })
        );
        assert_eq!(
            cursor.read_byte(),
            Err(InflateError::OutOfRange { position: 1 })
        );
    }

    #[test]
    #[should_panic]
    fn unchecked_source_panics_past_the_end() {
        let source = UncheckedSource::new(&[]);
        assert!(source.is_empty());
        let _ = source.byte_at(0);
    }
}
