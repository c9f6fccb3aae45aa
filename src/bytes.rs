/// Cursor over container framing: headers, chunk lengths, trailers.
pub struct BytesBuffer<'a> {
    bytes: &'a [u8],
    byte_cursor: usize,
}

impl<'a> BytesBuffer<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            byte_cursor: 0,
        }
    }

    pub fn pop_byte(&mut self) -> Option<u8> {
        let ret = *self.bytes.get(self.byte_cursor)?;
        self.byte_cursor += 1;
        Some(ret)
    }

    pub fn pop_bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let ret = self
            .bytes
            .get(self.byte_cursor..self.byte_cursor.checked_add(n)?)?;
        self.byte_cursor += n;
        Some(ret)
    }

    pub fn pop_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.pop_bytes(N)?.try_into().ok()
    }

    pub fn pop_u16_le(&mut self) -> Option<u16> {
        self.pop_array().map(u16::from_le_bytes)
    }

    pub fn pop_u32_le(&mut self) -> Option<u32> {
        self.pop_array().map(u32::from_le_bytes)
    }

    pub fn pop_u32_be(&mut self) -> Option<u32> {
        self.pop_array().map(u32::from_be_bytes)
    }

    /// Pops up to and including the next NUL byte, returning what precedes it.
    pub fn pop_until_nul(&mut self) -> Option<&'a [u8]> {
        let len = self.remaining().iter().position(|&byte| byte == 0)?;
        let ret = self.pop_bytes(len)?;
        self.byte_cursor += 1;
        Some(ret)
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.byte_cursor..]
    }

    pub fn byte_cursor(&self) -> usize {
        self.byte_cursor
    }

    pub fn is_empty(&self) -> bool {
        self.byte_cursor >= self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::bytes::BytesBuffer;

    #[test]
    fn pops() {
        let mut buffer = BytesBuffer::new(b"\x01\x34\x12name\0rest\xde\xad\xbe\xef");
        assert_eq!(buffer.pop_byte(), Some(0x01));
        assert_eq!(buffer.pop_u16_le(), Some(0x1234));
        assert_eq!(buffer.pop_until_nul(), Some(&b"name"[..]));
        assert_eq!(buffer.pop_bytes(4), Some(&b"rest"[..]));
        assert_eq!(buffer.byte_cursor(), 12);
        assert_eq!(buffer.pop_u32_be(), Some(0xdead_beef));
        assert!(buffer.is_empty());
        assert_eq!(buffer.pop_byte(), None);
        assert_eq!(buffer.pop_bytes(1), None);
        assert_eq!(buffer.pop_until_nul(), None);
    }

    #[test]
    fn failed_pops_do_not_move_the_cursor() {
        let mut buffer = BytesBuffer::new(b"abc");
        assert_eq!(buffer.pop_u32_le(), None);
        assert_eq!(buffer.pop_until_nul(), None);
        assert_eq!(buffer.byte_cursor(), 0);
        assert_eq!(buffer.pop_bytes(2), Some(&b"ab"[..]));
        assert_eq!(buffer.remaining(), b"c");
    }
}
