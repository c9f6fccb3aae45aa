//! DEFLATE decompression with canonical Huffman codes.
//!
//! The core is [`inflate`]: it takes a raw RFC 1951 stream and returns the
//! bytes it encodes, or the reason it could not. Around it sit the container
//! formats that carry DEFLATE data: [`zlib`] streams, [`gzip`] members and the
//! `IDAT` chunks of a [`png`] file.
//!
//! ```
//! // A stored block holding "Hello".
//! let stream = [0x01, 0x05, 0x00, 0xfa, 0xff, b'H', b'e', b'l', b'l', b'o'];
//! assert_eq!(zinflate::inflate(&stream).unwrap(), b"Hello");
//! ```

pub mod bit_cursor;
pub mod bytes;
pub mod checksum;
pub mod error;
pub mod gzip;
pub mod huffman;
pub mod inflate;
pub mod png;
pub mod tables;
pub mod zlib;

#[cfg(test)]
mod test_utils;

pub use bit_cursor::SafetyPolicy;
pub use error::{InflateError, Result};
pub use huffman::HuffmanTree;
pub use inflate::{inflate, inflate_with_policy, Inflated};
