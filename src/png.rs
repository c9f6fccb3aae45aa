//! Reassembly of a PNG's compressed image data.
//!
//! Every `IDAT` payload is concatenated, in order, into a single zlib stream
//! and inflated. What comes out is the filtered scanline data; undoing the
//! filters is left to the caller.

use anyhow::{bail, ensure, Context};
use tracing::debug;

use crate::{bit_cursor::SafetyPolicy, bytes::BytesBuffer, checksum::Crc32, zlib};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

pub const IHDR: [u8; 4] = *b"IHDR";
pub const IDAT: [u8; 4] = *b"IDAT";
pub const IEND: [u8; 4] = *b"IEND";

#[derive(Debug, PartialEq, Eq)]
pub struct Chunk<'a> {
    kind: [u8; 4],
    data: &'a [u8],
    crc: u32,
}

impl<'a> Chunk<'a> {
    pub fn kind(&self) -> [u8; 4] {
        self.kind
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn crc_matches(&self) -> bool {
        let mut crc = Crc32::new();
        crc.update(&self.kind);
        crc.update(self.data);
        crc.finish() == self.crc
    }
}

/// Iterator over the chunks following the PNG signature.
pub struct Chunks<'a> {
    buffer: BytesBuffer<'a>,
}

impl<'a> Chunks<'a> {
    pub fn new(bytes: &'a [u8]) -> anyhow::Result<Self> {
        let mut buffer = BytesBuffer::new(bytes);
        ensure!(
            buffer.pop_bytes(PNG_SIGNATURE.len()) == Some(PNG_SIGNATURE),
            "invalid signature: not a PNG file"
        );
        Ok(Self { buffer })
    }

    fn chunk(&mut self) -> anyhow::Result<Chunk<'a>> {
        let offset = self.buffer.byte_cursor();
        let (Some(len), Some(kind)) = (self.buffer.pop_u32_be(), self.buffer.pop_array::<4>())
        else {
            bail!("truncated chunk header at offset {offset}");
        };
        let data = usize::try_from(len)
            .ok()
            .and_then(|len| self.buffer.pop_bytes(len))
            .with_context(|| {
                format!(
                    "chunk {} at offset {offset} claims {len} bytes past the end of the file",
                    String::from_utf8_lossy(&kind)
                )
            })?;
        let crc = self.buffer.pop_u32_be().with_context(|| {
            format!(
                "missing CRC for chunk {} at offset {offset}",
                String::from_utf8_lossy(&kind)
            )
        })?;
        Ok(Chunk { kind, data, crc })
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = anyhow::Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            return None;
        }
        let chunk = self.chunk();
        if chunk.is_err() {
            self.buffer = BytesBuffer::new(&[]);
        }
        Some(chunk)
    }
}

/// Concatenates the `IDAT` payloads of a PNG file, up to `IEND`.
pub fn image_data_stream(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut stream = vec![];
    let mut idat_chunks = 0;
    for chunk in Chunks::new(bytes)? {
        let chunk = chunk.context("reading PNG chunk")?;
        ensure!(
            chunk.crc_matches(),
            "CRC mismatch in chunk {}",
            String::from_utf8_lossy(&chunk.kind())
        );
        match chunk.kind() {
            IDAT => {
                stream.extend_from_slice(chunk.data());
                idat_chunks += 1;
            }
            IEND => {
                ensure!(idat_chunks > 0, "no IDAT chunk before IEND");
                debug!(idat_chunks, len = stream.len(), "IDAT stream reassembled");
                return Ok(stream);
            }
            _ => {}
        }
    }
    bail!("no IEND chunk found")
}

/// Reassembles and inflates the image data of a PNG file.
pub fn decompress_image_data(bytes: &[u8], policy: SafetyPolicy) -> anyhow::Result<Vec<u8>> {
    let stream = image_data_stream(bytes).context("reassembling IDAT chunks")?;
    zlib::decompress(&stream, policy).context("inflating IDAT stream")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::ZlibEncoder, Compression};

    use crate::{
        bit_cursor::SafetyPolicy,
        checksum::crc32,
        png::{decompress_image_data, image_data_stream, Chunks, IDAT, IEND, IHDR, PNG_SIGNATURE},
    };

    fn chunk(kind: [u8; 4], data: &[u8]) -> Vec<u8> {
        let mut bytes = (data.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(&kind);
        bytes.extend_from_slice(data);
        let mut covered = kind.to_vec();
        covered.extend_from_slice(data);
        bytes.extend(crc32(&covered).to_be_bytes());
        bytes
    }

    /// 4x4 grayscale image, filter byte 0 on each row, split over three IDATs.
    fn png() -> (Vec<u8>, Vec<u8>) {
        let mut scanlines = vec![];
        for row in 0..4u8 {
            scanlines.push(0);
            scanlines.extend([row * 16, row * 16 + 1, row * 16 + 2, row * 16 + 3]);
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&scanlines).unwrap();
        let compressed = encoder.finish().unwrap();
        let third = compressed.len() / 3;

        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend(chunk(IHDR, &[0, 0, 0, 4, 0, 0, 0, 4, 8, 0, 0, 0, 0]));
        bytes.extend(chunk(IDAT, &compressed[..third]));
        bytes.extend(chunk(*b"tEXt", b"Comment\0split IDAT"));
        bytes.extend(chunk(IDAT, &compressed[third..2 * third]));
        bytes.extend(chunk(IDAT, &compressed[2 * third..]));
        bytes.extend(chunk(IEND, &[]));
        (bytes, scanlines)
    }

    #[test]
    fn chunk_iteration() {
        let (bytes, _) = png();
        let kinds: Vec<[u8; 4]> = Chunks::new(&bytes)
            .unwrap()
            .map(|chunk| chunk.unwrap().kind())
            .collect();
        assert_eq!(kinds, [IHDR, IDAT, *b"tEXt", IDAT, IDAT, IEND]);
    }

    #[test]
    fn idat_reassembly() {
        let (bytes, scanlines) = png();
        assert_eq!(
            decompress_image_data(&bytes, SafetyPolicy::Checked).unwrap(),
            scanlines
        );
        assert_eq!(
            decompress_image_data(&bytes, SafetyPolicy::Unchecked).unwrap(),
            scanlines
        );
    }

    #[test]
    fn corrupt_chunk_crc() {
        let (mut bytes, _) = png();
        // First byte of the IHDR payload.
        bytes[PNG_SIGNATURE.len() + 8] ^= 0x01;
        assert!(image_data_stream(&bytes).is_err());
    }

    #[test]
    fn structural_errors() {
        assert!(Chunks::new(b"GIF89a").is_err());

        let (bytes, _) = png();
        let without_iend = &bytes[..bytes.len() - 12];
        assert!(image_data_stream(without_iend).is_err());
        assert!(image_data_stream(&bytes[..bytes.len() - 2]).is_err());

        let mut no_idat = PNG_SIGNATURE.to_vec();
        no_idat.extend(chunk(IEND, &[]));
        assert!(image_data_stream(&no_idat).is_err());
    }

    #[test]
    fn oversized_chunk_length() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend(u32::MAX.to_be_bytes());
        bytes.extend(IDAT);
        bytes.extend([0; 8]);
        let mut chunks = Chunks::new(&bytes).unwrap();
        assert!(chunks.next().unwrap().is_err());
        assert!(chunks.next().is_none());
        assert!(image_data_stream(&bytes).is_err());
    }
}
