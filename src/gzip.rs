use std::fmt::Display;

use anyhow::{bail, ensure, Context};
use tracing::debug;

use crate::{
    bit_cursor::SafetyPolicy,
    bytes::BytesBuffer,
    checksum::crc32,
    inflate::inflate_with_policy,
};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const DEFLATE_IDENTIFIER: u8 = 0x8;
const TRAILER_LEN: usize = 8;

const FTEXT: u8 = 1 << 0;
const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
const RESERVED_FLAGS: u8 = 0xe0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingSystem {
    Fat,
    Amiga,
    Vms,
    Unix,
    VmCms,
    AtariTos,
    Hpfs,
    Macintosh,
    ZSystem,
    CpM,
    Tops20,
    Ntfs,
    Qdos,
    AcornRiscos,
    Unknown(u8),
}

impl From<u8> for OperatingSystem {
    fn from(byte: u8) -> Self {
        match byte {
            0 => Self::Fat,
            1 => Self::Amiga,
            2 => Self::Vms,
            3 => Self::Unix,
            4 => Self::VmCms,
            5 => Self::AtariTos,
            6 => Self::Hpfs,
            7 => Self::Macintosh,
            8 => Self::ZSystem,
            9 => Self::CpM,
            10 => Self::Tops20,
            11 => Self::Ntfs,
            12 => Self::Qdos,
            13 => Self::AcornRiscos,
            b => Self::Unknown(b),
        }
    }
}

#[derive(Debug)]
struct Inflated {
    data: Vec<u8>,
    compressed_len: usize,
    crc: u32,
}

// RFC 1952
#[derive(Debug)]
pub struct Member {
    text: bool,
    modification_time: u32,
    extra_flags: u8,
    operating_system: OperatingSystem,
    extra: Option<Vec<u8>>,
    name: Option<String>,
    comment: Option<String>,
    header_crc: Option<u16>,
    header_len: usize,
    // Everything after the header, possibly including further members.
    compressed_data: Vec<u8>,
    policy: SafetyPolicy,
    inflated: Option<Inflated>,
}

impl Display for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Text (FTEXT): {}", self.text)?;
        writeln!(f, "Modification time (MTIME): {}", self.modification_time)?;
        writeln!(f, "Extra flags (XFL): {:#x}", self.extra_flags)?;
        writeln!(f, "Operating system: {:?}", self.operating_system)?;
        writeln!(
            f,
            "Extra field: {}",
            self.extra
                .as_ref()
                .map(|extra| format!("{} bytes", extra.len()))
                .unwrap_or("not present".to_string())
        )?;
        writeln!(
            f,
            "Name: {}",
            self.name.as_deref().unwrap_or("not present")
        )?;
        writeln!(
            f,
            "Comment: {}",
            self.comment.as_deref().unwrap_or("not present")
        )?;
        writeln!(
            f,
            "Header CRC-16: {}",
            self.header_crc
                .map(|crc| format!("{crc:#06x}"))
                .unwrap_or("not present".to_string())
        )?;
        if let Some(inflated) = &self.inflated {
            writeln!(f, "Compressed data length: {}", inflated.compressed_len)?;
            writeln!(f, "Decompressed data length: {}", inflated.data.len())?;
            writeln!(f, "Checksum (CRC-32): {:#x}", inflated.crc)?;
        }
        Ok(())
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| char::from(byte)).collect()
}

impl TryFrom<&[u8]> for Member {
    type Error = anyhow::Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let mut buffer = BytesBuffer::new(bytes);
        let magic: [u8; 2] = buffer.pop_array().context("reading magic bytes")?;
        ensure!(magic == GZIP_MAGIC, "not a gzip member: magic {magic:02x?}");
        let method = buffer.pop_byte().context("reading compression method")?;
        ensure!(
            method == DEFLATE_IDENTIFIER,
            "invalid compression method: {method}"
        );
        let flags = buffer.pop_byte().context("reading flags")?;
        if flags & RESERVED_FLAGS != 0 {
            bail!("reserved flag bits set: {flags:#010b}");
        }
        let modification_time = buffer.pop_u32_le().context("reading MTIME")?;
        let extra_flags = buffer.pop_byte().context("reading XFL")?;
        let operating_system = buffer.pop_byte().context("reading OS")?.into();

        let extra = if flags & FEXTRA == FEXTRA {
            let len = buffer.pop_u16_le().context("reading XLEN")?;
            let extra = buffer
                .pop_bytes(usize::from(len))
                .context("reading extra field")?;
            Some(extra.to_vec())
        } else {
            None
        };
        let name = if flags & FNAME == FNAME {
            Some(latin1(
                buffer.pop_until_nul().context("reading file name")?,
            ))
        } else {
            None
        };
        let comment = if flags & FCOMMENT == FCOMMENT {
            Some(latin1(
                buffer.pop_until_nul().context("reading comment")?,
            ))
        } else {
            None
        };
        let header_crc = if flags & FHCRC == FHCRC {
            let covered = &bytes[..buffer.byte_cursor()];
            let header_crc = buffer.pop_u16_le().context("reading header CRC-16")?;
            let actual = (crc32(covered) & 0xffff) as u16;
            ensure!(
                header_crc == actual,
                "header CRC-16 mismatch: stored {header_crc:#06x}, computed {actual:#06x}"
            );
            Some(header_crc)
        } else {
            None
        };

        Ok(Self {
            text: flags & FTEXT == FTEXT,
            modification_time,
            extra_flags,
            operating_system,
            extra,
            name,
            comment,
            header_crc,
            header_len: buffer.byte_cursor(),
            compressed_data: buffer.remaining().to_vec(),
            policy: SafetyPolicy::default(),
            inflated: None,
        })
    }
}

impl Member {
    pub fn with_policy(mut self, policy: SafetyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Inflates the member and checks the CRC-32 and ISIZE trailer.
    pub fn inflate(&mut self) -> anyhow::Result<&[u8]> {
        if self.inflated.is_none() {
            self.inflated = Some(self.decode()?);
        }
        Ok(self.bytes())
    }

    fn decode(&self) -> anyhow::Result<Inflated> {
        let inflated = inflate_with_policy(&self.compressed_data, self.policy)
            .context("inflating DEFLATE payload")?;
        let compressed_len = inflated.consumed();
        let mut trailer = BytesBuffer::new(
            self.compressed_data
                .get(compressed_len..)
                .context("DEFLATE payload overran the member")?,
        );
        let crc = trailer.pop_u32_le().context("reading CRC-32 trailer")?;
        let size = trailer.pop_u32_le().context("reading ISIZE trailer")?;
        let data = inflated.into_data();
        let actual = crc32(&data);
        ensure!(
            crc == actual,
            "CRC-32 mismatch: trailer says {crc:#010x}, data hashes to {actual:#010x}"
        );
        ensure!(
            size == data.len() as u32,
            "ISIZE mismatch: trailer says {size}, got {} bytes",
            data.len()
        );
        debug!(compressed_len, len = data.len(), "gzip member inflated");
        Ok(Inflated {
            data,
            compressed_len,
            crc,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        self.inflated
            .as_ref()
            .map(|inflated| inflated.data.as_slice())
            .unwrap_or_default()
    }

    /// Bytes the member takes up, known once it has been inflated.
    pub fn serialization_len(&self) -> Option<usize> {
        let inflated = self.inflated.as_ref()?;
        Some(self.header_len + inflated.compressed_len + TRAILER_LEN)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn modification_time(&self) -> u32 {
        self.modification_time
    }

    pub fn operating_system(&self) -> OperatingSystem {
        self.operating_system
    }
}

/// Decompresses every member of a gzip file, concatenating their contents.
pub fn decompress(bytes: &[u8], policy: SafetyPolicy) -> anyhow::Result<Vec<u8>> {
    let mut output = vec![];
    let mut cursor = 0;
    let mut members = 0;
    while cursor < bytes.len() {
        let mut member = Member::try_from(&bytes[cursor..])
            .context(format!("parsing gzip member {members} at offset {cursor}"))?
            .with_policy(policy);
        output.extend_from_slice(
            member
                .inflate()
                .context(format!("inflating gzip member {members}"))?,
        );
        cursor += member
            .serialization_len()
            .ok_or_else(|| anyhow::anyhow!("could not get serialization length"))?;
        members += 1;
    }
    ensure!(members > 0, "no gzip member found");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression, GzBuilder};

    use crate::{
        bit_cursor::SafetyPolicy,
        checksum::crc32,
        gzip::{decompress, Member, OperatingSystem},
    };

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn inflate_member() {
        let text = b"gzip wraps DEFLATE with a CRC-32 and a length. ".repeat(30);
        let compressed = gzip(&text);
        let mut member = Member::try_from(compressed.as_slice()).unwrap();
        assert_eq!(member.inflate().unwrap(), text.as_slice());
        assert_eq!(member.serialization_len(), Some(compressed.len()));
        assert_eq!(member.name(), None);
    }

    #[test]
    fn optional_header_fields() {
        let mut encoder = GzBuilder::new()
            .filename("notes.txt")
            .comment("kept for the tests")
            .extra(vec![b'A', b'B', 2, 0, 1, 2])
            .mtime(1_700_000_000)
            .operating_system(3)
            .write(Vec::new(), Compression::best());
        encoder.write_all(b"header fields").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut member = Member::try_from(compressed.as_slice()).unwrap();
        assert_eq!(member.name(), Some("notes.txt"));
        assert_eq!(member.comment(), Some("kept for the tests"));
        assert_eq!(member.modification_time(), 1_700_000_000);
        assert_eq!(member.operating_system(), OperatingSystem::Unix);
        assert_eq!(member.inflate().unwrap(), b"header fields");
        assert!(member.to_string().contains("Name: notes.txt"));
    }

    #[test]
    fn header_crc() {
        let mut bytes = vec![0x1f, 0x8b, 0x08, 0x02, 0, 0, 0, 0, 0x00, 0xff];
        let crc = (crc32(&bytes) & 0xffff) as u16;
        bytes.extend(crc.to_le_bytes());
        // Empty stored block followed by the trailer of an empty member.
        bytes.extend([0x01, 0x00, 0x00, 0xff, 0xff]);
        bytes.extend([0; 8]);
        assert_eq!(decompress(&bytes, SafetyPolicy::Checked).unwrap(), b"");

        bytes[10] ^= 0xff;
        assert!(Member::try_from(bytes.as_slice()).is_err());
    }

    #[test]
    fn concatenated_members() {
        let mut bytes = gzip(b"first, ");
        bytes.extend(gzip(b"second"));
        assert_eq!(
            decompress(&bytes, SafetyPolicy::Unchecked).unwrap(),
            b"first, second"
        );
    }

    #[test]
    fn corrupt_trailers() {
        let compressed = gzip(b"trailer checks");
        let len = compressed.len();

        let mut bad_crc = compressed.clone();
        bad_crc[len - 8] ^= 0x01;
        let error = decompress(&bad_crc, SafetyPolicy::Checked).unwrap_err();
        assert!(format!("{error:#}").contains("CRC-32 mismatch"));

        let mut bad_size = compressed.clone();
        bad_size[len - 4] ^= 0x01;
        let error = decompress(&bad_size, SafetyPolicy::Checked).unwrap_err();
        assert!(format!("{error:#}").contains("ISIZE mismatch"));

        assert!(decompress(&compressed[..len - 3], SafetyPolicy::Checked).is_err());
    }

    #[test]
    fn invalid_headers() {
        assert!(Member::try_from(&b"\x1f\x8c\x08\x00\x00\x00\x00\x00\x00\x03"[..]).is_err());
        assert!(Member::try_from(&b"\x1f\x8b\x07\x00\x00\x00\x00\x00\x00\x03"[..]).is_err());
        assert!(Member::try_from(&b"\x1f\x8b\x08\x20\x00\x00\x00\x00\x00\x03"[..]).is_err());
        assert!(Member::try_from(&b"\x1f\x8b\x08"[..]).is_err());
        assert!(decompress(b"", SafetyPolicy::Checked).is_err());
    }
}
