use std::fmt::Display;

use anyhow::{bail, ensure, Context};
use tracing::debug;

use crate::{
    bit_cursor::SafetyPolicy, checksum::adler32, error::InflateError,
    inflate::inflate_with_policy,
};

const COMPRESSION_LEVEL_MASK: u8 = 0x3;
const DEFLATE_IDENTIFIER: u8 = 0x8;
const PRESET_DICTIONARY_FLAG: u8 = 1 << 5;
const HEADER_LEN: usize = 2;
const DICTIONARY_ID_LEN: usize = 4;
const TRAILER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    Lowest,
    Low,
    Medium,
    Highest,
}

impl From<u8> for CompressionLevel {
    fn from(byte: u8) -> Self {
        match byte & COMPRESSION_LEVEL_MASK {
            0 => Self::Lowest,
            1 => Self::Low,
            2 => Self::Medium,
            3 => Self::Highest,
            _ => unreachable!(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    #[allow(clippy::upper_case_acronyms)]
    DEFLATE(usize), // window size
}

impl Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self::DEFLATE(window_size) = self;
        write!(f, "DEFLATE with a window size of {window_size} bytes")
    }
}

impl TryFrom<u8> for CompressionMethod {
    type Error = anyhow::Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte & 0xf {
            DEFLATE_IDENTIFIER => {
                let info = u32::from(byte >> 4);
                ensure!(info <= 7, "invalid window size exponent: {info}");
                Ok(Self::DEFLATE(2usize.pow(8 + info)))
            }
            _ => bail!("invalid compression method: {byte}"),
        }
    }
}

/// What is known about the stream once its payload has been inflated.
#[derive(Debug)]
struct Inflated {
    data: Vec<u8>,
    compressed_len: usize,
    checksum: [u8; 4],
}

// RFC 1950
#[derive(Debug)]
pub struct Stream {
    compression_method: CompressionMethod,
    preset_dictionary: Option<[u8; 4]>,
    flags_check_bits: u8,
    compression_level: CompressionLevel,
    // Everything after the header: DEFLATE data, trailer, and whatever the
    // enclosing format stores after the stream.
    compressed_data: Vec<u8>,
    policy: SafetyPolicy,
    inflated: Option<Inflated>,
}

impl Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Compression method: {}", self.compression_method)?;
        writeln!(
            f,
            "Preset dictionary (FDICT): {}",
            self.preset_dictionary
                .map(|dict| { format!("{:#x}", u32::from_be_bytes(dict)) })
                .unwrap_or("not present".to_string())
        )?;
        writeln!(f, "Compression level: {:?}", self.compression_level)?;
        writeln!(f, "Check bits: 0b{:05b}", self.flags_check_bits & 0x1f)?;
        match &self.inflated {
            Some(inflated) => {
                writeln!(f, "Compressed data length: {}", inflated.compressed_len)?;
                writeln!(f, "Decompressed data length: {}", inflated.data.len())?;
                writeln!(
                    f,
                    "Checksum (ADLER-32): {:#x}",
                    u32::from_be_bytes(inflated.checksum)
                )
            }
            None => writeln!(
                f,
                "Compressed data length: at most {}",
                self.compressed_data.len().saturating_sub(TRAILER_LEN)
            ),
        }
    }
}

impl TryFrom<&[u8]> for Stream {
    type Error = anyhow::Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        // At least enough bytes for CMF, FLG and the ADLER-32 checksum
        ensure!(bytes.len() > 6, "not enough bytes");
        // FCHECK validation
        ensure!(
            u16::from_be_bytes([bytes[0], bytes[1]]) % 31 == 0,
            "corrupt stream: invalid CMF, FLG, or both"
        );
        let compression_method: CompressionMethod =
            bytes[0].try_into().context("decoding compression method")?;
        let flags_check_bits = bytes[1] & 0x1f;
        let compression_level: CompressionLevel = (bytes[1] >> 6).into();
        let has_preset_dictionary = bytes[1] & PRESET_DICTIONARY_FLAG == PRESET_DICTIONARY_FLAG;
        let compressed_data_offset =
            HEADER_LEN + usize::from(has_preset_dictionary) * DICTIONARY_ID_LEN;
        let preset_dictionary = if has_preset_dictionary {
            // We need 4 more bytes for DICTID
            ensure!(bytes.len() > 10, "not enough bytes");
            Some(bytes[HEADER_LEN..][..DICTIONARY_ID_LEN].try_into()?)
        } else {
            None
        };
        Ok(Self {
            compression_method,
            preset_dictionary,
            flags_check_bits,
            compression_level,
            compressed_data: bytes[compressed_data_offset..].to_vec(),
            policy: SafetyPolicy::default(),
            inflated: None,
        })
    }
}

impl Stream {
    pub fn with_policy(mut self, policy: SafetyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Inflates the payload and checks it against the ADLER-32 trailer that
    /// follows it. Later calls return the already inflated bytes.
    pub fn inflate(&mut self) -> anyhow::Result<&[u8]> {
        if self.inflated.is_none() {
            self.inflated = Some(self.decode()?);
        }
        Ok(self.bytes())
    }

    fn decode(&self) -> anyhow::Result<Inflated> {
        if let Some(dictionary) = self.preset_dictionary {
            return Err(InflateError::UnsupportedFeature(format!(
                "preset dictionary {:#x}",
                u32::from_be_bytes(dictionary)
            ))
            .into());
        }
        let inflated = inflate_with_policy(&self.compressed_data, self.policy)
            .context("inflating DEFLATE payload")?;
        let compressed_len = inflated.consumed();
        let checksum: [u8; 4] = self
            .compressed_data
            .get(compressed_len..compressed_len + TRAILER_LEN)
            .context("not enough bytes for the ADLER-32 trailer")?
            .try_into()?;
        let data = inflated.into_data();
        let expected = u32::from_be_bytes(checksum);
        let actual = adler32(&data);
        ensure!(
            expected == actual,
            "ADLER-32 mismatch: trailer says {expected:#010x}, data hashes to {actual:#010x}"
        );
        debug!(compressed_len, len = data.len(), "zlib stream inflated");
        Ok(Inflated {
            data,
            compressed_len,
            checksum,
        })
    }

    /// Decompressed bytes; empty until [`Stream::inflate`] succeeds.
    pub fn bytes(&self) -> &[u8] {
        self.inflated
            .as_ref()
            .map(|inflated| inflated.data.as_slice())
            .unwrap_or_default()
    }

    /// Bytes the whole stream takes up (header, payload and trailer), known
    /// once it has been inflated.
    pub fn serialization_len(&self) -> Option<usize> {
        let inflated = self.inflated.as_ref()?;
        Some(
            HEADER_LEN
                + usize::from(self.preset_dictionary.is_some()) * DICTIONARY_ID_LEN
                + inflated.compressed_len
                + TRAILER_LEN,
        )
    }

    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    pub fn compression_level(&self) -> CompressionLevel {
        self.compression_level
    }
}

/// Decompresses a complete zlib stream.
pub fn decompress(bytes: &[u8], policy: SafetyPolicy) -> anyhow::Result<Vec<u8>> {
    let mut stream = Stream::try_from(bytes)
        .context("parsing zlib header")?
        .with_policy(policy);
    stream.inflate()?;
    Ok(stream.inflated.map(|inflated| inflated.data).unwrap_or_default())
}
