//! DEFLATE decoding (RFC 1951).
//!
//! [`Inflater`] reads blocks until it has consumed the one flagged as final.
//! Stored blocks are copied verbatim, fixed blocks decode against the shared
//! [`fixed_literal_tree`], dynamic blocks ship their own code lengths. Nothing
//! is returned unless the whole stream decodes.

use std::sync::LazyLock;

use tracing::{debug, trace};

use crate::{
    bit_cursor::{BitCursor, ByteSource, CheckedSource, SafetyPolicy, UncheckedSource},
    error::{InflateError, Result},
    huffman::HuffmanTree,
    tables::{
        CODE_LENGTH_ORDER, DISTANCE_CODES, END_OF_BLOCK, FIXED_DISTANCE_BITS,
        FIXED_LITERAL_LENGTHS, LENGTH_CODES, MAX_DISTANCE_CODES, MAX_LITERAL_CODES,
    },
};

static FIXED_LITERAL_TREE: LazyLock<HuffmanTree> = LazyLock::new(|| {
    HuffmanTree::from_lengths(&FIXED_LITERAL_LENGTHS)
        .expect("fixed literal/length code lengths form a complete code")
});

/// The literal/length tree of fixed blocks, built on first use and shared
/// read-only by every decode afterwards.
pub fn fixed_literal_tree() -> &'static HuffmanTree {
    &FIXED_LITERAL_TREE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Stored,
    Fixed,
    Dynamic,
}

impl TryFrom<u32> for BlockType {
    type Error = InflateError;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            0 => Ok(Self::Stored),
            1 => Ok(Self::Fixed),
            2 => Ok(Self::Dynamic),
            bits => Err(InflateError::corrupted(format!(
                "reserved block type {bits}"
            ))),
        }
    }
}

/// Output of a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inflated {
    data: Vec<u8>,
    consumed: usize,
}

impl Inflated {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Input bytes taken up by the DEFLATE stream, including the final
    /// partially used byte. Container trailers start right after.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

enum Distances<'t> {
    Fixed,
    Dynamic(&'t HuffmanTree),
}

pub struct Inflater<S> {
    cursor: BitCursor<S>,
    output: Vec<u8>,
}

impl<S: ByteSource> Inflater<S> {
    pub fn new(source: S) -> Self {
        let capacity = source.len().saturating_mul(2);
        Self {
            cursor: BitCursor::new(source),
            output: Vec::with_capacity(capacity),
        }
    }

    pub fn run(mut self) -> Result<Inflated> {
        loop {
            let final_block = self.cursor.next_bit()? == 1;
            let block_type = BlockType::try_from(self.cursor.read_bits(2)?)?;
            debug!(
                final_block,
                ?block_type,
                output_len = self.output.len(),
                "inflating block"
            );
            match block_type {
                BlockType::Stored => self.stored_block()?,
                BlockType::Fixed => self.huffman_block(fixed_literal_tree(), Distances::Fixed)?,
                BlockType::Dynamic => {
                    let (literals, distances) = self.dynamic_trees()?;
                    self.huffman_block(&literals, Distances::Dynamic(&distances))?;
                }
            }
            if final_block {
                break;
            }
        }

        let consumed = self.cursor.bytes_consumed();
        debug!(consumed, produced = self.output.len(), "inflate finished");
        Ok(Inflated {
            data: self.output,
            consumed,
        })
    }

    fn stored_block(&mut self) -> Result<()> {
        self.cursor.align_to_byte();
        let len = self.cursor.read_u16_le()?;
        let nlen = self.cursor.read_u16_le()?;
        if len != 0xffff - nlen {
            return Err(InflateError::corrupted(format!(
                "stored block length {len:#06x} does not match its complement {nlen:#06x}"
            )));
        }
        self.output.reserve(usize::from(len));
        for _ in 0..len {
            let byte = self.cursor.read_byte()?;
            self.output.push(byte);
        }
        Ok(())
    }

    fn dynamic_trees(&mut self) -> Result<(HuffmanTree, HuffmanTree)> {
        let (lengths, hlit) = read_code_lengths(&mut self.cursor)?;
        let (literal_lengths, distance_lengths) = lengths.split_at(hlit);
        if literal_lengths[usize::from(END_OF_BLOCK)] == 0 {
            return Err(InflateError::corrupted("no code for end of block"));
        }
        Ok((
            HuffmanTree::from_lengths(literal_lengths)?,
            HuffmanTree::from_lengths(distance_lengths)?,
        ))
    }

    fn huffman_block(&mut self, literals: &HuffmanTree, distances: Distances<'_>) -> Result<()> {
        loop {
            let symbol = literals.decode(&mut self.cursor)?;
            match symbol {
                0..=255 => self.output.push(symbol as u8),
                END_OF_BLOCK => return Ok(()),
                _ => {
                    let length = self.match_length(symbol)?;
                    let distance = self.match_distance(&distances)?;
                    self.copy_match(length, distance)?;
                }
            }
        }
    }

    fn match_length(&mut self, symbol: u16) -> Result<usize> {
        let &(extra, base) = LENGTH_CODES
            .get(usize::from(symbol - 257))
            .ok_or_else(|| InflateError::corrupted(format!("invalid length symbol {symbol}")))?;
        Ok(usize::from(base) + self.cursor.read_bits(extra)? as usize)
    }

    fn match_distance(&mut self, distances: &Distances<'_>) -> Result<usize> {
        let symbol = match distances {
            Distances::Fixed => self.cursor.read_bits_reversed(FIXED_DISTANCE_BITS)? as u16,
            Distances::Dynamic(tree) => tree.decode(&mut self.cursor)?,
        };
        let &(extra, base) = DISTANCE_CODES
            .get(usize::from(symbol))
            .ok_or_else(|| InflateError::corrupted(format!("invalid distance symbol {symbol}")))?;
        Ok(usize::from(base) + self.cursor.read_bits(extra)? as usize)
    }

    /// Appends `length` bytes starting `distance` bytes back, one at a time so
    /// that a source range overlapping the destination repeats itself.
    fn copy_match(&mut self, length: usize, distance: usize) -> Result<()> {
        if distance > self.output.len() {
            return Err(InflateError::corrupted(format!(
                "distance {distance} reaches before the start of the output ({} bytes)",
                self.output.len()
            )));
        }
        let start = self.output.len() - distance;
        self.output.reserve(length);
        for index in start..start + length {
            let byte = self.output[index];
            self.output.push(byte);
        }
        Ok(())
    }
}

/// Reads a dynamic block header up to and including the run-length coded
/// code lengths. Returns the literal/length and distance lengths back to
/// back, and `HLIT`, the index where the distance lengths begin.
pub(crate) fn read_code_lengths<S: ByteSource>(
    cursor: &mut BitCursor<S>,
) -> Result<(Vec<u8>, usize)> {
    let hlit = cursor.read_bits(5)? as usize + 257;
    let hdist = cursor.read_bits(5)? as usize + 1;
    let hclen = cursor.read_bits(4)? as usize + 4;
    trace!(hlit, hdist, hclen, "dynamic block header");
    if hlit > MAX_LITERAL_CODES {
        return Err(InflateError::corrupted(format!(
            "{hlit} literal/length codes declared"
        )));
    }
    if hdist > MAX_DISTANCE_CODES {
        return Err(InflateError::corrupted(format!(
            "{hdist} distance codes declared"
        )));
    }

    let mut code_length_lengths = [0u8; 19];
    for &symbol in &CODE_LENGTH_ORDER[..hclen] {
        code_length_lengths[symbol] = cursor.read_bits(3)? as u8;
    }
    let code_length_tree = HuffmanTree::from_lengths(&code_length_lengths)?;

    let total = hlit + hdist;
    let mut lengths: Vec<u8> = Vec::with_capacity(total);
    while lengths.len() < total {
        let (value, repeat) = match code_length_tree.decode(cursor)? {
            len @ 0..=15 => (len as u8, 1),
            16 => {
                let Some(&previous) = lengths.last() else {
                    return Err(InflateError::corrupted(
                        "repeat code 16 with no previous length",
                    ));
                };
                (previous, 3 + cursor.read_bits(2)? as usize)
            }
            17 => (0, 3 + cursor.read_bits(3)? as usize),
            18 => (0, 11 + cursor.read_bits(7)? as usize),
            symbol => {
                return Err(InflateError::corrupted(format!(
                    "invalid code length symbol {symbol}"
                )))
            }
        };
        if lengths.len() + repeat > total {
            return Err(InflateError::corrupted(
                "code length run overflows the declared alphabets",
            ));
        }
        lengths.resize(lengths.len() + repeat, value);
    }
    Ok((lengths, hlit))
}

/// Decodes a complete raw DEFLATE stream over a bounds-checked source.
pub fn inflate(compressed: &[u8]) -> Result<Vec<u8>> {
    inflate_with_policy(compressed, SafetyPolicy::Checked).map(Inflated::into_data)
}

pub fn inflate_with_policy(compressed: &[u8], policy: SafetyPolicy) -> Result<Inflated> {
    match policy {
        SafetyPolicy::Checked => Inflater::new(CheckedSource::new(compressed)).run(),
        SafetyPolicy::Unchecked => Inflater::new(UncheckedSource::new(compressed)).run(),
    }
}
