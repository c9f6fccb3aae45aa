//! Canonical Huffman trees.
//!
//! A tree is built either greedily from symbol frequencies or canonically from
//! a code length per symbol (RFC 1951, section 3.2.2). Both produce the same
//! [`HuffmanTree`], which decodes by walking one bit at a time and encodes
//! through a code table computed once when the tree is built.

use std::{
    cmp::{Ordering, Reverse},
    collections::{BTreeMap, BinaryHeap},
    fmt::Display,
};

use crate::{
    bit_cursor::{BitCursor, ByteSource},
    error::{InflateError, Result},
    tables::MAX_CODE_LENGTH,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Leaf(u16),
    Internal {
        left: Option<Box<Node>>,
        right: Option<Box<Node>>,
    },
}

impl Node {
    fn branch() -> Self {
        Self::Internal {
            left: None,
            right: None,
        }
    }
}

/// A code word, its bits in transmission order.
///
/// Frequency-built trees have no depth limit, so the bits are kept as a path
/// rather than packed into a machine word.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Code {
    bits: Vec<u8>,
}

impl Code {
    /// The low `len` bits of `bits`, most significant bit first.
    pub fn new(bits: u32, len: u8) -> Self {
        Self {
            bits: (0..len)
                .rev()
                .map(|shift| (bits.checked_shr(u32::from(shift)).unwrap_or(0) & 1) as u8)
                .collect(),
        }
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.bits.iter().copied()
    }

    fn child(&self, bit: u8) -> Self {
        let mut bits = Vec::with_capacity(self.bits.len() + 1);
        bits.extend_from_slice(&self.bits);
        bits.push(bit);
        Self { bits }
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for bit in self.iter() {
            write!(f, "{bit}")?;
        }
        Ok(())
    }
}

// Min-heap entry: lowest frequency first, then the oldest node.
struct Weighted {
    frequency: u64,
    order: usize,
    node: Node,
}

impl PartialEq for Weighted {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Weighted {}

impl Ord for Weighted {
    fn cmp(&self, other: &Self) -> Ordering {
        (Reverse(self.frequency), Reverse(self.order))
            .cmp(&(Reverse(other.frequency), Reverse(other.order)))
    }
}

impl PartialOrd for Weighted {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub struct HuffmanTree {
    root: Option<Box<Node>>,
    codes: BTreeMap<u16, Code>,
}

impl HuffmanTree {
    /// Builds a tree by repeatedly merging the two least frequent nodes.
    ///
    /// Ties go to the lower symbol, and leaves beat merged nodes of equal
    /// weight created later; the first node popped takes the `0` branch. A
    /// lone symbol gets the one bit code `0`.
    pub fn from_frequencies<I>(frequencies: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u16, u64)>,
    {
        let mut merged: BTreeMap<u16, u64> = BTreeMap::new();
        for (symbol, frequency) in frequencies {
            *merged.entry(symbol).or_default() += frequency;
        }
        if merged.is_empty() {
            return Err(InflateError::EmptyAlphabet);
        }

        let mut heap: BinaryHeap<Weighted> = merged
            .into_iter()
            .enumerate()
            .map(|(order, (symbol, frequency))| Weighted {
                frequency,
                order,
                node: Node::Leaf(symbol),
            })
            .collect();
        let mut next_order = heap.len();

        let root = loop {
            let Some(first) = heap.pop() else {
                return Err(InflateError::EmptyAlphabet);
            };
            let Some(second) = heap.pop() else {
                break match first.node {
                    leaf @ Node::Leaf(_) => Node::Internal {
                        left: Some(Box::new(leaf)),
                        right: None,
                    },
                    internal => internal,
                };
            };
            heap.push(Weighted {
                frequency: first.frequency.saturating_add(second.frequency),
                order: next_order,
                node: Node::Internal {
                    left: Some(Box::new(first.node)),
                    right: Some(Box::new(second.node)),
                },
            });
            next_order += 1;
        };

        Ok(Self::with_root(Some(Box::new(root))))
    }

    /// Builds the canonical tree for a code length per symbol (0 = unused).
    ///
    /// Over-subscribed length sets are rejected; incomplete ones are accepted
    /// and the missing codes decode as [`InflateError::UnknownSymbol`].
    pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
        let mut length_count = [0u32; MAX_CODE_LENGTH as usize + 1];
        for &len in lengths {
            if len > MAX_CODE_LENGTH {
                return Err(InflateError::corrupted(format!(
                    "code length {len} exceeds {MAX_CODE_LENGTH}"
                )));
            }
            length_count[len as usize] += 1;
        }
        length_count[0] = 0;

        let mut next_code = [0u32; MAX_CODE_LENGTH as usize + 1];
        let mut code = 0u32;
        for len in 1..=MAX_CODE_LENGTH as usize {
            code = (code + length_count[len - 1]) << 1;
            next_code[len] = code;
        }

        let mut root = None;
        for (symbol, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let code = next_code[len as usize];
            next_code[len as usize] += 1;
            if code >= 1 << len {
                return Err(InflateError::corrupted("over-subscribed code lengths"));
            }
            let symbol = u16::try_from(symbol)
                .map_err(|_| InflateError::corrupted("alphabet larger than 65536 symbols"))?;
            insert(&mut root, symbol, code, len)?;
        }

        Ok(Self::with_root(root))
    }

    fn with_root(root: Option<Box<Node>>) -> Self {
        let mut codes = BTreeMap::new();
        if let Some(root) = &root {
            collect_codes(root, Code::default(), &mut codes);
        }
        Self { root, codes }
    }

    /// Reads one symbol, following `0` to the left and `1` to the right.
    pub fn decode<S: ByteSource>(&self, cursor: &mut BitCursor<S>) -> Result<u16> {
        let mut node = self.root.as_deref().ok_or(InflateError::UnknownSymbol)?;
        loop {
            match node {
                Node::Leaf(symbol) => return Ok(*symbol),
                Node::Internal { left, right } => {
                    let child = if cursor.next_bit()? == 0 { left } else { right };
                    node = child.as_deref().ok_or(InflateError::UnknownSymbol)?;
                }
            }
        }
    }

    pub fn code(&self, symbol: u16) -> Option<&Code> {
        self.codes.get(&symbol)
    }

    /// The bits spelling `symbol`, most significant first.
    pub fn encode(&self, symbol: u16) -> Result<Vec<u8>> {
        self.code(symbol)
            .map(|code| code.bits().to_vec())
            .ok_or(InflateError::UnknownSymbol)
    }

    /// Every symbol with a code, in ascending symbol order.
    pub fn codes(&self) -> impl Iterator<Item = (u16, &Code)> + '_ {
        self.codes.iter().map(|(&symbol, code)| (symbol, code))
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

fn insert(slot: &mut Option<Box<Node>>, symbol: u16, code: u32, remaining: u8) -> Result<()> {
    if remaining == 0 {
        if slot.is_some() {
            return Err(InflateError::corrupted("over-subscribed code lengths"));
        }
        *slot = Some(Box::new(Node::Leaf(symbol)));
        return Ok(());
    }
    match slot.get_or_insert_with(|| Box::new(Node::branch())).as_mut() {
        Node::Leaf(_) => Err(InflateError::corrupted("over-subscribed code lengths")),
        Node::Internal { left, right } => {
            let child = if (code >> (remaining - 1)) & 1 == 0 {
                left
            } else {
                right
            };
            insert(child, symbol, code, remaining - 1)
        }
    }
}

fn collect_codes(node: &Node, prefix: Code, codes: &mut BTreeMap<u16, Code>) {
    match node {
        Node::Leaf(symbol) => {
            codes.insert(*symbol, prefix);
        }
        Node::Internal { left, right } => {
            for (bit, child) in [(0, left), (1, right)] {
                if let Some(child) = child {
                    collect_codes(child, prefix.child(bit), codes);
                }
            }
        }
    }
}
