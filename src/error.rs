use thiserror::Error;

pub type Result<T> = std::result::Result<T, InflateError>;

/// Reasons a decode can fail. Every one of them aborts the decode call: no
/// partial output is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InflateError {
    /// The stream violates the DEFLATE format.
    #[error("corrupt data: {0}")]
    DataCorruption(String),

    /// A Huffman walk reached a branch with no code behind it.
    #[error("bit sequence does not map to any symbol")]
    UnknownSymbol,

    /// A frequency-based tree was requested for no symbols at all.
    #[error("cannot build a Huffman tree over an empty alphabet")]
    EmptyAlphabet,

    /// A bounds-checked source ran out of bytes.
    #[error("read past the end of the input at byte {position}")]
    OutOfRange { position: usize },

    /// A valid stream needing something this crate does not implement.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
}

impl InflateError {
    pub fn corrupted(reason: impl Into<String>) -> Self {
        Self::DataCorruption(reason.into())
    }
}
