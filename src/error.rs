//! Error types for biometal-vcf
//!
//! Fatal conditions abort the current operation with one of these variants.
//! Recoverable conditions are reported as [`Warning`](crate::formats::vcf::Warning)s
//! instead and never surface here.

use thiserror::Error;

/// Result type alias for biometal-vcf operations
pub type Result<T> = std::result::Result<T, BiometalError>;

/// Error types that can occur in biometal-vcf
#[derive(Debug, Error)]
pub enum BiometalError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes were available than a structure requires
    #[error("Truncated input: {context}")]
    Truncated {
        /// What was being read
        context: String,
    },

    /// Wrong magic bytes (gzip header or tabix magic)
    #[error("Invalid magic: {context}")]
    InvalidMagic {
        /// What was being validated
        context: String,
    },

    /// A gzip member without the BGZF "BC" extra subfield
    #[error("Missing BGZF 'BC' subfield in block at offset {offset}")]
    MissingBcSubfield {
        /// File offset of the block
        offset: u64,
    },

    /// CRC32 or size mismatch, or malformed deflate payload
    #[error("Corrupt BGZF block at offset {offset}: {msg}")]
    Corrupt {
        /// File offset of the block
        offset: u64,
        /// Error message
        msg: String,
    },

    /// Out-of-range virtual offset component
    #[error("Invalid virtual offset: block={block}, within={within}")]
    InvalidVirtualOffset {
        /// Block start offset in the compressed file
        block: u64,
        /// Offset inside the decompressed block
        within: u64,
    },

    /// More content than fits in a single BGZF block
    #[error("BGZF block content of {size} bytes exceeds the 65536 byte limit")]
    BlockTooLarge {
        /// Requested content size
        size: usize,
    },

    /// Structurally invalid tabix index
    #[error("Invalid tabix index: {msg}")]
    InvalidIndex {
        /// Error message
        msg: String,
    },

    /// Sequence name not present in the index
    #[error("Unknown reference '{name}'")]
    UnknownReference {
        /// Requested sequence name
        name: String,
    },

    /// Conflicting or incomplete fetch arguments
    #[error("Invalid query: {msg}")]
    InvalidQuery {
        /// Error message
        msg: String,
    },

    /// Malformed VCF header
    #[error("Invalid VCF header at line {line}: {msg}")]
    InvalidHeader {
        /// Line number (1-based)
        line: usize,
        /// Error message
        msg: String,
    },

    /// Header mapping value not of the form `<...>`
    #[error("Invalid header mapping: {msg}")]
    InvalidHeaderMapping {
        /// Error message
        msg: String,
    },

    /// Data line with the wrong number of tab-separated columns
    #[error("Wrong number of columns at line {line}: expected {expected}, got {actual}")]
    ColumnCountMismatch {
        /// Line number (1-based, 0 if unknown)
        line: usize,
        /// Expected column count
        expected: usize,
        /// Actual column count
        actual: usize,
    },

    /// Empty REF or ALT allele
    #[error("Empty allele at line {line}")]
    EmptyAllele {
        /// Line number (1-based, 0 if unknown)
        line: usize,
    },

    /// Other structural record violation
    #[error("Invalid VCF record at line {line}: {msg}")]
    InvalidRecord {
        /// Line number (1-based, 0 if unknown)
        line: usize,
        /// Error message
        msg: String,
    },

    /// Operation requires an indexed BGZF file
    #[error("Incorrect VCF file: {msg}")]
    IncorrectVcfFile {
        /// Error message
        msg: String,
    },
}

impl BiometalError {
    pub(crate) fn truncated(context: impl Into<String>) -> Self {
        BiometalError::Truncated {
            context: context.into(),
        }
    }

    pub(crate) fn invalid_query(msg: impl Into<String>) -> Self {
        BiometalError::InvalidQuery { msg: msg.into() }
    }

    pub(crate) fn invalid_index(msg: impl Into<String>) -> Self {
        BiometalError::InvalidIndex { msg: msg.into() }
    }

    /// Attach a line number to line-scoped errors raised without one
    pub(crate) fn at_line(self, line_no: usize) -> Self {
        match self {
            BiometalError::ColumnCountMismatch {
                line: 0,
                expected,
                actual,
            } => BiometalError::ColumnCountMismatch {
                line: line_no,
                expected,
                actual,
            },
            BiometalError::EmptyAllele { line: 0 } => BiometalError::EmptyAllele { line: line_no },
            BiometalError::InvalidRecord { line: 0, msg } => {
                BiometalError::InvalidRecord { line: line_no, msg }
            }
            BiometalError::InvalidHeader { line: 0, msg } => {
                BiometalError::InvalidHeader { line: line_no, msg }
            }
            other => other,
        }
    }
}
