//! Recoverable VCF problems
//!
//! Parsing continues past these with a sensible default. Each warning is
//! logged through `tracing` when it is recorded and kept in a [`Warnings`]
//! collector until the caller drains it.

use thiserror::Error;

/// A recoverable problem found while reading a VCF file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    /// FILTER (or FORMAT/FT) value not declared in the header
    #[error("filter '{filter}' not found in header{}", sample_suffix(.sample))]
    UnknownFilter {
        /// Offending filter
        filter: String,
        /// Sample whose FT column used it, `None` for the FILTER column
        sample: Option<String>,
    },

    /// Value list length disagrees with the declared Number
    #[error("number of elements for {section} field {key} is {actual} instead of {expected}")]
    IncorrectListLength {
        /// "INFO" or "FORMAT"
        section: &'static str,
        /// Field ID
        key: String,
        /// Values present
        actual: usize,
        /// Values implied by Number
        expected: usize,
    },

    /// INFO/FORMAT key with no header or reserved definition
    #[error("{section} field {key} not found in header, using String/.")]
    FieldInfoNotFound {
        /// "INFO" or "FORMAT"
        section: &'static str,
        /// Field ID
        key: String,
    },

    /// Header field definition without Number
    #[error("field {key} has no Number, assuming '.'")]
    FieldMissingNumber {
        /// Field ID
        key: String,
    },

    /// Header field definition with an unparseable Number
    #[error("field {key} has invalid Number '{number}', assuming '.'")]
    FieldInvalidNumber {
        /// Field ID
        key: String,
        /// Declared value
        number: String,
    },

    /// Header field definition without Type, or with an unknown one
    #[error("field {key} has missing or invalid Type, assuming String")]
    FieldMissingType {
        /// Field ID
        key: String,
    },

    /// Header field definition without Description
    #[error("field {key} has no Description")]
    FieldMissingDescription {
        /// Field ID
        key: String,
    },

    /// Mapping key with surrounding whitespace (stripped)
    #[error("mapping key {key:?} has leading or trailing space")]
    LeadingTrailingSpaceInKey {
        /// Key as written
        key: String,
    },

    /// `##fileformat` outside VCFv4.0 to VCFv4.3
    #[error("unknown VCF version {version}")]
    UnknownVcfVersion {
        /// Declared version
        version: String,
    },

    /// Value does not parse as its declared type (kept as string)
    #[error("{value} cannot be converted to {field_type}, keeping as string")]
    CannotConvertValue {
        /// Raw value
        value: String,
        /// Declared type
        field_type: String,
    },

    /// `#CHROM` line uses spaces (split on whitespace instead)
    #[error("found space in #CHROM line, splitting at whitespace instead of tab")]
    SpaceInChromLine,

    /// Second definition for the same ID (first one wins)
    #[error("duplicate {key} header line with ID {id}")]
    DuplicateHeaderLineId {
        /// Header line key (INFO, FORMAT, FILTER, contig)
        key: String,
        /// Repeated ID
        id: String,
    },

    /// Sample column with more values than FORMAT keys (extra values kept raw)
    #[error("sample {sample} has {values} values for {keys} FORMAT keys")]
    SurplusSampleValues {
        /// Sample name
        sample: String,
        /// FORMAT key count
        keys: usize,
        /// Values in the column
        values: usize,
    },

    /// BGZF stream without the empty terminating block
    #[error("BGZF EOF marker missing, file may be truncated")]
    MissingEofMarker,
}

fn sample_suffix(sample: &Option<String>) -> String {
    match sample {
        Some(name) => format!(" (FORMAT/FT of sample {})", name),
        None => String::new(),
    }
}

/// Ordered collection of recorded warnings
#[derive(Debug, Default, Clone)]
pub struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it
    pub fn push(&mut self, warning: Warning) {
        tracing::warn!(warning = %warning, "VCF warning");
        self.items.push(warning);
    }

    /// Remove and return everything recorded so far
    pub fn take(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.items)
    }

    /// Move all warnings from `other` into this collector without logging again
    pub fn append(&mut self, other: &mut Warnings) {
        self.items.append(&mut other.items);
    }

    /// Number of pending warnings
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no warnings are pending
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pending warnings in the order they were recorded
    pub fn iter(&self) -> std::slice::Iter<'_, Warning> {
        self.items.iter()
    }
}
