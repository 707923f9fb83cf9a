//! VCF header model
//!
//! A [`Header`] is the ordered list of `##` lines plus the sample names from
//! the `#CHROM` line. INFO, FORMAT, FILTER and contig lines are indexed by ID
//! for lookups during record parsing; lines read from a file keep their
//! original text so that writing them back is byte-exact.
//!
//! INFO/FORMAT keys that the header does not declare fall back to the
//! reserved definitions of the VCF specification ([`RESERVED_INFO`],
//! [`RESERVED_FORMAT`]).
//!
//! # Example
//!
//! ```
//! use biometal_vcf::formats::vcf::header::{FieldType, Header, HeaderLine, Number, SamplesInfos};
//!
//! let mut header = Header::new(
//!     vec![HeaderLine::plain("fileformat", "VCFv4.3")],
//!     SamplesInfos::new(vec!["NA00001".to_string()]),
//! );
//! header.add_line(HeaderLine::info("DP", Number::Fixed(1), FieldType::Integer, "Total depth"));
//!
//! let dp = header.info_field_info("DP").unwrap();
//! assert_eq!(dp.number, Number::Fixed(1));
//!
//! // Reserved keys resolve without a header line
//! assert_eq!(header.format_field_info("GT").unwrap().field_type, FieldType::String);
//! ```

use crate::error::{BiometalError, Result};
use crate::formats::vcf::splitter::{parse_mapping, quote, MappingValue};
use crate::formats::vcf::warning::{Warning, Warnings};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Supported `##fileformat` values
pub const SUPPORTED_VCF_VERSIONS: [&str; 4] = ["VCFv4.0", "VCFv4.1", "VCFv4.2", "VCFv4.3"];

/// Required `#CHROM` line columns when samples are present
pub const REQUIRE_SAMPLE_HEADER: [&str; 9] = [
    "#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO", "FORMAT",
];

/// Required `#CHROM` line columns without samples
pub const REQUIRE_NO_SAMPLE_HEADER: [&str; 8] =
    ["#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO"];

/// Declared value count of an INFO/FORMAT field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Number {
    /// Fixed count (`0` for flags)
    Fixed(usize),
    /// `A`: one per ALT allele
    Alleles,
    /// `R`: one per allele including REF
    Ref,
    /// `G`: one per genotype
    Genotypes,
    /// `.`: unknown
    Unbounded,
}

impl FromStr for Number {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "A" => Ok(Number::Alleles),
            "R" => Ok(Number::Ref),
            "G" => Ok(Number::Genotypes),
            "." => Ok(Number::Unbounded),
            _ => s.parse().map(Number::Fixed).map_err(|_| ()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Fixed(n) => write!(f, "{}", n),
            Number::Alleles => f.write_str("A"),
            Number::Ref => f.write_str("R"),
            Number::Genotypes => f.write_str("G"),
            Number::Unbounded => f.write_str("."),
        }
    }
}

/// Declared type of an INFO/FORMAT field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 32-bit signed integer
    Integer,
    /// Floating point
    Float,
    /// Presence flag (INFO only)
    Flag,
    /// Single character
    Character,
    /// Free text
    String,
}

impl FieldType {
    fn from_str_in(s: &str, section: HeaderLineKind) -> Option<Self> {
        match s {
            "Integer" => Some(FieldType::Integer),
            "Float" => Some(FieldType::Float),
            "Flag" if section == HeaderLineKind::Info => Some(FieldType::Flag),
            "Character" => Some(FieldType::Character),
            "String" => Some(FieldType::String),
            _ => None,
        }
    }

    /// Name as written in headers
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Integer => "Integer",
            FieldType::Float => "Float",
            FieldType::Flag => "Flag",
            FieldType::Character => "Character",
            FieldType::String => "String",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition of an INFO or FORMAT field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field ID
    pub id: String,
    /// Declared count
    pub number: Number,
    /// Declared type
    pub field_type: FieldType,
    /// Description text
    pub description: Option<String>,
}

impl FieldInfo {
    /// Create a definition
    pub fn new(id: impl Into<String>, number: Number, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            number,
            field_type,
            description: None,
        }
    }

    /// Definition used for undeclared keys
    pub fn fallback(id: impl Into<String>) -> Self {
        Self::new(id, Number::Unbounded, FieldType::String)
    }
}

/// Built-in field definition
#[derive(Debug, Clone, Copy)]
pub struct ReservedField {
    /// Field ID
    pub id: &'static str,
    /// Declared count
    pub number: Number,
    /// Declared type
    pub field_type: FieldType,
    /// Description text
    pub description: &'static str,
}

impl From<&ReservedField> for FieldInfo {
    fn from(r: &ReservedField) -> Self {
        Self {
            id: r.id.to_string(),
            number: r.number,
            field_type: r.field_type,
            description: Some(r.description.to_string()),
        }
    }
}

const fn reserved(
    id: &'static str,
    field_type: FieldType,
    number: Number,
    description: &'static str,
) -> ReservedField {
    ReservedField {
        id,
        number,
        field_type,
        description,
    }
}

use FieldType::{Flag, Float, Integer, String as Str};
use Number::{Alleles as A, Fixed, Genotypes as G, Ref as R, Unbounded as U};

/// Reserved INFO fields
pub const RESERVED_INFO: &[ReservedField] = &[
    reserved("AA", Str, Fixed(1), "Ancestral Allele"),
    reserved("AC", Integer, A, "Allele count in genotypes, for each ALT allele"),
    reserved("AD", Integer, R, "Total read depth for each allele"),
    reserved("ADF", Integer, R, "Forward-strand read depth for each allele"),
    reserved("ADR", Integer, R, "Reverse-strand read depth for each allele"),
    reserved("AF", Float, A, "Allele frequency for each ALT allele"),
    reserved("AN", Integer, Fixed(1), "Total number of alleles in called genotypes"),
    reserved("BQ", Float, Fixed(1), "RMS base quality"),
    reserved("CIGAR", Str, A, "Cigar string describing how to align an alternate allele to the reference allele"),
    reserved("DB", Flag, Fixed(0), "dbSNP membership"),
    reserved("DP", Integer, Fixed(1), "Combined depth across samples"),
    reserved("END", Integer, Fixed(1), "End position on CHROM"),
    reserved("H2", Flag, Fixed(0), "HapMap2 membership"),
    reserved("H3", Flag, Fixed(0), "HapMap3 membership"),
    reserved("MQ", Integer, Fixed(1), "RMS mapping quality"),
    reserved("MQ0", Integer, Fixed(1), "Number of MAPQ == 0 reads"),
    reserved("NS", Integer, Fixed(1), "Number of samples with data"),
    reserved("SB", Integer, Fixed(4), "Strand bias"),
    reserved("SOMATIC", Flag, Fixed(0), "Somatic mutation"),
    reserved("VALIDATED", Flag, Fixed(0), "Validated by follow-up experiment"),
    reserved("1000G", Flag, Fixed(0), "1000 Genomes membership"),
    reserved("IMPRECISE", Flag, Fixed(0), "Imprecise structural variation"),
    reserved("NOVEL", Flag, Fixed(0), "Indicates a novel structural variation"),
    reserved("SVTYPE", Str, Fixed(1), "Type of structural variant"),
    reserved("SVLEN", Integer, Fixed(1), "Difference in length between REF and ALT alleles"),
    reserved("CIPOS", Integer, Fixed(2), "Confidence interval around POS for imprecise variants"),
    reserved("CIEND", Integer, Fixed(2), "Confidence interval around END for imprecise variants"),
    reserved("HOMLEN", Integer, U, "Length of base pair identical micro-homology at event breakpoints"),
    reserved("HOMSEQ", Str, U, "Sequence of base pair identical micro-homology at event breakpoints"),
    reserved("BKPTID", Str, U, "ID of the assembled alternate allele in the assembly file"),
    reserved("MEINFO", Str, Fixed(4), "Mobile element info of the form NAME,START,END,POLARITY"),
    reserved("METRANS", Str, Fixed(4), "Mobile element transduction info of the form CHR,START,END,POLARITY"),
    reserved("DGVID", Str, Fixed(1), "ID of this element in Database of Genomic Variation"),
    reserved("DBVARID", Str, Fixed(1), "ID of this element in DBVAR"),
    reserved("DBRIPID", Str, Fixed(1), "ID of this element in DBRIP"),
    reserved("MATEID", Str, U, "ID of mate breakends"),
    reserved("PARID", Str, Fixed(1), "ID of partner breakend"),
    reserved("EVENT", Str, Fixed(1), "ID of event associated to breakend"),
    reserved("CILEN", Integer, Fixed(2), "Confidence interval around the inserted material between breakends"),
    reserved("DPADJ", Integer, U, "Read Depth of adjacency"),
    reserved("CN", Integer, Fixed(1), "Copy number of segment containing breakend"),
    reserved("CNADJ", Integer, U, "Copy number of adjacency"),
    reserved("CICN", Integer, Fixed(2), "Confidence interval around copy number for the segment"),
    reserved("CICNADJ", Integer, U, "Confidence interval around copy number for the adjacency"),
];

/// Reserved FORMAT fields
pub const RESERVED_FORMAT: &[ReservedField] = &[
    reserved("AD", Integer, R, "Total, per-sample read depth"),
    reserved("ADF", Integer, R, "Forward-strand, per-sample read depth"),
    reserved("ADR", Integer, R, "Reverse-strand, per-sample read depth"),
    reserved("DP", Integer, Fixed(1), "Read depth at this position for this sample"),
    reserved("EC", Integer, A, "Expected alternate allele counts for each alternate allele"),
    reserved("FT", Str, Fixed(1), "Sample genotype filter indicating if this genotype was called"),
    reserved("GL", Float, G, "Genotype likelihoods"),
    reserved("GP", Float, G, "Genotype posterior probabilities"),
    reserved("GQ", Integer, G, "Conditional genotype quality"),
    reserved("GT", Str, Fixed(1), "Genotype"),
    reserved("HQ", Integer, Fixed(2), "Haplotype quality"),
    reserved("MQ", Integer, Fixed(1), "RMS mapping quality"),
    reserved("PL", Integer, G, "Phred-scaled genotype likelihoods rounded to the closest integer"),
    reserved("PQ", Integer, Fixed(1), "Phasing quality"),
    reserved("PS", Integer, Fixed(1), "Non-negative 32 bit integer giving phasing set for this sample and this chromosome"),
    reserved("CN", Integer, Fixed(1), "Copy number genotype for imprecise events"),
    reserved("CNQ", Float, Fixed(1), "Copy number genotype quality for imprecise events"),
    reserved("CNL", Float, G, "Copy number genotype likelihood for imprecise events"),
    reserved("CNP", Float, G, "Copy number posterior probabilities"),
    reserved("NQ", Integer, Fixed(1), "Phred style probability score that the variant is novel"),
    reserved("HAP", Integer, Fixed(1), "Unique haplotype identifier"),
    reserved("AHAP", Integer, Fixed(1), "Unique identifier of ancestral haplotype"),
];

/// Look up a reserved INFO definition
pub fn reserved_info(id: &str) -> Option<&'static ReservedField> {
    RESERVED_INFO.iter().find(|r| r.id == id)
}

/// Look up a reserved FORMAT definition
pub fn reserved_format(id: &str) -> Option<&'static ReservedField> {
    RESERVED_FORMAT.iter().find(|r| r.id == id)
}

/// Kind of a structured `##KEY=<...>` header line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderLineKind {
    /// `##INFO`
    Info,
    /// `##FORMAT`
    Format,
    /// `##FILTER`
    Filter,
    /// `##contig`
    Contig,
    /// `##ALT`
    Alt,
    /// `##META`
    Meta,
    /// `##PEDIGREE`
    Pedigree,
    /// `##SAMPLE`
    Sample,
}

impl HeaderLineKind {
    /// Kind for a header key, `None` for plain `key=value` lines
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "INFO" => Some(Self::Info),
            "FORMAT" => Some(Self::Format),
            "FILTER" => Some(Self::Filter),
            "contig" => Some(Self::Contig),
            "ALT" => Some(Self::Alt),
            "META" => Some(Self::Meta),
            "PEDIGREE" => Some(Self::Pedigree),
            "SAMPLE" => Some(Self::Sample),
            _ => None,
        }
    }

    /// Header key
    pub fn key(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Format => "FORMAT",
            Self::Filter => "FILTER",
            Self::Contig => "contig",
            Self::Alt => "ALT",
            Self::Meta => "META",
            Self::Pedigree => "PEDIGREE",
            Self::Sample => "SAMPLE",
        }
    }

    fn requires_id(self) -> bool {
        matches!(self, Self::Info | Self::Format | Self::Filter | Self::Contig)
    }
}

/// Keys whose text values are always quoted when serialized
const QUOTED_KEYS: [&str; 3] = ["Description", "Source", "Version"];

/// A `##KEY=<...>` header line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingLine {
    kind: HeaderLineKind,
    value: String,
    entries: Vec<(String, MappingValue)>,
}

impl MappingLine {
    /// Build a line from entries; the serialized value is derived from them
    pub fn new(kind: HeaderLineKind, entries: Vec<(String, MappingValue)>) -> Self {
        let body: Vec<String> = entries
            .iter()
            .map(|(key, value)| match value {
                MappingValue::Flag => key.clone(),
                MappingValue::Text(text) => {
                    let needs_quotes = QUOTED_KEYS.contains(&key.as_str())
                        || text.contains([',', '"', '<', '>', '=', ' ']);
                    if needs_quotes {
                        format!("{}={}", key, quote(text))
                    } else {
                        format!("{}={}", key, text)
                    }
                }
                MappingValue::List(items) => format!("{}=[{}]", key, items.join(", ")),
            })
            .collect();
        Self {
            kind,
            value: format!("<{}>", body.join(",")),
            entries,
        }
    }

    /// Parse the `<...>` value of a header line, keeping the text as written
    pub fn parse(kind: HeaderLineKind, value: &str, warnings: &mut Warnings) -> Result<Self> {
        let entries = parse_mapping(value, warnings)?;
        let line = Self {
            kind,
            value: value.to_string(),
            entries,
        };
        if kind.requires_id() && line.id().is_none() {
            return Err(BiometalError::InvalidHeader {
                line: 0,
                msg: format!("{} header line without ID: {}", kind.key(), value),
            });
        }
        Ok(line)
    }

    /// Line kind
    pub fn kind(&self) -> HeaderLineKind {
        self.kind
    }

    /// Serialized value including the angle brackets
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Parsed entries in order
    pub fn entries(&self) -> &[(String, MappingValue)] {
        &self.entries
    }

    /// Entry by key
    pub fn get(&self, key: &str) -> Option<&MappingValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Text entry by key
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MappingValue::as_text)
    }

    /// `ID` entry
    pub fn id(&self) -> Option<&str> {
        self.get_text("ID")
    }

    /// `length` of a contig line
    pub fn length(&self) -> Option<u64> {
        self.get_text("length").and_then(|l| l.parse().ok())
    }

    /// Field definition of an INFO/FORMAT line
    ///
    /// Missing or invalid Number becomes `.`, missing or invalid Type becomes
    /// `String`; each substitution is recorded as a warning.
    pub fn field_info(&self, warnings: &mut Warnings) -> FieldInfo {
        let id = self.id().unwrap_or_default().to_string();

        let number = match self.get_text("Number") {
            None => {
                warnings.push(Warning::FieldMissingNumber { key: id.clone() });
                Number::Unbounded
            }
            Some(n) => n.parse().unwrap_or_else(|_| {
                warnings.push(Warning::FieldInvalidNumber {
                    key: id.clone(),
                    number: n.to_string(),
                });
                Number::Unbounded
            }),
        };

        let field_type = match self
            .get_text("Type")
            .and_then(|t| FieldType::from_str_in(t, self.kind))
        {
            Some(t) => t,
            None => {
                warnings.push(Warning::FieldMissingType { key: id.clone() });
                FieldType::String
            }
        };

        let description = self.get_text("Description").map(str::to_string);
        if description.is_none() {
            warnings.push(Warning::FieldMissingDescription { key: id.clone() });
        }

        FieldInfo {
            id,
            number,
            field_type,
            description,
        }
    }
}

/// One `##` header line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLine {
    /// `##key=value`
    Plain {
        /// Key
        key: String,
        /// Value
        value: String,
    },
    /// `##KEY=<...>`
    Mapping(MappingLine),
}

impl HeaderLine {
    /// Plain `##key=value` line
    pub fn plain(key: impl Into<String>, value: impl Into<String>) -> Self {
        HeaderLine::Plain {
            key: key.into(),
            value: value.into(),
        }
    }

    /// INFO definition line
    pub fn info(id: &str, number: Number, field_type: FieldType, description: &str) -> Self {
        Self::field(HeaderLineKind::Info, id, number, field_type, description)
    }

    /// FORMAT definition line
    pub fn format(id: &str, number: Number, field_type: FieldType, description: &str) -> Self {
        Self::field(HeaderLineKind::Format, id, number, field_type, description)
    }

    fn field(
        kind: HeaderLineKind,
        id: &str,
        number: Number,
        field_type: FieldType,
        description: &str,
    ) -> Self {
        HeaderLine::Mapping(MappingLine::new(
            kind,
            vec![
                ("ID".to_string(), MappingValue::Text(id.to_string())),
                ("Number".to_string(), MappingValue::Text(number.to_string())),
                ("Type".to_string(), MappingValue::Text(field_type.to_string())),
                (
                    "Description".to_string(),
                    MappingValue::Text(description.to_string()),
                ),
            ],
        ))
    }

    /// FILTER definition line
    pub fn filter(id: &str, description: &str) -> Self {
        HeaderLine::Mapping(MappingLine::new(
            HeaderLineKind::Filter,
            vec![
                ("ID".to_string(), MappingValue::Text(id.to_string())),
                (
                    "Description".to_string(),
                    MappingValue::Text(description.to_string()),
                ),
            ],
        ))
    }

    /// contig line
    pub fn contig(id: &str, length: Option<u64>) -> Self {
        let mut entries = vec![("ID".to_string(), MappingValue::Text(id.to_string()))];
        if let Some(length) = length {
            entries.push(("length".to_string(), MappingValue::Text(length.to_string())));
        }
        HeaderLine::Mapping(MappingLine::new(HeaderLineKind::Contig, entries))
    }

    /// Key (text between `##` and `=`)
    pub fn key(&self) -> &str {
        match self {
            HeaderLine::Plain { key, .. } => key,
            HeaderLine::Mapping(m) => m.kind.key(),
        }
    }

    /// Serialized value
    pub fn value(&self) -> &str {
        match self {
            HeaderLine::Plain { value, .. } => value,
            HeaderLine::Mapping(m) => m.value(),
        }
    }

    /// Mapping details, if structured
    pub fn as_mapping(&self) -> Option<&MappingLine> {
        match self {
            HeaderLine::Mapping(m) => Some(m),
            HeaderLine::Plain { .. } => None,
        }
    }

    /// `##key=value` text without line break
    pub fn serialize(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for HeaderLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "##{}={}", self.key(), self.value())
    }
}

/// Sample names from the `#CHROM` line and which of them to parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplesInfos {
    names: Vec<String>,
    name_to_idx: HashMap<String, usize>,
    parsed: Option<HashSet<String>>,
}

impl SamplesInfos {
    /// All samples parsed
    pub fn new(names: Vec<String>) -> Self {
        Self::with_parsed(names, None)
    }

    /// Only `parsed` samples get their calls decoded (`None` = all)
    pub fn with_parsed(names: Vec<String>, parsed: Option<HashSet<String>>) -> Self {
        let name_to_idx = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self {
            names,
            name_to_idx,
            parsed,
        }
    }

    /// Names in column order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Column index (0-based among samples) of `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_idx.get(name).copied()
    }

    /// Whether calls of `name` are decoded
    pub fn is_parsed(&self, name: &str) -> bool {
        self.parsed.as_ref().map_or(true, |p| p.contains(name))
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Parsed VCF header
#[derive(Debug, Clone, Default)]
pub struct Header {
    lines: Vec<HeaderLine>,
    samples: SamplesInfos,
    info: HashMap<String, FieldInfo>,
    format: HashMap<String, FieldInfo>,
    filters: Vec<String>,
    contigs: Vec<String>,
}

impl Header {
    /// Build a header; definition problems are logged and dropped
    pub fn new(lines: Vec<HeaderLine>, samples: SamplesInfos) -> Self {
        Self::with_warnings(lines, samples, &mut Warnings::new())
    }

    /// Build a header, recording definition problems in `warnings`
    pub fn with_warnings(
        lines: Vec<HeaderLine>,
        samples: SamplesInfos,
        warnings: &mut Warnings,
    ) -> Self {
        let mut header = Self {
            samples,
            ..Self::default()
        };
        for line in lines {
            header.push_line(line, warnings);
        }
        header
    }

    fn push_line(&mut self, line: HeaderLine, warnings: &mut Warnings) {
        if let HeaderLine::Mapping(m) = &line {
            if let Some(id) = m.id() {
                let duplicate = match m.kind {
                    HeaderLineKind::Info if !self.info.contains_key(id) => {
                        self.info.insert(id.to_string(), m.field_info(warnings));
                        false
                    }
                    HeaderLineKind::Format if !self.format.contains_key(id) => {
                        self.format.insert(id.to_string(), m.field_info(warnings));
                        false
                    }
                    HeaderLineKind::Filter if !self.filters.iter().any(|f| f == id) => {
                        self.filters.push(id.to_string());
                        false
                    }
                    HeaderLineKind::Contig if !self.contigs.iter().any(|c| c == id) => {
                        self.contigs.push(id.to_string());
                        false
                    }
                    HeaderLineKind::Info
                    | HeaderLineKind::Format
                    | HeaderLineKind::Filter
                    | HeaderLineKind::Contig => true,
                    _ => false,
                };
                if duplicate {
                    warnings.push(Warning::DuplicateHeaderLineId {
                        key: m.kind.key().to_string(),
                        id: id.to_string(),
                    });
                }
            }
        }
        self.lines.push(line);
    }

    /// Append a line, returning any definition problems
    pub fn add_line(&mut self, line: HeaderLine) -> Vec<Warning> {
        let mut warnings = Warnings::new();
        self.push_line(line, &mut warnings);
        warnings.take()
    }

    /// Header lines in order
    pub fn lines(&self) -> &[HeaderLine] {
        &self.lines
    }

    /// Sample information
    pub fn samples(&self) -> &SamplesInfos {
        &self.samples
    }

    /// `##fileformat` value of the first line
    pub fn fileformat(&self) -> Option<&str> {
        match self.lines.first() {
            Some(HeaderLine::Plain { key, value }) if key == "fileformat" => Some(value),
            _ => None,
        }
    }

    /// Lines with the given key
    pub fn get_lines<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a HeaderLine> + 'a {
        self.lines.iter().filter(move |l| l.key() == key)
    }

    /// Whether a mapping line with `key` and `ID=id` exists
    pub fn has_header_line(&self, key: &str, id: &str) -> bool {
        self.get_lines(key)
            .filter_map(HeaderLine::as_mapping)
            .any(|m| m.id() == Some(id))
    }

    /// INFO definition from the header, else the reserved table
    pub fn info_field_info(&self, id: &str) -> Option<FieldInfo> {
        self.info
            .get(id)
            .cloned()
            .or_else(|| reserved_info(id).map(FieldInfo::from))
    }

    /// FORMAT definition from the header, else the reserved table
    pub fn format_field_info(&self, id: &str) -> Option<FieldInfo> {
        self.format
            .get(id)
            .cloned()
            .or_else(|| reserved_format(id).map(FieldInfo::from))
    }

    /// Declared FILTER IDs in header order
    pub fn filter_ids(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(String::as_str)
    }

    /// Declared contig IDs in header order
    pub fn contig_names(&self) -> impl Iterator<Item = &str> {
        self.contigs.iter().map(String::as_str)
    }

    /// The `#CHROM` column header line (without line break)
    pub fn column_header(&self) -> String {
        if self.samples.is_empty() {
            REQUIRE_NO_SAMPLE_HEADER.join("\t")
        } else {
            let mut cols: Vec<&str> = REQUIRE_SAMPLE_HEADER.to_vec();
            cols.extend(self.samples.names().iter().map(String::as_str));
            cols.join("\t")
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        writeln!(f, "{}", self.column_header())
    }
}
