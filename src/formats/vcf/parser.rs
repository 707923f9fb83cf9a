//! VCF header and record parsing
//!
//! [`HeaderParser`] turns `##` lines into [`HeaderLine`]s, [`parse_samples_line`]
//! reads the `#CHROM` line and [`check_header`] validates the result.
//! [`RecordParser`] then decodes data lines against that header:
//!
//! - the column count must be exactly 8 (no samples) or 9 + samples
//! - ALT alleles are classified with [`process_alt`]
//! - INFO and FORMAT values are typed by their declared Type and Number
//! - unknown FILTER values and count mismatches become warnings
//!
//! # Example
//!
//! ```
//! use biometal_vcf::formats::vcf::header::{Header, HeaderLine, SamplesInfos};
//! use biometal_vcf::formats::vcf::parser::{RecordChecks, RecordParser};
//!
//! # fn main() -> biometal_vcf::Result<()> {
//! let header = Header::new(
//!     vec![HeaderLine::plain("fileformat", "VCFv4.3")],
//!     SamplesInfos::default(),
//! );
//! let mut parser = RecordParser::new(header, RecordChecks::default());
//! let record = parser.parse_line("20\t14370\trs6054257\tG\tA\t29\tPASS\tDP=14;DB")?.unwrap();
//! assert_eq!(record.pos, 14370);
//! assert_eq!(record.ids, vec!["rs6054257"]);
//! # Ok(())
//! # }
//! ```

use crate::error::{BiometalError, Result};
use crate::formats::vcf::escape::{escape, unescape, Section};
use crate::formats::vcf::header::{
    FieldInfo, FieldType, Header, HeaderLine, HeaderLineKind, MappingLine, Number, SamplesInfos,
    REQUIRE_NO_SAMPLE_HEADER, REQUIRE_SAMPLE_HEADER, SUPPORTED_VCF_VERSIONS,
};
use crate::formats::vcf::record::{
    AltRecord, AltType, BreakEnd, Call, FieldValue, Orientation, Qual, Record, SampleCall, Value,
};
use crate::formats::vcf::splitter::split_mapping;
use crate::formats::vcf::warning::{Warning, Warnings};
use std::collections::{HashMap, HashSet};

/// Parser for `##key=value` header lines
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderParser;

impl HeaderParser {
    /// Create a parser
    pub fn new() -> Self {
        Self
    }

    /// Parse one header line (trailing whitespace is ignored)
    ///
    /// INFO, FORMAT, FILTER, contig, ALT, META, PEDIGREE and SAMPLE values
    /// must be `<...>` mappings; every other key is kept as plain text.
    pub fn parse_line(&self, line: &str, warnings: &mut Warnings) -> Result<HeaderLine> {
        let body = line
            .strip_prefix("##")
            .ok_or_else(|| BiometalError::InvalidHeader {
                line: 0,
                msg: format!("header line must start with \"##\": {}", line),
            })?
            .trim_end();
        let (key, value) = split_mapping(body, warnings).ok_or_else(|| {
            BiometalError::InvalidHeader {
                line: 0,
                msg: format!("header line must contain \"=\": {}", line),
            }
        })?;

        match HeaderLineKind::from_key(key) {
            Some(kind) => Ok(HeaderLine::Mapping(MappingLine::parse(kind, value, warnings)?)),
            None => Ok(HeaderLine::plain(key, value)),
        }
    }
}

/// Parse the `#CHROM` line into sample information
///
/// A line with spaces before the INFO/FORMAT column is split on whitespace
/// with a warning.
pub fn parse_samples_line(
    line: &str,
    parsed_samples: Option<HashSet<String>>,
    warnings: &mut Warnings,
) -> Result<SamplesInfos> {
    let invalid = |msg: String| BiometalError::InvalidHeader { line: 0, msg };

    let line = line.trim_end_matches(['\r', '\n']);
    if !line.starts_with("#CHROM") {
        return Err(invalid("missing line starting with \"#CHROM\"".to_string()));
    }
    let pos = line
        .find("FORMAT")
        .or_else(|| line.find("INFO"))
        .ok_or_else(|| invalid(format!("ill-formatted \"#CHROM\" line: {}", line)))?;

    let columns: Vec<&str> = if line[..pos].contains(' ') {
        warnings.push(Warning::SpaceInChromLine);
        line.split_whitespace().collect()
    } else {
        line.split('\t').collect()
    };

    if columns.len() <= REQUIRE_NO_SAMPLE_HEADER.len() {
        if columns != REQUIRE_NO_SAMPLE_HEADER {
            return Err(invalid(format!(
                "\"#CHROM\" line without samples must equal {}",
                REQUIRE_NO_SAMPLE_HEADER.join("\t")
            )));
        }
    } else if &columns[..REQUIRE_SAMPLE_HEADER.len()] != REQUIRE_SAMPLE_HEADER {
        return Err(invalid(format!(
            "\"#CHROM\" line must start with {}",
            REQUIRE_SAMPLE_HEADER.join("\t")
        )));
    }

    let names = columns
        .iter()
        .skip(REQUIRE_SAMPLE_HEADER.len())
        .map(|s| s.to_string())
        .collect();
    Ok(SamplesInfos::with_parsed(names, parsed_samples))
}

/// Validate header structure
///
/// The first line must be `##fileformat`; versions other than VCFv4.0 to
/// VCFv4.3 only produce a warning.
pub fn check_header(header: &Header, warnings: &mut Warnings) -> Result<()> {
    let first = header.lines().first().ok_or_else(|| BiometalError::InvalidHeader {
        line: 1,
        msg: "the VCF file did not contain any header lines".to_string(),
    })?;
    if first.key() != "fileformat" {
        return Err(BiometalError::InvalidHeader {
            line: 1,
            msg: "the VCF file did not start with ##fileformat".to_string(),
        });
    }
    if !SUPPORTED_VCF_VERSIONS.contains(&first.value()) {
        warnings.push(Warning::UnknownVcfVersion {
            version: first.value().to_string(),
        });
    }
    Ok(())
}

/// `n` choose `k`, 0 when `k > n`
pub fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
}

/// Classify one ALT allele against REF
///
/// # Errors
///
/// [`BiometalError::EmptyAllele`] for an empty ALT (or REF where it matters),
/// [`BiometalError::InvalidRecord`] for a malformed breakend.
pub fn process_alt(reference: &str, alt: &str) -> Result<AltRecord> {
    if alt.is_empty() {
        return Err(BiometalError::EmptyAllele { line: 0 });
    }
    if alt.contains(['[', ']']) {
        return parse_breakend(alt).map(AltRecord::BreakEnd);
    }
    if alt.len() > 1 {
        if let Some(sequence) = alt.strip_prefix('.') {
            return Ok(AltRecord::SingleBreakEnd {
                orientation: Orientation::Forward,
                sequence: sequence.to_string(),
            });
        }
        if let Some(sequence) = alt.strip_suffix('.') {
            return Ok(AltRecord::SingleBreakEnd {
                orientation: Orientation::Reverse,
                sequence: sequence.to_string(),
            });
        }
        if let Some(inner) = alt.strip_prefix('<').and_then(|a| a.strip_suffix('>')) {
            return Ok(AltRecord::Symbolic(inner.to_string()));
        }
    }
    process_sub(reference, alt)
}

fn process_sub(reference: &str, alt: &str) -> Result<AltRecord> {
    let (r, a) = (reference.as_bytes(), alt.as_bytes());
    let same_first = r.first() == a.first();

    let alt_type = if r.len() == a.len() {
        if r.len() == 1 {
            AltType::Snv
        } else {
            AltType::Mnv
        }
    } else if r.len() > a.len() {
        match a.len() {
            0 => return Err(BiometalError::EmptyAllele { line: 0 }),
            1 if same_first => AltType::Del,
            _ => AltType::Indel,
        }
    } else {
        match r.len() {
            0 => return Err(BiometalError::EmptyAllele { line: 0 }),
            1 if same_first => AltType::Ins,
            _ => AltType::Indel,
        }
    };

    Ok(AltRecord::Substitution {
        alt_type,
        value: alt.to_string(),
    })
}

fn parse_breakend(alt: &str) -> Result<BreakEnd> {
    let invalid = || BiometalError::InvalidRecord {
        line: 0,
        msg: format!("invalid breakend '{}'", alt),
    };

    let parts: Vec<&str> = alt.split(['[', ']']).collect();
    if parts.len() < 3 {
        return Err(invalid());
    }
    let (mate_chrom, mate_pos) = parts[1].rsplit_once(':').ok_or_else(invalid)?;
    let mate_pos: u64 = mate_pos.parse().map_err(|_| invalid())?;

    let (mate_chrom, within_main_assembly) =
        match mate_chrom.strip_prefix('<').and_then(|c| c.strip_suffix('>')) {
            Some(inner) => (inner, false),
            None => (mate_chrom, true),
        };

    let orientation = if alt.starts_with(['[', ']']) {
        Orientation::Forward
    } else {
        Orientation::Reverse
    };
    let mate_orientation = if alt.contains('[') {
        Orientation::Forward
    } else {
        Orientation::Reverse
    };
    let sequence = match orientation {
        Orientation::Forward => parts[2],
        Orientation::Reverse => parts[0],
    };

    Ok(BreakEnd {
        mate_chrom: Some(mate_chrom.to_string()),
        mate_pos: Some(mate_pos),
        orientation,
        mate_orientation,
        sequence: sequence.to_string(),
        within_main_assembly,
    })
}

/// Optional value-count checks against declared Number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordChecks {
    /// Check INFO list lengths
    pub info: bool,
    /// Check FORMAT list lengths (GT and FT excepted)
    pub format: bool,
}

impl RecordChecks {
    /// Enable both checks
    pub fn all() -> Self {
        Self {
            info: true,
            format: true,
        }
    }
}

fn expected_len(number: Number, actual: usize, num_alts: usize, ploidy: usize) -> usize {
    match number {
        Number::Unbounded => actual,
        Number::Alleles => num_alts,
        Number::Ref => num_alts + 1,
        Number::Genotypes => binomial(num_alts + ploidy, ploidy),
        Number::Fixed(n) => n,
    }
}

/// Decodes data lines against a header
#[derive(Debug)]
pub struct RecordParser {
    header: Header,
    checks: RecordChecks,
    expected_fields: usize,
    filter_ids: HashSet<String>,
    format_cache: HashMap<String, Vec<FieldInfo>>,
    reported_missing: HashSet<(Section, String)>,
    warnings: Warnings,
}

impl RecordParser {
    /// Create a parser for records described by `header`
    pub fn new(header: Header, checks: RecordChecks) -> Self {
        let expected_fields = if header.samples().is_empty() {
            8
        } else {
            9 + header.samples().len()
        };
        let filter_ids = header.filter_ids().map(str::to_string).collect();
        Self {
            header,
            checks,
            expected_fields,
            filter_ids,
            format_cache: HashMap::new(),
            reported_missing: HashSet::new(),
            warnings: Warnings::new(),
        }
    }

    /// Header used for decoding
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Number of tab-separated columns every data line must have
    pub fn expected_fields(&self) -> usize {
        self.expected_fields
    }

    /// Drain warnings raised so far
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        self.warnings.take()
    }

    /// Move pending warnings into `sink`
    pub fn drain_warnings_into(&mut self, sink: &mut Warnings) {
        sink.append(&mut self.warnings);
    }

    /// Decode one data line; `None` for an empty line
    pub fn parse_line(&mut self, line: &str) -> Result<Option<Record>> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Ok(None);
        }

        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() != self.expected_fields {
            return Err(BiometalError::ColumnCountMismatch {
                line: 0,
                expected: self.expected_fields,
                actual: columns.len(),
            });
        }

        let chrom = columns[0].to_string();
        let pos = columns[1]
            .parse::<u64>()
            .map_err(|_| BiometalError::InvalidRecord {
                line: 0,
                msg: format!("invalid POS '{}'", columns[1]),
            })?;
        let ids = split_list(columns[2], ';');
        let reference = columns[3].to_string();
        if reference.is_empty() {
            return Err(BiometalError::EmptyAllele { line: 0 });
        }

        let alts = if columns[4] == "." {
            Vec::new()
        } else {
            columns[4]
                .split(',')
                .map(|alt| process_alt(&reference, alt))
                .collect::<Result<Vec<_>>>()?
        };

        let qual = Qual::from_text(columns[5]);
        let filters = split_list(columns[6], ';');
        self.check_filters(&filters, None);

        let info = self.parse_info(columns[7], alts.len());

        let (format, calls) = if columns.len() > 8 {
            let format: Vec<String> = columns[8].split(':').map(str::to_string).collect();
            let calls = self.parse_calls(columns[8], &format, &columns[9..], alts.len());
            (format, calls)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(Some(Record {
            chrom,
            pos,
            ids,
            reference,
            alts,
            qual,
            filters,
            info,
            format,
            calls,
        }))
    }

    fn check_filters(&mut self, filters: &[String], sample: Option<&str>) {
        for filter in filters {
            if filter != "PASS" && !self.filter_ids.contains(filter) {
                self.warnings.push(Warning::UnknownFilter {
                    filter: filter.clone(),
                    sample: sample.map(str::to_string),
                });
            }
        }
    }

    fn field_info(&mut self, section: Section, key: &str) -> FieldInfo {
        let found = match section {
            Section::Info => self.header.info_field_info(key),
            Section::Format => self.header.format_field_info(key),
        };
        found.unwrap_or_else(|| {
            if self.reported_missing.insert((section, key.to_string())) {
                self.warnings.push(Warning::FieldInfoNotFound {
                    section: section_name(section),
                    key: key.to_string(),
                });
            }
            FieldInfo::fallback(key)
        })
    }

    fn parse_info(&mut self, column: &str, num_alts: usize) -> Vec<(String, FieldValue)> {
        if column == "." {
            return Vec::new();
        }

        let mut info = Vec::new();
        for entry in column.split(';') {
            let (key, raw) = match split_mapping(entry, &mut self.warnings) {
                Some((key, value)) => (key, Some(value)),
                None => (entry, None),
            };
            let field = self.field_info(Section::Info, key);
            let value = self.parse_field_value(&field, raw, Section::Info);

            if self.checks.info {
                if let FieldValue::List(items) = &value {
                    // Genotype counts in INFO assume a diploid call
                    let expected = match field.number {
                        Number::Genotypes => binomial(num_alts + 1, 2),
                        number => expected_len(number, items.len(), num_alts, 1),
                    };
                    self.check_length("INFO", key, items.len(), expected);
                }
            }
            info.push((key.to_string(), value));
        }
        info
    }

    fn parse_calls(
        &mut self,
        format_column: &str,
        format: &[String],
        columns: &[&str],
        num_alts: usize,
    ) -> Vec<SampleCall> {
        if !self.format_cache.contains_key(format_column) {
            let infos = format
                .iter()
                .map(|key| self.field_info(Section::Format, key))
                .collect();
            self.format_cache.insert(format_column.to_string(), infos);
        }
        let infos = self.format_cache.get(format_column).cloned().unwrap_or_default();
        let names: Vec<String> = self.header.samples().names().to_vec();

        let mut calls = Vec::with_capacity(columns.len());
        for (name, raw) in names.into_iter().zip(columns) {
            if !self.header.samples().is_parsed(&name) {
                calls.push(SampleCall::Unparsed {
                    sample: name,
                    data: raw.to_string(),
                });
                continue;
            }

            let mut values = raw.split(':');
            let data: Vec<(String, FieldValue)> = format
                .iter()
                .zip(&infos)
                .zip(values.by_ref())
                .map(|((key, field), value)| {
                    (
                        key.clone(),
                        self.parse_field_value(field, Some(value), Section::Format),
                    )
                })
                .collect();
            let surplus: Vec<String> = values.map(str::to_string).collect();
            if !surplus.is_empty() {
                self.warnings.push(Warning::SurplusSampleValues {
                    sample: name.clone(),
                    keys: format.len(),
                    values: format.len() + surplus.len(),
                });
            }
            let mut call = Call::new(name, data);
            call.surplus = surplus;

            if self.checks.format {
                self.check_call_lengths(&call, &infos, num_alts);
            }
            let filters: Vec<String> = match call.get("FT") {
                Some(FieldValue::List(items)) => items
                    .iter()
                    .flatten()
                    .map(|v| v.to_string())
                    .collect(),
                _ => Vec::new(),
            };
            self.check_filters(&filters, Some(&call.sample));
            calls.push(SampleCall::Parsed(call));
        }
        calls
    }

    fn check_call_lengths(&mut self, call: &Call, infos: &[FieldInfo], num_alts: usize) {
        let ploidy = call.ploidy().unwrap_or(0);
        for ((key, value), field) in call.data.iter().zip(infos) {
            if key == "GT" || key == "FT" {
                continue;
            }
            if let FieldValue::List(items) = value {
                let expected = expected_len(field.number, items.len(), num_alts, ploidy);
                self.check_length("FORMAT", key, items.len(), expected);
            }
        }
    }

    fn check_length(&mut self, section: &'static str, key: &str, actual: usize, expected: usize) {
        if actual != expected {
            self.warnings.push(Warning::IncorrectListLength {
                section,
                key: key.to_string(),
                actual,
                expected,
            });
        }
    }

    fn parse_field_value(
        &mut self,
        field: &FieldInfo,
        raw: Option<&str>,
        section: Section,
    ) -> FieldValue {
        let raw = match raw {
            None => return FieldValue::Flag,
            Some(raw) if field.field_type == FieldType::Flag => {
                return FieldValue::FlagWithValue(raw.to_string())
            }
            Some(raw) => raw,
        };
        if raw == "." {
            return FieldValue::Missing;
        }

        if section == Section::Format && field.id == "FT" {
            return FieldValue::List(
                raw.split(';')
                    .map(|f| (f != ".").then(|| text_value(f, section)))
                    .collect(),
            );
        }

        if field.number == Number::Fixed(1) {
            return match self.convert(field.field_type, raw, section) {
                Some(value) => FieldValue::Scalar(value),
                None => FieldValue::Missing,
            };
        }

        if raw.is_empty() {
            return FieldValue::List(Vec::new());
        }
        FieldValue::List(
            raw.split(',')
                .map(|item| self.convert(field.field_type, item, section))
                .collect(),
        )
    }

    fn convert(&mut self, field_type: FieldType, raw: &str, section: Section) -> Option<Value> {
        if raw == "." {
            return None;
        }
        let value = match field_type {
            FieldType::Integer => raw.parse::<i64>().ok().map(|value| Value::Integer {
                value,
                text: raw.to_string(),
            }),
            FieldType::Float => raw.parse::<f64>().ok().map(|value| Value::Float {
                value,
                text: raw.to_string(),
            }),
            FieldType::String | FieldType::Character | FieldType::Flag => {
                Some(text_value(raw, section))
            }
        };
        Some(value.unwrap_or_else(|| {
            self.warnings.push(Warning::CannotConvertValue {
                value: raw.to_string(),
                field_type: field_type.to_string(),
            });
            text_value(raw, section)
        }))
    }
}

/// Unescaped text, keeping the source spelling when escaping would not restore it
fn text_value(raw: &str, section: Section) -> Value {
    let value = unescape(raw);
    if escape(&value, section) == raw {
        Value::String(value.into_owned())
    } else {
        Value::Verbatim {
            value: value.into_owned(),
            text: raw.to_string(),
        }
    }
}

fn section_name(section: Section) -> &'static str {
    match section {
        Section::Info => "INFO",
        Section::Format => "FORMAT",
    }
}

fn split_list(column: &str, delim: char) -> Vec<String> {
    if column == "." {
        Vec::new()
    } else {
        column.split(delim).map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_LINES: &[&str] = &[
        "##fileformat=VCFv4.3",
        "##FILTER=<ID=q10,Description=\"Quality below 10\">",
        "##INFO=<ID=NS,Number=1,Type=Integer,Description=\"Number of Samples With Data\">",
        "##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele Frequency\">",
        "##INFO=<ID=ANN,Number=.,Type=String,Description=\"Annotation\">",
        "##INFO=<ID=GP,Number=G,Type=Float,Description=\"Genotype probabilities\">",
        "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">",
        "##FORMAT=<ID=HQ,Number=2,Type=Integer,Description=\"Haplotype Quality\">",
    ];

    fn header(samples: &[&str]) -> Header {
        let parser = HeaderParser::new();
        let mut warnings = Warnings::new();
        let lines = HEADER_LINES
            .iter()
            .map(|l| parser.parse_line(l, &mut warnings).unwrap())
            .collect();
        Header::with_warnings(
            lines,
            SamplesInfos::new(samples.iter().map(|s| s.to_string()).collect()),
            &mut warnings,
        )
    }

    fn alt_type(reference: &str, alt: &str) -> AltType {
        process_alt(reference, alt).unwrap().alt_type()
    }

    #[test]
    fn test_process_alt_substitutions() {
        assert_eq!(alt_type("C", "T"), AltType::Snv);
        assert_eq!(alt_type("C", "CT"), AltType::Ins);
        assert_eq!(alt_type("CT", "C"), AltType::Del);
        assert_eq!(alt_type("AAAC", "TG"), AltType::Indel);
        assert_eq!(alt_type("GC", "TG"), AltType::Mnv);
        assert_eq!(alt_type("C", "GT"), AltType::Indel);
        assert_eq!(alt_type("CT", "G"), AltType::Indel);
    }

    #[test]
    fn test_process_alt_breakends() {
        match process_alt("G", "G]17:198982]").unwrap() {
            AltRecord::BreakEnd(bnd) => {
                assert_eq!(bnd.mate_chrom.as_deref(), Some("17"));
                assert_eq!(bnd.mate_pos, Some(198982));
                assert_eq!(bnd.orientation, Orientation::Reverse);
                assert_eq!(bnd.mate_orientation, Orientation::Reverse);
                assert_eq!(bnd.sequence, "G");
            }
            other => panic!("unexpected {:?}", other),
        }

        for alt in ["G]17:198982]", "]13:123456]T", "C[2:321682[", "[17:198983[A", "A]<ctg1>:7]"] {
            assert_eq!(process_alt("N", alt).unwrap().to_string(), alt);
        }
        match process_alt("A", "A]<ctg1>:7]").unwrap() {
            AltRecord::BreakEnd(bnd) => assert!(!bnd.within_main_assembly),
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            process_alt("A", "A]17]"),
            Err(BiometalError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn test_process_alt_single_breakend_and_symbolic() {
        assert_eq!(
            process_alt("A", ".A").unwrap(),
            AltRecord::SingleBreakEnd {
                orientation: Orientation::Forward,
                sequence: "A".to_string()
            }
        );
        assert_eq!(
            process_alt("A", "A.").unwrap(),
            AltRecord::SingleBreakEnd {
                orientation: Orientation::Reverse,
                sequence: "A".to_string()
            }
        );
        assert_eq!(
            process_alt("A", "<DUP:TANDEM>").unwrap(),
            AltRecord::Symbolic("DUP:TANDEM".to_string())
        );
        assert!(matches!(
            process_alt("A", ""),
            Err(BiometalError::EmptyAllele { .. })
        ));
    }

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(3, 2), 3);
        assert_eq!(binomial(4, 2), 6);
        assert_eq!(binomial(5, 0), 1);
        assert_eq!(binomial(2, 3), 0);
        assert_eq!(binomial(10, 5), 252);
    }

    #[test]
    fn test_header_parser() {
        let parser = HeaderParser::new();
        let mut warnings = Warnings::new();
        let line = parser.parse_line("##source=myImputationProgramV3.1\n", &mut warnings).unwrap();
        assert_eq!(line, HeaderLine::plain("source", "myImputationProgramV3.1"));

        let line = parser
            .parse_line("##contig=<ID=20,length=62435964,assembly=B36>", &mut warnings)
            .unwrap();
        assert_eq!(line.as_mapping().unwrap().length(), Some(62435964));

        assert!(parser.parse_line("#fileformat=VCFv4.3", &mut warnings).is_err());
        assert!(parser.parse_line("##fileformat", &mut warnings).is_err());
        assert!(matches!(
            parser.parse_line("##INFO=ID=DP", &mut warnings),
            Err(BiometalError::InvalidHeaderMapping { .. })
        ));
    }

    #[test]
    fn test_samples_line() {
        let mut warnings = Warnings::new();
        let samples = parse_samples_line(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNA00001\tNA00002\n",
            None,
            &mut warnings,
        )
        .unwrap();
        assert_eq!(samples.names(), ["NA00001", "NA00002"]);
        assert!(warnings.is_empty());

        let samples = parse_samples_line(
            "#CHROM POS ID REF ALT QUAL FILTER INFO FORMAT S1",
            None,
            &mut warnings,
        )
        .unwrap();
        assert_eq!(samples.names(), ["S1"]);
        assert_eq!(warnings.take(), vec![Warning::SpaceInChromLine]);

        let samples = parse_samples_line(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO",
            None,
            &mut warnings,
        )
        .unwrap();
        assert!(samples.is_empty());

        assert!(parse_samples_line("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFMT\tS1", None, &mut warnings).is_err());
        assert!(parse_samples_line("#CHROM\tPOS\tID\tREF", None, &mut warnings).is_err());
        assert!(parse_samples_line("CHROM\tPOS\tINFO", None, &mut warnings).is_err());
    }

    #[test]
    fn test_check_header() {
        let mut warnings = Warnings::new();
        check_header(&header(&[]), &mut warnings).unwrap();
        assert!(warnings.is_empty());

        let odd = Header::new(vec![HeaderLine::plain("fileformat", "VCFv9")], SamplesInfos::default());
        check_header(&odd, &mut warnings).unwrap();
        assert_eq!(
            warnings.take(),
            vec![Warning::UnknownVcfVersion {
                version: "VCFv9".to_string()
            }]
        );

        let bad = Header::new(vec![HeaderLine::plain("source", "x")], SamplesInfos::default());
        assert!(check_header(&bad, &mut warnings).is_err());
        assert!(check_header(&Header::default(), &mut warnings).is_err());
    }

    #[test]
    fn test_parse_record_with_samples() {
        let mut parser = RecordParser::new(header(&["NA00001", "NA00002"]), RecordChecks::default());
        let record = parser
            .parse_line("20\t14370\trs6054257;rs1\tG\tA\t29\tPASS\tNS=3;AF=0.5;DB\tGT:HQ\t0|0:51,51\t./.:.,.\n")
            .unwrap()
            .unwrap();

        assert_eq!(record.chrom, "20");
        assert_eq!(record.ids, vec!["rs6054257", "rs1"]);
        assert_eq!(record.alts[0].alt_type(), AltType::Snv);
        assert_eq!(record.qual.value(), Some(29.0));
        assert_eq!(record.info_value("NS"), Some(&FieldValue::Scalar(Value::integer(3))));
        assert_eq!(
            record.info_value("AF"),
            Some(&FieldValue::List(vec![Some(Value::Float {
                value: 0.5,
                text: "0.5".to_string()
            })]))
        );
        assert_eq!(record.info_value("DB"), Some(&FieldValue::Flag));

        let call = record.call_for_sample("NA00002").and_then(SampleCall::as_call).unwrap();
        assert_eq!(call.get("HQ"), Some(&FieldValue::List(vec![None, None])));
        assert_eq!(call.is_called(), Some(false));
        assert!(parser.take_warnings().is_empty());
    }

    #[test]
    fn test_missing_columns_values() {
        let mut parser = RecordParser::new(header(&[]), RecordChecks::default());
        let record = parser.parse_line("1\t10\t.\tA\t.\t.\t.\t.").unwrap().unwrap();
        assert!(record.ids.is_empty());
        assert!(record.alts.is_empty());
        assert_eq!(record.qual.text(), None);
        assert!(record.filters.is_empty());
        assert!(record.info.is_empty());
        assert!(parser.parse_line("\n").unwrap().is_none());
    }

    #[test]
    fn test_column_count_mismatch() {
        let mut parser = RecordParser::new(header(&["S1"]), RecordChecks::default());
        for line in [
            "1\t10\t.\tA\tC\t.\t.\t.\tGT",
            "1\t10\t.\tA\tC\t.\t.\t.\tGT\t0/1\t1/1",
            "1\t10\t.\tA\tC\t.\t.\t.",
        ] {
            match parser.parse_line(line) {
                Err(BiometalError::ColumnCountMismatch {
                    expected, actual, ..
                }) => {
                    assert_eq!(expected, 10);
                    assert_ne!(actual, 10);
                }
                other => panic!("expected column count error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_pos_and_empty_ref() {
        let mut parser = RecordParser::new(header(&[]), RecordChecks::default());
        assert!(matches!(
            parser.parse_line("1\tx\t.\tA\tC\t.\t.\t."),
            Err(BiometalError::InvalidRecord { .. })
        ));
        assert!(matches!(
            parser.parse_line("1\t5\t.\t\tC\t.\t.\t."),
            Err(BiometalError::EmptyAllele { .. })
        ));
    }

    #[test]
    fn test_unknown_filters_warn() {
        let mut parser = RecordParser::new(header(&["S1"]), RecordChecks::default());
        parser
            .parse_line("1\t10\t.\tA\tC\t.\tq10;s50\t.\tGT:FT\t0/1:lowdp;PASS")
            .unwrap();
        assert_eq!(
            parser.take_warnings(),
            vec![
                Warning::UnknownFilter {
                    filter: "s50".to_string(),
                    sample: None
                },
                Warning::UnknownFilter {
                    filter: "lowdp".to_string(),
                    sample: Some("S1".to_string())
                },
            ]
        );
    }

    #[test]
    fn test_ft_is_list() {
        let mut parser = RecordParser::new(header(&["S1"]), RecordChecks::default());
        let record = parser
            .parse_line("1\t10\t.\tA\tC\t.\t.\t.\tGT:FT\t0/1:.")
            .unwrap()
            .unwrap();
        let call = record.calls[0].as_call().unwrap();
        assert_eq!(call.get("FT"), Some(&FieldValue::Missing));
        assert!(!call.is_filtered(None, None));
    }

    #[test]
    fn test_values_keep_source_text() {
        let mut parser = RecordParser::new(header(&["S1"]), RecordChecks::default());
        let record = parser
            .parse_line("1\t10\t.\tA\tC\t.\t.\tNS=007;DB=1;ANN=100%,a=b,\tGT:HQ:XS\t0/1:+5,10:a%3Bb")
            .unwrap()
            .unwrap();

        assert_eq!(
            record.info_value("NS"),
            Some(&FieldValue::Scalar(Value::Integer {
                value: 7,
                text: "007".to_string()
            }))
        );
        assert_eq!(
            record.info_value("DB"),
            Some(&FieldValue::FlagWithValue("1".to_string()))
        );
        assert_eq!(
            record.info_value("ANN"),
            Some(&FieldValue::List(vec![
                Some(Value::Verbatim {
                    value: "100%".to_string(),
                    text: "100%".to_string()
                }),
                Some(Value::Verbatim {
                    value: "a=b".to_string(),
                    text: "a=b".to_string()
                }),
                Some(Value::String(String::new())),
            ]))
        );

        let call = record.calls[0].as_call().unwrap();
        let hq = call.get("HQ").and_then(FieldValue::as_list).unwrap();
        assert_eq!(
            hq[0],
            Some(Value::Integer {
                value: 5,
                text: "+5".to_string()
            })
        );
        assert_eq!(
            call.get("XS"),
            Some(&FieldValue::List(vec![Some(Value::String("a;b".to_string()))]))
        );
    }

    #[test]
    fn test_empty_and_missing_lists() {
        let mut parser = RecordParser::new(header(&[]), RecordChecks::default());
        let record = parser
            .parse_line("1\t10\t.\tA\tC\t.\t.\tAF=;ANN=.")
            .unwrap()
            .unwrap();
        assert_eq!(record.info_value("AF"), Some(&FieldValue::List(Vec::new())));
        assert_eq!(record.info_value("ANN"), Some(&FieldValue::Missing));
    }

    #[test]
    fn test_surplus_sample_values_kept() {
        let mut parser = RecordParser::new(header(&["S1"]), RecordChecks::default());
        let record = parser
            .parse_line("1\t10\t.\tA\tC\t.\t.\t.\tGT\t0/1:99:x")
            .unwrap()
            .unwrap();
        let call = record.calls[0].as_call().unwrap();
        assert_eq!(call.data.len(), 1);
        assert_eq!(call.surplus, vec!["99", "x"]);
        assert_eq!(
            parser.take_warnings(),
            vec![Warning::SurplusSampleValues {
                sample: "S1".to_string(),
                keys: 1,
                values: 3
            }]
        );
    }

    #[test]
    fn test_escaped_string_values() {
        let mut parser = RecordParser::new(header(&[]), RecordChecks::default());
        let record = parser
            .parse_line("1\t10\t.\tA\tC\t.\t.\tANN=a%3Bb,c%2Cd")
            .unwrap()
            .unwrap();
        assert_eq!(
            record.info_value("ANN"),
            Some(&FieldValue::List(vec![
                Some(Value::String("a;b".to_string())),
                Some(Value::String("c,d".to_string())),
            ]))
        );
    }

    #[test]
    fn test_unknown_info_and_conversion_warnings() {
        let mut parser = RecordParser::new(header(&[]), RecordChecks::default());
        let record = parser
            .parse_line("1\t10\t.\tA\tC\t.\t.\tXX=1;XX2=2;NS=abc")
            .unwrap()
            .unwrap();
        assert_eq!(
            record.info_value("NS"),
            Some(&FieldValue::Scalar(Value::String("abc".to_string())))
        );
        let warnings = parser.take_warnings();
        assert_eq!(warnings.len(), 3);
        assert!(matches!(warnings[0], Warning::FieldInfoNotFound { .. }));
        assert!(matches!(warnings[2], Warning::CannotConvertValue { .. }));

        // Reported once per key
        parser.parse_line("1\t11\t.\tA\tC\t.\t.\tXX=1").unwrap();
        assert!(parser.take_warnings().is_empty());
    }

    #[test]
    fn test_info_length_check() {
        let mut parser = RecordParser::new(header(&[]), RecordChecks::all());
        parser.parse_line("1\t10\t.\tA\tC,G\t.\t.\tAF=0.1").unwrap();
        assert_eq!(
            parser.take_warnings(),
            vec![Warning::IncorrectListLength {
                section: "INFO",
                key: "AF".to_string(),
                actual: 1,
                expected: 2
            }]
        );

        parser.parse_line("1\t10\t.\tA\tC,G\t.\t.\tAF=0.1,0.2").unwrap();
        assert!(parser.take_warnings().is_empty());
    }

    #[test]
    fn test_info_genotype_count() {
        let mut parser = RecordParser::new(header(&[]), RecordChecks::all());
        // binomial(alts + 1, 2)
        parser.parse_line("1\t10\t.\tA\tC\t.\t.\tGP=0.5").unwrap();
        assert!(parser.take_warnings().is_empty());

        parser.parse_line("1\t10\t.\tA\tC,G\t.\t.\tGP=0.5,0.5").unwrap();
        assert_eq!(
            parser.take_warnings(),
            vec![Warning::IncorrectListLength {
                section: "INFO",
                key: "GP".to_string(),
                actual: 2,
                expected: 3
            }]
        );
    }

    #[test]
    fn test_format_length_check() {
        let mut parser = RecordParser::new(header(&["S1"]), RecordChecks::all());
        parser
            .parse_line("1\t10\t.\tA\tC\t.\t.\t.\tGT:HQ\t0/1:10,20,30")
            .unwrap();
        assert_eq!(
            parser.take_warnings(),
            vec![Warning::IncorrectListLength {
                section: "FORMAT",
                key: "HQ".to_string(),
                actual: 3,
                expected: 2
            }]
        );
    }

    #[test]
    fn test_unparsed_samples() {
        let names = vec!["S1".to_string(), "S2".to_string()];
        let parsed: HashSet<String> = ["S2".to_string()].into_iter().collect();
        let mut warnings = Warnings::new();
        let lines = vec![HeaderLine::plain("fileformat", "VCFv4.3")];
        let header = Header::with_warnings(
            lines,
            SamplesInfos::with_parsed(names, Some(parsed)),
            &mut warnings,
        );
        let mut parser = RecordParser::new(header, RecordChecks::default());
        let record = parser
            .parse_line("1\t10\t.\tA\tC\t.\t.\t.\tGT\t0/1\t1/1")
            .unwrap()
            .unwrap();
        assert_eq!(
            record.calls[0],
            SampleCall::Unparsed {
                sample: "S1".to_string(),
                data: "0/1".to_string()
            }
        );
        assert!(record.calls[1].as_call().is_some());
    }
}
