//! VCF record model
//!
//! [`Record`] holds one data line with typed INFO/FORMAT values, ALT alleles
//! classified into [`AltRecord`] variants and per-sample [`SampleCall`]s.
//! Samples the reader was told not to parse are kept as
//! [`SampleCall::Unparsed`] text and written back unchanged.
//!
//! Coordinates follow the file: `pos` is 1-based. The `affected_*` helpers
//! return 0-based half-open positions.

use std::fmt;

/// ALT allele classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AltType {
    /// Single nucleotide variant
    Snv,
    /// Multi-nucleotide variant
    Mnv,
    /// Deletion
    Del,
    /// Insertion
    Ins,
    /// Insertion-deletion
    Indel,
    /// Structural variant
    Sv,
    /// Breakend
    Bnd,
    /// Symbolic allele (`<DEL>`)
    Symbolic,
    /// Mixed types
    Mixed,
}

/// Breakend orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// `+`
    Forward,
    /// `-`
    Reverse,
}

/// Mate-pair breakend (`G]17:198982]`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakEnd {
    /// Mate chromosome (`None` for `.`)
    pub mate_chrom: Option<String>,
    /// Mate position
    pub mate_pos: Option<u64>,
    /// Orientation of this side
    pub orientation: Orientation,
    /// Orientation of the mate
    pub mate_orientation: Orientation,
    /// Bases next to the bracket group
    pub sequence: String,
    /// `false` when the mate chromosome is written as `<ctg>`
    pub within_main_assembly: bool,
}

/// One ALT allele
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltRecord {
    /// Sequence change (SNV, MNV, insertion, deletion, indel)
    Substitution {
        /// Classification relative to REF
        alt_type: AltType,
        /// ALT bases
        value: String,
    },
    /// Paired breakend
    BreakEnd(BreakEnd),
    /// Single breakend (`.A` or `A.`)
    SingleBreakEnd {
        /// `Forward` for a leading `.`
        orientation: Orientation,
        /// Bases without the dot
        sequence: String,
    },
    /// `<ID>` allele
    Symbolic(String),
}

impl AltRecord {
    /// Classification of this allele
    pub fn alt_type(&self) -> AltType {
        match self {
            AltRecord::Substitution { alt_type, .. } => *alt_type,
            AltRecord::BreakEnd(_) | AltRecord::SingleBreakEnd { .. } => AltType::Bnd,
            AltRecord::Symbolic(_) => AltType::Symbolic,
        }
    }

    /// Bases of a substitution
    pub fn value(&self) -> Option<&str> {
        match self {
            AltRecord::Substitution { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Text as written in the ALT column
    pub fn serialize(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AltRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AltRecord::Substitution { value, .. } => f.write_str(value),
            AltRecord::Symbolic(id) => write!(f, "<{}>", id),
            AltRecord::SingleBreakEnd {
                orientation: Orientation::Forward,
                sequence,
            } => write!(f, ".{}", sequence),
            AltRecord::SingleBreakEnd {
                orientation: Orientation::Reverse,
                sequence,
            } => write!(f, "{}.", sequence),
            AltRecord::BreakEnd(bnd) => {
                let remote = match (&bnd.mate_chrom, bnd.mate_pos) {
                    (Some(chrom), Some(pos)) => {
                        let chrom = if bnd.within_main_assembly {
                            chrom.clone()
                        } else {
                            format!("<{}>", chrom)
                        };
                        let bracket = match bnd.mate_orientation {
                            Orientation::Forward => '[',
                            Orientation::Reverse => ']',
                        };
                        format!("{b}{}:{}{b}", chrom, pos, b = bracket)
                    }
                    _ => ".".to_string(),
                };
                match bnd.orientation {
                    Orientation::Forward => write!(f, "{}{}", remote, bnd.sequence),
                    Orientation::Reverse => write!(f, "{}{}", bnd.sequence, remote),
                }
            }
        }
    }
}

/// Atomic INFO/FORMAT value
///
/// Numbers keep the text they were read from so that `007` or `1.50` are
/// written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer, with the text it was read from
    Integer {
        /// Parsed value
        value: i64,
        /// Source text, used when writing
        text: String,
    },
    /// Float, with the text it was read from
    Float {
        /// Parsed value
        value: f64,
        /// Source text, used when writing
        text: String,
    },
    /// String, Character or unconvertible text (unescaped)
    String(String),
    /// Text whose source spelling differs from its escaped form
    ///
    /// Produced for input such as a bare `%` or an unescaped `=`, which
    /// escaping `value` would not reproduce.
    Verbatim {
        /// Unescaped text
        value: String,
        /// Source text, used when writing
        text: String,
    },
}

impl Value {
    /// Integer formatted with `{}`
    pub fn integer(value: i64) -> Self {
        Value::Integer {
            value,
            text: value.to_string(),
        }
    }

    /// Float value formatted with `{}`
    pub fn float(value: f64) -> Self {
        Value::Float {
            value,
            text: value.to_string(),
        }
    }

    /// Integer content
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Numeric content
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer { value, .. } => Some(*value as f64),
            Value::Float { value, .. } => Some(*value),
            Value::String(_) | Value::Verbatim { .. } => None,
        }
    }

    /// String content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Verbatim { value: s, .. } => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer { text, .. } | Value::Float { text, .. } => f.write_str(text),
            Value::String(s) | Value::Verbatim { value: s, .. } => f.write_str(s),
        }
    }
}

/// Value of one INFO entry or FORMAT key
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Present flag
    Flag,
    /// Flag written with a value (`DB=1`); the value text is kept as read
    FlagWithValue(String),
    /// `.` in place of the whole value
    Missing,
    /// Single-valued field
    Scalar(Value),
    /// Multi-valued field; `.` items are `None`, an empty value has no items
    List(Vec<Option<Value>>),
}

impl FieldValue {
    /// Scalar content
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// List content
    pub fn as_list(&self) -> Option<&[Option<Value>]> {
        match self {
            FieldValue::List(v) => Some(v),
            _ => None,
        }
    }
}

/// QUAL column, kept as text and converted on access
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Qual(Option<String>);

impl Qual {
    /// `.`
    pub fn missing() -> Self {
        Qual(None)
    }

    /// From column text (`.` becomes missing)
    pub fn from_text(text: &str) -> Self {
        if text == "." {
            Qual(None)
        } else {
            Qual(Some(text.to_string()))
        }
    }

    /// Numeric value, `None` when missing or not a number
    pub fn value(&self) -> Option<f64> {
        self.0.as_deref().and_then(|t| t.parse().ok())
    }

    /// Source text, `None` when missing
    pub fn text(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl From<f64> for Qual {
    fn from(value: f64) -> Self {
        Qual(Some(value.to_string()))
    }
}

impl fmt::Display for Qual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_deref().unwrap_or("."))
    }
}

/// Genotype class of a called sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenotypeType {
    /// All alleles REF
    HomRef = 0,
    /// Mixed alleles
    Het = 1,
    /// One non-REF allele on every haplotype
    HomAlt = 2,
}

/// Decoded FORMAT values of one sample
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Sample name
    pub sample: String,
    /// FORMAT key to value, in FORMAT order
    pub data: Vec<(String, FieldValue)>,
    /// Raw values past the last FORMAT key
    pub surplus: Vec<String>,
}

impl Call {
    /// Create a call
    pub fn new(sample: impl Into<String>, data: Vec<(String, FieldValue)>) -> Self {
        Self {
            sample: sample.into(),
            data,
            surplus: Vec::new(),
        }
    }

    /// Value for a FORMAT key
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.data.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Set a value, appending the key if it is new
    pub fn set(&mut self, key: &str, value: FieldValue) {
        match self.data.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.data.push((key.to_string(), value)),
        }
    }

    fn gt(&self) -> Option<&str> {
        self.get("GT").and_then(FieldValue::as_scalar).and_then(Value::as_str)
    }

    /// Allele indices from `GT`; `.` entries are `None`
    ///
    /// `None` when there is no genotype.
    pub fn gt_alleles(&self) -> Option<Vec<Option<usize>>> {
        self.gt()
            .map(|gt| gt.split(['/', '|']).map(|a| a.parse().ok()).collect())
    }

    /// Number of alleles in the genotype
    pub fn ploidy(&self) -> Option<usize> {
        self.gt_alleles().map(|a| a.len())
    }

    /// Whether every allele is called (`None` without genotype)
    pub fn is_called(&self) -> Option<bool> {
        self.gt_alleles().map(|a| a.iter().all(Option::is_some))
    }

    /// Whether the genotype uses `|`
    pub fn is_phased(&self) -> bool {
        self.gt().map_or(false, |gt| gt.contains('|'))
    }

    /// Genotype class, `None` for no-calls
    pub fn gt_type(&self) -> Option<GenotypeType> {
        let alleles: Vec<usize> = self.gt_alleles()?.into_iter().collect::<Option<_>>()?;
        let first = *alleles.first()?;
        if alleles.iter().all(|&a| a == 0) {
            Some(GenotypeType::HomRef)
        } else if alleles.iter().all(|&a| a == first) {
            Some(GenotypeType::HomAlt)
        } else {
            Some(GenotypeType::Het)
        }
    }

    /// Heterozygous call
    pub fn is_het(&self) -> bool {
        self.gt_type() == Some(GenotypeType::Het)
    }

    /// Called with at least one non-REF allele
    pub fn is_variant(&self) -> bool {
        matches!(
            self.gt_type(),
            Some(GenotypeType::Het) | Some(GenotypeType::HomAlt)
        )
    }

    /// Whether FORMAT/FT marks this call as filtered
    ///
    /// Filters in `ignore` (default `["PASS"]`) never count; when `require`
    /// is given only those filters count.
    pub fn is_filtered(&self, require: Option<&[&str]>, ignore: Option<&[&str]>) -> bool {
        let ignore = ignore.unwrap_or(&["PASS"]);
        let filters = match self.get("FT") {
            Some(FieldValue::List(items)) => items,
            _ => return false,
        };
        filters
            .iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter(|ft| !ignore.contains(ft))
            .any(|ft| require.map_or(true, |r| r.contains(&ft)))
    }
}

/// Per-sample slot of a record
#[derive(Debug, Clone, PartialEq)]
pub enum SampleCall {
    /// Decoded call
    Parsed(Call),
    /// Column text kept verbatim
    Unparsed {
        /// Sample name
        sample: String,
        /// Raw column
        data: String,
    },
}

impl SampleCall {
    /// Sample name
    pub fn sample(&self) -> &str {
        match self {
            SampleCall::Parsed(call) => &call.sample,
            SampleCall::Unparsed { sample, .. } => sample,
        }
    }

    /// Decoded call, if parsed
    pub fn as_call(&self) -> Option<&Call> {
        match self {
            SampleCall::Parsed(call) => Some(call),
            SampleCall::Unparsed { .. } => None,
        }
    }
}

/// One VCF data line
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// CHROM
    pub chrom: String,
    /// 1-based POS
    pub pos: u64,
    /// ID values (empty for `.`)
    pub ids: Vec<String>,
    /// REF
    pub reference: String,
    /// ALT alleles (empty for `.`)
    pub alts: Vec<AltRecord>,
    /// QUAL
    pub qual: Qual,
    /// FILTER values (empty for `.`)
    pub filters: Vec<String>,
    /// INFO entries in column order
    pub info: Vec<(String, FieldValue)>,
    /// FORMAT keys
    pub format: Vec<String>,
    /// Sample columns in header order
    pub calls: Vec<SampleCall>,
}

impl Record {
    /// Record with the given site and every other column empty
    pub fn new(chrom: impl Into<String>, pos: u64, reference: impl Into<String>) -> Self {
        Self {
            chrom: chrom.into(),
            pos,
            ids: Vec::new(),
            reference: reference.into(),
            alts: Vec::new(),
            qual: Qual::missing(),
            filters: Vec::new(),
            info: Vec::new(),
            format: Vec::new(),
            calls: Vec::new(),
        }
    }

    /// 0-based start
    pub fn begin(&self) -> u64 {
        self.pos.saturating_sub(1)
    }

    fn insertions_only(&self) -> bool {
        !self.alts.is_empty() && self.alts.iter().all(|a| a.alt_type() == AltType::Ins)
    }

    /// 0-based start of the affected reference interval
    ///
    /// For pure insertions this is the position right of the first base,
    /// giving an empty interval together with [`Record::affected_end`].
    pub fn affected_start(&self) -> u64 {
        if self.insertions_only() {
            self.pos
        } else {
            self.begin()
        }
    }

    /// 0-based end (exclusive) of the affected reference interval
    pub fn affected_end(&self) -> u64 {
        if self.insertions_only() {
            self.pos
        } else {
            self.begin() + self.reference.len() as u64
        }
    }

    /// Whether REF is one base and every ALT is an SNV
    pub fn is_snv(&self) -> bool {
        self.reference.len() == 1 && self.alts.iter().all(|a| a.alt_type() == AltType::Snv)
    }

    /// INFO value by key
    pub fn info_value(&self, key: &str) -> Option<&FieldValue> {
        self.info.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Add a FILTER label, dropping `PASS`
    pub fn add_filter(&mut self, label: &str) {
        if self.filters.iter().any(|f| f == label) {
            return;
        }
        self.filters.retain(|f| f != "PASS");
        self.filters.push(label.to_string());
    }

    /// Append a FORMAT key, setting `value` on parsed calls that lack it
    pub fn add_format(&mut self, key: &str, value: Option<FieldValue>) {
        if self.format.iter().any(|k| k == key) {
            return;
        }
        self.format.push(key.to_string());
        let Some(value) = value else { return };
        for call in &mut self.calls {
            match call {
                SampleCall::Parsed(call) => {
                    if call.get(key).is_none() {
                        call.set(key, value.clone());
                    }
                }
                SampleCall::Unparsed { sample, .. } => {
                    tracing::warn!(sample = %sample, key, "cannot modify unparsed call");
                }
            }
        }
    }

    /// Call for a sample by name
    pub fn call_for_sample(&self, name: &str) -> Option<&SampleCall> {
        self.calls.iter().find(|c| c.sample() == name)
    }

    /// Bases named by a call's genotype (`None` for `.` or non-sequence ALTs)
    pub fn gt_bases(&self, call: &Call) -> Vec<Option<String>> {
        call.gt_alleles()
            .unwrap_or_default()
            .into_iter()
            .map(|allele| match allele? {
                0 => Some(self.reference.clone()),
                i => self.alts.get(i - 1)?.value().map(str::to_string),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(alt_type: AltType, value: &str) -> AltRecord {
        AltRecord::Substitution {
            alt_type,
            value: value.to_string(),
        }
    }

    fn call_with_gt(gt: &str) -> Call {
        Call::new(
            "S1",
            vec![("GT".to_string(), FieldValue::Scalar(Value::String(gt.to_string())))],
        )
    }

    #[test]
    fn test_breakend_serialization() {
        let bnd = AltRecord::BreakEnd(BreakEnd {
            mate_chrom: Some("17".to_string()),
            mate_pos: Some(198982),
            orientation: Orientation::Reverse,
            mate_orientation: Orientation::Reverse,
            sequence: "G".to_string(),
            within_main_assembly: true,
        });
        assert_eq!(bnd.to_string(), "G]17:198982]");
        assert_eq!(bnd.alt_type(), AltType::Bnd);

        let bnd = AltRecord::BreakEnd(BreakEnd {
            mate_chrom: Some("ctg1".to_string()),
            mate_pos: Some(5),
            orientation: Orientation::Forward,
            mate_orientation: Orientation::Forward,
            sequence: "T".to_string(),
            within_main_assembly: false,
        });
        assert_eq!(bnd.to_string(), "[<ctg1>:5[T");
    }

    #[test]
    fn test_other_alt_serialization() {
        assert_eq!(AltRecord::Symbolic("DEL".to_string()).to_string(), "<DEL>");
        assert_eq!(
            AltRecord::SingleBreakEnd {
                orientation: Orientation::Forward,
                sequence: "A".to_string()
            }
            .to_string(),
            ".A"
        );
        assert_eq!(
            AltRecord::SingleBreakEnd {
                orientation: Orientation::Reverse,
                sequence: "A".to_string()
            }
            .serialize(),
            "A."
        );
    }

    #[test]
    fn test_affected_interval() {
        let mut record = Record::new("1", 100, "AC");
        record.alts = vec![sub(AltType::Del, "A")];
        assert_eq!((record.affected_start(), record.affected_end()), (99, 101));

        let mut record = Record::new("1", 100, "A");
        record.alts = vec![sub(AltType::Ins, "AT"), sub(AltType::Ins, "ATT")];
        assert_eq!((record.affected_start(), record.affected_end()), (100, 100));

        record.alts.push(sub(AltType::Snv, "C"));
        assert_eq!((record.affected_start(), record.affected_end()), (99, 100));
    }

    #[test]
    fn test_is_snv() {
        let mut record = Record::new("1", 1, "A");
        record.alts = vec![sub(AltType::Snv, "C"), sub(AltType::Snv, "G")];
        assert!(record.is_snv());
        record.alts.push(sub(AltType::Ins, "AT"));
        assert!(!record.is_snv());
    }

    #[test]
    fn test_add_filter_drops_pass() {
        let mut record = Record::new("1", 1, "A");
        record.filters = vec!["PASS".to_string()];
        record.add_filter("q10");
        record.add_filter("q10");
        assert_eq!(record.filters, vec!["q10"]);
    }

    #[test]
    fn test_add_format() {
        let mut record = Record::new("1", 1, "A");
        record.format = vec!["GT".to_string()];
        record.calls = vec![
            SampleCall::Parsed(call_with_gt("0/1")),
            SampleCall::Unparsed {
                sample: "S2".to_string(),
                data: "1/1".to_string(),
            },
        ];
        record.add_format("DP", Some(FieldValue::Scalar(Value::integer(0))));
        assert_eq!(record.format, vec!["GT", "DP"]);
        let call = record.call_for_sample("S1").and_then(SampleCall::as_call).unwrap();
        assert_eq!(call.get("DP"), Some(&FieldValue::Scalar(Value::integer(0))));
        assert!(record.call_for_sample("S2").unwrap().as_call().is_none());
    }

    #[test]
    fn test_call_genotype() {
        let het = call_with_gt("0|1");
        assert_eq!(het.gt_alleles(), Some(vec![Some(0), Some(1)]));
        assert_eq!(het.ploidy(), Some(2));
        assert!(het.is_phased());
        assert!(het.is_het());
        assert!(het.is_variant());

        assert_eq!(call_with_gt("0/0").gt_type(), Some(GenotypeType::HomRef));
        assert_eq!(call_with_gt("2/2").gt_type(), Some(GenotypeType::HomAlt));
        assert_eq!(call_with_gt("1").gt_type(), Some(GenotypeType::HomAlt));

        let partial = call_with_gt("./1");
        assert_eq!(partial.gt_alleles(), Some(vec![None, Some(1)]));
        assert_eq!(partial.is_called(), Some(false));
        assert_eq!(partial.gt_type(), None);

        let none = Call::new("S", vec![("GT".to_string(), FieldValue::Missing)]);
        assert_eq!(none.gt_alleles(), None);
        assert_eq!(none.is_called(), None);
        assert!(!none.is_phased());
    }

    #[test]
    fn test_call_is_filtered() {
        let mut call = call_with_gt("0/1");
        assert!(!call.is_filtered(None, None));

        call.set(
            "FT",
            FieldValue::List(vec![Some(Value::String("PASS".to_string()))]),
        );
        assert!(!call.is_filtered(None, None));

        call.set(
            "FT",
            FieldValue::List(vec![
                Some(Value::String("q10".to_string())),
                Some(Value::String("s50".to_string())),
            ]),
        );
        assert!(call.is_filtered(None, None));
        assert!(call.is_filtered(Some(&["s50"]), None));
        assert!(!call.is_filtered(Some(&["lowdp"]), None));
        assert!(!call.is_filtered(None, Some(&["q10", "s50"])));
    }

    #[test]
    fn test_gt_bases() {
        let mut record = Record::new("1", 1, "A");
        record.alts = vec![sub(AltType::Snv, "C"), AltRecord::Symbolic("DEL".to_string())];
        let bases = record.gt_bases(&call_with_gt("0/1"));
        assert_eq!(bases, vec![Some("A".to_string()), Some("C".to_string())]);
        let bases = record.gt_bases(&call_with_gt("./2"));
        assert_eq!(bases, vec![None, None]);
    }

    #[test]
    fn test_qual() {
        assert_eq!(Qual::from_text(".").value(), None);
        assert_eq!(Qual::from_text(".").to_string(), ".");
        let q = Qual::from_text("29.50");
        assert_eq!(q.value(), Some(29.5));
        assert_eq!(q.to_string(), "29.50");
        assert_eq!(Qual::from(10.0).text(), Some("10"));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::integer(-3).to_string(), "-3");
        let padded = Value::Integer {
            value: 7,
            text: "007".to_string(),
        };
        assert_eq!(padded.to_string(), "007");
        assert_eq!(padded.as_i64(), Some(7));
        let verbatim = Value::Verbatim {
            value: "100%".to_string(),
            text: "100%".to_string(),
        };
        assert_eq!(verbatim.as_str(), Some("100%"));
        assert_eq!(
            Value::Float {
                value: 0.5,
                text: "0.500".to_string()
            }
            .to_string(),
            "0.500"
        );
        assert_eq!(Value::float(0.25).to_string(), "0.25");
        assert_eq!(Value::integer(2).as_f64(), Some(2.0));
    }
}
