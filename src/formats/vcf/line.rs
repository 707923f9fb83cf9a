//! Character-driven VCF line decoder
//!
//! [`parse_line`] runs one line of VCF text through an explicit finite-state
//! machine: every character is classified, and the pair `(state, class)` is
//! looked up in a transition table giving the next state and an action on the
//! accumulator. The result is the lightweight intermediate form [`VcfLine`]:
//!
//! - `#...` raw comment lines (including the `#CHROM` column header)
//! - `##key=value` and `##key=<k=v,...>` meta lines
//! - tab-delimited data lines with ID/ALT/FILTER lists, INFO entries and
//!   FORMAT-keyed samples
//!
//! Index building and raw region fetches use this form because it needs no
//! header. [`Display`](std::fmt::Display) reconstructs the line.
//!
//! # Example
//!
//! ```
//! use biometal_vcf::formats::vcf::line::{parse_line, VcfLine};
//!
//! # fn main() -> biometal_vcf::Result<()> {
//! let line = parse_line("20\t14370\trs6054257\tG\tA\t29\tPASS\tDP=14;DB\tGT\t0|0")?;
//! match &line {
//!     VcfLine::Data(data) => {
//!         assert_eq!(data.pos, 14370);
//!         assert_eq!(data.alts, vec!["A"]);
//!     }
//!     _ => unreachable!(),
//! }
//! assert_eq!(line.to_string(), "20\t14370\trs6054257\tG\tA\t29\tPASS\tDP=14;DB\tGT\t0|0");
//! # Ok(())
//! # }
//! ```

use crate::error::{BiometalError, Result};
use std::fmt;

/// One decoded VCF line
#[derive(Debug, Clone, PartialEq)]
pub enum VcfLine {
    /// `#` line, text after the leading `#`
    Comment(String),
    /// `##key=value` line
    Meta {
        /// Text between `##` and the first `=`
        key: String,
        /// Flat text or `<...>` mapping
        value: MetaValue,
    },
    /// Tab-delimited record
    Data(DataLine),
}

/// Value of a meta line
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    /// `##fileformat=VCFv4.3`
    Text(String),
    /// `##INFO=<ID=DP,...>`; bare flags have no value, quotes are kept
    Mapping(Vec<(String, Option<String>)>),
}

/// Data line fields, split but not typed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataLine {
    /// CHROM
    pub chrom: String,
    /// 1-based POS
    pub pos: u64,
    /// `;`-split ID column (`.` kept literally)
    pub ids: Vec<String>,
    /// REF
    pub reference: String,
    /// `,`-split ALT column
    pub alts: Vec<String>,
    /// QUAL text
    pub qual: String,
    /// `;`-split FILTER column
    pub filters: Vec<String>,
    /// INFO entries in order; flags have no value list
    pub info: Vec<(String, Option<Vec<String>>)>,
    /// `:`-split FORMAT column
    pub format: Vec<String>,
    /// Per-sample `FORMAT key -> value` pairs in column order
    pub samples: Vec<Vec<(String, String)>>,
    /// Per-sample values past the last FORMAT key
    pub surplus: Vec<Vec<String>>,
}

impl VcfLine {
    /// Whether this is a `#` or `##` line
    pub fn is_comment(&self) -> bool {
        !matches!(self, VcfLine::Data(_))
    }

    /// Data fields, if this is a data line
    pub fn as_data(&self) -> Option<&DataLine> {
        match self {
            VcfLine::Data(data) => Some(data),
            _ => None,
        }
    }
}

impl DataLine {
    /// Parsed QUAL, `None` when missing or not numeric
    pub fn qual_value(&self) -> Option<f64> {
        self.qual.parse().ok()
    }

    /// Look up an INFO entry
    pub fn info_value(&self, key: &str) -> Option<&Option<Vec<String>>> {
        self.info.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Alleles named by each sample's `GT`
    ///
    /// Indices are resolved against REF followed by ALTs; `.` stays `.`.
    /// Samples without `GT` yield an empty list.
    pub fn genotypes(&self) -> Result<Vec<Vec<String>>> {
        let alleles: Vec<&str> = std::iter::once(self.reference.as_str())
            .chain(self.alts.iter().map(String::as_str))
            .collect();

        self.samples
            .iter()
            .map(|sample| {
                let gt = match sample.iter().find(|(k, _)| k == "GT") {
                    Some((_, gt)) => gt,
                    None => return Ok(Vec::new()),
                };
                gt.split(['/', '|'])
                    .map(|allele| {
                        if allele == "." {
                            return Ok(".".to_string());
                        }
                        allele
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| alleles.get(i))
                            .map(|a| a.to_string())
                            .ok_or_else(|| BiometalError::InvalidRecord {
                                line: 0,
                                msg: format!("genotype allele '{}' out of range", allele),
                            })
                    })
                    .collect()
            })
            .collect()
    }
}

/// Decode one line (a trailing `\n` or `\r\n` is ignored)
pub fn parse_line(text: &str) -> Result<VcfLine> {
    let text = text
        .strip_suffix('\n')
        .map(|t| t.strip_suffix('\r').unwrap_or(t))
        .unwrap_or(text);

    let mut acc = Accumulator::default();
    let mut state = State::LineStart;

    for c in text.chars() {
        state = step(&mut acc, state, Class::of(c), Some(c))?;
        if state == State::Done {
            break;
        }
    }
    if state != State::Done {
        state = step(&mut acc, state, Class::End, None)?;
    }
    debug_assert_eq!(state, State::Done);

    Ok(acc.finish())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    LineStart,
    Hash,
    Comment,
    MetaKey,
    MetaValueStart,
    MetaValue,
    StructKey,
    StructValue,
    StructQuoted,
    StructEscaped,
    StructEnd,
    Chrom,
    Pos,
    Id,
    Ref,
    Alt,
    Qual,
    Filter,
    InfoKey,
    InfoValue,
    Format,
    Sample,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Hash,
    Tab,
    Semicolon,
    Comma,
    Colon,
    Equals,
    Lt,
    Gt,
    Quote,
    Backslash,
    Digit,
    Other,
    End,
}

impl Class {
    fn of(c: char) -> Self {
        match c {
            '#' => Class::Hash,
            '\t' => Class::Tab,
            ';' => Class::Semicolon,
            ',' => Class::Comma,
            ':' => Class::Colon,
            '=' => Class::Equals,
            '<' => Class::Lt,
            '>' => Class::Gt,
            '"' => Class::Quote,
            '\\' => Class::Backslash,
            '0'..='9' => Class::Digit,
            _ => Class::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Skip,
    Append,
    EndComment,
    MetaKey,
    MetaText,
    MetaMapping,
    StructKey,
    StructFlag,
    StructValue,
    Chrom,
    Pos,
    Id,
    Ref,
    Alt,
    Qual,
    Filter,
    InfoFlag,
    InfoKey,
    InfoValue,
    Format,
    Sample,
}

/// Transition table; `None` rejects the character
fn transition(state: State, class: Class) -> Option<(State, Action)> {
    use Action as A;
    use Class as C;
    use State as S;

    let next = match (state, class) {
        (S::LineStart, C::Hash) => (S::Hash, A::Skip),
        (S::LineStart, C::Tab | C::End) => return None,
        (S::LineStart, _) => (S::Chrom, A::Append),

        (S::Hash, C::Hash) => (S::MetaKey, A::Skip),
        (S::Hash, C::End) => (S::Done, A::EndComment),
        (S::Hash, _) => (S::Comment, A::Append),

        (S::Comment, C::End) => (S::Done, A::EndComment),
        (S::Comment, _) => (S::Comment, A::Append),

        (S::MetaKey, C::Equals) => (S::MetaValueStart, A::MetaKey),
        (S::MetaKey, C::End) => return None,
        (S::MetaKey, _) => (S::MetaKey, A::Append),

        (S::MetaValueStart, C::Lt) => (S::StructKey, A::Skip),
        (S::MetaValueStart | S::MetaValue, C::End) => (S::Done, A::MetaText),
        (S::MetaValueStart | S::MetaValue, _) => (S::MetaValue, A::Append),

        (S::StructKey, C::Equals) => (S::StructValue, A::StructKey),
        (S::StructKey, C::Comma) => (S::StructKey, A::StructFlag),
        (S::StructKey, C::Gt) => (S::StructEnd, A::StructFlag),
        (S::StructKey, C::End) => return None,
        (S::StructKey, _) => (S::StructKey, A::Append),

        (S::StructValue, C::Quote) => (S::StructQuoted, A::Append),
        (S::StructValue, C::Comma) => (S::StructKey, A::StructValue),
        (S::StructValue, C::Gt) => (S::StructEnd, A::StructValue),
        (S::StructValue, C::End) => return None,
        (S::StructValue, _) => (S::StructValue, A::Append),

        (S::StructQuoted, C::Quote) => (S::StructValue, A::Append),
        (S::StructQuoted, C::Backslash) => (S::StructEscaped, A::Append),
        (S::StructQuoted | S::StructEscaped, C::End) => return None,
        (S::StructQuoted | S::StructEscaped, _) => (S::StructQuoted, A::Append),

        (S::StructEnd, C::End) => (S::Done, A::MetaMapping),
        (S::StructEnd, _) => return None,

        (S::Chrom, C::Tab) => (S::Pos, A::Chrom),
        (S::Pos, C::Digit) => (S::Pos, A::Append),
        (S::Pos, C::Tab) => (S::Id, A::Pos),
        (S::Pos, _) => return None,
        (S::Id, C::Semicolon) => (S::Id, A::Id),
        (S::Id, C::Tab) => (S::Ref, A::Id),
        (S::Ref, C::Tab) => (S::Alt, A::Ref),
        (S::Alt, C::Comma) => (S::Alt, A::Alt),
        (S::Alt, C::Tab) => (S::Qual, A::Alt),
        (S::Qual, C::Tab) => (S::Filter, A::Qual),
        (S::Filter, C::Semicolon) => (S::Filter, A::Filter),
        (S::Filter, C::Tab) => (S::InfoKey, A::Filter),
        (S::Chrom | S::Id | S::Ref | S::Alt | S::Qual | S::Filter, C::End) => return None,
        (S::Chrom | S::Id | S::Ref | S::Alt | S::Qual | S::Filter, _) => (state, A::Append),

        (S::InfoKey, C::Equals) => (S::InfoValue, A::InfoKey),
        (S::InfoKey, C::Semicolon) => (S::InfoKey, A::InfoFlag),
        (S::InfoKey, C::Tab) => (S::Format, A::InfoFlag),
        (S::InfoKey, C::End) => (S::Done, A::InfoFlag),
        (S::InfoKey, _) => (S::InfoKey, A::Append),

        (S::InfoValue, C::Comma) => (S::InfoValue, A::InfoValue),
        (S::InfoValue, C::Semicolon) => (S::InfoKey, A::InfoValue),
        (S::InfoValue, C::Tab) => (S::Format, A::InfoValue),
        (S::InfoValue, C::End) => (S::Done, A::InfoValue),
        (S::InfoValue, _) => (S::InfoValue, A::Append),

        (S::Format, C::Colon) => (S::Format, A::Format),
        (S::Format, C::Tab) => (S::Sample, A::Format),
        (S::Format, C::End) => (S::Done, A::Format),
        (S::Format, _) => (S::Format, A::Append),

        (S::Sample, C::Tab) => (S::Sample, A::Sample),
        (S::Sample, C::End) => (S::Done, A::Sample),
        (S::Sample, _) => (S::Sample, A::Append),

        (S::Done, _) => return None,
    };
    Some(next)
}

fn step(acc: &mut Accumulator, state: State, class: Class, c: Option<char>) -> Result<State> {
    let (next, action) = transition(state, class).ok_or_else(|| BiometalError::InvalidRecord {
        line: 0,
        msg: match c {
            Some(c) => format!("unexpected {:?} while reading {:?}", c, state),
            None => format!("line ended while reading {:?}", state),
        },
    })?;
    acc.apply(action, c)?;
    Ok(next)
}

#[derive(Debug, Default)]
struct Accumulator {
    buf: String,
    kind: Option<VcfLine>,
    meta_key: String,
    mapping: Vec<(String, Option<String>)>,
    data: DataLine,
}

impl Accumulator {
    fn take(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }

    fn apply(&mut self, action: Action, c: Option<char>) -> Result<()> {
        match action {
            Action::Skip => {}
            Action::Append => {
                if let Some(c) = c {
                    self.buf.push(c);
                }
            }
            Action::EndComment => self.kind = Some(VcfLine::Comment(self.take())),
            Action::MetaKey => self.meta_key = self.take(),
            Action::MetaText => {
                self.kind = Some(VcfLine::Meta {
                    key: std::mem::take(&mut self.meta_key),
                    value: MetaValue::Text(self.take()),
                })
            }
            Action::MetaMapping => {
                self.kind = Some(VcfLine::Meta {
                    key: std::mem::take(&mut self.meta_key),
                    value: MetaValue::Mapping(std::mem::take(&mut self.mapping)),
                })
            }
            Action::StructKey => {
                let key = self.take();
                self.mapping.push((key, None));
            }
            Action::StructFlag => {
                let key = self.take();
                if !key.is_empty() {
                    self.mapping.push((key, None));
                }
            }
            Action::StructValue => {
                let value = self.take();
                if let Some(last) = self.mapping.last_mut() {
                    last.1 = Some(value);
                }
            }
            Action::Chrom => self.data.chrom = self.take(),
            Action::Pos => {
                let digits = self.take();
                self.data.pos = digits.parse().map_err(|_| BiometalError::InvalidRecord {
                    line: 0,
                    msg: format!("invalid POS '{}'", digits),
                })?;
            }
            Action::Id => {
                let id = self.take();
                self.data.ids.push(id);
            }
            Action::Ref => {
                self.data.reference = self.take();
                if self.data.reference.is_empty() {
                    return Err(BiometalError::EmptyAllele { line: 0 });
                }
            }
            Action::Alt => {
                let alt = self.take();
                if alt.is_empty() {
                    return Err(BiometalError::EmptyAllele { line: 0 });
                }
                self.data.alts.push(alt);
            }
            Action::Qual => self.data.qual = self.take(),
            Action::Filter => {
                let filter = self.take();
                self.data.filters.push(filter);
            }
            Action::InfoFlag => {
                let key = self.take();
                if !key.is_empty() {
                    self.data.info.push((key, None));
                }
            }
            Action::InfoKey => {
                let key = self.take();
                self.data.info.push((key, Some(Vec::new())));
            }
            Action::InfoValue => {
                let value = self.take();
                if let Some((_, Some(values))) = self.data.info.last_mut() {
                    values.push(value);
                }
            }
            Action::Format => {
                let key = self.take();
                self.data.format.push(key);
            }
            Action::Sample => {
                let column = self.take();
                let mut values = column.split(':');
                let sample = self
                    .data
                    .format
                    .iter()
                    .zip(values.by_ref())
                    .map(|(k, v)| (k.clone(), v.to_string()))
                    .collect();
                self.data.samples.push(sample);
                self.data.surplus.push(values.map(str::to_string).collect());
            }
        }
        Ok(())
    }

    fn finish(mut self) -> VcfLine {
        self.kind
            .take()
            .unwrap_or_else(|| VcfLine::Data(std::mem::take(&mut self.data)))
    }
}

impl fmt::Display for VcfLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcfLine::Comment(raw) => write!(f, "#{}", raw),
            VcfLine::Meta {
                key,
                value: MetaValue::Text(text),
            } => write!(f, "##{}={}", key, text),
            VcfLine::Meta {
                key,
                value: MetaValue::Mapping(entries),
            } => {
                write!(f, "##{}=<", key)?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    match v {
                        Some(v) => write!(f, "{}={}", k, v)?,
                        None => f.write_str(k)?,
                    }
                }
                f.write_str(">")
            }
            VcfLine::Data(data) => data.fmt(f),
        }
    }
}

impl fmt::Display for DataLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t",
            self.chrom,
            self.pos,
            self.ids.join(";"),
            self.reference,
            self.alts.join(","),
            self.qual,
            self.filters.join(";")
        )?;

        if self.info.is_empty() {
            f.write_str(".")?;
        }
        for (i, (key, values)) in self.info.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            match values {
                Some(values) => write!(f, "{}={}", key, values.join(","))?,
                None => f.write_str(key)?,
            }
        }

        if self.format.is_empty() && self.samples.is_empty() {
            return Ok(());
        }
        write!(f, "\t{}", self.format.join(":"))?;
        for (i, sample) in self.samples.iter().enumerate() {
            let surplus = self.surplus.get(i).map(Vec::as_slice).unwrap_or_default();
            let values: Vec<&str> = sample
                .iter()
                .map(|(_, v)| v.as_str())
                .chain(surplus.iter().map(String::as_str))
                .collect();
            write!(f, "\t{}", values.join(":"))?;
        }
        Ok(())
    }
}
