//! Header mapping splitter
//!
//! Splits the body of `##KEY=<...>` lines at top-level commas while leaving
//! quoted strings (with backslash escapes) and one level of `[...]` arrays
//! intact:
//!
//! ```text
//! ID=DP,Description="Depth, total",Values=[a, b],Flag
//! └────┘ └──────────────────────┘ └───────────┘ └──┘
//! ```
//!
//! Nested brackets are not interpreted.

use crate::error::{BiometalError, Result};
use crate::formats::vcf::warning::{Warning, Warnings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitState {
    Normal,
    Quoted,
    Escaped,
    Array,
    Delim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Delim,
    Quote,
    Backslash,
    Open,
    Close,
    Other,
}

/// `(state, input) -> (next state, split before this character)`
fn transition(state: SplitState, input: Input) -> (SplitState, bool) {
    use Input as I;
    use SplitState as S;

    match (state, input) {
        (S::Normal | S::Delim, I::Delim) => (S::Delim, true),
        (S::Normal | S::Delim, I::Quote) => (S::Quoted, false),
        (S::Normal | S::Delim, I::Open) => (S::Array, false),
        (S::Normal | S::Delim, _) => (S::Normal, false),
        (S::Quoted, I::Backslash) => (S::Escaped, false),
        (S::Quoted, I::Quote) => (S::Normal, false),
        (S::Quoted, _) => (S::Quoted, false),
        (S::Escaped, _) => (S::Quoted, false),
        (S::Array, I::Close) => (S::Normal, false),
        (S::Array, _) => (S::Array, false),
    }
}

/// Split `s` at `delim`, ignoring delimiters inside `quote`d strings and `[...]`
///
/// # Example
///
/// ```
/// use biometal_vcf::formats::vcf::splitter::split_quoted_string;
///
/// let parts = split_quoted_string(r#"ID=X,Description="a, b",Flag"#, ',', '"');
/// assert_eq!(parts, vec!["ID=X", r#"Description="a, b""#, "Flag"]);
/// ```
pub fn split_quoted_string(s: &str, delim: char, quote: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut begin = 0;
    let mut state = SplitState::Normal;

    for (pos, c) in s.char_indices() {
        let input = if c == delim {
            Input::Delim
        } else if c == quote {
            Input::Quote
        } else {
            match c {
                '\\' => Input::Backslash,
                '[' => Input::Open,
                ']' => Input::Close,
                _ => Input::Other,
            }
        };
        let (next, split) = transition(state, input);
        if split {
            parts.push(&s[begin..pos]);
            begin = pos + c.len_utf8();
        }
        state = next;
    }
    parts.push(&s[begin..]);
    parts
}

/// Split `pair` at the first `=`, stripping whitespace around the key
///
/// Returns `None` when there is no `=`.
pub fn split_mapping<'a>(pair: &'a str, warnings: &mut Warnings) -> Option<(&'a str, &'a str)> {
    let (raw_key, value) = pair.split_once('=')?;
    let key = raw_key.trim();
    if key != raw_key {
        warnings.push(Warning::LeadingTrailingSpaceInKey {
            key: raw_key.to_string(),
        });
    }
    Some((key, value))
}

/// Value of one header mapping entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingValue {
    /// Bare token without `=`
    Flag,
    /// Plain or unquoted string value
    Text(String),
    /// `[a, b]` array with trimmed items
    List(Vec<String>),
}

impl MappingValue {
    /// Text value, if this is one
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MappingValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Parse a `<key=value,...>` header mapping
///
/// Quoted values are unquoted and unescaped, bracketed values become lists and
/// bare tokens become [`MappingValue::Flag`].
///
/// # Errors
///
/// [`BiometalError::InvalidHeaderMapping`] if `value` is not wrapped in `<...>`.
pub fn parse_mapping(value: &str, warnings: &mut Warnings) -> Result<Vec<(String, MappingValue)>> {
    let body = value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .ok_or_else(|| BiometalError::InvalidHeaderMapping {
            msg: format!("value was not wrapped in angular brackets: {}", value),
        })?;

    let mut entries = Vec::new();
    for pair in split_quoted_string(body, ',', '"') {
        if pair.is_empty() {
            continue;
        }
        let entry = match split_mapping(pair, warnings) {
            Some((key, v)) => {
                let parsed = if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') {
                    MappingValue::Text(unquote(&v[1..v.len() - 1]))
                } else if v.starts_with('[') && v.ends_with(']') {
                    MappingValue::List(
                        v[1..v.len() - 1]
                            .split(',')
                            .map(|item| item.trim().to_string())
                            .collect(),
                    )
                } else {
                    MappingValue::Text(v.to_string())
                };
                (key.to_string(), parsed)
            }
            None => (pair.to_string(), MappingValue::Flag),
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// Resolve backslash escapes inside a quoted string body
fn unquote(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Quote `value` for a mapping, escaping `\` and `"`
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
