//! Percent-escaping of INFO and FORMAT values
//!
//! VCF reserves a few characters inside INFO and FORMAT values and encodes
//! them as `%XX` (for example `;` becomes `%3B`). FORMAT reserves the INFO
//! set plus `:`.

use std::borrow::Cow;

/// Column a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// INFO column
    Info,
    /// FORMAT / sample columns
    Format,
}

impl Section {
    /// Characters that must be escaped in this section
    pub fn reserved(self) -> &'static str {
        match self {
            Section::Info => ";=%,\r\n\t",
            Section::Format => ";=%,\r\n\t:",
        }
    }
}

const ESCAPE_MAPPING: [(char, &str); 8] = [
    ('%', "%25"),
    (':', "%3A"),
    (';', "%3B"),
    ('=', "%3D"),
    (',', "%2C"),
    ('\r', "%0D"),
    ('\n', "%0A"),
    ('\t', "%09"),
];

fn escape_code(c: char) -> Option<&'static str> {
    ESCAPE_MAPPING
        .iter()
        .find(|(ch, _)| *ch == c)
        .map(|(_, code)| *code)
}

fn unescape_code(code: &str) -> Option<char> {
    ESCAPE_MAPPING
        .iter()
        .find(|(_, c)| c.eq_ignore_ascii_case(code))
        .map(|(ch, _)| *ch)
}

/// Escape the characters reserved in `section`
///
/// # Example
///
/// ```
/// use biometal_vcf::formats::vcf::escape::{escape, Section};
///
/// assert_eq!(escape("a;b=c", Section::Info), "a%3Bb%3Dc");
/// assert_eq!(escape("a:b", Section::Info), "a:b");
/// assert_eq!(escape("a:b", Section::Format), "a%3Ab");
/// ```
pub fn escape(value: &str, section: Section) -> Cow<'_, str> {
    let reserved = section.reserved();
    if !value.chars().any(|c| reserved.contains(c)) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match escape_code(c) {
            Some(code) if reserved.contains(c) => out.push_str(code),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Decode `%XX` sequences in a single left-to-right pass
///
/// Unknown sequences and lone `%` are kept as they are.
pub fn unescape(value: &str) -> Cow<'_, str> {
    if !value.contains('%') {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        match tail.get(..3).and_then(unescape_code) {
            Some(c) => {
                out.push(c);
                rest = &tail[3..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_borrows_when_clean() {
        assert!(matches!(escape("plain", Section::Info), Cow::Borrowed(_)));
        assert!(matches!(unescape("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_all_reserved() {
        assert_eq!(escape("%;=,\r\n\t", Section::Info), "%25%3B%3D%2C%0D%0A%09");
        assert_eq!(escape("%:=,\r\n\t;", Section::Format), "%25%3A%3D%2C%0D%0A%09%3B");
        assert_eq!(escape("a:b", Section::Info), "a:b");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a%3Bb%2Cc"), "a;b,c");
        assert_eq!(unescape("%3a"), ":");
        assert_eq!(unescape("100%"), "100%");
        assert_eq!(unescape("%ZZ%"), "%ZZ%");
        // Single pass: "%253B" decodes to "%3B", not ";"
        assert_eq!(unescape("%253B"), "%3B");
    }

    #[test]
    fn test_unescape_multibyte_neighbour() {
        assert_eq!(unescape("é%2Cü"), "é,ü");
        assert_eq!(unescape("%é"), "%é");
    }
}
