use std::fmt;

use serde::Serialize;

/// A user-supplied column reference: a zero-based index or a header name.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Index(usize),
    Name(String),
}

impl ColumnSpec {
    /// Digit-only text becomes an index, anything else a trimmed name.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match digits_index(trimmed) {
            Some(index) => ColumnSpec::Index(index),
            None => ColumnSpec::Name(trimmed.to_string()),
        }
    }
}

impl From<usize> for ColumnSpec {
    fn from(index: usize) -> Self {
        ColumnSpec::Index(index)
    }
}

impl From<&str> for ColumnSpec {
    fn from(raw: &str) -> Self {
        ColumnSpec::parse(raw)
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSpec::Index(index) => write!(f, "#{}", index),
            ColumnSpec::Name(name) => write!(f, "\"{}\"", name),
        }
    }
}

/// Outcome of resolving a specifier, keeping track of silent fallbacks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ColumnMatch {
    pub index: usize,
    pub fell_back: bool,
}

/// Maps a specifier to a zero-based column index.
///
/// Never fails: an unknown name, or a name used without a header row,
/// resolves to the first column.
pub fn resolve(has_header: bool, header_names: &[String], spec: &ColumnSpec) -> usize {
    resolve_column(has_header, header_names, spec).index
}

pub fn resolve_column(has_header: bool, header_names: &[String], spec: &ColumnSpec) -> ColumnMatch {
    let name = match spec {
        ColumnSpec::Index(index) => return found(*index),
        ColumnSpec::Name(name) => match digits_index(name.trim()) {
            Some(index) => return found(index),
            None => name.trim(),
        },
    };
    if !has_header {
        return fallback();
    }
    header_names
        .iter()
        .position(|header| header.trim() == name)
        .map(found)
        .unwrap_or_else(fallback)
}

fn found(index: usize) -> ColumnMatch {
    ColumnMatch {
        index,
        fell_back: false,
    }
}

fn fallback() -> ColumnMatch {
    ColumnMatch {
        index: 0,
        fell_back: true,
    }
}

pub(crate) fn digits_index(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn headerless_digits_are_indices() {
        assert_eq!(resolve(false, &[], &ColumnSpec::parse("2")), 2);
        assert_eq!(resolve(false, &[], &ColumnSpec::Index(4)), 4);
    }

    #[test]
    fn headerless_names_fall_back_to_first_column() {
        let matched = resolve_column(false, &[], &ColumnSpec::parse("Question"));
        assert_eq!(matched, ColumnMatch { index: 0, fell_back: true });
    }

    #[test]
    fn header_names_match_exactly_after_trim() {
        let names = headers(&["Q", " Choices "]);
        assert_eq!(resolve(true, &names, &ColumnSpec::parse("Choices")), 1);
        assert_eq!(resolve(true, &names, &ColumnSpec::parse("choices")), 0);
    }

    #[test]
    fn header_mode_still_accepts_indices() {
        let names = headers(&["Q", "Choices", "Code"]);
        assert_eq!(resolve(true, &names, &ColumnSpec::parse("2")), 2);
        assert_eq!(
            resolve(true, &names, &ColumnSpec::Name("1".to_string())),
            1
        );
    }

    #[test]
    fn unmatched_header_name_falls_back() {
        let names = headers(&["Q", "Choices"]);
        let matched = resolve_column(true, &names, &ColumnSpec::parse("Missing"));
        assert!(matched.fell_back);
        assert_eq!(matched.index, 0);
    }

    #[test]
    fn oversized_digit_strings_are_names() {
        assert_eq!(
            ColumnSpec::parse("99999999999999999999999"),
            ColumnSpec::Name("99999999999999999999999".to_string())
        );
    }
}
