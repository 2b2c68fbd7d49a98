//! Comma-separated text tokenizer.
//!
//! The tokenizer is total: malformed quoting never fails, it degrades to
//! accumulating characters into the current cell and records a warning.
//! Header detection is left to the row extractor.

use crate::diagnostic::{Diagnostic, W_CSV_STRAY_QUOTE, W_CSV_UNTERMINATED_QUOTE};
use crate::source_map::SourceMap;

/// One tokenized line of cells together with its byte extent in the source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CsvRecord {
    pub cells: Vec<String>,
    pub start: usize,
    pub end: usize,
}

impl CsvRecord {
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    /// True when every cell is blank after trimming.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|cell| cell.trim().is_empty())
    }
}

/// Cells without a known source position, such as rows from [`tokenize`].
impl From<Vec<String>> for CsvRecord {
    fn from(cells: Vec<String>) -> Self {
        Self {
            cells,
            start: 0,
            end: 0,
        }
    }
}

pub struct CsvParse {
    pub records: Vec<CsvRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Splits `text` into rows of cells, discarding positions and diagnostics.
pub fn tokenize(text: &str) -> Vec<Vec<String>> {
    parse_csv(text)
        .records
        .into_iter()
        .map(|record| record.cells)
        .collect()
}

pub fn parse_csv(text: &str) -> CsvParse {
    let mut tokenizer = Tokenizer::default();
    tokenizer.feed(text);
    tokenizer.finish(text.len());

    let diagnostics = if tokenizer.issues.is_empty() {
        Vec::new()
    } else {
        let map = SourceMap::new(text);
        tokenizer
            .issues
            .into_iter()
            .map(|issue| {
                Diagnostic::warning(issue.code, issue.message)
                    .with_range(map.range(issue.start, issue.end))
            })
            .collect()
    };

    CsvParse {
        records: tokenizer.records,
        diagnostics,
    }
}

struct Issue {
    code: &'static str,
    message: &'static str,
    start: usize,
    end: usize,
}

#[derive(Default)]
struct Tokenizer {
    records: Vec<CsvRecord>,
    row: Vec<String>,
    cell: String,
    in_quotes: bool,
    // The current cell opened with a quote (it may since have closed).
    quoted: bool,
    stray_reported: bool,
    quote_start: usize,
    record_start: Option<usize>,
    issues: Vec<Issue>,
}

impl Tokenizer {
    fn feed(&mut self, text: &str) {
        let mut chars = text.char_indices().peekable();
        while let Some((offset, ch)) = chars.next() {
            if self.in_quotes {
                if ch == '"' {
                    if matches!(chars.peek(), Some((_, '"'))) {
                        chars.next();
                        self.cell.push('"');
                    } else {
                        self.in_quotes = false;
                    }
                } else {
                    self.cell.push(ch);
                }
                continue;
            }

            match ch {
                '\r' => {
                    if matches!(chars.peek(), Some((_, '\n'))) {
                        chars.next();
                    }
                    self.end_line(offset);
                }
                '\n' => self.end_line(offset),
                ',' => {
                    self.touch(offset);
                    self.end_cell();
                }
                '"' if self.cell.is_empty() && !self.quoted => {
                    self.touch(offset);
                    self.in_quotes = true;
                    self.quoted = true;
                    self.quote_start = offset;
                }
                _ => {
                    self.touch(offset);
                    if ch == '"' || self.quoted {
                        self.report_stray(offset, ch.len_utf8());
                    }
                    self.cell.push(ch);
                }
            }
        }
    }

    fn finish(&mut self, len: usize) {
        if self.in_quotes {
            self.issues.push(Issue {
                code: W_CSV_UNTERMINATED_QUOTE,
                message: "quoted cell is never closed; the rest of the text was kept in it",
                start: self.quote_start,
                end: len,
            });
            self.in_quotes = false;
        }
        if self.quoted || !self.cell.is_empty() || !self.row.is_empty() {
            self.end_line(len);
        }
    }

    fn touch(&mut self, offset: usize) {
        if self.record_start.is_none() {
            self.record_start = Some(offset);
        }
    }

    fn report_stray(&mut self, offset: usize, width: usize) {
        if self.stray_reported {
            return;
        }
        self.stray_reported = true;
        self.issues.push(Issue {
            code: W_CSV_STRAY_QUOTE,
            message: "quote character outside a quoted cell was kept as text",
            start: offset,
            end: offset + width,
        });
    }

    fn end_cell(&mut self) {
        self.row.push(std::mem::take(&mut self.cell));
        self.quoted = false;
        self.stray_reported = false;
    }

    fn end_line(&mut self, offset: usize) {
        if self.row.is_empty() && self.cell.is_empty() && !self.quoted {
            self.record_start = None;
            return;
        }
        self.end_cell();
        let start = self.record_start.take().unwrap_or(offset);
        self.records.push(CsvRecord {
            cells: std::mem::take(&mut self.row),
            start,
            end: offset,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_cells_keep_commas() {
        assert_eq!(tokenize("a,\"b,c\",d"), vec![vec!["a", "b,c", "d"]]);
    }

    #[test]
    fn doubled_quote_is_an_escape() {
        assert_eq!(tokenize("a,\"b\"\"c\""), vec![vec!["a", "b\"c"]]);
    }

    #[test]
    fn quoted_cells_keep_newlines() {
        assert_eq!(
            tokenize("\"line one\nline two\",x\r\ny"),
            vec![vec!["line one\nline two", "x"], vec!["y"]]
        );
    }

    #[test]
    fn every_terminator_style_ends_a_line() {
        assert_eq!(
            tokenize("a\r\nb\rc\nd"),
            vec![vec!["a"], vec!["b"], vec!["c"], vec!["d"]]
        );
    }

    #[test]
    fn empty_lines_are_dropped_but_empty_cells_are_not() {
        assert_eq!(
            tokenize("a\n\n\n,\n\"\"\n"),
            vec![vec!["a"], vec!["", ""], vec![""]]
        );
    }

    #[test]
    fn trailing_cell_without_terminator_is_emitted() {
        assert_eq!(tokenize("a,b\nc,"), vec![vec!["a", "b"], vec!["c", ""]]);
    }

    #[test]
    fn unterminated_quote_degrades_with_warning() {
        let parsed = parse_csv("a,\"open\nstill open");
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].cells, vec!["a", "open\nstill open"]);
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].code, W_CSV_UNTERMINATED_QUOTE);
        let range = parsed.diagnostics[0].range.expect("range");
        assert_eq!(range.start.line, 0);
        assert_eq!(range.start.character, 2);
        assert_eq!(range.end.line, 1);
    }

    #[test]
    fn stray_quotes_are_kept_as_text() {
        let parsed = parse_csv("ab\"c,\"x\"y");
        assert_eq!(parsed.records[0].cells, vec!["ab\"c", "xy"]);
        assert_eq!(parsed.diagnostics.len(), 2);
        assert!(
            parsed
                .diagnostics
                .iter()
                .all(|diag| diag.code == W_CSV_STRAY_QUOTE)
        );
    }

    #[test]
    fn record_extents_point_at_source_lines() {
        let text = "q1,a\n\nq2,b";
        let parsed = parse_csv(text);
        assert_eq!(parsed.records[0].start, 0);
        assert_eq!(parsed.records[0].end, 4);
        assert_eq!(&text[parsed.records[1].start..parsed.records[1].end], "q2,b");
    }
}
