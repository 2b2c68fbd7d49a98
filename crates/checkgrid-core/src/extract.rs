use tracing::debug;

use crate::column::{ColumnSpec, resolve_column};
use crate::csv::{CsvRecord, parse_csv};
use crate::diagnostic::{Diagnostic, W_COLUMN_NOT_FOUND, W_ROW_BLANK_QUESTION};
use crate::error::SourceError;
use crate::model::Row;
use crate::sanitize::sanitize;
use crate::source_map::SourceMap;

pub const DEFAULT_CHOICES_DELIMITER: &str = "|";

/// How CSV records map onto rows.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CsvSchema {
    pub has_header: bool,
    pub question: ColumnSpec,
    pub choices: Option<ColumnSpec>,
    pub code: Option<ColumnSpec>,
    pub choices_delimiter: String,
}

impl Default for CsvSchema {
    fn default() -> Self {
        Self {
            has_header: true,
            question: ColumnSpec::Name("Question".to_string()),
            choices: Some(ColumnSpec::Name("Choices".to_string())),
            code: Some(ColumnSpec::Name("Code".to_string())),
            choices_delimiter: DEFAULT_CHOICES_DELIMITER.to_string(),
        }
    }
}

pub struct Extraction {
    pub rows: Vec<Row>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Tokenizes and extracts rows, failing with [`SourceError::NoRows`] when
/// nothing usable is left so the caller can switch to its fallback list.
pub fn rows_from_csv(text: &str, schema: &CsvSchema) -> Result<Extraction, SourceError> {
    let parsed = parse_csv(text);
    let map = SourceMap::new(text);
    let mut extraction = extract_records(&parsed.records, schema, Some(&map));
    let mut diagnostics = parsed.diagnostics;
    diagnostics.append(&mut extraction.diagnostics);
    extraction.diagnostics = diagnostics;

    if extraction.rows.is_empty() {
        return Err(SourceError::NoRows);
    }
    Ok(extraction)
}

/// Builds rows from already tokenized records.
pub fn extract(records: &[CsvRecord], schema: &CsvSchema) -> Extraction {
    extract_records(records, schema, None)
}

/// Splits a per-row options cell, trimming tokens and dropping empties.
pub fn split_options(raw: &str, delimiter: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    let delimiter = if delimiter.is_empty() {
        DEFAULT_CHOICES_DELIMITER
    } else {
        delimiter
    };
    raw.split(delimiter)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

struct Columns {
    question: usize,
    choices: Option<usize>,
    code: Option<usize>,
    // Header mode only addresses cells under a header.
    width: Option<usize>,
}

impl Columns {
    fn cell<'r>(&self, record: &'r CsvRecord, index: usize) -> &'r str {
        match self.width {
            Some(width) if index >= width => "",
            _ => record.cell(index),
        }
    }
}

fn extract_records(
    records: &[CsvRecord],
    schema: &CsvSchema,
    map: Option<&SourceMap<'_>>,
) -> Extraction {
    let mut diagnostics = Vec::new();
    let mut data = records.iter().filter(|record| !record.is_blank());

    let header: Vec<String> = if schema.has_header {
        match data.next() {
            Some(record) => record
                .cells
                .iter()
                .map(|cell| cell.trim().to_string())
                .collect(),
            None => Vec::new(),
        }
    } else {
        Vec::new()
    };
    let columns = resolve_columns(schema, &header, &mut diagnostics);

    let mut rows = Vec::new();
    for record in data {
        let question = columns.cell(record, columns.question).trim();
        if question.is_empty() {
            let mut diag = Diagnostic::warning(
                W_ROW_BLANK_QUESTION,
                "record has content but an empty question cell; skipped",
            );
            if let Some(map) = map {
                diag = diag.with_range(map.range(record.start, record.end));
            }
            diagnostics.push(diag);
            continue;
        }
        let question = sanitize(question);
        if question.trim().is_empty() {
            debug!(start = record.start, "question cell empty after sanitizing; skipped");
            continue;
        }

        let mut row = Row::new(question);
        if let Some(index) = columns.choices {
            let options = split_options(columns.cell(record, index), &schema.choices_delimiter);
            if !options.is_empty() {
                row.options = Some(options);
            }
        }
        if let Some(index) = columns.code {
            let code = columns.cell(record, index).trim();
            if !code.is_empty() {
                row.code = Some(code.to_string());
            }
        }
        rows.push(row);
    }

    Extraction { rows, diagnostics }
}

fn resolve_columns(
    schema: &CsvSchema,
    header: &[String],
    diagnostics: &mut Vec<Diagnostic>,
) -> Columns {
    let has_header = schema.has_header;
    let question = resolve_column(has_header, header, &schema.question);
    if question.fell_back && has_header {
        diagnostics.push(Diagnostic::warning(
            W_COLUMN_NOT_FOUND,
            format!(
                "question column {} not found in header; using the first column",
                schema.question
            ),
        ));
    }

    // Optional columns degrade to the first column like the question column.
    let mut optional = |spec: &Option<ColumnSpec>, what: &str| -> Option<usize> {
        let spec = spec.as_ref()?;
        let matched = resolve_column(has_header, header, spec);
        if matched.fell_back && has_header {
            diagnostics.push(Diagnostic::warning(
                W_COLUMN_NOT_FOUND,
                format!("{} column {} not found in header; using the first column", what, spec),
            ));
        }
        Some(matched.index)
    };
    let choices = optional(&schema.choices, "choices");
    let code = optional(&schema.code, "code");

    Columns {
        question: question.index,
        choices,
        code,
        width: has_header.then_some(header.len()),
    }
}
