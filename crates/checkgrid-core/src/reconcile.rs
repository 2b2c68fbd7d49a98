//! Carrying answers across reloads.
//!
//! Rows have no identity that survives a CSV reload, so answers are matched
//! on the markup-free question text. Each saved answer goes to the first row
//! whose text matches; with duplicated questions later rows never receive
//! one. The scan is linear per answer, quadratic overall, which is fine for
//! tables of tens of rows.

use serde_json::Value;
use tracing::debug;

use crate::error::PersistedError;
use crate::model::{PersistedAnswer, SubmissionRecord, parse_date};
use crate::render::{RenderedRow, collect};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RestoreReport {
    pub matched: usize,
    pub missed: usize,
    pub choices_dropped: usize,
}

/// Captures the answers currently entered in `table`.
pub fn snapshot(table: &[RenderedRow]) -> Vec<SubmissionRecord> {
    collect(table)
}

/// Re-applies saved answers to matching rows.
///
/// Best effort: answers whose question is gone, choices the row no longer
/// offers and malformed dates are skipped. Empty fields leave the row as is.
pub fn restore(table: &mut [RenderedRow], persisted: &[PersistedAnswer]) -> RestoreReport {
    let mut report = RestoreReport::default();
    for saved in persisted {
        let key = saved.question.trim();
        let Some(row) = table.iter_mut().find(|row| row.question_text == key) else {
            debug!(question = key, "saved answer matches no rendered row");
            report.missed += 1;
            continue;
        };
        report.matched += 1;

        if let Some(choice) = saved.choice.as_deref().filter(|choice| !choice.is_empty()) {
            if row.offers(choice) {
                row.answer.selected = Some(choice.to_string());
            } else {
                debug!(question = key, choice, "saved choice is no longer offered");
                report.choices_dropped += 1;
            }
        }
        if let Some(date) = saved.date.as_deref().and_then(parse_date) {
            row.set_date(Some(date));
        }
    }
    report
}

/// Restores from a snapshot taken with [`snapshot`].
pub fn restore_snapshot(table: &mut [RenderedRow], records: &[SubmissionRecord]) -> RestoreReport {
    let persisted: Vec<PersistedAnswer> = records.iter().cloned().map(PersistedAnswer::from).collect();
    restore(table, &persisted)
}

/// Reads a host-supplied saved value: either the JSON text of a submission
/// or the already decoded array.
pub fn parse_persisted(value: &Value) -> Result<Vec<PersistedAnswer>, PersistedError> {
    match value {
        Value::String(text) => parse_persisted_str(text),
        Value::Array(_) => serde_json::from_value(value.clone())
            .map_err(|err| PersistedError::Shape(err.to_string())),
        other => Err(PersistedError::Shape(format!("unexpected {}", kind(other)))),
    }
}

pub fn parse_persisted_str(text: &str) -> Result<Vec<PersistedAnswer>, PersistedError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| PersistedError::Json(err.to_string()))?;
    match value {
        Value::Array(_) => {
            serde_json::from_value(value).map_err(|err| PersistedError::Shape(err.to_string()))
        }
        other => Err(PersistedError::Shape(format!("unexpected {}", kind(&other)))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
