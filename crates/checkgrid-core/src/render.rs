use chrono::NaiveDate;
use serde::Serialize;
use tracing::error;

use crate::config::Config;
use crate::model::{AnswerState, Row, SubmissionRecord, SubmitResponse, format_date};
use crate::sanitize::plain_text;

/// One row of interactive controls: the question, its answer selector and
/// its date field.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedRow {
    pub index: usize,
    pub question_html: String,
    /// Markup-free question text, the key answers are matched on.
    pub question_text: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub group_name: String,
    pub aria_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_max: Option<NaiveDate>,
    pub answer: AnswerState,
}

impl RenderedRow {
    pub fn offers(&self, option: &str) -> bool {
        self.options.iter().any(|offered| offered == option)
    }

    /// Selects `option` and fills in today's date when the date is empty or
    /// `always_redate` is set. Returns false if the row does not offer it.
    pub fn select(&mut self, option: &str, today: NaiveDate, always_redate: bool) -> bool {
        if !self.offers(option) {
            return false;
        }
        self.answer.selected = Some(option.to_string());
        if always_redate || self.answer.answered_on.is_none() {
            self.answer.answered_on = Some(today);
            if self.date_max.is_some() {
                self.date_max = Some(today);
            }
        }
        true
    }

    pub fn set_date(&mut self, date: Option<NaiveDate>) {
        self.answer.answered_on = date;
    }

    pub fn record(&self) -> SubmissionRecord {
        SubmissionRecord {
            question: self.question_text.clone(),
            choice: self.answer.selected.clone().unwrap_or_default(),
            date: self.answer.answered_on.map(format_date).unwrap_or_default(),
            code: self.code.clone(),
        }
    }
}

/// Projects canonical rows into fresh, unanswered controls.
///
/// Rows without their own options use `global_options`.
pub fn project(
    rows: &[Row],
    global_options: &[String],
    config: &Config,
    today: NaiveDate,
) -> Vec<RenderedRow> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let question_text = plain_text(&row.question);
            let options = match &row.options {
                Some(options) if !options.is_empty() => options.clone(),
                _ => global_options.to_vec(),
            };
            RenderedRow {
                index,
                aria_label: format!("{} for \"{}\"", config.col_choice_header, question_text),
                question_html: row.question.clone(),
                question_text,
                options,
                code: row.code.clone(),
                group_name: format!("row-{}-choice", index),
                date_max: config.restrict_max_today.then_some(today),
                answer: AnswerState::default(),
            }
        })
        .collect()
}

pub fn collect(table: &[RenderedRow]) -> Vec<SubmissionRecord> {
    table.iter().map(RenderedRow::record).collect()
}

pub fn unanswered(table: &[RenderedRow]) -> Vec<usize> {
    table
        .iter()
        .filter(|row| !row.answer.is_answered())
        .map(|row| row.index)
        .collect()
}

/// Builds the host's submit payload, rejecting it when answers are required
/// and some row has none.
pub fn submission(table: &[RenderedRow], enforce_required: bool) -> SubmitResponse {
    if enforce_required && table.iter().any(|row| !row.answer.is_answered()) {
        return SubmitResponse::rejected();
    }
    match serde_json::to_string(&collect(table)) {
        Ok(value) => SubmitResponse {
            valid: true,
            value: Some(value),
        },
        Err(err) => {
            error!(%err, "could not serialize submission");
            SubmitResponse::rejected()
        }
    }
}
