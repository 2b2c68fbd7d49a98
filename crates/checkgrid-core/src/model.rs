use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Wire format of answer dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One canonical question entry.
///
/// `question` is plain text or sanitized HTML and is never blank.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Row {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Row {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            options: None,
            code: None,
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Answer entered for one rendered row.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerState {
    pub selected: Option<String>,
    pub answered_on: Option<NaiveDate>,
}

impl AnswerState {
    pub fn is_answered(&self) -> bool {
        self.selected.is_some()
    }
}

/// What the host receives for each row on submit or as a draft.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub question: String,
    pub choice: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A previously saved answer offered back by the host.
///
/// Only `question` is required; `code` and unknown fields are ignored.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct PersistedAnswer {
    pub question: String,
    #[serde(default)]
    pub choice: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl From<SubmissionRecord> for PersistedAnswer {
    fn from(record: SubmissionRecord) -> Self {
        Self {
            question: record.question,
            choice: Some(record.choice),
            date: Some(record.date),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SubmitResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl SubmitResponse {
    pub fn rejected() -> Self {
        Self {
            valid: false,
            value: None,
        }
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Strict `YYYY-MM-DD` parsing.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_record_omits_missing_code() {
        let record = SubmissionRecord {
            question: "Q".to_string(),
            choice: String::new(),
            date: String::new(),
            code: None,
        };
        let json = serde_json::to_string(&record).expect("json");
        assert_eq!(json, r#"{"question":"Q","choice":"","date":""}"#);
    }

    #[test]
    fn rejected_submit_has_no_value_field() {
        let json = serde_json::to_string(&SubmitResponse::rejected()).expect("json");
        assert_eq!(json, r#"{"valid":false}"#);
    }

    #[test]
    fn dates_must_be_iso_calendar_days() {
        assert_eq!(
            parse_date("2024-01-01"),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(parse_date("2024-1-1"), None);
        assert_eq!(parse_date("2024-02-30"), None);
        assert_eq!(parse_date(""), None);
    }
}
