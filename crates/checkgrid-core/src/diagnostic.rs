use serde::Serialize;

use crate::source_map::Range;

pub const E_ANSWERS_MISSING: &str = "E_ANSWERS_MISSING";

pub const W_CSV_UNTERMINATED_QUOTE: &str = "W_CSV_UNTERMINATED_QUOTE";
pub const W_CSV_STRAY_QUOTE: &str = "W_CSV_STRAY_QUOTE";
pub const W_COLUMN_NOT_FOUND: &str = "W_COLUMN_NOT_FOUND";
pub const W_ROW_BLANK_QUESTION: &str = "W_ROW_BLANK_QUESTION";
pub const W_SOURCE_UNAVAILABLE: &str = "W_SOURCE_UNAVAILABLE";
pub const W_OPTIONS_MALFORMED: &str = "W_OPTIONS_MALFORMED";
pub const W_PERSISTED_MALFORMED: &str = "W_PERSISTED_MALFORMED";

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    pub severity: DiagnosticSeverity,
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: DiagnosticSeverity, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            range: None,
            severity,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, code, message)
    }

    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, code, message)
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

impl DiagnosticSeverity {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
        }
    }
}
