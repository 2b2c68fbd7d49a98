mod column;
mod config;
mod csv;
mod diagnostic;
mod emit;
mod error;
mod extract;
mod model;
mod options;
mod reconcile;
mod render;
mod sanitize;
mod session;
mod source_map;

pub use column::{ColumnMatch, ColumnSpec, resolve, resolve_column};
pub use config::{Config, SettingsSource};
pub use csv::{CsvParse, CsvRecord, parse_csv, tokenize};
pub use diagnostic::{
    Diagnostic, DiagnosticSeverity, E_ANSWERS_MISSING, W_COLUMN_NOT_FOUND,
    W_CSV_STRAY_QUOTE, W_CSV_UNTERMINATED_QUOTE, W_OPTIONS_MALFORMED, W_PERSISTED_MALFORMED,
    W_ROW_BLANK_QUESTION, W_SOURCE_UNAVAILABLE,
};
pub use emit::emit_table_html;
pub use error::{PersistedError, SessionError, SessionResult, SourceError};
pub use extract::{
    CsvSchema, DEFAULT_CHOICES_DELIMITER, Extraction, extract, rows_from_csv, split_options,
};
pub use model::{
    AnswerState, DATE_FORMAT, PersistedAnswer, Row, SubmissionRecord, SubmitResponse,
    format_date, parse_date,
};
pub use options::{default_choices, normalize_choices, parse_remote_options};
pub use reconcile::{
    RestoreReport, parse_persisted, parse_persisted_str, restore, restore_snapshot, snapshot,
};
pub use render::{RenderedRow, collect, project, submission, unanswered};
pub use sanitize::{plain_text, sanitize};
pub use session::{
    Clock, Effect, FALLBACK_ADVISORY, FixedClock, HostMessage, LOADING_STATUS, LoadRequest,
    LoadResponse, LoadState, REQUIRED_ADVISORY, Session, SessionView, SourceFetcher, SystemClock,
    cache_busted,
};
pub use source_map::{Position, Range, SourceMap};
