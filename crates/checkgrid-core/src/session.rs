//! The load cycle and its host boundary.
//!
//! A [`Session`] owns everything one widget instance renders. Fetching is
//! left to the caller: [`Session::begin_load`] says what to fetch and
//! [`Session::complete_load`] takes the results, so the same state machine
//! runs behind a browser `fetch`, a blocking HTTP client or a test double.
//! Row and option state only change inside `complete_load`.

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::diagnostic::{
    Diagnostic, E_ANSWERS_MISSING, W_PERSISTED_MALFORMED, W_SOURCE_UNAVAILABLE,
};
use crate::error::{SessionError, SessionResult, SourceError};
use crate::extract::rows_from_csv;
use crate::model::{Row, SubmissionRecord, SubmitResponse, parse_date};
use crate::options::parse_remote_options;
use crate::reconcile::{parse_persisted, restore, restore_snapshot, snapshot};
use crate::render::{RenderedRow, collect, project, submission, unanswered};
use crate::sanitize::sanitize;

pub const LOADING_STATUS: &str = "Loading…";
pub const FALLBACK_ADVISORY: &str = "Could not load CSV questions. Using fallback list.";
pub const REQUIRED_ADVISORY: &str = "Please answer all rows before submitting.";

pub trait Clock {
    fn today(&self) -> NaiveDate;
    fn now_millis(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    pub today: NaiveDate,
    pub millis: i64,
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today
    }

    fn now_millis(&self) -> i64 {
        self.millis
    }
}

/// Fetches a remote document as text.
pub trait SourceFetcher {
    fn fetch(&mut self, url: &str) -> Result<String, SourceError>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Fallback,
}

/// Documents the caller must fetch before completing a load.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRequest {
    pub csv_url: Option<String>,
    pub options_url: Option<String>,
}

/// Fetch results for a [`LoadRequest`]; `None` means not fetched.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LoadResponse {
    pub csv: Option<Result<String, SourceError>>,
    pub options: Option<Result<String, SourceError>>,
}

/// Outbound notifications for the host, drained with
/// [`Session::take_effects`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Effect {
    RequestResize,
    PushDraft { records: Vec<SubmissionRecord> },
    SendSubmit { response: SubmitResponse },
}

/// Inbound lifecycle messages from the host.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum HostMessage {
    Ready,
    Reload,
    Populate(Value),
    Submit,
}

/// Serializable picture of everything the UI shows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView<'a> {
    pub state: LoadState,
    pub title: &'a str,
    pub headers: [&'a str; 3],
    pub rows: &'a [RenderedRow],
    pub advisory: Option<&'a str>,
    pub status: Option<&'a str>,
    pub reload_enabled: bool,
}

pub fn cache_busted(url: &str, millis: i64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}_={}", url, separator, millis)
}

pub struct Session<C = SystemClock> {
    config: Config,
    clock: C,
    state: LoadState,
    rows: Vec<Row>,
    options: Vec<String>,
    table: Vec<RenderedRow>,
    snapshot: Vec<SubmissionRecord>,
    loaded_once: bool,
    pending_populate: Option<Value>,
    populated: bool,
    advisory: Option<String>,
    status: Option<String>,
    effects: Vec<Effect>,
    diagnostics: Vec<Diagnostic>,
}

impl Session<SystemClock> {
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Session<C> {
    pub fn with_clock(config: Config, clock: C) -> Self {
        let options = config.choices.clone();
        Self {
            config,
            clock,
            state: LoadState::Idle,
            rows: Vec::new(),
            options,
            table: Vec::new(),
            snapshot: Vec::new(),
            loaded_once: false,
            pending_populate: None,
            populated: false,
            advisory: None,
            status: None,
            effects: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn table(&self) -> &[RenderedRow] {
        &self.table
    }

    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Diagnostics gathered since the last load started.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn reload_enabled(&self) -> bool {
        self.config.show_reload_button && self.state != LoadState::Loading
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            state: self.state,
            title: &self.config.table_title,
            headers: [
                self.config.col_question_header.as_str(),
                self.config.col_choice_header.as_str(),
                self.config.col_date_header.as_str(),
            ],
            rows: &self.table,
            advisory: self.advisory(),
            status: self.status(),
            reload_enabled: self.reload_enabled(),
        }
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Enters `Loading`, remembering current answers unless this is the
    /// first load.
    pub fn begin_load(&mut self) -> SessionResult<LoadRequest> {
        if self.state == LoadState::Loading {
            return Err(SessionError::LoadInFlight);
        }
        self.snapshot = if self.loaded_once {
            snapshot(&self.table)
        } else {
            Vec::new()
        };
        self.state = LoadState::Loading;
        self.status = Some(LOADING_STATUS.to_string());
        self.advisory = None;
        self.diagnostics.clear();

        let csv_url = self.config.csv_url.as_ref().map(|url| {
            if self.config.csv_cache_buster {
                cache_busted(url, self.clock.now_millis())
            } else {
                url.clone()
            }
        });
        info!(
            first = !self.loaded_once,
            csv_url = csv_url.as_deref().unwrap_or(""),
            "load started"
        );
        self.effects.push(Effect::RequestResize);
        self.push_draft();

        Ok(LoadRequest {
            csv_url,
            options_url: self.config.options_url.clone(),
        })
    }

    /// Finishes the load started by [`Session::begin_load`].
    ///
    /// Always ends with a renderable table: failures switch to the static
    /// question list and set the advisory.
    pub fn complete_load(&mut self, response: LoadResponse) {
        if self.state != LoadState::Loading {
            warn!(state = ?self.state, "load completion without a load in flight; ignored");
            return;
        }

        let options = self.resolve_options(response.options);
        let (rows, outcome) = self.resolve_rows(response.csv);
        self.options = options;
        self.rows = rows;
        self.table = project(&self.rows, &self.options, &self.config, self.clock.today());

        let carried = std::mem::take(&mut self.snapshot);
        if !carried.is_empty() {
            let report = restore_snapshot(&mut self.table, &carried);
            debug!(?report, "answers carried across reload");
        }

        match outcome {
            Ok(()) => {
                self.state = LoadState::Ready;
                info!(rows = self.table.len(), "load finished");
            }
            Err(err) => {
                warn!(%err, "question source failed; using fallback list");
                self.diagnostics.push(Diagnostic::warning(
                    W_SOURCE_UNAVAILABLE,
                    format!("{}; using fallback list", err),
                ));
                self.advisory = Some(FALLBACK_ADVISORY.to_string());
                self.state = LoadState::Fallback;
            }
        }
        self.status = None;
        self.loaded_once = true;

        if let Some(value) = self.pending_populate.take() {
            self.apply_populate(&value);
        }
        self.effects.push(Effect::RequestResize);
        self.push_draft();
    }

    /// Runs a whole load cycle, fetching through `fetcher`.
    pub fn load_with(&mut self, fetcher: &mut impl SourceFetcher) -> SessionResult<LoadState> {
        let request = self.begin_load()?;
        let response = LoadResponse {
            csv: request.csv_url.as_deref().map(|url| fetcher.fetch(url)),
            options: request.options_url.as_deref().map(|url| fetcher.fetch(url)),
        };
        self.complete_load(response);
        Ok(self.state)
    }

    pub fn dispatch(
        &mut self,
        message: HostMessage,
        fetcher: &mut impl SourceFetcher,
    ) -> SessionResult<Option<SubmitResponse>> {
        match message {
            HostMessage::Ready if self.state != LoadState::Idle => {
                debug!("ready received twice; ignored");
                Ok(None)
            }
            HostMessage::Ready | HostMessage::Reload => {
                self.load_with(fetcher)?;
                Ok(None)
            }
            HostMessage::Populate(value) => {
                self.populate(value);
                Ok(None)
            }
            HostMessage::Submit => Ok(Some(self.submit())),
        }
    }

    /// Offers a previously saved submission value, once.
    ///
    /// Arriving before the first load finishes, it is held and applied when
    /// the table is rendered. Returns true when answers were applied now.
    pub fn populate(&mut self, value: Value) -> bool {
        if self.populated || self.pending_populate.is_some() {
            debug!("persisted value already offered; ignored");
            return false;
        }
        match self.state {
            LoadState::Idle | LoadState::Loading => {
                self.pending_populate = Some(value);
                false
            }
            LoadState::Ready | LoadState::Fallback => self.apply_populate(&value),
        }
    }

    pub fn select(&mut self, index: usize, option: &str) -> SessionResult<()> {
        let today = self.clock.today();
        let always_redate = self.config.update_date_on_change;
        let row = self.editable_row(index)?;
        if !row.select(option, today, always_redate) {
            return Err(SessionError::OptionNotOffered {
                index,
                option: option.to_string(),
            });
        }
        self.effects.push(Effect::RequestResize);
        Ok(())
    }

    /// Sets or, with an empty string, clears a row's date. Dates after the
    /// row's `date_max` are refused.
    pub fn set_date(&mut self, index: usize, date: &str) -> SessionResult<()> {
        let parsed = if date.trim().is_empty() {
            None
        } else {
            Some(parse_date(date).ok_or_else(|| SessionError::InvalidDate(date.to_string()))?)
        };
        let row = self.editable_row(index)?;
        if let (Some(date), Some(max)) = (parsed, row.date_max) {
            if date > max {
                return Err(SessionError::DateAfterMax { index, date, max });
            }
        }
        row.set_date(parsed);
        self.effects.push(Effect::RequestResize);
        Ok(())
    }

    pub fn submit(&mut self) -> SubmitResponse {
        let response = submission(&self.table, self.config.enforce_required);
        if response.valid {
            self.advisory = None;
        } else {
            let missing = unanswered(&self.table);
            info!(missing = missing.len(), "submit rejected");
            self.diagnostics.push(Diagnostic::error(
                E_ANSWERS_MISSING,
                format!("{} row(s) have no answer: {:?}", missing.len(), missing),
            ));
            self.advisory = Some(REQUIRED_ADVISORY.to_string());
        }
        self.effects.push(Effect::SendSubmit {
            response: response.clone(),
        });
        self.effects.push(Effect::RequestResize);
        response
    }

    /// Current answers in submission form.
    pub fn records(&self) -> Vec<SubmissionRecord> {
        collect(&self.table)
    }

    fn editable_row(&mut self, index: usize) -> SessionResult<&mut RenderedRow> {
        if matches!(self.state, LoadState::Idle | LoadState::Loading) {
            return Err(SessionError::NotReady);
        }
        let len = self.table.len();
        self.table
            .get_mut(index)
            .ok_or(SessionError::RowOutOfRange { index, len })
    }

    fn apply_populate(&mut self, value: &Value) -> bool {
        self.populated = true;
        if value.is_null() || value.as_str().is_some_and(|text| text.trim().is_empty()) {
            return false;
        }
        match parse_persisted(value) {
            Ok(answers) => {
                let report = restore(&mut self.table, &answers);
                info!(?report, "persisted answers restored");
                self.effects.push(Effect::RequestResize);
                true
            }
            Err(err) => {
                warn!(%err, "persisted value skipped");
                self.diagnostics
                    .push(Diagnostic::warning(W_PERSISTED_MALFORMED, err.to_string()));
                false
            }
        }
    }

    fn resolve_options(&mut self, fetched: Option<Result<String, SourceError>>) -> Vec<String> {
        if self.config.options_url.is_none() {
            return self.config.choices.clone();
        }
        let parsed = match fetched.unwrap_or(Err(SourceError::NotFetched)) {
            Ok(body) => parse_remote_options(&body),
            Err(err) => Err(Diagnostic::warning(
                W_SOURCE_UNAVAILABLE,
                format!("remote options unavailable: {}", err),
            )),
        };
        match parsed {
            Ok(options) => options,
            Err(diag) => {
                warn!(reason = %diag.message, "using configured options");
                self.diagnostics.push(diag);
                self.config.choices.clone()
            }
        }
    }

    fn resolve_rows(
        &mut self,
        fetched: Option<Result<String, SourceError>>,
    ) -> (Vec<Row>, Result<(), SourceError>) {
        let text = if self.config.csv_url.is_some() {
            fetched.unwrap_or(Err(SourceError::NotFetched))
        } else if let Some(text) = &self.config.csv_text {
            Ok(text.clone())
        } else {
            return (self.fallback_rows(), Ok(()));
        };

        let extracted = text.and_then(|text| {
            if text.trim().is_empty() {
                Err(SourceError::EmptyBody)
            } else {
                rows_from_csv(&text, &self.config.csv)
            }
        });
        match extracted {
            Ok(mut extraction) => {
                self.diagnostics.append(&mut extraction.diagnostics);
                (extraction.rows, Ok(()))
            }
            Err(err) => (self.fallback_rows(), Err(err)),
        }
    }

    fn fallback_rows(&self) -> Vec<Row> {
        self.config
            .questions
            .iter()
            .map(|question| question.trim())
            .filter(|question| !question.is_empty())
            .map(sanitize)
            .filter(|question| !question.trim().is_empty())
            .map(Row::new)
            .collect()
    }

    fn push_draft(&mut self) {
        let records = collect(&self.table);
        self.effects.push(Effect::PushDraft { records });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_buster_respects_existing_query() {
        assert_eq!(cache_busted("https://x/q.csv", 42), "https://x/q.csv?_=42");
        assert_eq!(
            cache_busted("https://x/q.csv?gid=1", 42),
            "https://x/q.csv?gid=1&_=42"
        );
    }

    #[test]
    fn second_begin_while_loading_is_refused() {
        let clock = FixedClock {
            today: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            millis: 7,
        };
        let config = Config {
            csv_url: Some("https://x/q.csv".to_string()),
            ..Config::default()
        };
        let mut session = Session::with_clock(config, clock);
        let request = session.begin_load().expect("first load");
        assert_eq!(request.csv_url.as_deref(), Some("https://x/q.csv?_=7"));
        assert!(!session.reload_enabled());
        assert_eq!(session.status(), Some(LOADING_STATUS));
        assert_eq!(session.begin_load(), Err(SessionError::LoadInFlight));
    }

    #[test]
    fn host_messages_use_tagged_json() {
        let message: HostMessage =
            serde_json::from_str(r#"{"type":"populate","payload":"[]"}"#).expect("json");
        assert_eq!(message, HostMessage::Populate(Value::String("[]".to_string())));
        let message: HostMessage = serde_json::from_str(r#"{"type":"submit"}"#).expect("json");
        assert_eq!(message, HostMessage::Submit);
    }
}
