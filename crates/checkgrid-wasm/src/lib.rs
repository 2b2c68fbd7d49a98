use checkgrid_core::{
    Config, Diagnostic, HostMessage, LoadResponse, Session, SourceError, emit_table_html,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use wasm_bindgen::prelude::*;

/// What the page's `fetch` calls produced for a load request.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchResults {
    csv_text: Option<String>,
    csv_status: Option<u16>,
    csv_error: Option<String>,
    options_text: Option<String>,
    options_status: Option<u16>,
    options_error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsDiagnostic {
    code: String,
    message: String,
    severity: String,
    range: Option<JsRange>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsRange {
    start_line: usize,
    start_col: usize,
    end_line: usize,
    end_col: usize,
}

/// One checklist instance, driven by the hosting page.
#[wasm_bindgen]
pub struct Widget {
    session: Session,
}

#[wasm_bindgen]
impl Widget {
    #[wasm_bindgen(constructor)]
    pub fn new(settings: JsValue) -> Result<Widget, JsValue> {
        let settings = settings_from_js(settings)?;
        Ok(Widget {
            session: Session::new(Config::from_settings(&settings)),
        })
    }

    /// Starts a load and returns `{ csvUrl, optionsUrl }` for the page to fetch.
    #[wasm_bindgen(js_name = beginLoad)]
    pub fn begin_load(&mut self) -> Result<JsValue, JsValue> {
        let request = self.session.begin_load().map_err(to_js_error)?;
        to_js(&request)
    }

    #[wasm_bindgen(js_name = completeLoad)]
    pub fn complete_load(&mut self, results: JsValue) -> Result<JsValue, JsValue> {
        let results: FetchResults = if results.is_null() || results.is_undefined() {
            FetchResults::default()
        } else {
            serde_wasm_bindgen::from_value(results).map_err(to_js_error)?
        };
        let response = LoadResponse {
            csv: fetch_outcome(results.csv_text, results.csv_status, results.csv_error),
            options: fetch_outcome(
                results.options_text,
                results.options_status,
                results.options_error,
            ),
        };
        self.session.complete_load(response);
        debug!(state = ?self.session.state(), "load completed from page");
        to_js(&self.session.state())
    }

    /// Handles a `{ type, payload }` message from the host. Only `populate`
    /// and `submit` are handled here; the page answers `ready` and `reload`
    /// with `beginLoad`.
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&mut self, message: JsValue) -> Result<JsValue, JsValue> {
        let message: HostMessage = serde_wasm_bindgen::from_value(message).map_err(to_js_error)?;
        match message {
            HostMessage::Populate(value) => to_js(&self.session.populate(value)),
            HostMessage::Submit => to_js(&self.session.submit()),
            HostMessage::Ready | HostMessage::Reload => Err(JsValue::from_str(
                "ready and reload are answered with beginLoad",
            )),
        }
    }

    pub fn select(&mut self, index: usize, option: &str) -> Result<(), JsValue> {
        self.session.select(index, option).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = setDate)]
    pub fn set_date(&mut self, index: usize, date: &str) -> Result<(), JsValue> {
        self.session.set_date(index, date).map_err(to_js_error)
    }

    pub fn populate(&mut self, value: JsValue) -> Result<bool, JsValue> {
        let value: Value = if value.is_undefined() {
            Value::Null
        } else {
            serde_wasm_bindgen::from_value(value).map_err(to_js_error)?
        };
        Ok(self.session.populate(value))
    }

    pub fn submit(&mut self) -> Result<JsValue, JsValue> {
        let response = self.session.submit();
        to_js(&response)
    }

    pub fn view(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.view())
    }

    #[wasm_bindgen(js_name = tableHtml)]
    pub fn table_html(&self) -> String {
        emit_table_html(self.session.config(), self.session.table())
    }

    #[wasm_bindgen(js_name = takeEffects)]
    pub fn take_effects(&mut self) -> Result<JsValue, JsValue> {
        let effects = self.session.take_effects();
        to_js(&effects)
    }

    pub fn diagnostics(&self) -> Result<JsValue, JsValue> {
        let diagnostics: Vec<JsDiagnostic> = self
            .session
            .diagnostics()
            .iter()
            .map(js_diagnostic)
            .collect();
        to_js(&diagnostics)
    }
}

fn settings_from_js(value: JsValue) -> Result<Map<String, Value>, JsValue> {
    if value.is_null() || value.is_undefined() {
        return Ok(Map::new());
    }
    serde_wasm_bindgen::from_value(value).map_err(to_js_error)
}

fn fetch_outcome(
    text: Option<String>,
    status: Option<u16>,
    error: Option<String>,
) -> Option<Result<String, SourceError>> {
    match (text, status, error) {
        (_, Some(status), _) if !(200..300).contains(&status) => {
            Some(Err(SourceError::Http { status }))
        }
        (_, _, Some(error)) => Some(Err(SourceError::Network(error))),
        (Some(text), _, _) => Some(Ok(text)),
        (None, Some(_), None) => Some(Err(SourceError::EmptyBody)),
        (None, None, None) => None,
    }
}

fn js_diagnostic(diag: &Diagnostic) -> JsDiagnostic {
    JsDiagnostic {
        code: diag.code.to_string(),
        message: diag.message.clone(),
        severity: diag.severity.label().to_string(),
        range: diag.range.map(|range| JsRange {
            start_line: range.start.line,
            start_col: range.start.character,
            end_line: range.end.line,
            end_col: range.end.character,
        }),
    }
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(to_js_error)
}

fn to_js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_outcome_prefers_failures() {
        assert_eq!(
            fetch_outcome(Some("a".into()), Some(500), None),
            Some(Err(SourceError::Http { status: 500 }))
        );
        assert_eq!(
            fetch_outcome(None, None, Some("offline".into())),
            Some(Err(SourceError::Network("offline".into())))
        );
        assert_eq!(
            fetch_outcome(Some("a".into()), Some(200), None),
            Some(Ok("a".to_string()))
        );
        assert_eq!(fetch_outcome(None, None, None), None);
    }
}
