use std::collections::HashMap;
use std::hash::BuildHasher;

use serde_json::{Map, Value};

use crate::column::ColumnSpec;
use crate::extract::{CsvSchema, DEFAULT_CHOICES_DELIMITER};
use crate::options::{default_choices, normalize_choices};

/// Read access to the host's widget settings.
///
/// `None` (or a null value) means "use the default".
pub trait SettingsSource {
    fn setting(&self, name: &str) -> Option<Value>;
}

impl SettingsSource for Map<String, Value> {
    fn setting(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<S: BuildHasher> SettingsSource for HashMap<String, Value, S> {
    fn setting(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Settings for one load cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub table_title: String,
    pub col_question_header: String,
    pub col_choice_header: String,
    pub col_date_header: String,
    pub choices: Vec<String>,
    pub enforce_required: bool,
    pub restrict_max_today: bool,
    pub update_date_on_change: bool,
    pub show_reload_button: bool,
    pub csv_url: Option<String>,
    pub csv_text: Option<String>,
    pub csv: CsvSchema,
    pub csv_cache_buster: bool,
    pub options_url: Option<String>,
    pub questions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_title: "Learning & Development Evaluation".to_string(),
            col_question_header: "Question".to_string(),
            col_choice_header: "Response".to_string(),
            col_date_header: "Date".to_string(),
            choices: default_choices(),
            enforce_required: false,
            restrict_max_today: true,
            update_date_on_change: false,
            show_reload_button: true,
            csv_url: None,
            csv_text: None,
            csv: CsvSchema::default(),
            csv_cache_buster: true,
            options_url: None,
            questions: [
                "Access Employee Portal within PageUp",
                "Complete Workplace Behaviour training",
                "Review HSE Essentials procedures",
                "Navigate to Operational Excellence Framework",
                "Complete training plan 1:1 with Staffing Development",
            ]
            .iter()
            .map(|q| q.to_string())
            .collect(),
        }
    }
}

impl Config {
    pub fn from_settings(source: &impl SettingsSource) -> Self {
        let defaults = Config::default();
        let get = |name: &str| source.setting(name).filter(|value| !value.is_null());

        let text = |name: &str, default: &str| match get(name) {
            Some(Value::String(value)) => value,
            Some(Value::Number(value)) => value.to_string(),
            _ => default.to_string(),
        };
        let flag = |name: &str, default: bool| get(name).map_or(default, |value| truthy(&value));
        let unless_false =
            |name: &str, default: bool| get(name).map_or(default, |value| !is_false(&value));
        let optional_text = |name: &str| match get(name) {
            Some(Value::String(value)) if !value.trim().is_empty() => Some(value),
            _ => None,
        };

        let choices = match get("choices") {
            Some(value) => normalize_choices(&value, &defaults.choices),
            None => defaults.choices.clone(),
        };

        let question = match get("csvQuestionColumn") {
            Some(value) => column_spec(&value).unwrap_or(ColumnSpec::Index(0)),
            None => defaults.csv.question.clone(),
        };
        let optional_column = |name: &str, default: &Option<ColumnSpec>| match get(name) {
            Some(value) => column_spec(&value),
            None => default.clone(),
        };
        let mut delimiter = text("csvChoicesDelimiter", DEFAULT_CHOICES_DELIMITER);
        if delimiter.is_empty() {
            delimiter = DEFAULT_CHOICES_DELIMITER.to_string();
        }
        let csv = CsvSchema {
            has_header: flag("csvHasHeader", defaults.csv.has_header),
            question,
            choices: optional_column("csvChoicesColumn", &defaults.csv.choices),
            code: optional_column("csvCodeColumn", &defaults.csv.code),
            choices_delimiter: delimiter,
        };

        let questions = match get("questions") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.clone()),
                    Value::Number(number) => Some(number.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(text)) => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            _ => defaults.questions.clone(),
        };

        Config {
            table_title: text("tableTitle", &defaults.table_title),
            col_question_header: text("colQuestionHeader", &defaults.col_question_header),
            col_choice_header: text("colChoiceHeader", &defaults.col_choice_header),
            col_date_header: text("colDateHeader", &defaults.col_date_header),
            choices,
            enforce_required: flag("enforceRequired", defaults.enforce_required),
            restrict_max_today: unless_false("restrictMaxToday", defaults.restrict_max_today),
            update_date_on_change: flag("updateDateOnChange", defaults.update_date_on_change),
            show_reload_button: unless_false("showReloadButton", defaults.show_reload_button),
            csv_url: optional_text("csvUrl").map(|url| url.trim().to_string()),
            // Any non-empty text is a source, even if it yields no rows.
            csv_text: match get("csvText") {
                Some(Value::String(value)) if !value.is_empty() => Some(value),
                _ => None,
            },
            csv,
            csv_cache_buster: flag("csvCacheBuster", defaults.csv_cache_buster),
            options_url: optional_text("optionsUrl").map(|url| url.trim().to_string()),
            questions,
        }
    }

    /// True when rows come from CSV rather than the static question list.
    pub fn has_dynamic_source(&self) -> bool {
        self.csv_url.is_some() || self.csv_text.is_some()
    }
}

/// Host truthiness, with the literal text "false" also counting as false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty() && !text.eq_ignore_ascii_case("false"),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn is_false(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => !flag,
        Value::String(text) => text.eq_ignore_ascii_case("false"),
        _ => false,
    }
}

/// Column settings: numbers and digit strings are indices, blank disables.
fn column_spec(value: &Value) -> Option<ColumnSpec> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(ColumnSpec::Index),
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(ColumnSpec::parse(text)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn settings(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn empty_settings_give_defaults() {
        assert_eq!(Config::from_settings(&Map::new()), Config::default());
    }

    #[test]
    fn booleans_follow_host_truthiness() {
        let config = Config::from_settings(&settings(json!({
            "enforceRequired": "yes",
            "updateDateOnChange": 0,
            "restrictMaxToday": "",
            "showReloadButton": "false",
            "csvHasHeader": "false",
            "csvCacheBuster": false,
        })));
        assert!(config.enforce_required);
        assert!(!config.update_date_on_change);
        assert!(config.restrict_max_today);
        assert!(!config.show_reload_button);
        assert!(!config.csv.has_header);
        assert!(!config.csv_cache_buster);
    }

    #[test]
    fn column_settings_accept_numbers_and_names() {
        let config = Config::from_settings(&settings(json!({
            "csvQuestionColumn": "2",
            "csvChoicesColumn": 3,
            "csvCodeColumn": "",
            "csvChoicesDelimiter": "",
        })));
        assert_eq!(config.csv.question, ColumnSpec::Index(2));
        assert_eq!(config.csv.choices, Some(ColumnSpec::Index(3)));
        assert_eq!(config.csv.code, None);
        assert_eq!(config.csv.choices_delimiter, "|");
    }

    #[test]
    fn questions_accept_text_blocks() {
        let config = Config::from_settings(&settings(json!({
            "questions": "First\r\n\n  Second  \n",
            "csvUrl": "  https://example.com/q.csv ",
            "csvText": "",
        })));
        assert_eq!(config.questions, vec!["First", "Second"]);
        assert_eq!(config.csv_url.as_deref(), Some("https://example.com/q.csv"));
        assert_eq!(config.csv_text, None);
        assert!(config.has_dynamic_source());
    }

    #[test]
    fn blank_csv_text_still_counts_as_a_source() {
        let config = Config::from_settings(&settings(json!({ "csvText": "  \n " })));
        assert_eq!(config.csv_text.as_deref(), Some("  \n "));
        assert!(config.has_dynamic_source());
    }
}
