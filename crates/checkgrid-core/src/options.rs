use serde_json::Value;

use crate::diagnostic::{Diagnostic, W_OPTIONS_MALFORMED};

pub fn default_choices() -> Vec<String> {
    ["Yes", "No", "N/A"].iter().map(|s| s.to_string()).collect()
}

/// Coerces the `choices` setting into an option list.
///
/// Unset values (null, false, 0, "") keep `fallback`. Strings are read as a
/// JSON array when they start with `[` and parse, otherwise as a comma list.
pub fn normalize_choices(value: &Value, fallback: &[String]) -> Vec<String> {
    match value {
        Value::Null | Value::Bool(false) => fallback.to_vec(),
        Value::Number(number) if number.as_f64() == Some(0.0) => fallback.to_vec(),
        Value::String(text) if text.is_empty() => fallback.to_vec(),
        Value::Array(items) => items.iter().filter_map(scalar_label).collect(),
        Value::String(text) => {
            let text = text.trim();
            if text.starts_with('[') {
                if let Ok(list) = serde_json::from_str::<Vec<Value>>(text) {
                    return list.iter().filter_map(scalar_label).collect();
                }
            }
            text.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        }
        other => scalar_label(other).into_iter().collect(),
    }
}

/// Reads a remote options document, which must be a non-empty JSON array of
/// strings.
pub fn parse_remote_options(body: &str) -> Result<Vec<String>, Diagnostic> {
    let value: Value = serde_json::from_str(body).map_err(|err| {
        Diagnostic::warning(
            W_OPTIONS_MALFORMED,
            format!("remote options are not JSON: {}", err),
        )
    })?;
    let Value::Array(items) = value else {
        return Err(Diagnostic::warning(
            W_OPTIONS_MALFORMED,
            "remote options must be a JSON array",
        ));
    };

    let mut options = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(text) if !text.trim().is_empty() => options.push(text.trim().to_string()),
            Value::String(_) => {}
            other => {
                return Err(Diagnostic::warning(
                    W_OPTIONS_MALFORMED,
                    format!("remote options must be strings, found {}", other),
                ));
            }
        }
    }
    if options.is_empty() {
        return Err(Diagnostic::warning(
            W_OPTIONS_MALFORMED,
            "remote options list is empty",
        ));
    }
    Ok(options)
}

fn scalar_label(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn unset_choices_keep_fallback() {
        let fallback = default_choices();
        assert_eq!(normalize_choices(&Value::Null, &fallback), fallback);
        assert_eq!(normalize_choices(&json!(""), &fallback), fallback);
        assert_eq!(normalize_choices(&json!(false), &fallback), fallback);
    }

    #[test]
    fn choices_accept_lists_json_and_commas() {
        let fallback = default_choices();
        assert_eq!(
            normalize_choices(&json!(["Done", "Pending"]), &fallback),
            strings(&["Done", "Pending"])
        );
        assert_eq!(
            normalize_choices(&json!("[\"A\", \"B\"]"), &fallback),
            strings(&["A", "B"])
        );
        assert_eq!(
            normalize_choices(&json!(" Agree, Disagree ,, Unsure"), &fallback),
            strings(&["Agree", "Disagree", "Unsure"])
        );
        assert!(normalize_choices(&json!("   "), &fallback).is_empty());
    }

    #[test]
    fn broken_json_choices_fall_back_to_comma_split() {
        assert_eq!(
            normalize_choices(&json!("[A, B"), &default_choices()),
            strings(&["[A", "B"])
        );
    }

    #[test]
    fn remote_options_must_be_string_arrays() {
        assert_eq!(
            parse_remote_options(r#"["Met", " Not met "]"#),
            Ok(strings(&["Met", "Not met"]))
        );
        for body in [r#"{"options":["a"]}"#, "[1, 2]", "[]", "not json"] {
            let err = parse_remote_options(body).expect_err(body);
            assert_eq!(err.code, W_OPTIONS_MALFORMED);
        }
    }
}
