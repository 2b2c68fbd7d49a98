use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

fn bin_path() -> PathBuf {
    if let Some(path) = env::var_os("CARGO_BIN_EXE_checkgrid") {
        return PathBuf::from(path);
    }
    let exe = env::current_exe().expect("current exe");
    let mut debug_dir = exe.as_path();
    while let Some(parent) = debug_dir.parent() {
        if parent.file_name().and_then(|name| name.to_str()) == Some("debug") {
            let candidate = parent.join("checkgrid");
            if candidate.exists() {
                return candidate;
            }
        }
        debug_dir = parent;
    }
    panic!("binary path missing");
}

fn temp_file(name: &str, extension: &str, contents: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("time");
    let file_name = format!(
        "checkgrid_cli_{}_{}_{}.{}",
        name,
        now.as_secs(),
        now.subsec_nanos(),
        extension
    );
    path.push(file_name);
    fs::write(&path, contents).expect("write temp file");
    path
}

const CHECKLIST: &str = "Question,Choices,Code\nDo X?,Yes|No,X1\nDo Y?,,Y1\n";

#[test]
fn json_view_lists_rows_and_options() {
    let input = temp_file("view", "csv", CHECKLIST);
    let output = Command::new(bin_path())
        .args([input.to_str().expect("path")])
        .output()
        .expect("run");

    assert!(output.status.success(), "expected success exit code");
    let view: Value = serde_json::from_slice(&output.stdout).expect("json view");
    assert_eq!(view["state"], "ready");
    let rows = view["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["options"], serde_json::json!(["Yes", "No"]));
    assert_eq!(rows[1]["options"], serde_json::json!(["Yes", "No", "N/A"]));
    assert_eq!(rows[1]["code"], "Y1");
}

#[test]
fn html_output_renders_radio_groups() {
    let input = temp_file("html", "csv", CHECKLIST);
    let output = Command::new(bin_path())
        .args(["--format", "html", input.to_str().expect("path")])
        .output()
        .expect("run");

    assert!(output.status.success(), "expected success exit code");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name=\"row-0-choice\""));
    assert!(stdout.contains("type=\"date\""));
}

#[test]
fn submit_with_required_answers_fails() {
    let input = temp_file("required", "csv", CHECKLIST);
    let output = Command::new(bin_path())
        .args([
            "--submit",
            "--require-all",
            "--diagnostics",
            "pretty",
            input.to_str().expect("path"),
        ])
        .output()
        .expect("run");

    assert!(!output.status.success(), "expected error exit code");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"valid\": false"));
    assert!(!stdout.contains("\"value\""));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("E_ANSWERS_MISSING"),
        "expected E_ANSWERS_MISSING in stderr"
    );
}

#[test]
fn saved_answers_are_restored_before_submit() {
    let input = temp_file("restore", "csv", CHECKLIST);
    let answers = temp_file(
        "restore_answers",
        "json",
        r#"[{"question":"Do X?","choice":"No","date":"2024-01-02"},{"question":"Do Y?","choice":"N/A","date":"2024-01-03"}]"#,
    );
    let output = Command::new(bin_path())
        .args([
            "--submit",
            "--require-all",
            "--answers",
            answers.to_str().expect("path"),
            input.to_str().expect("path"),
        ])
        .output()
        .expect("run");

    assert!(output.status.success(), "expected success exit code");
    let response: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(response["valid"], true);
    let records: Value =
        serde_json::from_str(response["value"].as_str().expect("value")).expect("records");
    assert_eq!(records[0]["choice"], "No");
    assert_eq!(records[0]["date"], "2024-01-02");
    assert_eq!(records[1]["code"], "Y1");
}

#[test]
fn diagnostics_json_reports_csv_warnings() {
    let input = temp_file("stray", "csv", "Question\nA \"quoted\" word\n");
    let output = Command::new(bin_path())
        .args(["--diagnostics", "json", input.to_str().expect("path")])
        .output()
        .expect("run");

    assert!(output.status.success(), "expected success exit code");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("\"code\": \"W_CSV_STRAY_QUOTE\""),
        "expected W_CSV_STRAY_QUOTE in stderr"
    );
}

#[test]
fn settings_file_supplies_static_questions() {
    let settings = temp_file(
        "settings",
        "json",
        r#"{"questions":"First\nSecond","choices":"Pass,Fail","tableTitle":"Audit"}"#,
    );
    let output = Command::new(bin_path())
        .args(["--settings", settings.to_str().expect("path")])
        .output()
        .expect("run");

    assert!(output.status.success(), "expected success exit code");
    let view: Value = serde_json::from_slice(&output.stdout).expect("json view");
    assert_eq!(view["title"], "Audit");
    assert_eq!(view["rows"][1]["questionText"], "Second");
    assert_eq!(view["rows"][0]["options"], serde_json::json!(["Pass", "Fail"]));
}
