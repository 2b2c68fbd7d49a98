use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use checkgrid_core::{
    Config, Diagnostic, DiagnosticSeverity, LoadState, Session, SourceError, SourceFetcher,
    emit_table_html,
};
use clap::{Parser, ValueEnum};
use reqwest::blocking::Client as HttpClient;
use serde_json::{Map, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "checkgrid", version, about = "Render a checklist table from CSV questions")]
struct Cli {
    /// CSV file with the questions, `-` for stdin.
    input: Option<PathBuf>,
    /// JSON object of widget settings.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Fetch the CSV from this URL instead of reading a file.
    #[arg(long)]
    url: Option<String>,
    /// Fetch the answer options (a JSON array of strings) from this URL.
    #[arg(long = "options-url")]
    options_url: Option<String>,
    /// Treat the first CSV record as data.
    #[arg(long = "no-header")]
    no_header: bool,
    #[arg(long = "question-column")]
    question_column: Option<String>,
    #[arg(long = "choices-column")]
    choices_column: Option<String>,
    #[arg(long = "code-column")]
    code_column: Option<String>,
    /// Separator between options inside the choices cell.
    #[arg(long)]
    delimiter: Option<String>,
    /// Previously submitted answers to restore.
    #[arg(long)]
    answers: Option<PathBuf>,
    /// Reject submission while any row is unanswered.
    #[arg(long = "require-all")]
    require_all: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    /// Print the submission payload instead of the table.
    #[arg(long)]
    submit: bool,
    #[arg(long, value_enum)]
    diagnostics: Option<DiagnosticsMode>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Html,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DiagnosticsMode {
    Json,
    Pretty,
}

struct HttpFetcher {
    client: HttpClient,
}

impl HttpFetcher {
    fn new() -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&mut self, url: &str) -> Result<String, SourceError> {
        debug!(url, "fetching");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| SourceError::Network(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
            });
        }
        response
            .text()
            .map_err(|err| SourceError::Network(err.to_string()))
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("checkgrid: {:#}", err);
            ExitCode::from(2)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let settings = settings_from_cli(cli)?;
    let config = Config::from_settings(&settings);
    let mut session = Session::new(config);

    if let Some(path) = &cli.answers {
        let saved = read_source(path)?;
        session.populate(Value::String(saved));
    }

    let mut fetcher = HttpFetcher::new()?;
    let state = session.load_with(&mut fetcher)?;
    info!(?state, rows = session.table().len(), "checklist loaded");

    let mut failed = state == LoadState::Fallback;
    if cli.submit {
        let response = session.submit();
        failed |= !response.valid;
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&session.view())?),
            OutputFormat::Html => print!("{}", emit_table_html(session.config(), session.table())),
        }
    }

    if let Some(mode) = cli.diagnostics {
        emit_diagnostics(session.diagnostics(), mode)?;
    }
    if session
        .diagnostics()
        .iter()
        .any(|diag| diag.severity == DiagnosticSeverity::Error)
    {
        failed = true;
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Merges the settings file with command-line overrides.
fn settings_from_cli(cli: &Cli) -> Result<Map<String, Value>> {
    let mut settings = match &cli.settings {
        Some(path) => {
            let text = read_source(path)?;
            match serde_json::from_str(&text)
                .with_context(|| format!("{} is not valid JSON", path.display()))?
            {
                Value::Object(map) => map,
                _ => bail!("{} must hold a JSON object", path.display()),
            }
        }
        None => Map::new(),
    };

    let mut set = |name: &str, value: Value| {
        settings.insert(name.to_string(), value);
    };
    if let Some(url) = &cli.url {
        set("csvUrl", Value::from(url.as_str()));
    }
    if let Some(url) = &cli.options_url {
        set("optionsUrl", Value::from(url.as_str()));
    }
    if cli.no_header {
        set("csvHasHeader", Value::Bool(false));
    }
    if let Some(column) = &cli.question_column {
        set("csvQuestionColumn", Value::from(column.as_str()));
    }
    if let Some(column) = &cli.choices_column {
        set("csvChoicesColumn", Value::from(column.as_str()));
    }
    if let Some(column) = &cli.code_column {
        set("csvCodeColumn", Value::from(column.as_str()));
    }
    if let Some(delimiter) = &cli.delimiter {
        set("csvChoicesDelimiter", Value::from(delimiter.as_str()));
    }
    if cli.require_all {
        set("enforceRequired", Value::Bool(true));
    }

    let has_source = ["csvUrl", "csvText"]
        .iter()
        .any(|name| settings.get(*name).is_some_and(|value| !value.is_null()));
    match &cli.input {
        Some(path) => {
            let text = read_source(path)?;
            settings.insert("csvText".to_string(), Value::String(text));
        }
        None if !has_source && !settings.contains_key("questions") => {
            let text = read_source(Path::new("-"))?;
            settings.insert("csvText".to_string(), Value::String(text));
        }
        None => {}
    }
    Ok(settings)
}

fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn emit_diagnostics(diagnostics: &[Diagnostic], mode: DiagnosticsMode) -> Result<()> {
    match mode {
        DiagnosticsMode::Json => eprintln!("{}", serde_json::to_string_pretty(diagnostics)?),
        DiagnosticsMode::Pretty => {
            for diagnostic in diagnostics {
                eprintln!("{}", diagnostic_to_pretty(diagnostic));
            }
        }
    }
    Ok(())
}

fn diagnostic_to_pretty(diagnostic: &Diagnostic) -> String {
    let location = match diagnostic.range {
        Some(range) => format!("{}:{}", range.start.line + 1, range.start.character + 1),
        None => "-:-".to_string(),
    };
    format!(
        "{} {} {} {}",
        location,
        diagnostic.severity.label(),
        diagnostic.code,
        diagnostic.message
    )
}
