//! csv-append: append JSON Lines records to an existing CSV file.
//!
//! Stands in for the host engine: loads the settings blob, declares the
//! incoming fields, streams records through the plugin lifecycle and reports
//! notices through the log.

use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal};
use std::path::PathBuf;
use std::process;

use ca_common::{FieldDef, FieldSchema};
use ca_config::{RawSettings, SettingKey};
use ca_core::{CsvAppendPlugin, ExitCode, JsonLinesReader, TracingLink, CHUNK_SIZE};
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Records between progress updates.
const PROGRESS_EVERY: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "csv-append",
    version,
    about = "Append records to an existing delimited text file"
)]
struct Cli {
    /// Settings file (XML or JSON); individual flags override its values
    #[arg(long, env = "CSV_APPEND_SETTINGS")]
    settings: Option<PathBuf>,

    /// Target file; must already exist
    #[arg(long, env = "CSV_APPEND_OUTPUT")]
    output: Option<String>,

    /// Single-byte field delimiter
    #[arg(long, env = "CSV_APPEND_DELIMITER", allow_hyphen_values = true)]
    delimiter: Option<String>,

    /// Quoting policy: auto, text, none, or anything else for always
    #[arg(long, env = "CSV_APPEND_QUOTE")]
    quote: Option<String>,

    /// Output code page label (utf-8, latin1, shift_jis, ...)
    #[arg(long, env = "CSV_APPEND_CODEPAGE")]
    codepage: Option<String>,

    /// Line ending: windows, unix, or anything else for CR
    #[arg(long, env = "CSV_APPEND_NEWLINE")]
    newline: Option<String>,

    /// Resolve a relative output path against this directory
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Incoming field, in record order
    #[arg(long = "field", value_name = "NAME:TYPE", required = true)]
    fields: Vec<String>,

    /// JSON Lines input; stdin when omitted or `-`
    #[arg(long)]
    input: Option<PathBuf>,

    /// Records buffered before each append
    #[arg(long, default_value_t = CHUNK_SIZE)]
    batch_size: usize,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn settings(&self) -> Result<RawSettings, ca_common::Error> {
        let mut raw = match &self.settings {
            Some(path) => RawSettings::load(path)?,
            None => RawSettings::default(),
        };
        let overrides = [
            (SettingKey::FileOutputPath, &self.output),
            (SettingKey::Delimiter, &self.delimiter),
            (SettingKey::Quote, &self.quote),
            (SettingKey::CodePage, &self.codepage),
            (SettingKey::Newline, &self.newline),
        ];
        for (key, value) in overrides {
            if let Some(value) = value {
                raw.set(key, value.as_str());
            }
        }
        Ok(raw)
    }

    fn schema(&self) -> Result<FieldSchema, ca_common::Error> {
        self.fields.iter().map(|spec| FieldDef::parse(spec)).collect()
    }

    fn log_filter(&self) -> EnvFilter {
        let level = match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    }
}

fn init_logging(cli: &Cli) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter())
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal());
    let result = match cli.log_format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(err) = result {
        eprintln!("csv-append: logging unavailable: {err}");
    }
}

fn open_input(path: Option<&PathBuf>) -> io::Result<(Box<dyn BufRead>, Option<u64>)> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path)?;
            let len = file.metadata().ok().map(|m| m.len());
            Ok((Box::new(BufReader::new(file)), len))
        }
        _ => Ok((Box::new(io::stdin().lock()), None)),
    }
}

fn run(cli: &Cli) -> ExitCode {
    let raw = match cli.settings() {
        Ok(raw) => raw,
        Err(err) => {
            error!(code = err.code(), "{err}");
            return ExitCode::from_error(&err);
        }
    };
    let schema = match cli.schema() {
        Ok(schema) => schema,
        Err(err) => {
            error!(code = err.code(), "{err}");
            return ExitCode::from_error(&err);
        }
    };

    let mut plugin = CsvAppendPlugin::new(TracingLink).with_batch_size(cli.batch_size);
    if let Some(dir) = &cli.output_dir {
        plugin = plugin.with_base_dir(dir);
    }

    if let Err(err) = plugin.initialize(&raw) {
        plugin.close();
        return ExitCode::from_error(&err.into());
    }
    if let Err(err) = plugin.bind_schema(schema.clone()) {
        plugin.close();
        return ExitCode::from_error(&err.into());
    }

    let (reader, total_bytes) = match open_input(cli.input.as_ref()) {
        Ok(input) => input,
        Err(err) => {
            error!(error = %err, "failed to open input");
            plugin.close();
            return ExitCode::IoError;
        }
    };

    let mut records = JsonLinesReader::new(reader, schema);
    let mut count: u64 = 0;
    let mut failure = None;
    loop {
        match records.next_record() {
            Ok(Some(record)) => {
                plugin.push_record(&record);
                count += 1;
                if count % PROGRESS_EVERY == 0 {
                    if let Some(total) = total_bytes.filter(|t| *t > 0) {
                        plugin.update_progress(records.bytes_read() as f64 / total as f64);
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                error!(code = err.code(), records = count, "{err}");
                failure = Some(ExitCode::from_error(&err));
                break;
            }
        }
    }
    if failure.is_none() && total_bytes.is_some() {
        plugin.update_progress(1.0);
    }

    let written = plugin.close();
    debug!(records = count, appended = plugin.rows_appended(), "input drained");

    match failure {
        Some(code) => code,
        None if !written => ExitCode::PartialFail,
        None => {
            info!(records = count, "done");
            ExitCode::Success
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let code = run(&cli);
    process::exit(code.as_i32());
}
