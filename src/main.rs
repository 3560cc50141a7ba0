//! sheetscrub - Remove rows with blank cells from spreadsheets

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use sheetscrub::config::{CleanMode, ConflictPolicy, Config, HeaderMatch, ReportFormat};
use sheetscrub::report::{render_to_stdout, report_error};
use sheetscrub::writer::ConsolePrompt;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliConflictPolicy {
    /// Ask on the terminal
    Prompt,
    /// Replace the existing file
    Overwrite,
    /// Write to the first free `<name>_<n>` path
    #[value(alias = "new")]
    Rename,
    /// Stop with an error
    Fail,
}

impl From<CliConflictPolicy> for ConflictPolicy {
    fn from(p: CliConflictPolicy) -> Self {
        match p {
            CliConflictPolicy::Prompt => ConflictPolicy::Prompt,
            CliConflictPolicy::Overwrite => ConflictPolicy::Overwrite,
            CliConflictPolicy::Rename => ConflictPolicy::Rename,
            CliConflictPolicy::Fail => ConflictPolicy::Fail,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliReportFormat {
    Text,
    Json,
}

impl From<CliReportFormat> for ReportFormat {
    fn from(f: CliReportFormat) -> Self {
        match f {
            CliReportFormat::Text => ReportFormat::Text,
            CliReportFormat::Json => ReportFormat::Json,
        }
    }
}

/// Remove rows with blank cells in the given columns from a spreadsheet (Excel, CSV)
#[derive(Parser, Debug)]
#[command(name = "sheetscrub")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Spreadsheet to clean
    input_file: PathBuf,

    /// Column that must not be blank; repeat for more columns
    #[arg(short, long = "column", required = true)]
    columns: Vec<String>,

    /// Where to write the cleaned file; the extension picks the format
    #[arg(short, long)]
    output: PathBuf,

    /// Sheet to clean (defaults to the first sheet)
    #[arg(short, long)]
    sheet: Option<String>,

    /// What to do when the output file already exists
    #[arg(long, value_enum, default_value = "prompt")]
    on_conflict: CliConflictPolicy,

    /// Delete rows inside the original workbook so fonts, fills and widths survive (xlsx only)
    #[arg(long)]
    preserve_formatting: bool,

    /// Match column names ignoring case and surrounding whitespace
    #[arg(long)]
    match_normalized: bool,

    /// Extra cell text to treat as blank (repeatable, e.g. --na-value NA)
    #[arg(long = "na-value")]
    na_values: Vec<String>,

    /// Show the rows that would be removed without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    format: CliReportFormat,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config::new(self.input_file, self.output, self.columns)
            .with_conflict_policy(self.on_conflict.into())
            .with_mode(if self.preserve_formatting {
                CleanMode::Preserve
            } else {
                CleanMode::Rebuild
            })
            .with_header_match(if self.match_normalized {
                HeaderMatch::Normalized
            } else {
                HeaderMatch::Exact
            })
            .with_na_values(self.na_values)
            .with_dry_run(self.dry_run)
            .with_report_format(self.format.into());
        if let Some(sheet) = self.sheet {
            config = config.with_sheet_name(sheet);
        }
        config
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let ansi = std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.into_config();
    let mut prompt = ConsolePrompt::stdio();

    match sheetscrub::run(&config, &mut prompt) {
        Ok(report) => {
            render_to_stdout(&report, config.report_format)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report_error(&err)?;
            if err.is_cancellation() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
