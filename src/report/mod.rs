//! Rendering of run reports and status lines

mod json;
mod text;

use std::io::{IsTerminal, Write};

use anyhow::Result;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::config::ReportFormat;
use crate::error::CleanError;
use crate::pipeline::CleanReport;

pub use json::JsonReport;
pub use text::TextReport;

/// Trait for report formatters
pub trait ReportFormatter {
    /// Render a finished run to a writer
    fn render(&self, report: &CleanReport, writer: &mut dyn WriteColor) -> Result<()>;
}

/// Factory for creating report formatters
pub struct ReportFactory;

impl ReportFactory {
    /// Create a report formatter based on format type
    pub fn create(format: ReportFormat) -> Box<dyn ReportFormatter> {
        match format {
            ReportFormat::Text => Box::new(TextReport::new()),
            ReportFormat::Json => Box::new(JsonReport::new()),
        }
    }
}

/// Colors only when the stream is a terminal and NO_COLOR is unset
pub fn color_choice(is_terminal: bool) -> ColorChoice {
    if is_terminal && std::env::var_os("NO_COLOR").is_none() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Render a report to stdout
pub fn render_to_stdout(report: &CleanReport, format: ReportFormat) -> Result<()> {
    let formatter = ReportFactory::create(format);
    let mut stdout = StandardStream::stdout(color_choice(std::io::stdout().is_terminal()));
    formatter.render(report, &mut stdout)
}

/// Print the status line for a run that ended early.
///
/// Cancellation is an ordinary outcome and goes to stdout; failures go to
/// stderr.
pub fn report_error(err: &CleanError) -> Result<()> {
    if err.is_cancellation() {
        let mut stdout = StandardStream::stdout(color_choice(std::io::stdout().is_terminal()));
        write_status(&mut stdout, Color::Yellow, &err.to_string())
    } else {
        let mut stderr = StandardStream::stderr(color_choice(std::io::stderr().is_terminal()));
        write_status(&mut stderr, Color::Red, &err.to_string())
    }
}

pub(crate) fn write_status(writer: &mut dyn WriteColor, color: Color, line: &str) -> Result<()> {
    writer.set_color(ColorSpec::new().set_fg(Some(color)))?;
    write!(writer, "{line}")?;
    writer.reset()?;
    writeln!(writer)?;
    Ok(())
}
