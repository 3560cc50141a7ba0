//! Plain status lines with an optional preview table

use std::io::Write;

use anyhow::Result;
use tabled::builder::Builder;
use tabled::settings::Style;
use termcolor::{Color, WriteColor};

use crate::model::Table;
use crate::pipeline::CleanReport;

use super::{write_status, ReportFormatter};

/// Human-readable report
pub struct TextReport {
    preview_limit: usize,
}

impl TextReport {
    pub fn new() -> Self {
        Self { preview_limit: 50 }
    }

    pub fn with_preview_limit(preview_limit: usize) -> Self {
        Self { preview_limit }
    }

    fn write_dry_run(&self, report: &CleanReport, writer: &mut dyn WriteColor) -> Result<()> {
        writeln!(
            writer,
            "Dry run: {} of {} rows in sheet \"{}\" have missing values in the columns: {}.",
            report.stats.rows_removed,
            report.stats.rows_scanned,
            report.sheet_name,
            quoted_list(&report.columns)
        )?;

        if report.removed.rows.is_empty() {
            writeln!(writer, "No rows would be removed.")?;
            return Ok(());
        }

        writeln!(writer, "{}", preview_table(&report.removed, self.preview_limit))?;
        let hidden = report.removed.row_count().saturating_sub(self.preview_limit);
        if hidden > 0 {
            writeln!(writer, "... and {} more", hidden)?;
        }
        writeln!(writer, "No file was written.")?;
        Ok(())
    }
}

impl Default for TextReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for TextReport {
    fn render(&self, report: &CleanReport, writer: &mut dyn WriteColor) -> Result<()> {
        if report.dry_run {
            return self.write_dry_run(report, writer);
        }

        writeln!(
            writer,
            "Rows with missing values have been removed from the columns: {}.",
            quoted_list(&report.columns)
        )?;
        if let Some(path) = &report.output_file {
            write_status(
                writer,
                Color::Green,
                &format!("Cleaned file saved as: {}.", path.display()),
            )?;
        }
        Ok(())
    }
}

/// `"A", "B"`
fn quoted_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Removed rows with their sheet row number in front
fn preview_table(table: &Table, limit: usize) -> String {
    let mut builder = Builder::default();

    let mut header = vec!["Row".to_string()];
    header.extend(table.header_names().map(str::to_string));
    builder.push_record(header);

    for row in table.rows.iter().take(limit) {
        let mut record = vec![row.source_line.to_string()];
        record.extend(row.cells.iter().map(|c| c.display().into_owned()));
        builder.push_record(record);
    }

    let mut rendered = builder.build();
    rendered.with(Style::sharp());
    rendered.to_string()
}
