//! JSON report format

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use termcolor::WriteColor;

use crate::config::CleanMode;
use crate::model::CellValue;
use crate::pipeline::CleanReport;

use super::ReportFormatter;

/// JSON report formatter
pub struct JsonReport {
    pretty: bool,
}

impl JsonReport {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Default for JsonReport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct JsonRemovedRow {
    source_line: usize,
    cells: Vec<JsonCell>,
}

#[derive(Serialize)]
struct JsonCell {
    column: String,
    value: serde_json::Value,
}

#[derive(Serialize)]
struct JsonCleanOutput<'a> {
    input_file: String,
    sheet: &'a str,
    columns: &'a [String],
    mode: CleanMode,
    dry_run: bool,
    output_file: Option<String>,
    rows_scanned: usize,
    rows_removed: usize,
    rows_kept: usize,
    removed_rows: Vec<JsonRemovedRow>,
}

fn cell_value_to_json(value: &CellValue) -> serde_json::Value {
    match value {
        CellValue::Null => serde_json::Value::Null,
        CellValue::Bool(b) => serde_json::Value::Bool(*b),
        CellValue::Int(i) => serde_json::json!(*i),
        CellValue::Float(f) => serde_json::json!(*f),
        CellValue::String(s) => serde_json::Value::String(s.to_string()),
        CellValue::Date(d) => serde_json::Value::String(d.to_string()),
        CellValue::DateTime(dt) => serde_json::Value::String(dt.to_string()),
    }
}

impl ReportFormatter for JsonReport {
    fn render(&self, report: &CleanReport, writer: &mut dyn WriteColor) -> Result<()> {
        let removed = &report.removed;
        let removed_rows = removed
            .rows
            .iter()
            .map(|row| JsonRemovedRow {
                source_line: row.source_line,
                cells: row
                    .cells
                    .iter()
                    .enumerate()
                    .map(|(i, c)| JsonCell {
                        column: removed
                            .columns
                            .get(i)
                            .map(|col| col.name.clone())
                            .unwrap_or_else(|| format!("column_{}", i)),
                        value: cell_value_to_json(c),
                    })
                    .collect(),
            })
            .collect();

        let output = JsonCleanOutput {
            input_file: report.input_file.display().to_string(),
            sheet: &report.sheet_name,
            columns: &report.columns,
            mode: report.mode,
            dry_run: report.dry_run,
            output_file: report.output_file.as_ref().map(|p| p.display().to_string()),
            rows_scanned: report.stats.rows_scanned,
            rows_removed: report.stats.rows_removed,
            rows_kept: report.stats.rows_kept,
            removed_rows,
        };

        if self.pretty {
            serde_json::to_writer_pretty(&mut *writer, &output)?;
        } else {
            serde_json::to_writer(&mut *writer, &output)?;
        }
        writeln!(writer)?;

        Ok(())
    }
}
