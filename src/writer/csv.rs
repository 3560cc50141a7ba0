//! Delimited text output for the rebuild path

use std::io::Write;
use std::path::Path;

use anyhow::Context;

use crate::model::Table;
use crate::reader::delimiter_for;

use super::TableWriter;

/// Writes a table as CSV (or TSV, by extension)
pub struct CsvTableWriter;

impl TableWriter for CsvTableWriter {
    fn write(&self, table: &Table, destination: &Path, out: &mut dyn Write) -> anyhow::Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter_for(destination))
            .flexible(true)
            .from_writer(out);

        writer
            .write_record(table.header_names())
            .context("Failed to write CSV header")?;

        for row in &table.rows {
            writer
                .write_record(row.cells.iter().map(|c| c.as_text().into_owned()))
                .with_context(|| format!("Failed to write CSV row {}", row.source_line))?;
        }

        writer.flush()?;
        Ok(())
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "csv" | "tsv")
    }
}
