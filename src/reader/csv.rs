//! CSV file reader

use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;

use crate::error::CleanError;
use crate::model::{CellValue, Column, Table};

use super::{extension_of, SheetReader};

/// Reader for delimited text files.
///
/// A delimited file holds a single sheet, named after the file stem. Fields
/// are kept verbatim; only empty fields become null.
pub struct CsvReader;

impl SheetReader for CsvReader {
    fn read(&self, path: &Path, sheet_name: Option<&str>) -> Result<Table, CleanError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Sheet1")
            .to_string();

        if let Some(name) = sheet_name {
            if name != stem {
                return Err(CleanError::SheetNotFound(name.to_string()));
            }
        }

        read_delimited(path, &stem).map_err(|e| CleanError::read(path, e))
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "csv" | "tsv")
    }
}

/// Field delimiter implied by the file extension
pub(crate) fn delimiter_for(path: &Path) -> u8 {
    if extension_of(path) == "tsv" {
        b'\t'
    } else {
        b','
    }
}

fn read_delimited(path: &Path, sheet_name: &str) -> anyhow::Result<Table> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter_for(path))
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();

    let mut table = Table::new(sheet_name, Column::from_names(headers.iter()));

    for (line_num, result) in csv_reader.records().enumerate() {
        // +2 for 1-indexing and header
        let record = result.with_context(|| format!("Failed to read CSV row {}", line_num + 2))?;

        let mut cells: Vec<CellValue> = record.iter().map(parse_cell_value).collect();

        // Pad with nulls if row has fewer columns
        if cells.len() < table.column_count() {
            cells.resize(table.column_count(), CellValue::Null);
        }

        table.add_row(cells, line_num + 2);
    }

    Ok(table)
}

fn parse_cell_value(s: &str) -> CellValue {
    if s.is_empty() {
        CellValue::Null
    } else {
        CellValue::String(Cow::Owned(s.to_string()))
    }
}
