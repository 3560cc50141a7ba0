//! Excel file reader (xlsx, xlsm, xls, xlsb, ods)

use std::borrow::Cow;
use std::path::Path;

use anyhow::Context;
use calamine::{open_workbook_auto, Data, Range, Reader};

use crate::error::CleanError;
use crate::model::{CellValue, Column, Table};

use super::SheetReader;

/// Extensions of OOXML workbooks that can be edited in place
pub const XLSX_EXTENSIONS: &[&str] = &["xlsx", "xlsm"];

/// Reader for Excel and OpenDocument workbooks
pub struct ExcelReader;

impl SheetReader for ExcelReader {
    fn read(&self, path: &Path, sheet_name: Option<&str>) -> Result<Table, CleanError> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("Failed to open workbook: {}", path.display()))
            .map_err(|e| CleanError::read(path, e))?;

        let sheets = workbook.sheet_names();
        let sheet_name = match sheet_name {
            Some(name) => sheets
                .iter()
                .find(|s| s.as_str() == name)
                .cloned()
                .ok_or_else(|| CleanError::SheetNotFound(name.to_string()))?,
            None => sheets
                .first()
                .cloned()
                .ok_or_else(|| CleanError::SheetNotFound("<first sheet>".to_string()))?,
        };

        let range: Range<Data> = workbook
            .worksheet_range(&sheet_name)
            .with_context(|| format!("Failed to read sheet: {}", sheet_name))
            .map_err(|e| CleanError::read(path, e))?;

        Ok(parse_range(&sheet_name, &range))
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(
            ext.to_lowercase().as_str(),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods"
        )
    }
}

fn parse_range(sheet_name: &str, range: &Range<Data>) -> Table {
    let Some((start_row, _)) = range.start() else {
        return Table::new(sheet_name, Vec::new());
    };
    let (_, col_count) = range.get_size();
    let header_line = start_row as usize + 1;

    let mut rows = range.rows();

    // First non-empty row of the sheet is the header
    let columns: Vec<Column> = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(i, cell)| Column::new(cell_to_string(cell), i))
            .collect(),
        None => Vec::new(),
    };

    let mut table = Table::new(sheet_name, columns);
    table.header_line = header_line;

    for (offset, row) in rows.enumerate() {
        let mut cells: Vec<CellValue> = row.iter().take(col_count).map(convert_cell).collect();

        // Pad with nulls if row has fewer columns
        if cells.len() < table.column_count() {
            cells.resize(table.column_count(), CellValue::Null);
        }

        table.add_row(cells, header_line + offset + 1);
    }

    table
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#{:?}", e),
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::String(Cow::Owned(s.clone())),
        Data::Float(f) => {
            // Check if it's actually an integer
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                CellValue::Int(*f as i64)
            } else {
                CellValue::Float(*f)
            }
        }
        Data::Int(i) => CellValue::Int(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(ref dt) => {
            let s = format!("{}", dt);
            if let Ok(datetime) =
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f")
            {
                CellValue::DateTime(datetime)
            } else if let Ok(datetime) =
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
            {
                CellValue::DateTime(datetime)
            } else if let Ok(date) = chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                CellValue::Date(date)
            } else {
                CellValue::String(Cow::Owned(s))
            }
        }
        Data::DateTimeIso(s) => {
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                CellValue::DateTime(dt)
            } else if let Ok(d) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                CellValue::Date(d)
            } else {
                CellValue::String(Cow::Owned(s.clone()))
            }
        }
        Data::DurationIso(s) => CellValue::String(Cow::Owned(s.clone())),
        Data::Error(e) => CellValue::String(Cow::Owned(format!("#{:?}", e))),
    }
}
