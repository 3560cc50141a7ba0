//! Fresh xlsx output for the rebuild path

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::model::{CellValue, Table};

use super::TableWriter;

const SHEET_NAME_MAX_LEN: usize = 31;
const SHEET_NAME_ILLEGAL: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Excel serial number of 1970-01-01
const UNIX_EPOCH_SERIAL: f64 = 25569.0;
const SECONDS_PER_DAY: f64 = 86400.0;

/// Writes a table as a single-sheet workbook without source formatting
pub struct XlsxTableWriter;

impl TableWriter for XlsxTableWriter {
    fn write(&self, table: &Table, _destination: &Path, out: &mut dyn Write) -> anyhow::Result<()> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sanitize_sheet_name(&table.sheet_name))?;

        for column in &table.columns {
            worksheet.write_string_with_format(
                0,
                col_num(column.index)?,
                &column.name,
                &header_format,
            )?;
        }

        for (offset, row) in table.rows.iter().enumerate() {
            let row_num = u32::try_from(offset + 1).context("Too many rows for a worksheet")?;
            for (idx, cell) in row.cells.iter().enumerate() {
                write_cell(
                    worksheet,
                    row_num,
                    col_num(idx)?,
                    cell,
                    &date_format,
                    &datetime_format,
                )?;
            }
        }

        let buffer = workbook
            .save_to_buffer()
            .context("Failed to encode workbook")?;
        out.write_all(&buffer)?;
        Ok(())
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "xlsx")
    }
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    date_format: &Format,
    datetime_format: &Format,
) -> anyhow::Result<()> {
    match cell {
        CellValue::Null => {}
        CellValue::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        CellValue::Int(i) => {
            worksheet.write_number(row, col, *i as f64)?;
        }
        CellValue::Float(f) => {
            worksheet.write_number(row, col, *f)?;
        }
        CellValue::String(s) => {
            worksheet.write_string(row, col, &**s)?;
        }
        CellValue::Date(d) => {
            let serial = excel_serial(&d.and_time(chrono::NaiveTime::default()));
            worksheet.write_number_with_format(row, col, serial, date_format)?;
        }
        CellValue::DateTime(dt) => {
            worksheet.write_number_with_format(row, col, excel_serial(dt), datetime_format)?;
        }
    }
    Ok(())
}

fn col_num(index: usize) -> anyhow::Result<u16> {
    u16::try_from(index).context("Too many columns for a worksheet")
}

/// Days since 1899-12-30, as Excel stores dates
fn excel_serial(dt: &NaiveDateTime) -> f64 {
    let utc = dt.and_utc();
    let seconds = utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) / 1e9;
    UNIX_EPOCH_SERIAL + seconds / SECONDS_PER_DAY
}

/// Make a sheet name acceptable to Excel: no illegal characters, no
/// surrounding apostrophes, at most 31 characters, never empty.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if SHEET_NAME_ILLEGAL.contains(&c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'');
    if cleaned.is_empty() {
        return "Sheet1".to_string();
    }
    cleaned.chars().take(SHEET_NAME_MAX_LEN).collect()
}
