//! Reader layer: resolves the input file and sheet into a `Table`

mod csv;
mod excel;

use std::path::Path;

use tracing::debug;

use crate::config::Config;
use crate::error::CleanError;
use crate::model::Table;

pub use self::csv::CsvReader;
pub(crate) use self::csv::delimiter_for;
pub use self::excel::{ExcelReader, XLSX_EXTENSIONS};

/// Trait for reading one sheet of a tabular file
pub trait SheetReader: Send + Sync {
    /// Read the named sheet (or the first one) into a Table
    fn read(&self, path: &Path, sheet_name: Option<&str>) -> Result<Table, CleanError>;

    /// Check if this reader can handle the given file extension
    fn supports_extension(&self, ext: &str) -> bool;
}

/// Factory for picking a reader based on file extension
pub struct ReaderFactory {
    readers: Vec<Box<dyn SheetReader>>,
}

impl Default for ReaderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderFactory {
    /// Create a new reader factory with all supported readers
    pub fn new() -> Self {
        Self {
            readers: vec![Box::new(CsvReader), Box::new(ExcelReader)],
        }
    }

    /// Get a reader for the given file path
    pub fn get_reader(&self, path: &Path) -> Result<&dyn SheetReader, CleanError> {
        let ext = extension_of(path);

        self.readers
            .iter()
            .find(|reader| reader.supports_extension(&ext))
            .map(|reader| reader.as_ref())
            .ok_or_else(|| {
                CleanError::UnsupportedFormat(if ext.is_empty() {
                    "unknown".to_string()
                } else {
                    ext
                })
            })
    }

    /// Read a file using the appropriate reader
    pub fn read(&self, path: &Path, sheet_name: Option<&str>) -> Result<Table, CleanError> {
        let reader = self.get_reader(path)?;
        reader.read(path, sheet_name)
    }
}

/// Confirm the input exists and load the requested sheet.
///
/// The returned table is the only read of the source file for table data.
pub fn resolve_input(config: &Config) -> Result<Table, CleanError> {
    let path = config.input_file.as_path();
    if !path.is_file() {
        return Err(CleanError::FileNotFound(path.to_path_buf()));
    }

    let table = ReaderFactory::new().read(path, config.sheet_name.as_deref())?;
    debug!(
        sheet = %table.sheet_name,
        columns = table.column_count(),
        rows = table.row_count(),
        "loaded input table"
    );
    Ok(table)
}

/// Lowercase file extension, empty when absent
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}
