//! Output layer: destination resolution and atomic persistence

mod csv;
mod prompt;
mod xlsx;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tempfile::Builder;
use tracing::{debug, info};

use crate::config::ConflictPolicy;
use crate::error::CleanError;
use crate::model::Table;
use crate::reader::extension_of;

pub use self::csv::CsvTableWriter;
pub use self::prompt::{ConflictChoice, ConflictPrompt, ConsolePrompt, NoPrompt};
pub use self::xlsx::{sanitize_sheet_name, XlsxTableWriter};

/// Trait for serializing a table into a file format
pub trait TableWriter {
    /// Write the table to `out`; `destination` is the final path
    fn write(&self, table: &Table, destination: &Path, out: &mut dyn Write) -> anyhow::Result<()>;

    /// Check if this writer can produce the given file extension
    fn supports_extension(&self, ext: &str) -> bool;
}

/// Factory for picking a writer based on the output extension
pub struct WriterFactory {
    writers: Vec<Box<dyn TableWriter>>,
}

impl Default for WriterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterFactory {
    pub fn new() -> Self {
        Self {
            writers: vec![Box::new(XlsxTableWriter), Box::new(CsvTableWriter)],
        }
    }

    /// Get a writer for the given output path
    pub fn get_writer(&self, path: &Path) -> Result<&dyn TableWriter, CleanError> {
        let ext = extension_of(path);
        self.writers
            .iter()
            .find(|writer| writer.supports_extension(&ext))
            .map(|writer| writer.as_ref())
            .ok_or_else(|| {
                CleanError::UnsupportedFormat(if ext.is_empty() {
                    "unknown".to_string()
                } else {
                    ext
                })
            })
    }
}

/// Create the destination directory (recursively) if it is missing
pub fn ensure_parent_dir(path: &Path) -> Result<(), CleanError> {
    let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if dir.exists() {
        return Ok(());
    }

    std::fs::create_dir_all(dir).map_err(|source| CleanError::DirectoryCreate {
        path: dir.to_path_buf(),
        source,
    })?;
    debug!(dir = %dir.display(), "created output directory");
    Ok(())
}

/// Settle the path the output is written to.
///
/// A path that does not exist yet is used as is, without consulting the
/// policy or the prompt.
pub fn resolve_destination(
    path: &Path,
    policy: ConflictPolicy,
    prompt: &mut dyn ConflictPrompt,
) -> Result<PathBuf, CleanError> {
    if !path.is_file() {
        return Ok(path.to_path_buf());
    }

    let choice = match policy {
        ConflictPolicy::Overwrite => ConflictChoice::Overwrite,
        ConflictPolicy::Rename => ConflictChoice::New,
        ConflictPolicy::Fail => return Err(CleanError::OutputExists(path.to_path_buf())),
        ConflictPolicy::Prompt => prompt
            .ask(path)
            .context("Failed to read response")
            .map_err(|e| CleanError::save(path, e))?,
    };

    match choice {
        ConflictChoice::Overwrite => Ok(path.to_path_buf()),
        ConflictChoice::New => Ok(next_available_path(path)),
        ConflictChoice::Cancel => Err(CleanError::UserCancelled),
    }
}

/// First unused `<base>_<n><ext>` for n = 1, 2, ...
pub fn next_available_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1usize;
    loop {
        let candidate = path.with_file_name(format!("{stem}_{counter}{ext}"));
        if !candidate.is_file() {
            return candidate;
        }
        counter += 1;
    }
}

/// Write through a temporary file in the destination directory, then rename.
///
/// If `write` fails the target path is left untouched. A replaced file keeps
/// its permissions; a new one gets the usual mode for created files.
pub fn persist_atomically<F>(path: &Path, write: F) -> Result<(), CleanError>
where
    F: FnOnce(&mut File) -> anyhow::Result<()>,
{
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from("."),
    };

    let persist = || -> anyhow::Result<()> {
        let mut tmp = temp_file_builder()
            .tempfile_in(&dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        write(tmp.as_file_mut())?;
        tmp.as_file_mut().flush()?;
        if let Ok(existing) = std::fs::metadata(path) {
            std::fs::set_permissions(tmp.path(), existing.permissions())
                .with_context(|| format!("Failed to copy permissions of {}", path.display()))?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    };

    persist().map_err(|e| CleanError::save(path, e))?;
    info!(path = %path.display(), "saved cleaned file");
    Ok(())
}

/// Temporary files are owner-only by default; request 0666 and let the umask apply
fn temp_file_builder() -> Builder<'static, 'static> {
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder
}

/// Serialize a table to `destination` with the writer its extension selects
pub fn save_table(table: &Table, destination: &Path) -> Result<(), CleanError> {
    let factory = WriterFactory::new();
    let writer = factory.get_writer(destination)?;
    persist_atomically(destination, |file| writer.write(table, destination, file))
}
