//! End-to-end cleaning run: resolve, locate, filter, write

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{CleanMode, Config};
use crate::error::CleanError;
use crate::filter::{filter_table, find_blank_rows, BlankPredicate, FilterStats, RowDeletionSet};
use crate::locate::ColumnIndexMap;
use crate::model::Table;
use crate::preserve::WorkbookPackage;
use crate::reader::{extension_of, resolve_input, XLSX_EXTENSIONS};
use crate::writer::{
    ensure_parent_dir, persist_atomically, resolve_destination, save_table, ConflictPrompt,
    WriterFactory,
};

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct CleanReport {
    pub input_file: PathBuf,
    pub sheet_name: String,
    /// Target columns, in request order
    pub columns: Vec<String>,
    pub mode: CleanMode,
    pub stats: FilterStats,
    /// Where the cleaned file was saved; `None` on a dry run
    pub output_file: Option<PathBuf>,
    pub dry_run: bool,
    /// Source rows that were (or would be) removed
    pub removed: Table,
}

impl CleanReport {
    /// Sheet row numbers of the removed rows, ascending
    pub fn removed_lines(&self) -> Vec<usize> {
        self.removed.rows.iter().map(|row| row.source_line).collect()
    }
}

/// Run one cleaning pass as described by `config`.
///
/// `prompt` is only consulted when the output exists and the conflict policy
/// is `Prompt`. Nothing is written unless every earlier stage succeeds.
pub fn run(config: &Config, prompt: &mut dyn ConflictPrompt) -> Result<CleanReport, CleanError> {
    let table = resolve_input(config)?;
    let columns =
        ColumnIndexMap::locate(&table.columns, &config.target_columns, config.header_match)?;

    let predicate = BlankPredicate::new().with_na_values(config.na_values.iter().cloned());
    let deletions = find_blank_rows(&table, &columns, &predicate);
    debug!(
        scanned = table.row_count(),
        blank = deletions.len(),
        "found rows with blank target cells"
    );

    let removed = table.with_rows(
        table
            .rows
            .iter()
            .filter(|row| deletions.contains(row.source_line))
            .cloned()
            .collect(),
    );
    let mut report = CleanReport {
        input_file: config.input_file.clone(),
        sheet_name: table.sheet_name.clone(),
        columns: columns.names().map(str::to_string).collect(),
        mode: config.mode,
        stats: FilterStats {
            rows_scanned: table.row_count(),
            rows_removed: deletions.len(),
            rows_kept: table.row_count() - deletions.len(),
        },
        output_file: None,
        dry_run: config.dry_run,
        removed,
    };

    match config.mode {
        CleanMode::Rebuild => {
            WriterFactory::new().get_writer(&config.output_file)?;
        }
        CleanMode::Preserve => {
            require_xlsx(&config.input_file)?;
            require_xlsx(&config.output_file)?;
            require_same_package(&config.input_file, &config.output_file)?;
        }
    }

    if config.dry_run {
        return Ok(report);
    }

    let destination = match config.mode {
        CleanMode::Rebuild => {
            let (cleaned, stats) = filter_table(&table, &columns, &predicate);
            report.stats = stats;
            let destination = settle_destination(config, prompt)?;
            save_table(&cleaned, &destination)?;
            destination
        }
        CleanMode::Preserve => {
            let package = edit_in_place(&config.input_file, &table.sheet_name, &deletions)?;
            let destination = settle_destination(config, prompt)?;
            persist_atomically(&destination, |file| package.write_to(file))?;
            destination
        }
    };

    info!(
        removed = report.stats.rows_removed,
        kept = report.stats.rows_kept,
        output = %destination.display(),
        "cleaning finished"
    );
    report.output_file = Some(destination);
    Ok(report)
}

fn settle_destination(
    config: &Config,
    prompt: &mut dyn ConflictPrompt,
) -> Result<PathBuf, CleanError> {
    ensure_parent_dir(&config.output_file)?;
    resolve_destination(&config.output_file, config.conflict_policy, prompt)
}

/// Delete the rows from the workbook package, keeping its formatting.
///
/// The whole package is held in memory, so the output may replace the input.
fn edit_in_place(
    input: &Path,
    sheet_name: &str,
    deletions: &RowDeletionSet,
) -> Result<WorkbookPackage, CleanError> {
    let mut package =
        WorkbookPackage::open(input, sheet_name).map_err(|e| CleanError::read(input, e))?;
    let deleted = package
        .delete_rows(deletions)
        .map_err(|e| CleanError::read(input, e))?;
    debug!(deleted, part = package.sheet_part(), "edited worksheet in place");
    Ok(package)
}

fn require_xlsx(path: &Path) -> Result<(), CleanError> {
    let ext = extension_of(path);
    if XLSX_EXTENSIONS.contains(&ext.as_str()) {
        return Ok(());
    }
    Err(CleanError::UnsupportedFormat(format!(
        "{} (formatting can only be preserved for {})",
        if ext.is_empty() { "unknown" } else { ext.as_str() },
        XLSX_EXTENSIONS.join(", ")
    )))
}

/// The edited package keeps its content types, so the extension must too
fn require_same_package(input: &Path, output: &Path) -> Result<(), CleanError> {
    let (input_ext, output_ext) = (extension_of(input), extension_of(output));
    if input_ext == output_ext {
        return Ok(());
    }
    Err(CleanError::UnsupportedFormat(format!(
        "{output_ext} (a .{input_ext} workbook keeps its .{input_ext} extension when formatting is preserved)"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConflictPolicy, HeaderMatch};
    use crate::writer::NoPrompt;

    fn write_csv(path: &Path, content: &str) {
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_rebuild_csv_keeps_complete_rows() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("contacts.csv");
        let output = dir.path().join("out/clean.csv");
        write_csv(&input, "Name,Email\nA,a@x.com\nB,\nC,c@x.com\n");

        let config = Config::new(input, output.clone(), vec!["Email".into()]);
        let report = run(&config, &mut NoPrompt).unwrap();

        assert_eq!(report.output_file.as_deref(), Some(output.as_path()));
        assert_eq!(report.stats.rows_removed, 1);
        assert_eq!(report.stats.rows_kept, 2);
        assert_eq!(report.removed_lines(), vec![3]);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "Name,Email\nA,a@x.com\nC,c@x.com\n"
        );
    }

    #[test]
    fn test_output_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let first = dir.path().join("first.csv");
        let second = dir.path().join("second.csv");
        write_csv(&input, "Name,Email,Phone\nA,a@x.com,1\nB,,2\nC,c@x.com,\nD,d@x.com,4\n");

        let targets = vec!["Email".to_string(), "Phone".to_string()];
        let report = run(&Config::new(input, first.clone(), targets.clone()), &mut NoPrompt).unwrap();
        assert_eq!(report.removed_lines(), vec![3, 4]);

        let again = run(&Config::new(first.clone(), second.clone(), targets), &mut NoPrompt).unwrap();
        assert_eq!(again.stats.rows_removed, 0);
        assert_eq!(
            std::fs::read_to_string(&first).unwrap(),
            std::fs::read_to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_missing_column_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out/clean.csv");
        write_csv(&input, "Name,Email\nA,a@x.com\n");

        let config = Config::new(input, output.clone(), vec!["Phone".into(), "Fax".into()]);
        let err = run(&config, &mut NoPrompt).unwrap_err();
        assert_eq!(err.to_string(), "Target columns not found: Phone, Fax!");
        assert!(!output.exists());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("clean.csv");
        write_csv(&input, "Name,Email\nA,a@x.com\nB, \n");

        let config = Config::new(input, output.clone(), vec!["email".into()])
            .with_header_match(HeaderMatch::Normalized)
            .with_dry_run(true);
        let report = run(&config, &mut NoPrompt).unwrap();
        assert!(report.output_file.is_none());
        assert_eq!(report.columns, vec!["email"]);
        assert_eq!(report.removed_lines(), vec![3]);
        assert!(!output.exists());
    }

    #[test]
    fn test_na_values_and_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("clean.csv");
        write_csv(&input, "Name,Email\nA,NA\nB,b@x.com\n");
        write_csv(&output, "keep me");

        let config = Config::new(input, output.clone(), vec!["Email".into()])
            .with_na_values(vec!["NA".into()]);
        assert!(run(&config, &mut NoPrompt).unwrap_err().is_cancellation());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "keep me");

        let report = run(
            &config.with_conflict_policy(ConflictPolicy::Rename),
            &mut NoPrompt,
        )
        .unwrap();
        assert_eq!(report.output_file, Some(dir.path().join("clean_1.csv")));
        assert_eq!(report.stats.rows_removed, 1);
    }

    #[test]
    fn test_preserve_requires_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        write_csv(&input, "Name,Email\nA,\n");

        let config = Config::new(input, dir.path().join("out.xlsx"), vec!["Email".into()])
            .with_mode(CleanMode::Preserve);
        assert!(matches!(
            run(&config, &mut NoPrompt),
            Err(CleanError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_preserve_requires_matching_package_type() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("macros.xlsm");
        std::fs::write(&input, b"not read").unwrap();
        let output = dir.path().join("out.xlsx");

        let err = require_same_package(&input, &output).unwrap_err();
        assert!(matches!(&err, CleanError::UnsupportedFormat(msg) if msg.starts_with("xlsx")));
        assert!(require_same_package(&input, &dir.path().join("out.XLSM")).is_ok());
    }

    #[test]
    fn test_unknown_output_format_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("sub/out.parquet");
        write_csv(&input, "Name,Email\nA,\n");

        let config = Config::new(input, output, vec!["Email".into()]);
        assert!(matches!(
            run(&config, &mut NoPrompt),
            Err(CleanError::UnsupportedFormat(ext)) if ext == "parquet"
        ));
        assert!(!dir.path().join("sub").exists());
    }
}
