//! Configuration handling for sheetscrub

use std::path::PathBuf;

use serde::Serialize;

/// What to do when the output file already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Ask the operator: overwrite, new, or cancel
    #[default]
    Prompt,
    /// Replace the existing file
    Overwrite,
    /// Write to the first free `<base>_<n><ext>` path
    Rename,
    /// Refuse to write
    Fail,
}

/// How rows are removed from the source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanMode {
    /// Load into a table, filter, and write a fresh file without formatting
    #[default]
    Rebuild,
    /// Delete rows in place inside the workbook, keeping formatting
    Preserve,
}

/// How requested column names are compared with header cells
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderMatch {
    /// Byte-for-byte equality
    #[default]
    Exact,
    /// Trimmed, case-insensitive equality
    Normalized,
}

/// Format of the final run report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Configuration for a single cleaning run
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Path to the source spreadsheet
    pub input_file: PathBuf,
    /// Sheet to clean; the first sheet when `None`
    pub sheet_name: Option<String>,
    /// Columns checked for blank cells
    pub target_columns: Vec<String>,
    /// Where the cleaned file is written
    pub output_file: PathBuf,
    /// Behaviour when the output file already exists
    pub conflict_policy: ConflictPolicy,
    /// Rebuild or in-place deletion
    pub mode: CleanMode,
    /// Header comparison mode
    pub header_match: HeaderMatch,
    /// Extra cell texts treated as blank (exact match)
    pub na_values: Vec<String>,
    /// Report what would be removed without writing anything
    pub dry_run: bool,
    /// Format of the final report
    pub report_format: ReportFormat,
}

impl Config {
    /// Create a new Config with file paths and target columns
    pub fn new(input_file: PathBuf, output_file: PathBuf, target_columns: Vec<String>) -> Self {
        Self {
            input_file,
            output_file,
            target_columns,
            ..Default::default()
        }
    }

    /// Set the sheet to clean
    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    /// Set the output conflict policy
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Set the cleaning mode
    pub fn with_mode(mut self, mode: CleanMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the header match mode
    pub fn with_header_match(mut self, header_match: HeaderMatch) -> Self {
        self.header_match = header_match;
        self
    }

    /// Set extra missing-value tokens
    pub fn with_na_values(mut self, values: Vec<String>) -> Self {
        self.na_values = values;
        self
    }

    /// Enable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set report format
    pub fn with_report_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }
}
