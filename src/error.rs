//! Error taxonomy for a cleaning run

use std::path::PathBuf;

use thiserror::Error;

/// Terminal conditions of a cleaning run.
///
/// Every variant ends the run without producing output. `UserCancelled` is
/// an explicit abort rather than a failure; see [`CleanError::is_cancellation`].
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("Input file not found: {}!", .0.display())]
    FileNotFound(PathBuf),

    #[error("Sheet not found: {0}!")]
    SheetNotFound(String),

    #[error("Target columns not found: {}!", .0.join(", "))]
    ColumnsNotFound(Vec<String>),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Error reading {}: {cause:#}", path.display())]
    Read { path: PathBuf, cause: anyhow::Error },

    #[error("Error creating directory {}: {source}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output file already exists: {}.", .0.display())]
    OutputExists(PathBuf),

    #[error("Error saving file: {cause:#}")]
    Save { path: PathBuf, cause: anyhow::Error },

    #[error("Process canceled!")]
    UserCancelled,
}

impl CleanError {
    /// True for the operator-initiated abort path
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CleanError::UserCancelled)
    }

    pub(crate) fn read(path: impl Into<PathBuf>, cause: anyhow::Error) -> Self {
        CleanError::Read {
            path: path.into(),
            cause,
        }
    }

    pub(crate) fn save(path: impl Into<PathBuf>, cause: anyhow::Error) -> Self {
        CleanError::Save {
            path: path.into(),
            cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = CleanError::ColumnsNotFound(vec!["Phone".into(), "Fax".into()]);
        assert_eq!(err.to_string(), "Target columns not found: Phone, Fax!");

        let err = CleanError::FileNotFound(PathBuf::from("missing.xlsx"));
        assert_eq!(err.to_string(), "Input file not found: missing.xlsx!");

        let err = CleanError::save("out.xlsx", anyhow::anyhow!("disk full"));
        assert_eq!(err.to_string(), "Error saving file: disk full");
    }

    #[test]
    fn test_cancellation_is_distinct() {
        assert!(CleanError::UserCancelled.is_cancellation());
        assert!(!CleanError::SheetNotFound("Data".into()).is_cancellation());
        assert_eq!(CleanError::UserCancelled.to_string(), "Process canceled!");
    }
}
