//! Error types for sheet export

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ExportError>;

/// Stage of the pipeline a container failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Writing a per-sheet container
    Archive,
    /// Writing the package skeleton
    Skeleton,
    /// Unpacking the skeleton into the work directory
    Extract,
    /// Copying a sheet part out of a per-sheet container
    Install,
    /// Re-packing the work directory into the final package
    Seal,
    /// Reading a finished package back
    Read,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Archive => "archive",
            Phase::Skeleton => "skeleton",
            Phase::Extract => "extract",
            Phase::Install => "install",
            Phase::Seal => "seal",
            Phase::Read => "read",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while exporting datasets to a workbook
#[derive(Error, Debug)]
pub enum ExportError {
    /// The dataset provider could not supply a dataset
    #[error("dataset '{dataset}' is unavailable: {reason}")]
    DatasetUnavailable { dataset: String, reason: String },

    /// Dataset resolved to zero columns
    #[error("dataset '{dataset}' has no columns")]
    EmptySheet { dataset: String },

    /// An archived sheet references a style the shared catalog does not hold
    #[error(
        "dataset '{dataset}' references style index {index} but the catalog holds {catalog_len} entries"
    )]
    StyleIndexMismatch {
        dataset: String,
        index: u32,
        catalog_len: usize,
    },

    /// A temporary or final container failed to open, extract or seal
    #[error("container error during {phase}{}: {message}", dataset_suffix(.dataset))]
    ContainerCorrupt {
        phase: Phase,
        dataset: Option<String>,
        message: String,
    },

    /// Dataset does not fit in one worksheet
    #[error(
        "dataset '{dataset}' has {rows} rows and {columns} columns; a sheet holds at most {max_rows} rows and {max_columns} columns",
        max_rows = crate::sheet::MAX_ROWS,
        max_columns = crate::sheet::MAX_COLUMNS
    )]
    SheetTooLarge {
        dataset: String,
        rows: usize,
        columns: usize,
    },

    /// The two-digit rename counter ran out
    #[error("cannot find a unique sheet name for dataset '{dataset}'")]
    NameCollisionUnresolvable { dataset: String },

    /// The same dataset identifier was given twice
    #[error("dataset '{0}' was requested more than once")]
    DuplicateDataset(String),

    /// Every dataset was skipped, there is nothing to put in a package
    #[error("no sheet could be produced from the requested datasets")]
    NothingToExport,

    /// Malformed input while reading data back
    #[error("read error: {0}")]
    ReadError(String),

    /// Failure while serializing parts
    #[error("write error: {0}")]
    WriteError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn dataset_suffix(dataset: &Option<String>) -> String {
    match dataset {
        Some(name) => format!(" of dataset '{}'", name),
        None => String::new(),
    }
}

impl ExportError {
    /// Build a container error from any displayable cause
    pub fn container<E: fmt::Display>(phase: Phase, dataset: Option<&str>, err: E) -> Self {
        ExportError::ContainerCorrupt {
            phase,
            dataset: dataset.map(str::to_string),
            message: err.to_string(),
        }
    }

    /// Tag a bare I/O error with the phase and dataset it happened in
    pub fn in_phase(self, phase: Phase, dataset: Option<&str>) -> Self {
        match self {
            ExportError::Io(err) => ExportError::container(phase, dataset, err),
            other => other,
        }
    }

    /// Per-dataset conditions that skip the dataset instead of failing the run
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExportError::DatasetUnavailable { .. } | ExportError::EmptySheet { .. }
        )
    }

    /// Dataset identifier the error is about, if any
    pub fn dataset(&self) -> Option<&str> {
        match self {
            ExportError::DatasetUnavailable { dataset, .. }
            | ExportError::EmptySheet { dataset }
            | ExportError::StyleIndexMismatch { dataset, .. }
            | ExportError::SheetTooLarge { dataset, .. }
            | ExportError::NameCollisionUnresolvable { dataset } => Some(dataset),
            ExportError::ContainerCorrupt { dataset, .. } => dataset.as_deref(),
            ExportError::DuplicateDataset(dataset) => Some(dataset),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_message_names_phase_and_dataset() {
        let err = ExportError::container(Phase::Install, Some("orders"), "bad crc");
        assert_eq!(
            err.to_string(),
            "container error during install of dataset 'orders': bad crc"
        );
        assert_eq!(err.dataset(), Some("orders"));

        let err = ExportError::container(Phase::Seal, None, "disk full");
        assert_eq!(err.to_string(), "container error during seal: disk full");
    }

    #[test]
    fn test_in_phase_tags_only_io_errors() {
        let io = std::io::Error::other("no space");
        let err = ExportError::from(io).in_phase(Phase::Archive, Some("orders"));
        assert!(matches!(
            err,
            ExportError::ContainerCorrupt { phase: Phase::Archive, .. }
        ));
        assert_eq!(err.dataset(), Some("orders"));

        let err = ExportError::NothingToExport.in_phase(Phase::Seal, None);
        assert!(matches!(err, ExportError::NothingToExport));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ExportError::EmptySheet {
            dataset: "a".to_string()
        }
        .is_recoverable());
        assert!(ExportError::DatasetUnavailable {
            dataset: "a".to_string(),
            reason: "gone".to_string()
        }
        .is_recoverable());
        assert!(!ExportError::NothingToExport.is_recoverable());
        assert!(!ExportError::SheetTooLarge {
            dataset: "a".to_string(),
            rows: 1,
            columns: 20_000
        }
        .is_recoverable());
        assert!(!ExportError::NameCollisionUnresolvable {
            dataset: "a".to_string()
        }
        .is_recoverable());
    }
}
