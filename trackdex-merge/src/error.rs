use std::path::PathBuf;

/// Errors that can occur while merging snapshots.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("no snapshot files found in {}", .0.display())]
    NoSnapshots(PathBuf),

    #[error("no snapshot file could be read")]
    NoValidData,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
