use std::path::PathBuf;
use thiserror::Error;

/// Precondition failures on the boundary input file.
///
/// These abort a batch before any download is attempted, unlike per-job
/// download errors which are caught and reported tile by tile.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("boundary file not found: {0:?}")]
    Missing(PathBuf),

    #[error("failed to read boundary file {path:?}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("boundary file contains no usable features: {0:?}")]
    NoFeatures(PathBuf),
}
