use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Create `dir` and its parents when missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).context(format!("Failed to create directory: {:?}", dir))
}
