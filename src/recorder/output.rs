use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::errors::RecorderError;
use crate::shared::paths::ensure_dir;

pub const OUTPUT_EXTENSION: &str = "mp4";

/// `recording_YYYY-MM-DD_HH-MM-SS`
pub fn output_file_stem(now: &DateTime<Local>) -> String {
    format!("recording_{}", now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Picks a fresh output path in `dir` for a recording finished at `now`,
/// creating the directory if needed. Appends `_1`, `_2`, ... when a file
/// with the same second-resolution name already exists.
pub fn next_output_path(dir: &Path, now: &DateTime<Local>) -> Result<PathBuf, RecorderError> {
    ensure_dir(dir).map_err(|e| RecorderError::Storage(format!("{}: {}", dir.display(), e)))?;

    let stem = output_file_stem(now);
    let mut candidate = dir.join(format!("{}.{}", stem, OUTPUT_EXTENSION));
    let mut suffix = 1u32;
    while candidate.exists() {
        candidate = dir.join(format!("{}_{}.{}", stem, suffix, OUTPUT_EXTENSION));
        suffix += 1;
    }
    Ok(candidate)
}
