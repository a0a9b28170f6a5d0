use std::path::{Path, PathBuf};

use crate::errors::EncodeError;

/// RAII guard for the staging file an encode writes into.
///
/// The encoder writes to a hidden sibling of the final path. On
/// [`commit`](Self::commit) the staging file is renamed onto the final path;
/// if the guard is dropped without committing (error, early return, panic)
/// the staging file is deleted, so a partial file never appears at the
/// final location.
pub struct OutputGuard {
    staging_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl OutputGuard {
    pub fn new(final_path: &Path) -> Self {
        Self {
            staging_path: staging_path_for(final_path),
            final_path: final_path.to_path_buf(),
            committed: false,
        }
    }

    /// Where the encoder should write.
    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Moves the finished staging file into place.
    pub fn commit(mut self) -> Result<PathBuf, EncodeError> {
        std::fs::rename(&self.staging_path, &self.final_path).map_err(|e| {
            tracing::error!(target: "encoder", "[OUTPUT] Failed to move {:?} to {:?}: {}",
                self.staging_path, self.final_path, e);
            EncodeError::Io(format!("Failed to finalize {}: {}", self.final_path.display(), e))
        })?;
        self.committed = true;
        Ok(self.final_path.clone())
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        if self.staging_path.exists() {
            tracing::info!(target: "encoder", "[OUTPUT] Deleting partial file: {:?}", self.staging_path);
            if let Err(e) = std::fs::remove_file(&self.staging_path) {
                tracing::warn!(target: "encoder", "[OUTPUT] Failed to delete partial file: {}", e);
            }
        }
    }
}

/// `dir/name.ext` -> `dir/.name.partial.ext`, keeping the extension so the
/// container format can still be guessed from it.
pub fn staging_path_for(final_path: &Path) -> PathBuf {
    let stem = final_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    let name = match final_path.extension() {
        Some(ext) => format!(".{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!(".{}.partial", stem),
    };
    final_path.with_file_name(name)
}
