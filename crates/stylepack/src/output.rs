use crate::types::{BundleResult, StylepackError};
use std::io;
use std::path::{Path, PathBuf};

/// Resolve `path` against the current working directory
pub fn resolve_output_path(path: &Path) -> io::Result<PathBuf> {
    std::path::absolute(path)
}

/// Create the parent directory of `path` and any missing ancestors
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            // No-op if a concurrent call created it first
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}

/// Write `text` to `path`, creating directories as needed. Returns the absolute path written.
pub async fn write_output(path: &Path, text: &str) -> Result<PathBuf, StylepackError> {
    let to_error = |source| StylepackError::Output { path: path.to_path_buf(), source };

    let resolved = resolve_output_path(path).map_err(to_error)?;
    ensure_parent_dir(&resolved).map_err(to_error)?;
    tokio::fs::write(&resolved, text).await.map_err(to_error)?;

    tracing::info!(path = %resolved.display(), bytes = text.len(), "wrote bundle");
    Ok(resolved)
}

/// Persist a successful bundle to `output` and pass the result through unchanged
pub async fn materialize(result: BundleResult, output: &Path) -> BundleResult {
    match result {
        Ok(Some(text)) => {
            write_output(output, &text).await?;
            Ok(Some(text))
        }
        Ok(None) => {
            tracing::warn!(path = %output.display(), "no stylesheet produced, nothing written");
            Ok(None)
        }
        Err(error) => Err(error),
    }
}
