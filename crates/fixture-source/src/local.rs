//! Local filesystem helpers for fixture resolution.

use fixture_core::{FixtureError, Result};
use std::path::{Path, PathBuf};

/// Check if `path` is an existing regular file.
pub async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Check if `path` is an existing directory.
pub async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Read a whole file as UTF-8 text.
pub async fn read_to_string(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FixtureError::io(path, e))
}

/// List all files in a directory (non-recursive, immediate children only).
///
/// Returns only files, not subdirectories, sorted by path.
pub async fn list_directory(path: &Path) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();

    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|e| FixtureError::io(path, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| FixtureError::io(path, e))?
    {
        let entry_path = entry.path();
        let metadata = tokio::fs::metadata(&entry_path)
            .await
            .map_err(|e| FixtureError::io(&entry_path, e))?;

        if metadata.is_file() {
            results.push(entry_path);
        }
    }

    // Sort for consistent ordering
    results.sort();

    tracing::debug!(
        "Listed {} files in directory: {}",
        results.len(),
        path.display()
    );

    Ok(results)
}

/// List every file under `path` (recursively) whose extension is `extension`.
///
/// A missing directory yields an empty list.
pub async fn list_recursive(path: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();
    if !is_dir(path).await {
        return Ok(results);
    }

    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| FixtureError::io(&dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FixtureError::io(&dir, e))?
        {
            let entry_path = entry.path();
            // Symlinked directories are not followed, so cycles cannot loop.
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| FixtureError::io(&entry_path, e))?;

            if file_type.is_dir() {
                pending.push(entry_path);
            } else if entry_path.extension().and_then(|e| e.to_str()) == Some(extension)
                && (file_type.is_file() || (file_type.is_symlink() && is_file(&entry_path).await))
            {
                results.push(entry_path);
            }
        }
    }

    results.sort();
    Ok(results)
}
