use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file found under a walked root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub absolute: PathBuf,
    /// Path below the root, always `/`-separated
    pub relative: String,
}

/// Recursively list every regular file under `root`, sorted by relative path.
///
/// Directories are not returned and symlinks are not followed.
pub fn walk(root: &Path) -> Result<Vec<LocalFile>, PipelineError> {
    let metadata = std::fs::metadata(root).map_err(|e| PipelineError::fs(root, e))?;
    if !metadata.is_dir() {
        return Err(PipelineError::fs(root, "not a directory"));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            PipelineError::fs(path, e)
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| PipelineError::fs(entry.path(), e))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        files.push(LocalFile {
            absolute: entry.path().to_path_buf(),
            relative,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}
