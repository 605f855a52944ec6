use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::error::{RedubError, Result};

/// A video found under a batch root
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub path: PathBuf,
    /// Path relative to the batch root, forward slashes; names the job and its keys
    pub name: String,
}

/// Collect every supported video under `root`, sorted by relative name
pub fn discover_videos(root: &Path, config: &PipelineConfig) -> Result<Vec<BatchItem>> {
    if !root.is_dir() {
        return Err(RedubError::FileNotFound(root.display().to_string()));
    }

    let mut items = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| config.is_supported_format(e));
        if !supported {
            debug!("Skipping {}", path.display());
            continue;
        }

        let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| PathBuf::from(entry.file_name()));
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");
        items.push(BatchItem {
            path: path.to_path_buf(),
            name,
        });
    }
    items.sort_by(|a, b| a.name.cmp(&b.name));

    info!("Found {} video files under {}", items.len(), root.display());
    Ok(items)
}
