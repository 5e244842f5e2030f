//! Image corpus discovery

use bench_core::{CorpusConfig, Error, ErrorContext, ResolutionFolder, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Enumerate the configured resolution folders under the corpus root.
///
/// Folders are returned in configuration order, including empty ones; the
/// driver skips those. Fails when the root is missing or when no folder holds
/// a single recognized image.
pub fn discover(config: &CorpusConfig) -> Result<Vec<ResolutionFolder>> {
    if !config.root.is_dir() {
        return Err(Error::CorpusNotFound(config.root.clone()));
    }

    let mut folders = Vec::with_capacity(config.resolutions.len());
    for spec in &config.resolutions {
        let path = config.root.join(spec.name.as_str());
        let images = if path.is_dir() {
            list_images(&path, &config.extensions)?
        } else {
            warn!("Resolution folder {} does not exist", path.display());
            Vec::new()
        };

        debug!("Found {} images for {}", images.len(), spec.name);
        folders.push(ResolutionFolder::new(spec.name.clone(), path, images));
    }

    let total: usize = folders.iter().map(ResolutionFolder::len).sum();
    if total == 0 {
        return Err(Error::EmptyCorpus(config.root.clone()));
    }

    info!(
        "Discovered {} images in {} resolution folders under {}",
        total,
        folders.iter().filter(|f| !f.is_empty()).count(),
        config.root.display()
    );
    Ok(folders)
}

/// Files directly inside `dir` with a recognized extension, sorted by file name
pub fn list_images(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).with_context_fn(|| format!("Failed to read {}", dir.display()))?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry
            .with_context_fn(|| format!("Failed to read entry in {}", dir.display()))?
            .path();
        if path.is_file() && has_image_extension(&path, extensions) {
            images.push(path);
        }
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
