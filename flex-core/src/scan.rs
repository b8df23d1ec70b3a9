//! Local tree scanning.
//!
//! Walks a tracked directory and yields every asset file with its
//! POSIX-style relative path. The metadata directory and platform junk
//! files are never treated as assets.

use crate::error::{AssetError, Result};
use crate::hash::content_hash;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Metadata directory at the root of every tracked tree.
pub const META_DIR: &str = ".flex-cli";

/// File names that are never assets.
pub const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// A file found in the local tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    /// Relative path with `/` separators.
    pub path: String,
    pub data: Vec<u8>,
    pub content_hash: String,
}

impl LocalAsset {
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        let content_hash = content_hash(&data);
        Self {
            path: path.into(),
            data,
            content_hash,
        }
    }
}

/// Scan `root` and read every asset with its content hash, sorted by path.
pub fn scan_assets(root: &Path) -> Result<Vec<LocalAsset>> {
    let mut assets = Vec::new();
    for entry in asset_entries(root)? {
        let entry = entry?;
        let data = std::fs::read(entry.path()).map_err(|e| AssetError::io(entry.path(), e))?;
        assets.push(LocalAsset::new(relative_path(root, entry.path())?, data));
    }
    assets.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!("Scanned {} assets under {}", assets.len(), root.display());
    Ok(assets)
}

/// Scan `root` for asset paths only, sorted.
pub fn scan_paths(root: &Path) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    for entry in asset_entries(root)? {
        let entry = entry?;
        paths.push(relative_path(root, entry.path())?);
    }
    paths.sort();
    Ok(paths)
}

/// Whether a relative path is reserved for metadata.
pub fn is_meta_path(path: &str) -> bool {
    path == META_DIR || path.starts_with(&format!("{}/", META_DIR))
}

/// Reject bundle paths that would escape the tracked tree or land in the
/// metadata directory.
pub fn check_bundle_path(path: &str) -> Result<()> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        || is_meta_path(path);
    if bad {
        return Err(AssetError::Bundle(format!("unsafe asset path `{}`", path)));
    }
    Ok(())
}

fn asset_entries(root: &Path) -> Result<impl Iterator<Item = Result<DirEntry>>> {
    if !root.is_dir() {
        return Err(AssetError::NotADirectory(root.to_path_buf()));
    }
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_type().is_dir() && e.file_name() == META_DIR));

    Ok(walker.filter_map(|entry| match entry {
        Ok(e) if !e.file_type().is_file() => None,
        Ok(e) if is_ignored(&e) => None,
        Ok(e) => Some(Ok(e)),
        Err(e) => {
            let path = e.path().map(Path::to_path_buf).unwrap_or_default();
            Some(Err(AssetError::io(path, e.into())))
        }
    }))
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| IGNORED_FILES.contains(&name))
        .unwrap_or(false)
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| AssetError::Bundle(format!("{} is outside {}", path.display(), root.display())))?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
