use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// A file under the site root with its content decoded permissively.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub relative_path: String,
    pub content: String,
}

impl Document {
    pub fn read(site_root: &Path, path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            relative_path: relative_from_root(site_root, path)?,
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    pub fn write(&self, content: &str) -> Result<()> {
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

/// Every regular `*.html` file under `site_root`, ordered by the sorted walk.
pub fn html_files(site_root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(site_root)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("failed to walk {}", site_root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|ext| ext.to_str()) != Some("html") {
            continue;
        }
        out.push(entry.into_path());
    }
    Ok(out)
}

/// Site-relative path split on `/`, regardless of platform separator.
pub fn relative_segments(site_root: &Path, path: &Path) -> Result<Vec<String>> {
    let relative = relative_from_root(site_root, path)?;
    Ok(relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn relative_from_root(site_root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(site_root).with_context(|| {
        format!(
            "failed to derive relative path from root {} for {}",
            site_root.display(),
            path.display()
        )
    })?;
    Ok(display_path(rel))
}

pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
