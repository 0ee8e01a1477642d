//! Disk usage and root directory resolution.

use crate::core::error::{IndexdError, Result};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Absolute base directory every session path lives under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDir {
    path: PathBuf,
}

impl RootDir {
    /// Resolve the configured root against the current directory
    pub fn new(configured: &Path) -> Result<Self> {
        let path = std::path::absolute(configured)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Join a client-supplied relative path onto the root
    ///
    /// Leading separators and `.` are ignored; `..` is rejected so a
    /// session can never escape the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let mut resolved = self.path.clone();
        let mut depth = 0;

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    return Err(IndexdError::InvalidPath(format!(
                        "{relative}: parent components are not allowed"
                    )))
                }
            }
        }

        if depth == 0 {
            return Err(IndexdError::InvalidPath(format!(
                "{relative:?}: path is empty"
            )));
        }

        Ok(resolved)
    }

    /// Bytes used by the files directly under a session path
    ///
    /// Best effort: a missing or invalid path counts as zero.
    pub fn disk_size(&self, relative: &str) -> u64 {
        match self.resolve(relative) {
            Ok(dir) => directory_size(&dir),
            Err(e) => {
                tracing::warn!("Reporting zero disk size: {}", e);
                0
            }
        }
    }
}

/// Sum of the sizes of regular files directly inside `dir`
///
/// Subdirectories are not descended into and nothing is locked, so a
/// concurrent writer can make the figure slightly stale.
pub fn directory_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
