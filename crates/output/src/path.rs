//! Destination naming and collision avoidance.

use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Where one output file goes, before collisions are resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputDescriptor {
    /// `dir`, or `dir/<tag>/<year>` when filed under a tag.
    pub root: PathBuf,
    pub stem: String,
    pub extension: &'static str,
}
impl OutputDescriptor {
    pub fn new(dir: &Path, tag: Option<&str>, year: i32, stem: impl Into<String>, extension: &'static str) -> Self {
        let root = match tag {
            Some(tag) => dir.join(tag).join(year.to_string()),
            None => dir.to_path_buf(),
        };
        Self { root, stem: stem.into(), extension }
    }

    /// `root/stem.ext` for `None`, `root/stem.N.ext` otherwise.
    pub fn candidate(&self, suffix: Option<usize>) -> PathBuf {
        match suffix {
            None => self.root.join(format!("{}.{}", self.stem, self.extension)),
            Some(n) => self.root.join(format!("{}.{n}.{}", self.stem, self.extension)),
        }
    }

    /// See [`resolve_free_path`].
    pub async fn resolve(&self) -> PathBuf {
        resolve_free_path(self).await
    }
}

/// The stem used when no name is configured: `scan_HHMMSS`.
pub fn default_stem(started_at: OffsetDateTime) -> String {
    format!("scan_{:02}{:02}{:02}", started_at.hour(), started_at.minute(), started_at.second())
}

/// First free path among `stem.ext`, `stem.0.ext`, `stem.1.ext`, ...
///
/// Anything already at a candidate path occupies it, including a dangling
/// symlink. Check-then-act: another process writing to the same directory
/// at the same moment can still collide.
pub async fn resolve_free_path(descriptor: &OutputDescriptor) -> PathBuf {
    let mut candidate = descriptor.candidate(None);
    let mut suffix = 0;
    while occupied(&candidate).await {
        candidate = descriptor.candidate(Some(suffix));
        suffix += 1;
    }
    candidate
}

async fn occupied(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}
