// FILE: src/bookmarks.rs
//! BookmarkIndex and BookmarkMountTable.
//!
//! Bookmarks are grouped by registrant (the component that registered
//! them) and kept in registration order. The mount table maps every
//! bookmark to the longest mount point containing its real path and is
//! rebuilt wholesale on each reconciliation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::mounts::paths;

#[derive(Debug, Clone, Default)]
pub struct BookmarkIndex {
    by_registrant: HashMap<String, Vec<PathBuf>>,
}

impl BookmarkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registrant's bookmark set with the normalized,
    /// de-duplicated `bookmarks`.
    pub fn register<I, P>(&mut self, registrant: &str, bookmarks: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut normalized: Vec<PathBuf> = Vec::new();
        for bookmark in bookmarks {
            let bookmark = paths::normalize(bookmark);
            if !normalized.contains(&bookmark) {
                normalized.push(bookmark);
            }
        }
        tracing::debug!("[Bookmarks] {} -> {:?}", registrant, normalized);
        self.by_registrant.insert(registrant.to_string(), normalized);
    }

    /// Bookmarks of a registrant in registration order. Unknown
    /// registrants have none.
    pub fn bookmarks(&self, registrant: &str) -> &[PathBuf] {
        self.by_registrant
            .get(registrant)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First bookmark (in registration order) that contains `path`.
    pub fn find_bookmark(&self, registrant: &str, path: impl AsRef<Path>) -> Option<&PathBuf> {
        let path = paths::normalize(path);
        self.bookmarks(registrant)
            .iter()
            .find(|bookmark| path.starts_with(bookmark))
    }

    pub fn all_bookmarks(&self) -> impl Iterator<Item = &PathBuf> {
        self.by_registrant.values().flatten()
    }
}

/// Bookmark -> mount point, for bookmarks that currently sit on a mount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkMountTable {
    entries: HashMap<PathBuf, PathBuf>,
}

impl BookmarkMountTable {
    /// Map every bookmark of every registrant against `mount_points`.
    pub fn build(index: &BookmarkIndex, mount_points: &[PathBuf]) -> Self {
        let mut entries: HashMap<PathBuf, PathBuf> = HashMap::new();
        for bookmark in index.all_bookmarks() {
            if entries.contains_key(bookmark) {
                continue;
            }
            let real = paths::real_path(bookmark);
            if let Some(mount_point) = longest_mount_point(&real, mount_points) {
                entries.insert(bookmark.clone(), mount_point.clone());
            }
        }
        tracing::debug!("[Bookmarks] mount table: {:?}", entries);
        Self { entries }
    }

    pub fn mount_point(&self, bookmark: &Path) -> Option<&PathBuf> {
        self.entries.get(bookmark)
    }

    pub fn contains(&self, bookmark: &Path) -> bool {
        self.entries.contains_key(bookmark)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &PathBuf)> {
        self.entries.iter()
    }
}

/// The longest element of `mount_points` that is a component-wise prefix
/// of `real_path`.
pub fn longest_mount_point<'a>(real_path: &Path, mount_points: &'a [PathBuf]) -> Option<&'a PathBuf> {
    mount_points
        .iter()
        .filter(|mount_point| real_path.starts_with(mount_point))
        .max_by_key(|mount_point| mount_point.components().count())
}
