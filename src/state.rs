// FILE: src/state.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;

use crate::bookmarks::{BookmarkIndex, BookmarkMountTable};
use crate::mounts::{paths, space_usage, SpaceUsage};

/// Space usage for one bookmark location.
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkSpace {
    /// Parent directory of the bookmark without a leading `/media/`.
    pub label: String,
    pub usage: SpaceUsage,
}

/// Read-only snapshot of the bookmark index and its mount table.
///
/// Published by the cockpit task after every registration and every
/// reconciliation; readers never observe a half-built table.
#[derive(Debug, Clone, Default)]
pub struct CockpitView {
    pub index: BookmarkIndex,
    pub table: BookmarkMountTable,
}

/// Shared view wrapper handed to every handle.
pub type SharedView = watch::Receiver<Arc<CockpitView>>;

impl CockpitView {
    pub fn new(index: BookmarkIndex, table: BookmarkMountTable) -> Self {
        Self { index, table }
    }

    pub fn bookmark(&self, registrant: &str, path: impl AsRef<Path>) -> Option<PathBuf> {
        let bookmark = self.index.find_bookmark(registrant, path.as_ref()).cloned();
        tracing::debug!("[Cockpit] path: {}, bookmark: {:?}", path.as_ref().display(), bookmark);
        bookmark
    }

    /// Mount point of the registrant's bookmark containing `path`.
    pub fn mount_point(&self, registrant: &str, path: impl AsRef<Path>) -> Option<PathBuf> {
        self.index
            .find_bookmark(registrant, path)
            .and_then(|bookmark| self.table.mount_point(bookmark))
            .cloned()
    }

    /// Two unresolvable paths count as sharing a mount point.
    pub fn same_mount_point(
        &self,
        registrant: &str,
        first: impl AsRef<Path>,
        second: impl AsRef<Path>,
    ) -> bool {
        self.mount_point(registrant, first) == self.mount_point(registrant, second)
    }

    /// True if `path` is itself a bookmark that currently sits on a mount.
    pub fn is_known_mounted_path(&self, path: impl AsRef<Path>) -> bool {
        self.table.contains(&paths::normalize(path))
    }

    pub fn mounted_bookmarks(&self, registrant: &str) -> Vec<PathBuf> {
        self.index
            .bookmarks(registrant)
            .iter()
            .filter(|bookmark| self.table.contains(bookmark))
            .cloned()
            .collect()
    }

    /// First mounted bookmark of the registrant.
    pub fn home_directory(&self, registrant: &str) -> Option<PathBuf> {
        self.mounted_bookmarks(registrant).into_iter().next()
    }

    /// Project each directory onto every mounted bookmark of the registrant,
    /// keeping its suffix relative to the bookmark it came from.
    pub fn resolve_virtual_directories<P: AsRef<Path>>(
        &self,
        registrant: &str,
        dirs: &[P],
    ) -> Vec<PathBuf> {
        let mounted = self.mounted_bookmarks(registrant);
        let mut resolved: Vec<PathBuf> = Vec::new();

        for dir in dirs {
            let dir = paths::normalize(dir);
            let Some(origin) = self.index.find_bookmark(registrant, &dir) else {
                continue;
            };
            let Ok(suffix) = dir.strip_prefix(origin) else {
                continue;
            };
            for bookmark in &mounted {
                let candidate = paths::normalize(bookmark.join(suffix));
                if !resolved.contains(&candidate) {
                    resolved.push(candidate);
                }
            }
        }

        tracing::debug!("[Cockpit] virtual dirs for {}: {:?}", registrant, resolved);
        resolved
    }

    /// One entry per distinct bookmark parent directory with usable
    /// statistics.
    pub fn bookmark_space_usage(&self, registrant: &str) -> Vec<BookmarkSpace> {
        let mut seen: Vec<String> = Vec::new();
        let mut usages = Vec::new();

        for bookmark in self.index.bookmarks(registrant) {
            let parent = bookmark.parent().unwrap_or(bookmark.as_path());
            let label = parent
                .strip_prefix("/media")
                .unwrap_or(parent)
                .to_string_lossy()
                .into_owned();
            if seen.contains(&label) {
                continue;
            }
            let usage = space_usage(bookmark);
            if usage.is_available() {
                usages.push(BookmarkSpace {
                    label: label.clone(),
                    usage,
                });
            }
            seen.push(label);
        }
        usages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> CockpitView {
        let mut index = BookmarkIndex::new();
        index.register("movieplayer", ["/media/usb/Movies", "/media/hdd/Movies", "/media/nas/Movies"]);
        let mounts = vec![PathBuf::from("/media/usb"), PathBuf::from("/media/hdd")];
        let table = BookmarkMountTable::build(&index, &mounts);
        CockpitView::new(index, table)
    }

    #[test]
    fn test_mounted_bookmarks_in_registration_order() {
        let view = view();
        assert_eq!(
            view.mounted_bookmarks("movieplayer"),
            vec![PathBuf::from("/media/usb/Movies"), PathBuf::from("/media/hdd/Movies")]
        );
        assert_eq!(view.home_directory("movieplayer"), Some(PathBuf::from("/media/usb/Movies")));
        assert!(view.mounted_bookmarks("nobody").is_empty());
        assert!(view.home_directory("nobody").is_none());
    }

    #[test]
    fn test_mount_point_queries() {
        let view = view();
        assert_eq!(
            view.mount_point("movieplayer", "/media/hdd/Movies/Action/film.ts"),
            Some(PathBuf::from("/media/hdd"))
        );
        assert!(view.mount_point("movieplayer", "/media/nas/Movies/x").is_none());
        assert!(view.mount_point("nobody", "/media/hdd/Movies").is_none());

        assert!(view.same_mount_point("movieplayer", "/media/hdd/Movies/a", "/media/hdd/Movies/b"));
        assert!(!view.same_mount_point("movieplayer", "/media/hdd/Movies/a", "/media/usb/Movies/b"));
    }

    #[test]
    fn test_is_known_mounted_path() {
        let view = view();
        assert!(view.is_known_mounted_path("/media/hdd/Movies/"));
        assert!(!view.is_known_mounted_path("/media/hdd/Movies/Action"));
        assert!(!view.is_known_mounted_path("/media/nas/Movies"));
    }

    #[test]
    fn test_resolve_virtual_directories_projects_suffix() {
        let view = view();
        let resolved = view.resolve_virtual_directories(
            "movieplayer",
            &["/media/usb/Movies/x/y", "/media/hdd/Movies/x/y", "/elsewhere/z"],
        );
        assert_eq!(
            resolved,
            vec![PathBuf::from("/media/usb/Movies/x/y"), PathBuf::from("/media/hdd/Movies/x/y")]
        );
    }

    #[test]
    fn test_resolve_virtual_directories_bookmark_root() {
        let view = view();
        let resolved = view.resolve_virtual_directories("movieplayer", &["/media/nas/Movies"]);
        assert_eq!(
            resolved,
            vec![PathBuf::from("/media/usb/Movies"), PathBuf::from("/media/hdd/Movies")]
        );
    }

    #[test]
    fn test_space_usage_skips_unavailable_locations() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("Movies");
        std::fs::create_dir(&real).unwrap();

        let mut index = BookmarkIndex::new();
        index.register("p", [real.clone(), PathBuf::from("/media/ghost/Movies")]);
        let view = CockpitView::new(index, BookmarkMountTable::default());

        let usage = view.bookmark_space_usage("p");
        let labels: Vec<&str> = usage.iter().map(|entry| entry.label.as_str()).collect();
        assert!(!labels.contains(&"ghost"));
        assert!(usage.iter().all(|entry| entry.usage.is_available()));

        // the reachable bookmark is reported whenever its filesystem answers
        let expected = dir.path().to_string_lossy().into_owned();
        if space_usage(&real).is_available() {
            assert_eq!(labels, vec![expected.as_str()]);
        } else {
            assert!(usage.is_empty());
        }
    }
}
