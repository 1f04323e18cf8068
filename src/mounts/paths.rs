// FILE: src/mounts/paths.rs
//! Path normalization helpers shared by the bookmark index and mount table.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: collapse repeated separators, drop `.`,
/// fold `..` into its parent and strip trailing slashes.
///
/// Never touches the filesystem. An empty input normalizes to `.`.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is still `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

/// Resolve symlinks where the path exists; otherwise fall back to the
/// lexical normalization so unmounted bookmarks still compare sanely.
pub fn real_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match std::fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(_) => normalize(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_dots_and_slashes() {
        assert_eq!(normalize("/media/hdd/./Movies/"), PathBuf::from("/media/hdd/Movies"));
        assert_eq!(normalize("/media//hdd///Movies"), PathBuf::from("/media/hdd/Movies"));
        assert_eq!(normalize("/media/hdd/Movies/../Music"), PathBuf::from("/media/hdd/Music"));
    }

    #[test]
    fn test_normalize_edge_cases() {
        assert_eq!(normalize("/.."), PathBuf::from("/"));
        assert_eq!(normalize("/"), PathBuf::from("/"));
        assert_eq!(normalize(""), PathBuf::from("."));
        assert_eq!(normalize("../a"), PathBuf::from("../a"));
        assert_eq!(normalize("a/.."), PathBuf::from("."));
    }

    #[test]
    fn test_real_path_falls_back_for_missing_paths() {
        let missing = "/definitely/not/here/../there/";
        assert_eq!(real_path(missing), PathBuf::from("/definitely/not/there"));
    }

    #[test]
    fn test_real_path_resolves_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::create_dir(&target).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(real_path(&link), std::fs::canonicalize(&target).unwrap());
    }
}
