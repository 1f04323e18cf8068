// FILE: src/mounts/table.rs
//! MountTableReader: merges the declared (fstab) and live (/proc/mounts)
//! mount tables into one filtered list of mount points.

use std::fs;
use std::path::{Path, PathBuf};

/// Pseudo and system mount points that never hold user bookmarks.
const IGNORED_MOUNT_POINTS: &[&str] = &[
    "/",
    "/autofs",
    "none",
    "/proc",
    "/sys",
    "/dev/pts",
    "/dev",
    "/dev/shm",
    "/run",
    "/sysfscgroup",
    "/tmp",
    "/var/volatile",
];

/// One parsed line of a mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
    pub options: String,
    pub dump_freq: u32,
    pub pass_no: u32,
}

impl MountEntry {
    /// Parse a single fstab/mtab line. Comments, blank lines and anything
    /// that is not exactly six fields with numeric dump/pass yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 6 {
            return None;
        }

        Some(Self {
            device: unescape_octal(fields[0]),
            mount_point: unescape_octal(fields[1]),
            fs_type: fields[2].to_string(),
            options: fields[3].to_string(),
            dump_freq: fields[4].parse().ok()?,
            pass_no: fields[5].parse().ok()?,
        })
    }
}

/// Decode the `\040`-style escapes the kernel uses for whitespace in
/// mount table fields.
fn unescape_octal(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }

    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

pub fn is_ignored(mount_point: &str) -> bool {
    IGNORED_MOUNT_POINTS.contains(&mount_point)
}

/// Reads the declared and live mount sources.
#[derive(Debug, Clone)]
pub struct MountTableReader {
    declared_path: PathBuf,
    live_path: PathBuf,
}

impl Default for MountTableReader {
    fn default() -> Self {
        Self::new("/etc/fstab", "/proc/mounts")
    }
}

impl MountTableReader {
    pub fn new(declared_path: impl Into<PathBuf>, live_path: impl Into<PathBuf>) -> Self {
        Self {
            declared_path: declared_path.into(),
            live_path: live_path.into(),
        }
    }

    pub fn declared_path(&self) -> &Path {
        &self.declared_path
    }

    /// Live mount points first, then any declared-only mount point in
    /// declared order. No duplicates, no ignored system paths.
    pub fn list_mount_points(&self) -> Vec<PathBuf> {
        let mut mount_points = parse_mount_file(&self.live_path);
        for mount_point in parse_mount_file(&self.declared_path) {
            if !mount_points.contains(&mount_point) {
                mount_points.push(mount_point);
            }
        }
        tracing::debug!("[Mounts] mount points: {:?}", mount_points);
        mount_points
    }
}

/// Filtered, de-duplicated mount points of one source file. An unreadable
/// file is an empty source, not an error.
pub fn parse_mount_file(path: &Path) -> Vec<PathBuf> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!("[Mounts] Cannot read {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    parse_mount_lines(&content)
}

pub fn parse_mount_lines(content: &str) -> Vec<PathBuf> {
    let mut mount_points: Vec<PathBuf> = Vec::new();
    for entry in content.lines().filter_map(MountEntry::parse) {
        if is_ignored(&entry.mount_point) {
            continue;
        }
        let mount_point = PathBuf::from(entry.mount_point);
        if !mount_points.contains(&mount_point) {
            mount_points.push(mount_point);
        }
    }
    mount_points
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PROC_MOUNTS: &str = "\
rootfs / rootfs rw 0 0
proc /proc proc rw,relatime 0 0
sysfs /sys sysfs rw,relatime 0 0
devpts /dev/pts devpts rw 0 0
tmpfs /tmp tmpfs rw 0 0
/dev/sda1 /media/hdd ext4 rw,relatime 0 0
//10.0.0.5/movies /media/net/movies cifs rw 0 0
";

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_line_requires_six_fields() {
        assert!(MountEntry::parse("/dev/sda1 /media/hdd ext4 defaults 0").is_none());
        assert!(MountEntry::parse("/dev/sda1 /media/hdd ext4 defaults 0 x").is_none());
        assert!(MountEntry::parse("# /dev/sda1 /media/hdd ext4 defaults 0 0").is_none());
        assert!(MountEntry::parse("   ").is_none());

        let entry = MountEntry::parse("  /dev/sda1\t/media/hdd ext4 defaults 0 2 ").unwrap();
        assert_eq!(entry.device, "/dev/sda1");
        assert_eq!(entry.mount_point, "/media/hdd");
        assert_eq!(entry.fs_type, "ext4");
        assert_eq!(entry.pass_no, 2);
    }

    #[test]
    fn test_parse_line_decodes_octal_escapes() {
        let entry = MountEntry::parse("/dev/sdb1 /media/My\\040Disk vfat rw 0 0").unwrap();
        assert_eq!(entry.mount_point, "/media/My Disk");
    }

    #[test]
    fn test_ignored_paths_are_filtered() {
        let points = parse_mount_lines(PROC_MOUNTS);
        assert_eq!(
            points,
            vec![PathBuf::from("/media/hdd"), PathBuf::from("/media/net/movies")]
        );
        for ignored in IGNORED_MOUNT_POINTS {
            assert!(!points.contains(&PathBuf::from(ignored)));
        }
    }

    #[test]
    fn test_declared_only_mounts_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let live = write_file(dir.path(), "mounts", "/dev/sda1 /media/a ext4 rw 0 0\n");
        let declared = write_file(
            dir.path(),
            "fstab",
            "/dev/sda1 /media/a ext4 defaults 0 0\n/dev/sdb1 /media/b ext4 defaults 0 0\nnone none swap sw 0 0\n",
        );

        let reader = MountTableReader::new(declared, live);
        assert_eq!(
            reader.list_mount_points(),
            vec![PathBuf::from("/media/a"), PathBuf::from("/media/b")]
        );
    }

    #[test]
    fn test_duplicate_live_entries_collapse() {
        let points = parse_mount_lines(
            "/dev/sda1 /media/a ext4 rw 0 0\n/dev/sda1 /media/a ext4 rw 0 0\n",
        );
        assert_eq!(points, vec![PathBuf::from("/media/a")]);
    }

    #[test]
    fn test_missing_sources_yield_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let reader = MountTableReader::new(dir.path().join("nope"), dir.path().join("nada"));
        assert!(reader.list_mount_points().is_empty());
    }
}
