// FILE: src/mounts/space.rs
//! Filesystem space query (statvfs).

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use super::paths;

/// Space statistics for the filesystem holding a path.
///
/// `UNAVAILABLE` (all fields `-1`) is returned whenever the statistics
/// cannot be obtained; callers decide how to display that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceUsage {
    pub percent_used: f64,
    pub used_bytes: i64,
    pub available_bytes: i64,
}

impl SpaceUsage {
    pub const UNAVAILABLE: SpaceUsage = SpaceUsage {
        percent_used: -1.0,
        used_bytes: -1,
        available_bytes: -1,
    };

    pub fn is_available(&self) -> bool {
        self.used_bytes >= 0 && self.available_bytes >= 0
    }

    /// Compute usage from raw statvfs block counts. Zero total blocks is
    /// treated as a failure.
    fn from_blocks(blocks: u64, blocks_free: u64, blocks_avail: u64, fragment_size: u64) -> Self {
        let total = blocks.saturating_mul(fragment_size);
        if total == 0 {
            return Self::UNAVAILABLE;
        }
        let used = blocks.saturating_sub(blocks_free).saturating_mul(fragment_size);
        let available = blocks_avail.saturating_mul(fragment_size);
        let percent = (used as f64 / total as f64) * 100.0;

        Self {
            percent_used: (percent * 10.0).round() / 10.0,
            used_bytes: i64::try_from(used).unwrap_or(i64::MAX),
            available_bytes: i64::try_from(available).unwrap_or(i64::MAX),
        }
    }
}

/// Query the filesystem holding `path` (after resolving symlinks).
pub fn space_usage(path: impl AsRef<Path>) -> SpaceUsage {
    let real = paths::real_path(path);
    let c_path = match CString::new(real.as_os_str().as_bytes()) {
        Ok(c_path) => c_path,
        Err(_) => return SpaceUsage::UNAVAILABLE,
    };

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        tracing::debug!(
            "[Space] statvfs failed for {}: {}",
            real.display(),
            std::io::Error::last_os_error()
        );
        return SpaceUsage::UNAVAILABLE;
    }

    SpaceUsage::from_blocks(
        stat.f_blocks as u64,
        stat.f_bfree as u64,
        stat.f_bavail as u64,
        stat.f_frsize as u64,
    )
}
