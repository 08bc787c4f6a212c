//! Volume sampling: the `VolumeSampler` trait, the Linux host implementation
//! (`/proc/self/mounts` + `statvfs`), and a fixture sampler for tests.

#![allow(missing_docs)]

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::{MonError, Result};
use crate::monitor::hysteresis::VolumeSnapshot;

/// Lazily produced snapshots for one poll cycle. Each item may fail on its own.
pub type SnapshotIter<'a> = Box<dyn Iterator<Item = Result<VolumeSnapshot>> + 'a>;

/// Source of per-volume capacity readings.
///
/// `sample` is called once per cycle and yields every currently mounted
/// filesystem in host order. An `Err` from `sample` itself means the mount
/// table could not be read at all; per-volume failures are yielded as items.
pub trait VolumeSampler: Send + Sync {
    fn sample(&self) -> Result<SnapshotIter<'_>>;
}

/// Mount-table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    pub path: PathBuf,
    pub device: String,
    pub fs_type: String,
}

/// Filesystem types with no meaningful capacity, hidden the way `df` hides them.
pub const DEFAULT_IGNORED_FS_TYPES: &[&str] = &[
    "autofs",
    "binfmt_misc",
    "bpf",
    "cgroup",
    "cgroup2",
    "configfs",
    "debugfs",
    "devpts",
    "fuse.gvfsd-fuse",
    "fuse.lxcfs",
    "fusectl",
    "hugetlbfs",
    "mqueue",
    "nfsd",
    "nsfs",
    "proc",
    "pstore",
    "ramfs",
    "rpc_pipefs",
    "securityfs",
    "selinuxfs",
    "sysfs",
    "tracefs",
];

/// Linux host sampler.
#[derive(Debug, Clone)]
pub struct LinuxSampler {
    mounts_path: PathBuf,
    ignored_fs_types: HashSet<String>,
}

impl LinuxSampler {
    #[must_use]
    pub fn new(ignored_fs_types: &[String]) -> Self {
        Self {
            mounts_path: PathBuf::from("/proc/self/mounts"),
            ignored_fs_types: ignored_fs_types.iter().cloned().collect(),
        }
    }

    /// Read mounts from an alternate table (tests, containers with a bind-mounted proc).
    #[must_use]
    pub fn with_mounts_path(mut self, path: PathBuf) -> Self {
        self.mounts_path = path;
        self
    }

    fn mounts(&self) -> Result<Vec<MountPoint>> {
        let raw = fs::read_to_string(&self.mounts_path)
            .map_err(|source| MonError::io(&self.mounts_path, source))?;
        Ok(select_mounts(parse_proc_mounts(&raw), &self.ignored_fs_types))
    }
}

impl VolumeSampler for LinuxSampler {
    fn sample(&self) -> Result<SnapshotIter<'_>> {
        let mounts = self.mounts()?;
        Ok(Box::new(
            mounts
                .into_iter()
                .filter_map(|mount| statvfs_snapshot(&mount.path).transpose()),
        ))
    }
}

/// Block counts to a snapshot, using `df` accounting: used excludes reserved
/// blocks, free is what unprivileged users can still allocate. A filesystem
/// reporting no blocks at all is a pseudo mount and yields `None`.
#[cfg_attr(not(unix), allow(dead_code))]
fn snapshot_from_counts(
    location: String,
    blocks: u64,
    blocks_free: u64,
    blocks_available: u64,
    fragment: u64,
) -> Option<VolumeSnapshot> {
    if blocks == 0 {
        return None;
    }
    let used = blocks.saturating_sub(blocks_free).saturating_mul(fragment);
    let free = blocks_available.saturating_mul(fragment);
    Some(VolumeSnapshot::new(location, used, free))
}

#[cfg(unix)]
#[allow(clippy::useless_conversion)]
fn statvfs_snapshot(path: &Path) -> Result<Option<VolumeSnapshot>> {
    let location = path.to_string_lossy().into_owned();
    let stat = nix::sys::statvfs::statvfs(path).map_err(|error| MonError::FsStats {
        location: location.clone(),
        details: error.to_string(),
    })?;
    Ok(snapshot_from_counts(
        location,
        u64::from(stat.blocks()),
        u64::from(stat.blocks_free()),
        u64::from(stat.blocks_available()),
        u64::from(stat.fragment_size()),
    ))
}

#[cfg(not(unix))]
fn statvfs_snapshot(path: &Path) -> Result<Option<VolumeSnapshot>> {
    Err(MonError::UnsupportedPlatform {
        details: format!("statvfs unavailable for {}", path.display()),
    })
}

/// Scripted sampler: each `sample` call yields the next queued cycle, then
/// empty cycles once the script runs out.
#[derive(Debug, Default)]
pub struct FixtureSampler {
    cycles: Mutex<VecDeque<Vec<VolumeSnapshot>>>,
}

impl FixtureSampler {
    #[must_use]
    pub fn new(cycles: Vec<Vec<VolumeSnapshot>>) -> Self {
        Self {
            cycles: Mutex::new(cycles.into()),
        }
    }

    /// Queue another cycle.
    pub fn push_cycle(&self, snapshots: Vec<VolumeSnapshot>) {
        self.cycles.lock().push_back(snapshots);
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cycles.lock().len()
    }
}

impl VolumeSampler for FixtureSampler {
    fn sample(&self) -> Result<SnapshotIter<'_>> {
        let cycle = self.cycles.lock().pop_front().unwrap_or_default();
        Ok(Box::new(cycle.into_iter().map(Ok)))
    }
}

/// Detect the host sampler for this platform.
pub fn detect_sampler(ignored_fs_types: &[String]) -> Result<Arc<dyn VolumeSampler>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(LinuxSampler::new(ignored_fs_types)))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = ignored_fs_types;
        Err(MonError::UnsupportedPlatform {
            details: "only Linux is currently implemented".to_string(),
        })
    }
}

/// This host's name, or `"UNKNOWN"` when it cannot be read.
#[must_use]
pub fn host_name() -> String {
    #[cfg(unix)]
    {
        nix::unistd::gethostname()
            .ok()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }
    #[cfg(not(unix))]
    {
        std::env::var("COMPUTERNAME").unwrap_or_else(|_| "UNKNOWN".to_string())
    }
}

/// Drop ignored filesystem types and repeated mount paths, keeping host order.
fn select_mounts(mounts: Vec<MountPoint>, ignored: &HashSet<String>) -> Vec<MountPoint> {
    let mut seen = HashSet::new();
    mounts
        .into_iter()
        .filter(|mount| !ignored.contains(&mount.fs_type))
        .filter(|mount| seen.insert(mount.path.clone()))
        .collect()
}

fn parse_proc_mounts(raw: &str) -> Vec<MountPoint> {
    let mut mounts = Vec::new();
    for line in raw.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            if !line.trim().is_empty() {
                eprintln!("[DM-SAMPLER] warning: skipping malformed mount line: {line}");
            }
            continue;
        }
        mounts.push(MountPoint {
            path: unescape_mount_path(fields[1]),
            device: fields[0].to_string(),
            fs_type: fields[2].to_string(),
        });
    }
    mounts
}

/// Decode octal escape sequences (`\NNN`) used by the Linux kernel.
fn unescape_mount_path(raw: &str) -> PathBuf {
    let mut bytes = Vec::with_capacity(raw.len());
    let raw_bytes = raw.as_bytes();
    let mut i = 0;
    while i < raw_bytes.len() {
        if raw_bytes[i] == b'\\' && i + 3 < raw_bytes.len() {
            let a = raw_bytes[i + 1];
            let b = raw_bytes[i + 2];
            let c = raw_bytes[i + 3];
            if (b'0'..=b'3').contains(&a)
                && (b'0'..=b'7').contains(&b)
                && (b'0'..=b'7').contains(&c)
            {
                bytes.push((a - b'0') * 64 + (b - b'0') * 8 + (c - b'0'));
                i += 4;
                continue;
            }
        }
        bytes.push(raw_bytes[i]);
        i += 1;
    }

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStringExt;
        PathBuf::from(std::ffi::OsString::from_vec(bytes))
    }
    #[cfg(not(unix))]
    {
        PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
    }
}
