//! Root discovery: locate the cgroup mount point and build its tree

use procfs::process::Process;
use std::path::Path;
use tracing::debug;

use super::error::Result;
use super::tree::CgroupTree;
use super::utils::ROOT_ABSNAME;

/// Filesystem types that indicate a cgroup mount
const CGROUP_FS_TYPES: [&str; 2] = ["cgroup", "cgroup2"];

/// Entry point to the host's cgroup hierarchy
pub struct CgroupRoot;

impl CgroupRoot {
    /// Conventional cgroup mount point
    pub const DEFAULT_ROOT_PATH: &'static str = "/sys/fs/cgroup";

    /// Scan the hierarchy at the conventional mount point
    pub fn root() -> Result<CgroupTree> {
        Self::root_at(Self::DEFAULT_ROOT_PATH)
    }

    /// Scan the hierarchy mounted at `path`
    pub fn root_at(path: impl AsRef<Path>) -> Result<CgroupTree> {
        CgroupTree::with_absname(ROOT_ABSNAME, path)
    }

    /// Check if cgroups are available at the conventional mount point
    pub fn cgroup_enabled() -> bool {
        Self::cgroup_enabled_at(Self::DEFAULT_ROOT_PATH)
    }

    /// Check if `path` is a directory, or else if any cgroup filesystem is
    /// mounted for this process
    pub fn cgroup_enabled_at(path: impl AsRef<Path>) -> bool {
        if path.as_ref().is_dir() {
            return true;
        }

        Self::cgroup_mounted()
    }

    fn cgroup_mounted() -> bool {
        let mounts = match Process::myself().and_then(|p| p.mountinfo()) {
            Ok(mounts) => mounts,
            Err(e) => {
                debug!("Failed to read mount table: {}", e);
                return false;
            }
        };

        mounts
            .into_iter()
            .any(|mount| CGROUP_FS_TYPES.contains(&mount.fs_type.as_str()))
    }
}
