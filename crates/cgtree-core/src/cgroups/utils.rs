//! Utility functions for cgroup operations
//!
//! Every lookup and creation path goes through the name helpers here so that
//! child keys are always built the same way.

use nix::errno::Errno;
use nix::unistd::{access, AccessFlags};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::error::{CgroupError, Result};

/// Logical name of a hierarchy root
pub const ROOT_ABSNAME: &str = "/";

/// Split a logical name into normalized segments
///
/// Repeated, leading and trailing separators are dropped, `.` is ignored and
/// `..` removes the previous segment. A `..` with nothing left to remove is
/// kept so callers can reject names that climb above their starting point.
///
/// Examples:
/// - `"/cpu//group1/"` -> `["cpu", "group1"]`
/// - `"a/./b/../c"` -> `["a", "c"]`
/// - `"../a"` -> `["..", "a"]`
pub fn name_segments(name: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = Vec::new();

    for part in name.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else {
                    segments.push(part);
                }
            }
            _ => segments.push(part),
        }
    }

    segments
}

/// Normalize a logical name into its absolute form (`/a/b`, or `/` for a root)
pub fn normalize_absname(name: &str) -> String {
    let segments = name_segments(name);
    if segments.is_empty() {
        return ROOT_ABSNAME.to_string();
    }
    format!("/{}", segments.join("/"))
}

/// Join a child segment onto a normalized parent logical name
pub fn join_absname(parent: &str, segment: &str) -> String {
    if parent == ROOT_ABSNAME {
        format!("/{}", segment)
    } else {
        format!("{}/{}", parent, segment)
    }
}

/// Last segment of a normalized logical name (empty for `/`)
pub fn absname_basename(absname: &str) -> &str {
    absname.rsplit('/').next().unwrap_or("")
}

/// Lexically normalize a physical path
///
/// Same rules as [`name_segments`], applied to path components. Symlinks are
/// not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                } else if !matches!(
                    normalized.components().next_back(),
                    Some(Component::RootDir)
                ) {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    normalized
}

/// Check that the calling process may access `path` with `mode`
pub fn check_access(path: &Path, mode: AccessFlags) -> Result<()> {
    access(path, mode).map_err(|errno| match errno {
        Errno::ENOENT | Errno::ENOTDIR => CgroupError::NotFound(path.display().to_string()),
        Errno::EACCES | Errno::EPERM | Errno::EROFS => {
            CgroupError::AccessDenied(path.to_path_buf())
        }
        other => CgroupError::Io {
            path: path.to_path_buf(),
            source: io::Error::from(other),
        },
    })
}

/// Read a whole control file after checking read permission
pub fn read_cgroup_file(path: &Path) -> Result<String> {
    check_access(path, AccessFlags::R_OK)?;
    fs::read_to_string(path).map_err(|e| CgroupError::from_io(path, e))
}

/// Overwrite a control file after checking write permission
pub fn write_cgroup_file(path: &Path, content: &str) -> Result<()> {
    check_access(path, AccessFlags::W_OK)?;
    fs::write(path, content).map_err(|e| CgroupError::from_io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_segments() {
        assert_eq!(name_segments("/cpu//group1/"), vec!["cpu", "group1"]);
        assert_eq!(name_segments("a/./b/../c"), vec!["a", "c"]);
        assert_eq!(name_segments("../a"), vec!["..", "a"]);
        assert_eq!(name_segments("a/../.."), vec![".."]);
        assert!(name_segments("").is_empty());
        assert!(name_segments("///").is_empty());
    }

    #[test]
    fn test_normalize_absname() {
        assert_eq!(normalize_absname("/"), "/");
        assert_eq!(normalize_absname(""), "/");
        assert_eq!(normalize_absname("cpu,cpuacct"), "/cpu,cpuacct");
        assert_eq!(normalize_absname("/cpu/group1/"), "/cpu/group1");
    }

    #[test]
    fn test_join_and_basename() {
        assert_eq!(join_absname("/", "cpu"), "/cpu");
        assert_eq!(join_absname("/cpu", "group1"), "/cpu/group1");

        assert_eq!(absname_basename("/cpu/group1"), "group1");
        assert_eq!(absname_basename("/cpu"), "cpu");
        assert_eq!(absname_basename("/"), "");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/sys/fs/cgroup/")),
            PathBuf::from("/sys/fs/cgroup")
        );
        assert_eq!(
            normalize_path(Path::new("/sys//fs/./cgroup/cpu/..")),
            PathBuf::from("/sys/fs/cgroup")
        );
        assert_eq!(normalize_path(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize_path(Path::new("../a")), PathBuf::from("../a"));
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_cgroup_file(Path::new("/nonexistent/cgtree/cpu.max")).unwrap_err();
        assert!(err.is_not_found());
    }
}
