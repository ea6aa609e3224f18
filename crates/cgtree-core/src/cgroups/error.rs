//! Error types for cgroup operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Cgroup operation errors
#[derive(Debug, Error)]
pub enum CgroupError {
    #[error("Permission denied: {0:?}")]
    AccessDenied(PathBuf),

    #[error("Cgroup not found: {0}")]
    NotFound(String),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cgroup has no physical path: {0}")]
    NoPhysicalPath(String),

    #[error("Invalid cgroup name: {0:?}")]
    InvalidName(String),

    #[error("Failed to delete {} under {absname}", entries(.failures.len()))]
    PartialDelete {
        absname: String,
        failures: Vec<CgroupError>,
    },
}

impl CgroupError {
    /// Wrap an I/O error, keeping permission and missing-file failures apart
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::PermissionDenied => CgroupError::AccessDenied(path),
            io::ErrorKind::NotFound => CgroupError::NotFound(path.display().to_string()),
            _ => CgroupError::Io { path, source },
        }
    }

    /// Whether this is a missing file, setting or cgroup
    pub fn is_not_found(&self) -> bool {
        matches!(self, CgroupError::NotFound(_))
    }

    /// Whether this is a permission failure
    pub fn is_access_denied(&self) -> bool {
        matches!(self, CgroupError::AccessDenied(_))
    }
}

fn entries(count: usize) -> String {
    if count == 1 {
        "1 entry".to_string()
    } else {
        format!("{} entries", count)
    }
}

pub type Result<T> = std::result::Result<T, CgroupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CgroupError::NotFound("/cpu/test-group".to_string());
        assert_eq!(err.to_string(), "Cgroup not found: /cpu/test-group");

        let err = CgroupError::NoPhysicalPath("/cpu".to_string());
        assert_eq!(err.to_string(), "Cgroup has no physical path: /cpu");
    }

    #[test]
    fn test_partial_delete_display() {
        let err = CgroupError::PartialDelete {
            absname: "/a".to_string(),
            failures: vec![CgroupError::AccessDenied(PathBuf::from("/x/a/b"))],
        };
        assert_eq!(err.to_string(), "Failed to delete 1 entry under /a");

        let err = CgroupError::PartialDelete {
            absname: "/a".to_string(),
            failures: vec![
                CgroupError::NotFound("/a/b".to_string()),
                CgroupError::NotFound("/a".to_string()),
            ],
        };
        assert_eq!(err.to_string(), "Failed to delete 2 entries under /a");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(CgroupError::from_io("/tmp/x", io_err).is_access_denied());

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        assert!(CgroupError::from_io("/tmp/x", io_err).is_not_found());

        let io_err = io::Error::new(io::ErrorKind::Other, "busy");
        let err = CgroupError::from_io("/tmp/x", io_err);
        assert!(matches!(err, CgroupError::Io { .. }));
        assert!(err.to_string().contains("busy"));
    }
}
