//! A single cgroup control file

use std::path::{Path, PathBuf};
use tracing::warn;

use super::error::Result;
use super::utils::{read_cgroup_file, write_cgroup_file};

/// One control file of a cgroup, read and written as opaque text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupSetting {
    name: String,
    path: PathBuf,
}

impl CgroupSetting {
    /// Create a setting for the control file at `path`
    ///
    /// A missing file is only logged: cgroup layouts differ between kernels
    /// and controllers, so tree construction carries on regardless.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let setting = Self {
            name: name.into(),
            path: path.into(),
        };

        if !setting.exists() {
            warn!("Cgroup setting file not found: {:?}", setting.path);
        }

        setting
    }

    /// Control file name (e.g. `cpu.max`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path to the control file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the control file exists right now
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the whole control file
    pub fn get(&self) -> Result<String> {
        read_cgroup_file(&self.path).map_err(|e| {
            warn!("Failed to read cgroup setting {}: {}", self.name, e);
            e
        })
    }

    /// Overwrite the control file with `value`
    pub fn set(&self, value: &str) -> Result<()> {
        write_cgroup_file(&self.path, value).map_err(|e| {
            warn!("Failed to write cgroup setting {}: {}", self.name, e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_setting_get_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpu.weight");
        fs::write(&path, "100\n").unwrap();

        let setting = CgroupSetting::new("cpu.weight", &path);
        assert_eq!(setting.name(), "cpu.weight");
        assert_eq!(setting.path(), path.as_path());
        assert_eq!(setting.get().unwrap(), "100\n");

        setting.set("250").unwrap();
        assert_eq!(setting.get().unwrap(), "250");
    }

    #[test]
    fn test_setting_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let setting = CgroupSetting::new("memory.max", dir.path().join("memory.max"));

        assert!(!setting.exists());
        assert!(setting.get().unwrap_err().is_not_found());
        assert!(setting.set("max").unwrap_err().is_not_found());
    }
}
