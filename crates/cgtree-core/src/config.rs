use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cgroups::{CgroupRoot, DEFAULT_EXPORT_INDENT};
use crate::error::{Error, Result};

/// Main configuration for cgtree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cgroup hierarchy location
    #[serde(default)]
    pub cgroup: CgroupConfig,

    /// JSON export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LogConfig,
}

/// Where the hierarchy lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CgroupConfig {
    /// Mount point to scan (default: /sys/fs/cgroup)
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    /// Logical name given to the mount point (default: "/")
    #[serde(default = "default_root_name")]
    pub root_name: String,
}

/// JSON export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Indentation width (default: 4)
    #[serde(default = "default_indent")]
    pub indent: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter when RUST_LOG is unset (default: "info")
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for daily-rolled log files; stderr only if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_root_path() -> PathBuf {
    PathBuf::from(CgroupRoot::DEFAULT_ROOT_PATH)
}

fn default_root_name() -> String {
    "/".to_string()
}

fn default_indent() -> usize {
    DEFAULT_EXPORT_INDENT
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for CgroupConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            root_name: default_root_name(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use cgtree_core::Config;
    ///
    /// let config = Config::load_from_file("/etc/cgtree/config.toml").unwrap();
    /// println!("Cgroup root: {:?}", config.cgroup.root_path);
    /// ```
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.cgroup.root_path.is_absolute() {
            return Err(Error::Config(format!(
                "Cgroup root_path must be absolute, got: {:?}",
                self.cgroup.root_path
            )));
        }

        if !self.cgroup.root_name.starts_with('/') {
            return Err(Error::Config(format!(
                "Cgroup root_name must start with '/', got: {:?}",
                self.cgroup.root_name
            )));
        }

        if self.export.indent > 16 {
            return Err(Error::Config(format!(
                "Export indent must be 0-16, got: {}",
                self.export.indent
            )));
        }

        if self.logging.level.trim().is_empty() {
            return Err(Error::Config("Log level must not be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.cgroup.root_path, PathBuf::from("/sys/fs/cgroup"));
        assert_eq!(config.cgroup.root_name, "/");
        assert_eq!(config.export.indent, 4);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.log_dir.is_none());
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_relative_root() {
        let mut config = Config::default();
        config.cgroup.root_path = PathBuf::from("sys/fs/cgroup");

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("root_path"));
    }

    #[test]
    fn test_config_validation_root_name() {
        let mut config = Config::default();
        config.cgroup.root_name = "cpu".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("root_name"));
    }

    #[test]
    fn test_config_validation_indent() {
        let mut config = Config::default();
        config.export.indent = 64;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string(&Config::default()).unwrap();

        assert!(toml_str.contains("[cgroup]"));
        assert!(toml_str.contains("root_path"));
        assert!(toml_str.contains("[logging]"));
        assert!(!toml_str.contains("log_dir"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [cgroup]
            root_path = "/sys/fs/cgroup/cpu,cpuacct"
            root_name = "/cpu,cpuacct"

            [logging]
            level = "debug"
            log_dir = "/var/log/cgtree"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();

        assert_eq!(
            config.cgroup.root_path,
            PathBuf::from("/sys/fs/cgroup/cpu,cpuacct")
        );
        assert_eq!(config.cgroup.root_name, "/cpu,cpuacct");
        assert_eq!(config.export.indent, 4);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.log_dir, Some(PathBuf::from("/var/log/cgtree")));
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.export.indent = 2;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.export.indent, 2);
        assert_eq!(loaded.cgroup.root_path, config.cgroup.root_path);
    }
}
