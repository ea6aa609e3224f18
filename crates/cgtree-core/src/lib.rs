//! cgtree Core Library
//!
//! In-memory model of the Linux cgroup virtual filesystem.
//! Provides tree navigation, cgroup creation and deletion, control file
//! access, and task membership management.

pub mod cgroups;
pub mod config;
pub mod error;

pub use cgroups::{
    CgroupError, CgroupNode, CgroupRecord, CgroupRoot, CgroupSetting, CgroupTree, NodeId,
};
pub use config::Config;
pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
