//! Cgroup filesystem model
//!
//! Provides an in-memory snapshot of a cgroup hierarchy with typed operations
//! to navigate, create and delete cgroups, read and write control files, and
//! manage task membership.
//!
//! # Behaviour
//! - Every read and write goes straight to the filesystem (no caching)
//! - Control file values are opaque text
//! - Recursive operations keep going after a single failure

pub mod error;
pub mod export;
pub mod node;
pub mod root;
pub mod setting;
pub mod tree;
pub mod utils;

pub use error::{CgroupError, Result};
pub use export::{CgroupRecord, DEFAULT_EXPORT_INDENT};
pub use node::{CgroupNode, NodeId};
pub use root::CgroupRoot;
pub use setting::CgroupSetting;
pub use tree::{CgroupTree, TASK_FILES};
