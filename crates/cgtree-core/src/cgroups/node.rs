//! Data types for a single cgroup in the tree

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::setting::CgroupSetting;
use super::utils::{absname_basename, normalize_absname, normalize_path};

/// Handle of a node inside a [`CgroupTree`](super::tree::CgroupTree)
///
/// A slot freed by a delete or rescan may be reused, but with a new
/// generation, so handles to removed nodes stay dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) slot: usize,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.slot, self.generation)
    }
}

/// Represents a single cgroup directory
#[derive(Debug, Clone)]
pub struct CgroupNode {
    /// Normalized logical name (e.g. `/cpu/group1`)
    pub(crate) absname: String,

    /// Last segment of `absname`
    pub(crate) name: String,

    /// Normalized physical directory, if backed by one
    pub(crate) path: Option<PathBuf>,

    /// Parent handle (non-owning)
    pub(crate) parent: Option<NodeId>,

    /// Children keyed by their own `absname`
    pub(crate) children: HashMap<String, NodeId>,

    /// Control files keyed by file name
    pub(crate) settings: HashMap<String, CgroupSetting>,
}

impl CgroupNode {
    pub(crate) fn new(parent: Option<NodeId>, absname: &str, path: Option<&Path>) -> Self {
        let absname = normalize_absname(absname);
        let name = absname_basename(&absname).to_string();

        Self {
            absname,
            name,
            path: path.map(normalize_path),
            parent,
            children: HashMap::new(),
            settings: HashMap::new(),
        }
    }

    pub fn absname(&self) -> &str {
        &self.absname
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Whether this node is backed by a directory
    pub fn is_physical(&self) -> bool {
        self.path.is_some()
    }

    /// Child handle by the child's logical name
    pub fn child(&self, absname: &str) -> Option<NodeId> {
        self.children.get(absname).copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn setting(&self, name: &str) -> Option<&CgroupSetting> {
        self.settings.get(name)
    }

    pub fn has_setting(&self, name: &str) -> bool {
        self.settings.contains_key(name)
    }

    /// Sorted setting names
    pub fn setting_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.settings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Display for CgroupNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut children: Vec<&str> = self.children.keys().map(String::as_str).collect();
        children.sort_unstable();

        write!(
            f,
            "{}, {}, {:?}, {:?}",
            self.name,
            self.path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            children,
            self.setting_names()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_normalizes_names() {
        let node = CgroupNode::new(
            None,
            "cpu//group1/",
            Some(Path::new("/sys/fs/cgroup/cpu/group1/")),
        );

        assert_eq!(node.absname(), "/cpu/group1");
        assert_eq!(node.name(), "group1");
        assert_eq!(node.path(), Some(Path::new("/sys/fs/cgroup/cpu/group1")));
        assert!(node.is_physical());
        assert_eq!(node.parent(), None);
    }

    #[test]
    fn test_root_node() {
        let node = CgroupNode::new(None, "/", None);

        assert_eq!(node.absname(), "/");
        assert_eq!(node.name(), "");
        assert!(!node.is_physical());
        assert_eq!(node.child_count(), 0);
        assert!(node.setting_names().is_empty());
    }

    #[test]
    fn test_node_display() {
        let node = CgroupNode::new(None, "/cpu", Some(Path::new("/sys/fs/cgroup/cpu")));
        assert_eq!(node.to_string(), "cpu, /sys/fs/cgroup/cpu, [], []");
    }
}
