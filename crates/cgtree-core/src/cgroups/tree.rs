//! In-memory snapshot of a cgroup hierarchy
//!
//! Nodes live in a flat arena owned by [`CgroupTree`]; parents and children
//! refer to each other through [`NodeId`] handles. Freed slots go on a free
//! list and are reused under a bumped generation. The tree is built once by
//! scanning the filesystem and only changes through `create_cgroup`,
//! `delete_cgroup`, `delete_self` and `rescan`.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::error::{CgroupError, Result};
use super::node::{CgroupNode, NodeId};
use super::setting::CgroupSetting;
use super::utils::{join_absname, name_segments, normalize_path, ROOT_ABSNAME};

/// Membership files, in lookup order
pub const TASK_FILES: [&str; 2] = ["tasks", "cgroup.procs"];

/// One usable entry of a cgroup directory
#[derive(Debug)]
enum ScanEntry {
    Cgroup { name: String, path: PathBuf },
    Setting { name: String, path: PathBuf },
}

/// List a directory once, keeping subdirectories and regular files
///
/// Symlinks and other entry types are skipped. Entries that cannot be
/// inspected are logged and skipped.
fn read_entries(path: &Path) -> Result<Vec<ScanEntry>> {
    let dir = fs::read_dir(path).map_err(|e| CgroupError::from_io(path, e))?;
    let mut entries = Vec::new();

    for entry in dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read entry in {:?}: {}", path, e);
                continue;
            }
        };

        let entry_path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                warn!("Failed to stat {:?}: {}", entry_path, e);
                continue;
            }
        };

        if file_type.is_symlink() {
            debug!("Skipping symlink {:?}", entry_path);
            continue;
        }

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!("Skipping non UTF-8 entry {:?} in {:?}", raw, path);
                continue;
            }
        };

        if file_type.is_dir() {
            entries.push(ScanEntry::Cgroup {
                name,
                path: entry_path,
            });
        } else if file_type.is_file() {
            entries.push(ScanEntry::Setting {
                name,
                path: entry_path,
            });
        }
    }

    Ok(entries)
}

/// Arena slot; `generation` changes every time the slot is freed
#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<CgroupNode>,
}

/// Arena of cgroup nodes rooted at one directory
#[derive(Debug, Clone)]
pub struct CgroupTree {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
    root: NodeId,
}

impl CgroupTree {
    /// Scan the hierarchy mounted at `path`, with `/` as its logical name
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_absname(ROOT_ABSNAME, path)
    }

    /// Scan the hierarchy at `path` under the logical name `absname`
    ///
    /// Fails only if `path` itself cannot be listed. Unreadable descendants
    /// are left out of the tree.
    pub fn with_absname(absname: &str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let entries = read_entries(path)?;

        let mut tree = Self::empty();
        tree.root = tree.alloc(CgroupNode::new(None, absname, Some(path)));
        tree.populate(tree.root, entries);

        debug!("Scanned {:?}: {} cgroup(s)", path, tree.len());
        Ok(tree)
    }

    /// A single node with no backing directory
    pub fn detached(absname: &str) -> Self {
        let mut tree = Self::empty();
        tree.root = tree.alloc(CgroupNode::new(None, absname, None));
        tree
    }

    fn empty() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            root: NodeId {
                slot: 0,
                generation: 0,
            },
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&CgroupNode> {
        self.slots
            .get(id.slot)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Direct children, ordered by logical name
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };

        let mut keyed: Vec<(&String, NodeId)> =
            node.children.iter().map(|(k, v)| (k, *v)).collect();
        keyed.sort_unstable_by(|a, b| a.0.cmp(b.0));
        keyed.into_iter().map(|(_, child)| child).collect()
    }

    /// The node and all of its descendants, parents before children
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            out.push(current);
            let mut children = self.children(current);
            children.reverse();
            stack.extend(children);
        }

        out
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of arena slots ever allocated, live or free
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Find a cgroup by logical name
    ///
    /// A name equal to the node's own logical name resolves to the node;
    /// anything else is walked relative to it (`"a/b"` from `/cpu` finds
    /// `/cpu/a/b`).
    pub fn get_cgroup_by_name(&self, id: NodeId, name: &str) -> Option<NodeId> {
        let node = self.node(id)?;
        let segments = name_segments(name);

        if segments == name_segments(&node.absname) {
            return Some(id);
        }
        if segments.is_empty() {
            return None;
        }

        let mut current = id;
        for segment in segments {
            let cursor = self.node(current)?;
            current = cursor.child(&join_absname(&cursor.absname, segment))?;
        }

        Some(current)
    }

    /// Find a direct child by physical path (not recursive)
    pub fn get_cgroup_by_path(&self, id: NodeId, path: impl AsRef<Path>) -> Option<NodeId> {
        let wanted = normalize_path(path.as_ref());

        self.children(id).into_iter().find(|child| {
            self.node(*child)
                .and_then(CgroupNode::path)
                .map_or(false, |p| p == wanted.as_path())
        })
    }

    /// Create a cgroup hierarchy below `id`
    ///
    /// Every missing level of `name` is created, existing levels are reused,
    /// so calling this twice returns the same node.
    pub fn create_cgroup(&mut self, id: NodeId, name: &str) -> Result<NodeId> {
        let node = self.expect_node(id)?;
        if !node.is_physical() {
            warn!("Cannot create {:?} under {}: no physical path", name, node.absname);
            return Err(CgroupError::NoPhysicalPath(node.absname.clone()));
        }

        let segments = name_segments(name);
        if segments.is_empty() || segments.contains(&"..") {
            return Err(CgroupError::InvalidName(name.to_string()));
        }

        let mut current = id;
        for segment in segments {
            let cursor = self.expect_node(current)?;
            let absname = join_absname(&cursor.absname, segment);

            if let Some(existing) = cursor.child(&absname) {
                current = existing;
                continue;
            }

            let path = cursor
                .path
                .as_ref()
                .map(|p| p.join(segment))
                .ok_or_else(|| CgroupError::NoPhysicalPath(cursor.absname.clone()))?;

            fs::create_dir_all(&path).map_err(|e| {
                warn!("Failed to create cgroup directory {:?}: {}", path, e);
                CgroupError::from_io(&path, e)
            })?;
            info!("Created cgroup {} at {:?}", absname, path);

            let entries = read_entries(&path)?;
            let child =
                self.alloc(CgroupNode::new(Some(current), &absname, Some(path.as_path())));
            self.link(current, child);
            self.populate(child, entries);
            current = child;
        }

        Ok(current)
    }

    /// Delete the cgroup `name` (resolved relative to `id`) and its subtree
    ///
    /// The target is detached from its parent before any directory is
    /// removed, so a partial failure never leaves it reachable from the tree.
    pub fn delete_cgroup(&mut self, id: NodeId, name: &str) -> Result<()> {
        let target = self.get_cgroup_by_name(id, name).ok_or_else(|| {
            warn!("Cannot delete {:?}: cgroup not found", name);
            CgroupError::NotFound(name.to_string())
        })?;
        if target == self.root {
            warn!("Refusing to delete the tree root through {:?}", name);
            return Err(CgroupError::InvalidName(name.to_string()));
        }

        self.detach(target);
        let outcome = self.delete_self(target);
        self.release(target);

        outcome
    }

    /// Remove this cgroup's directory after removing all of its children
    ///
    /// Every child is attempted even if a sibling fails. Nodes whose
    /// directory was removed leave the tree; the others stay. Succeeds only
    /// if the whole subtree was removed.
    pub fn delete_self(&mut self, id: NodeId) -> Result<()> {
        let node = self.expect_node(id)?;
        let absname = node.absname.clone();
        if !node.is_physical() {
            warn!("Cannot delete {}: no physical path", absname);
            return Err(CgroupError::NoPhysicalPath(absname));
        }

        let mut failures = Vec::new();
        self.remove_subtree(id, &mut failures);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CgroupError::PartialDelete { absname, failures })
        }
    }

    /// Tokens of the `tasks` (or `cgroup.procs`) file
    pub fn get_tasks(&self, id: NodeId) -> Result<Vec<String>> {
        let setting = self.require_membership_setting(id)?;
        let content = setting.get()?;

        Ok(content.split_whitespace().map(str::to_string).collect())
    }

    /// Move process `pid` into this cgroup
    ///
    /// Writes the pid once to `tasks` (or `cgroup.procs`); the kernel adds
    /// the process to the membership list.
    pub fn append_task(&self, id: NodeId, pid: u32) -> Result<()> {
        let setting = self.require_membership_setting(id)?;

        setting.set(&pid.to_string()).map_err(|e| {
            warn!(
                "Failed to append task {} to {}: {}",
                pid,
                self.node(id).map(CgroupNode::absname).unwrap_or_default(),
                e
            );
            e
        })?;

        debug!("Appended task {} via {:?}", pid, setting.path());
        Ok(())
    }

    /// The membership file in use: `tasks` if present, else `cgroup.procs`
    pub fn membership_setting(&self, id: NodeId) -> Option<&CgroupSetting> {
        let node = self.node(id)?;
        TASK_FILES.iter().find_map(|name| node.setting(name))
    }

    pub fn get_setting(&self, id: NodeId, name: &str) -> Option<&CgroupSetting> {
        self.node(id)?.setting(name)
    }

    /// Settings of a node, ordered by name
    pub fn settings(&self, id: NodeId) -> Vec<&CgroupSetting> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };

        let mut settings: Vec<&CgroupSetting> = node.settings.values().collect();
        settings.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        settings
    }

    /// Write `value` to an existing setting; control files are never created
    pub fn set_setting(&self, id: NodeId, name: &str, value: &str) -> Result<()> {
        let node = self.expect_node(id)?;

        match node.setting(name) {
            Some(setting) => setting.set(value),
            None => {
                warn!("Setting {} not found in cgroup {}", name, node.absname);
                Err(CgroupError::NotFound(format!("{}/{}", node.absname, name)))
            }
        }
    }

    /// Rebuild a node's children and settings from the filesystem
    ///
    /// The node keeps its handle. If its directory cannot be listed it is
    /// left with no children or settings.
    pub fn rescan(&mut self, id: NodeId) -> Result<()> {
        let node = self.expect_node(id)?;
        let Some(path) = node.path.clone() else {
            warn!("Cannot rescan {}: no physical path", node.absname);
            return Err(CgroupError::NoPhysicalPath(node.absname.clone()));
        };

        for child in self.children(id) {
            self.release(child);
        }
        if let Some(node) = self.node_mut(id) {
            node.children.clear();
            node.settings.clear();
        }

        let entries = read_entries(&path)?;
        self.populate(id, entries);

        debug!("Rescanned {:?}", path);
        Ok(())
    }

    fn expect_node(&self, id: NodeId) -> Result<&CgroupNode> {
        self.node(id)
            .ok_or_else(|| CgroupError::NotFound(format!("node {}", id)))
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut CgroupNode> {
        self.slots
            .get_mut(id.slot)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn require_membership_setting(&self, id: NodeId) -> Result<&CgroupSetting> {
        let node = self.expect_node(id)?;

        self.membership_setting(id).ok_or_else(|| {
            warn!("tasks or cgroup.procs not found in cgroup {}", node.absname);
            CgroupError::NotFound(format!("{}/{}", node.absname, TASK_FILES.join("|")))
        })
    }

    fn alloc(&mut self, node: CgroupNode) -> NodeId {
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = Some(node);
            return NodeId {
                slot: index,
                generation: slot.generation,
            };
        }

        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            slot: self.slots.len() - 1,
            generation: 0,
        }
    }

    /// Register `child` under its parent, keyed by the child's logical name
    fn link(&mut self, parent: NodeId, child: NodeId) {
        let Some(absname) = self.node(child).map(|c| c.absname.clone()) else {
            return;
        };
        if let Some(parent) = self.node_mut(parent) {
            parent.children.insert(absname, child);
        }
    }

    /// Remove a node from its parent's children
    fn detach(&mut self, id: NodeId) {
        let Some((parent, absname)) = self
            .node_mut(id)
            .map(|node| (node.parent.take(), node.absname.clone()))
        else {
            return;
        };

        if let Some(parent) = parent.and_then(|p| self.node_mut(p)) {
            parent.children.remove(&absname);
        }
    }

    /// Free a node and every descendant still attached to it
    fn release(&mut self, id: NodeId) {
        for node in self.descendants(id) {
            let Some(slot) = self.slots.get_mut(node.slot) else {
                continue;
            };
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(node.slot);
                self.live -= 1;
            }
        }
    }

    fn populate(&mut self, id: NodeId, entries: Vec<ScanEntry>) {
        let Some(absname) = self.node(id).map(|n| n.absname.clone()) else {
            return;
        };

        for entry in entries {
            match entry {
                ScanEntry::Setting { name, path } => {
                    let setting = CgroupSetting::new(name.clone(), path);
                    if let Some(node) = self.node_mut(id) {
                        node.settings.insert(name, setting);
                    }
                }
                ScanEntry::Cgroup { name, path } => match read_entries(&path) {
                    Ok(child_entries) => {
                        let child_absname = join_absname(&absname, &name);
                        let node = CgroupNode::new(Some(id), &child_absname, Some(path.as_path()));
                        let child = self.alloc(node);
                        self.link(id, child);
                        self.populate(child, child_entries);
                    }
                    Err(e) => warn!("Skipping cgroup {:?}: {}", path, e),
                },
            }
        }
    }

    fn remove_subtree(&mut self, id: NodeId, failures: &mut Vec<CgroupError>) {
        for child in self.children(id) {
            self.remove_subtree(child, failures);
        }

        let Some(node) = self.node(id) else {
            return;
        };
        let Some(path) = node.path.clone() else {
            failures.push(CgroupError::NoPhysicalPath(node.absname.clone()));
            return;
        };
        let absname = node.absname.clone();

        match fs::remove_dir(&path) {
            Ok(()) => {
                info!("Removed cgroup {} ({:?})", absname, path);
                self.detach(id);
                self.release(id);
            }
            Err(e) => {
                warn!("Failed to delete {:?}: {}", path, e);
                failures.push(CgroupError::from_io(&path, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_tree() {
        let tree = CgroupTree::detached("/cpu");
        let root = tree.root();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.node(root).unwrap().absname(), "/cpu");
        assert_eq!(tree.get_cgroup_by_name(root, "cpu"), Some(root));
        assert_eq!(tree.get_cgroup_by_name(root, "/cpu/"), Some(root));
        assert_eq!(tree.get_cgroup_by_name(root, "other"), None);
        assert_eq!(tree.get_cgroup_by_name(root, ""), None);
    }

    #[test]
    fn test_detached_rejects_physical_operations() {
        let mut tree = CgroupTree::detached("/cpu");
        let root = tree.root();

        assert!(matches!(
            tree.create_cgroup(root, "a"),
            Err(CgroupError::NoPhysicalPath(_))
        ));
        assert!(matches!(
            tree.delete_self(root),
            Err(CgroupError::NoPhysicalPath(_))
        ));
        assert!(matches!(
            tree.rescan(root),
            Err(CgroupError::NoPhysicalPath(_))
        ));
        assert!(tree.contains(root));
    }

    #[test]
    fn test_missing_membership_files() {
        let tree = CgroupTree::detached("/");
        let root = tree.root();

        assert!(tree.membership_setting(root).is_none());
        assert!(tree.get_tasks(root).unwrap_err().is_not_found());
        assert!(tree.append_task(root, 1234).unwrap_err().is_not_found());
    }

    #[test]
    fn test_set_unknown_setting() {
        let tree = CgroupTree::detached("/");
        let err = tree.set_setting(tree.root(), "cpu.max", "max").unwrap_err();
        assert!(err.is_not_found());
        assert!(tree.get_setting(tree.root(), "cpu.max").is_none());
    }

    #[test]
    fn test_open_missing_root() {
        let err = CgroupTree::open("/nonexistent/cgtree/root").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = CgroupTree::open(dir.path()).unwrap();
        let root = tree.root();

        for name in ["", "/", "..", "a/../../b"] {
            assert!(
                matches!(tree.create_cgroup(root, name), Err(CgroupError::InvalidName(_))),
                "{:?} should be rejected",
                name
            );
        }
        assert_eq!(tree.len(), 1);

        assert!(matches!(
            tree.delete_cgroup(root, "/"),
            Err(CgroupError::InvalidName(_))
        ));
        assert!(tree.contains(root));
        assert!(dir.path().exists());
    }

    #[test]
    fn test_stale_handle() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = CgroupTree::open(dir.path()).unwrap();
        let root = tree.root();

        let child = tree.create_cgroup(root, "a").unwrap();
        tree.delete_cgroup(root, "a").unwrap();

        assert!(!tree.contains(child));
        assert!(tree.node(child).is_none());
        assert!(tree.delete_self(child).unwrap_err().is_not_found());

        // The slot comes back under a new generation
        let again = tree.create_cgroup(root, "a").unwrap();
        assert_ne!(again, child);
        assert!(!tree.contains(child));
        assert_eq!(tree.node(again).unwrap().absname(), "/a");
        assert_eq!(tree.capacity(), 2);
    }

    #[test]
    fn test_len_tracks_live_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = CgroupTree::open(dir.path()).unwrap();
        let root = tree.root();
        assert_eq!(tree.len(), 1);

        tree.create_cgroup(root, "a/b/c").unwrap();
        assert_eq!(tree.len(), 4);

        tree.delete_cgroup(root, "a").unwrap();
        assert_eq!(tree.len(), 1);
        assert!(!tree.is_empty());
        assert_eq!(tree.capacity(), 4);
    }
}
