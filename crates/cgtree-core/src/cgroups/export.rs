//! Read-only export of a cgroup subtree

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

use super::node::NodeId;
use super::tree::CgroupTree;
use crate::error::{Error, Result};

/// Default JSON indentation width
pub const DEFAULT_EXPORT_INDENT: usize = 4;

/// Point-in-time record of a cgroup and its subtree
///
/// Reflects the in-memory tree; settings are read when the record is built
/// and are `None` if unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CgroupRecord {
    pub name: String,

    /// Physical path, empty for a node without one
    pub path: String,

    pub children: Vec<CgroupRecord>,

    pub settings: BTreeMap<String, Option<String>>,
}

impl CgroupRecord {
    /// Number of records in this subtree, including itself
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(CgroupRecord::count).sum::<usize>()
    }
}

impl CgroupTree {
    /// Build the export record for `id` and its subtree
    pub fn export(&self, id: NodeId) -> Option<CgroupRecord> {
        let node = self.node(id)?;

        let settings = self
            .settings(id)
            .into_iter()
            .map(|setting| (setting.name().to_string(), setting.get().ok()))
            .collect();

        let children = self
            .children(id)
            .into_iter()
            .filter_map(|child| self.export(child))
            .collect();

        Some(CgroupRecord {
            name: node.name().to_string(),
            path: node
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            children,
            settings,
        })
    }

    /// Render the export record of `id` as indented JSON
    pub fn export_to_json_string(&self, id: NodeId, indent: usize) -> Result<String> {
        let record = self
            .export(id)
            .ok_or_else(|| Error::Other(format!("Unknown cgroup node {}", id)))?;

        let indent = vec![b' '; indent];
        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(&indent));
        record.serialize(&mut serializer)?;

        String::from_utf8(buf).map_err(|e| Error::Other(format!("Invalid UTF-8 in export: {}", e)))
    }

    /// Export the subtree of `id` to a JSON file
    pub fn export_to_json(&self, id: NodeId, filename: impl AsRef<Path>) -> Result<()> {
        let filename = filename.as_ref();
        let json = self.export_to_json_string(id, DEFAULT_EXPORT_INDENT)?;
        fs::write(filename, json)?;

        info!("Exported cgroup tree to {:?}", filename);
        Ok(())
    }
}
