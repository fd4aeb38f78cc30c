//! `index.json` - a cache of feature summaries for O(1) listing.
//!
//! Rebuilt atomically by a single task; readers tolerate
//! staleness since the relational store is canonical.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::error::TaskWingResult;
use crate::domain::models::Node;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub summary: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MemoryIndex {
    pub features: Vec<IndexEntry>,
}

/// Write `index.json` atomically (write to a temp file, then rename), so a
/// crash mid-write never leaves a half-written index behind.
pub fn rebuild_index(memory_root: &Path, nodes: &[Node]) -> TaskWingResult<()> {
    let mut features: Vec<IndexEntry> = nodes
        .iter()
        .filter(|n| n.kind == crate::domain::models::NodeKind::Feature)
        .map(|n| IndexEntry {
            id: n.id.clone(),
            summary: n.summary.clone(),
            updated_at: n.updated_at,
        })
        .collect();
    features.sort_by(|a, b| a.id.cmp(&b.id));

    let index = MemoryIndex { features };
    let json = serde_json::to_string_pretty(&index)?;

    std::fs::create_dir_all(memory_root)?;
    let final_path = memory_root.join("index.json");
    let tmp_path = memory_root.join("index.json.tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, &final_path)?;
    Ok(())
}

pub fn read_index(memory_root: &Path) -> TaskWingResult<Option<MemoryIndex>> {
    let path = memory_root.join("index.json");
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let index: MemoryIndex = serde_json::from_str(&contents)?;
    Ok(Some(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::NodeKind;

    #[test]
    fn rebuild_on_consistent_store_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let node = Node::new(NodeKind::Feature, "Core Feature", "content");
        rebuild_index(dir.path(), &[node.clone()]).unwrap();
        let first = std::fs::read_to_string(dir.path().join("index.json")).unwrap();
        rebuild_index(dir.path(), &[node]).unwrap();
        let second = std::fs::read_to_string(dir.path().join("index.json")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn only_feature_nodes_are_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let feature = Node::new(NodeKind::Feature, "Feature", "c");
        let decision = Node::new(NodeKind::Decision, "Decision", "c");
        rebuild_index(dir.path(), &[feature, decision]).unwrap();
        let index = read_index(dir.path()).unwrap().unwrap();
        assert_eq!(index.features.len(), 1);
    }
}
