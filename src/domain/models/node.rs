//! Node - the unit of project memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of a node's `summary`, per the data-model invariant.
pub const MAX_SUMMARY_LEN: usize = 240;

/// Kind of a memory node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Decision,
    Feature,
    Pattern,
    Constraint,
    Plan,
    Task,
    Note,
    Metadata,
    Documentation,
    Unknown,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Feature => "feature",
            Self::Pattern => "pattern",
            Self::Constraint => "constraint",
            Self::Plan => "plan",
            Self::Task => "task",
            Self::Note => "note",
            Self::Metadata => "metadata",
            Self::Documentation => "documentation",
            Self::Unknown => "unknown",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "decision" => Some(Self::Decision),
            "feature" => Some(Self::Feature),
            "pattern" => Some(Self::Pattern),
            "constraint" => Some(Self::Constraint),
            "plan" => Some(Self::Plan),
            "task" => Some(Self::Task),
            "note" => Some(Self::Note),
            "metadata" => Some(Self::Metadata),
            "documentation" => Some(Self::Documentation),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Structured payload fields carried by a node, beyond summary/content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub why: Option<String>,
    #[serde(default)]
    pub tradeoffs: Vec<String>,
    #[serde(default)]
    pub code_snippets: Vec<String>,
    #[serde(default)]
    pub file_paths: Vec<String>,
    /// Free-form custom fields (e.g. bootstrap-resolved `component` name used
    /// to link a Decision to its Feature).
    #[serde(default)]
    pub custom: std::collections::HashMap<String, serde_json::Value>,
}

/// A typed, content-addressed record in project memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub summary: String,
    pub content: String,
    #[serde(default)]
    pub payload: NodePayload,
    pub source_agent: Option<String>,
    pub confidence: f32,
    pub workspace: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Embedding vector, if one has been computed. `embedding_dim` tracks the
    /// length separately from `embedding.len()` so a legacy vector flagged
    /// by `Check()` can still be queried for display even though it no
    /// longer participates in vector search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub embedding_is_legacy: bool,
}

impl Node {
    pub fn new(kind: NodeKind, summary: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            summary: summary.into(),
            content: content.into(),
            payload: NodePayload::default(),
            source_agent: None,
            confidence: 0.8,
            workspace: None,
            created_at: now,
            updated_at: now,
            embedding: None,
            embedding_is_legacy: false,
        }
    }

    pub fn with_source_agent(mut self, agent: impl Into<String>) -> Self {
        self.source_agent = Some(agent.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn with_payload(mut self, payload: NodePayload) -> Self {
        self.payload = payload;
        self
    }

    /// Validate the data-model invariants: summary non-empty and bounded,
    /// confidence in [0,1].
    pub fn validate(&self) -> Result<(), String> {
        if self.summary.is_empty() {
            return Err("node summary cannot be empty".to_string());
        }
        if self.summary.len() > MAX_SUMMARY_LEN {
            return Err(format!(
                "node summary exceeds {MAX_SUMMARY_LEN} characters"
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence {} out of range [0,1]",
                self.confidence
            ));
        }
        Ok(())
    }

    /// A normalized key used for bootstrap deduplication: `(kind, summary)`
    /// lower-cased and whitespace-collapsed.
    pub fn dedup_key(&self) -> (NodeKind, String) {
        let normalized = self.summary.trim().to_lowercase();
        let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
        (self.kind, normalized)
    }
}

/// Fields accepted by a field-wise `Update`: `None` means "unchanged".
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub summary: Option<String>,
    pub content: Option<String>,
    pub payload: Option<NodePayload>,
    pub confidence: Option<f32>,
    pub workspace: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            NodeKind::Decision,
            NodeKind::Feature,
            NodeKind::Pattern,
            NodeKind::Constraint,
            NodeKind::Plan,
            NodeKind::Task,
            NodeKind::Note,
            NodeKind::Metadata,
            NodeKind::Documentation,
            NodeKind::Unknown,
        ] {
            assert_eq!(NodeKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn validate_rejects_empty_summary() {
        let node = Node::new(NodeKind::Feature, "", "content");
        assert!(node.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_summary() {
        let node = Node::new(NodeKind::Feature, "x".repeat(241), "content");
        assert!(node.validate().is_err());
    }

    #[test]
    fn validate_rejects_confidence_out_of_range() {
        let node = Node::new(NodeKind::Feature, "s", "c").with_confidence(1.5);
        assert!(node.validate().is_err());
    }

    #[test]
    fn dedup_key_normalizes_whitespace_and_case() {
        let a = Node::new(NodeKind::Feature, "Core  Feature", "c");
        let b = Node::new(NodeKind::Feature, "core feature", "c2");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
