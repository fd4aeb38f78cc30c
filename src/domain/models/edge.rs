//! Edge - a typed directed relation between two nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A typed directed relation between two nodes (e.g. decision -> feature
/// "applies_to", task -> task "depends_on").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    pub kind: String,
    pub weight: Option<f32>,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            kind: kind.into(),
            weight: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// Common edge kinds used by the bootstrap orchestrator and planning
/// pipeline. Not exhaustive: callers may use arbitrary strings.
pub mod kinds {
    pub const APPLIES_TO: &str = "applies_to";
    pub const DEPENDS_ON: &str = "depends_on";
    pub const IMPLEMENTS: &str = "implements";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_edge_has_no_weight_by_default() {
        let edge = Edge::new("a", "b", kinds::APPLIES_TO);
        assert!(edge.weight.is_none());
        assert_eq!(edge.kind, "applies_to");
    }
}
