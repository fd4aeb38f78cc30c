//! Finding - ephemeral agent output consumed during bootstrap/planning.
//!
//! Modeled as tagged variants rather than a dynamically-typed metadata map
//! (see SPEC_FULL.md §9 / DESIGN.md): each variant carries exactly the
//! fields its kind needs, and the bootstrap persistence step dispatches on
//! variant instead of probing a generic `HashMap<String, Value>`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFinding {
    pub summary: String,
    pub content: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternFinding {
    pub summary: String,
    pub context: String,
    pub solution: String,
    pub consequences: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionFinding {
    pub summary: String,
    pub content: String,
    /// Name of the feature this decision applies to, resolved by the
    /// persistence step against already-created Feature nodes. Empty string
    /// means "no link" (falls back to the synthesized Core Architecture
    /// feature).
    pub component: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintFinding {
    pub summary: String,
    pub content: String,
    pub confidence: f32,
}

/// A single piece of agent output, not yet persisted as a Node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Finding {
    Feature(FeatureFinding),
    Pattern(PatternFinding),
    Decision(DecisionFinding),
    Constraint(ConstraintFinding),
}

impl Finding {
    pub fn summary(&self) -> &str {
        match self {
            Self::Feature(f) => &f.summary,
            Self::Pattern(f) => &f.summary,
            Self::Decision(f) => &f.summary,
            Self::Constraint(f) => &f.summary,
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Self::Feature(f) => f.confidence,
            Self::Pattern(f) => f.confidence,
            Self::Decision(f) => f.confidence,
            Self::Constraint(f) => f.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_dispatches_on_variant() {
        let finding = Finding::Feature(FeatureFinding {
            summary: "Core Feature".into(),
            content: "c".into(),
            confidence: 0.9,
        });
        assert_eq!(finding.summary(), "Core Feature");
        assert_eq!(finding.confidence(), 0.9);
    }
}
