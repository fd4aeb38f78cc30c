//! Plan - a goal plus its ordered tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Active,
    Completed,
    Archived,
}

impl Default for PlanStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Status transitions: draft->active->completed->archived, with
    /// active<->archived allowed.
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Completed, Self::Archived)
                | (Self::Active, Self::Archived)
                | (Self::Archived, Self::Active)
        )
    }
}

/// A goal plus its ordered tasks. Tasks themselves are stored separately and
/// owned exclusively by the plan (cascade delete); this struct carries only
/// the plan's own fields — callers fetch tasks via `ListTasks(plan_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    /// Verbatim user text.
    pub original_goal: String,
    /// LLM-refined goal, set once the clarify loop completes.
    pub enriched_goal: Option<String>,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(original_goal: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            original_goal: original_goal.into(),
            enriched_goal: None,
            status: PlanStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: PlanStatus) -> Result<(), String> {
        if !self.status.can_transition_to(next) {
            return Err(format!(
                "cannot transition plan from {} to {}",
                self.status.as_str(),
                next.as_str()
            ));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_to_active_to_completed_to_archived_is_valid() {
        let mut plan = Plan::new("goal");
        assert!(plan.transition(PlanStatus::Active).is_ok());
        assert!(plan.transition(PlanStatus::Completed).is_ok());
        assert!(plan.transition(PlanStatus::Archived).is_ok());
    }

    #[test]
    fn archived_can_return_to_active() {
        let mut plan = Plan::new("goal");
        plan.transition(PlanStatus::Active).unwrap();
        plan.transition(PlanStatus::Completed).unwrap();
        plan.transition(PlanStatus::Archived).unwrap();
        assert!(plan.transition(PlanStatus::Active).is_ok());
    }

    #[test]
    fn draft_cannot_jump_to_completed() {
        let mut plan = Plan::new("goal");
        assert!(plan.transition(PlanStatus::Completed).is_err());
    }
}
