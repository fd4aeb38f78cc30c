//! Task - a unit of work owned by a Plan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task within a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Draft,
    Pending,
    InProgress,
    Verifying,
    Completed,
    Failed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "verifying" => Some(Self::Verifying),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Status never regresses past `completed` except via an explicit reset
    /// (callers that need a reset construct a fresh status directly rather
    /// than transitioning through this table).
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Draft => &[Self::Pending],
            Self::Pending => &[Self::InProgress],
            Self::InProgress => &[Self::Verifying, Self::Completed, Self::Failed],
            Self::Verifying => &[Self::Completed, Self::Failed],
            Self::Completed => &[],
            Self::Failed => &[Self::Pending],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// Claim metadata recorded when a task moves to `in_progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskClaim {
    pub session_id: String,
    pub claimed_at: DateTime<Utc>,
}

/// A unit of work owned by a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub plan_id: String,
    pub title: String,
    pub description: String,
    /// Higher is more urgent.
    pub priority: i32,
    pub status: TaskStatus,
    pub assigned_agent_hint: Option<String>,
    pub acceptance_criteria: Vec<String>,
    pub validation_steps: Vec<String>,
    pub claim: Option<TaskClaim>,
    /// Required by the `completed` invariant: a non-empty summary of what
    /// was done, set when the task transitions to `Completed`.
    pub completion_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(plan_id: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            plan_id: plan_id.into(),
            title: title.into(),
            description: description.into(),
            priority: 0,
            status: TaskStatus::default(),
            assigned_agent_hint: None,
            acceptance_criteria: Vec::new(),
            validation_steps: Vec::new(),
            claim: None,
            completion_summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_acceptance_criteria(mut self, criteria: Vec<String>) -> Self {
        self.acceptance_criteria = criteria;
        self
    }

    pub fn with_validation_steps(mut self, steps: Vec<String>) -> Self {
        self.validation_steps = steps;
        self
    }

    /// Claim the task for `session_id`. Returns an error string (not a
    /// `TaskWingError`, to keep this model layer free of the error
    /// taxonomy's storage concerns) if another session already holds the
    /// claim and has not released it.
    pub fn claim(&mut self, session_id: impl Into<String>) -> Result<(), String> {
        let session_id = session_id.into();
        if let Some(existing) = &self.claim {
            if existing.session_id != session_id {
                return Err(format!(
                    "task already claimed by session {}",
                    existing.session_id
                ));
            }
        }
        self.claim = Some(TaskClaim {
            session_id,
            claimed_at: Utc::now(),
        });
        self.status = TaskStatus::InProgress;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn release(&mut self) {
        self.claim = None;
        if self.status == TaskStatus::InProgress {
            self.status = TaskStatus::Pending;
        }
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self, summary: impl Into<String>) -> Result<(), String> {
        let summary = summary.into();
        if summary.trim().is_empty() {
            return Err("completion summary cannot be empty".to_string());
        }
        self.status = TaskStatus::Completed;
        self.completion_summary = Some(summary);
        self.claim = None;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_by_second_session_is_rejected() {
        let mut task = Task::new("p1", "t", "d");
        task.claim("session-a").unwrap();
        let err = task.claim("session-b").unwrap_err();
        assert!(err.contains("session-a"));
    }

    #[test]
    fn same_session_can_reclaim() {
        let mut task = Task::new("p1", "t", "d");
        task.claim("session-a").unwrap();
        assert!(task.claim("session-a").is_ok());
    }

    #[test]
    fn complete_requires_nonempty_summary() {
        let mut task = Task::new("p1", "t", "d");
        task.claim("s").unwrap();
        assert!(task.complete("").is_err());
        assert!(task.complete("  ").is_err());
        assert!(task.complete("done").is_ok());
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.claim.is_none());
    }

    #[test]
    fn release_after_claim_returns_to_pending() {
        let mut task = Task::new("p1", "t", "d");
        task.status = TaskStatus::Pending;
        task.claim("s").unwrap();
        task.release();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.claim.is_none());
    }

    #[test]
    fn status_transition_table_excludes_regression_past_completed() {
        assert!(TaskStatus::Completed.valid_transitions().is_empty());
        assert!(TaskStatus::Failed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Pending));
    }
}
