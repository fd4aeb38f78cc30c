//! ClarifySession - persisted state of the clarification loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One round of the clarify loop: the questions asked and the answers given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QaRound {
    pub questions: Vec<String>,
    pub answers: Vec<String>,
}

/// One decompose-produced phase, expanded into tasks independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub title: String,
    pub description: String,
    pub expanded: bool,
}

impl Phase {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            expanded: false,
        }
    }
}

/// Persisted state of the iterative Q/A loop that converts a goal into an
/// enriched goal, plus the decompose/expand phase list once the session
/// moves past `Ready`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarifySession {
    pub id: String,
    pub plan_id: Option<String>,
    pub goal: String,
    pub round_index: u32,
    pub history: Vec<QaRound>,
    pub enriched_goal: Option<String>,
    pub ready_to_plan: bool,
    pub max_rounds: u32,
    /// Questions asked in the current round that have not yet been answered.
    #[serde(default)]
    pub pending_questions: Vec<String>,
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub aborted: bool,
    /// Set once `finalize` (or the `generate` batch shortcut) has run. A
    /// non-`None` `plan_id` alone is not sufficient: `decompose` also
    /// assigns a draft plan before the session reaches `Finalized`.
    #[serde(default)]
    pub finalized: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClarifySession {
    pub fn new(goal: impl Into<String>, max_rounds: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            plan_id: None,
            goal: goal.into(),
            round_index: 0,
            history: Vec::new(),
            enriched_goal: None,
            ready_to_plan: false,
            max_rounds,
            pending_questions: Vec::new(),
            phases: Vec::new(),
            aborted: false,
            finalized: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the max-rounds cap has been reached.
    pub fn max_rounds_reached(&self) -> bool {
        self.round_index >= self.max_rounds
    }

    /// Terminal when ready to plan OR max rounds reached.
    pub fn is_terminal(&self) -> bool {
        self.ready_to_plan || self.max_rounds_reached()
    }

    /// Number of decompose-produced phases not yet expanded.
    pub fn remaining_phases(&self) -> usize {
        self.phases.iter().filter(|p| !p.expanded).count()
    }

    pub fn all_phases_expanded(&self) -> bool {
        !self.phases.is_empty() && self.remaining_phases() == 0
    }

    /// Advance the session by exactly one round. `round_index` strictly
    /// monotonically increases; this is the single place that mutates it.
    pub fn advance(&mut self, round: QaRound, ready_to_plan: bool, enriched_goal: Option<String>) {
        self.history.push(round);
        self.round_index += 1;
        self.ready_to_plan = ready_to_plan;
        if let Some(goal) = enriched_goal {
            self.enriched_goal = Some(goal);
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_index_strictly_increases() {
        let mut session = ClarifySession::new("goal", 3);
        assert_eq!(session.round_index, 0);
        session.advance(QaRound::default(), false, None);
        assert_eq!(session.round_index, 1);
        session.advance(QaRound::default(), false, None);
        assert_eq!(session.round_index, 2);
    }

    #[test]
    fn max_rounds_reached_is_terminal() {
        let mut session = ClarifySession::new("goal", 1);
        session.advance(QaRound::default(), false, None);
        assert!(session.max_rounds_reached());
        assert!(session.is_terminal());
    }

    #[test]
    fn all_phases_expanded_is_false_until_every_phase_is() {
        let mut session = ClarifySession::new("goal", 3);
        session.phases.push(Phase::new("phase one", "d1"));
        session.phases.push(Phase::new("phase two", "d2"));
        assert_eq!(session.remaining_phases(), 2);
        assert!(!session.all_phases_expanded());

        session.phases[0].expanded = true;
        assert_eq!(session.remaining_phases(), 1);
        assert!(!session.all_phases_expanded());

        session.phases[1].expanded = true;
        assert!(session.all_phases_expanded());
    }

    #[test]
    fn ready_to_plan_is_terminal_before_max_rounds() {
        let mut session = ClarifySession::new("goal", 5);
        session.advance(QaRound::default(), true, Some("enriched".into()));
        assert!(session.is_terminal());
        assert!(!session.max_rounds_reached());
        assert_eq!(session.enriched_goal.as_deref(), Some("enriched"));
    }
}
