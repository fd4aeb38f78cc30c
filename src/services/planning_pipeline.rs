//! Planning Pipeline: Clarify → Decompose → Expand →
//! Finalize, with a Batch shortcut and an `auto_answer` mode. Implemented as
//! a plain enum with an explicit transition function that returns
//! `TaskWingError::GateViolation` on illegal calls, generalizing the
//! teacher's `TaskStatus::can_transition_to` pattern from a single-field
//! status to a full session state machine.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use crate::domain::error::{TaskWingError, TaskWingResult};
use crate::domain::models::{ClarifySession, Phase, Plan, PlanStatus, QaRound, Task};
use crate::domain::ports::llm_provider::{validate_json_shape, ChatOptions, ChatProvider};
use crate::domain::ports::memory_store::MemoryStore;
use crate::services::agent_kernel::chat_with_repair;

/// The session's position in the state machine, derived from its stored
/// fields rather than tracked as a separate column — the fields are the
/// single source of truth and cannot drift out of sync with a redundant
/// enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanningState {
    Clarifying,
    Ready,
    MaxRounds,
    Decomposed { remaining: usize },
    AwaitingFinalize,
    Finalized,
    Aborted,
}

pub fn derive_state(session: &ClarifySession) -> PlanningState {
    if session.aborted {
        return PlanningState::Aborted;
    }
    if session.finalized {
        return PlanningState::Finalized;
    }
    if !session.phases.is_empty() {
        return if session.all_phases_expanded() {
            PlanningState::AwaitingFinalize
        } else {
            PlanningState::Decomposed {
                remaining: session.remaining_phases(),
            }
        };
    }
    if session.ready_to_plan {
        PlanningState::Ready
    } else if session.max_rounds_reached() {
        PlanningState::MaxRounds
    } else {
        PlanningState::Clarifying
    }
}

fn gate(condition: bool, message: impl Into<String>) -> TaskWingResult<()> {
    if condition {
        Ok(())
    } else {
        Err(TaskWingError::GateViolation(message.into()))
    }
}

#[derive(Debug, Deserialize)]
struct ClarifyAgentResponse {
    ready: bool,
    #[serde(default)]
    questions: Vec<String>,
    #[serde(default)]
    enriched_goal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DecomposeAgentResponse {
    phases: Vec<DecomposedPhase>,
}

#[derive(Debug, Deserialize)]
struct DecomposedPhase {
    title: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ExpandAgentResponse {
    tasks: Vec<ExpandedTask>,
}

#[derive(Debug, Deserialize)]
struct ExpandedTask {
    title: String,
    description: String,
    #[serde(default)]
    acceptance_criteria: Vec<String>,
    #[serde(default)]
    priority: i32,
}

#[derive(Debug, Deserialize)]
struct GenerateAgentResponse {
    tasks: Vec<ExpandedTask>,
}

/// Result of a `generate`/`finalize` call: the now-active plan and the
/// tasks written for it.
#[derive(Debug, Clone)]
pub struct PlanWithTasks {
    pub plan: Plan,
    pub tasks: Vec<Task>,
}

pub struct PlanningPipeline {
    store: Arc<dyn MemoryStore>,
    provider: Arc<dyn ChatProvider>,
    default_max_rounds: u32,
    /// Per-spec §5: "concurrent `clarify` calls on the same session id fail
    /// with `ErrConcurrentClarify` (no merge)". Tracks sessions with an
    /// in-flight mutating call.
    in_flight: tokio::sync::Mutex<HashSet<String>>,
}

impl PlanningPipeline {
    pub fn new(store: Arc<dyn MemoryStore>, provider: Arc<dyn ChatProvider>, default_max_rounds: u32) -> Self {
        Self {
            store,
            provider,
            default_max_rounds,
            in_flight: tokio::sync::Mutex::new(HashSet::new()),
        }
    }

    async fn lock_session(&self, session_id: &str) -> TaskWingResult<()> {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.insert(session_id.to_string()) {
            Ok(())
        } else {
            Err(TaskWingError::Conflict(format!(
                "concurrent clarify call already in progress for session {session_id}"
            )))
        }
    }

    async fn unlock_session(&self, session_id: &str) {
        self.in_flight.lock().await.remove(session_id);
    }

    /// `Init -> clarify(goal) -> Clarifying` when `session_id` is `None`;
    /// otherwise `Clarifying -> clarify(session_id, answers) -> {Ready,
    /// MaxRounds, Clarifying}`. With `auto_answer=true` the loop advances
    /// internally, synthesizing answers from retrieved memory, until the
    /// session reaches a terminal state or `max_rounds`.
    pub async fn clarify(
        &self,
        session_id: Option<&str>,
        goal: Option<&str>,
        mut answers: Vec<String>,
        auto_answer: bool,
        retrieved_context: Option<&str>,
    ) -> TaskWingResult<ClarifySession> {
        let mut session = match session_id {
            Some(id) => {
                self.lock_session(id).await?;
                self.store.get_clarify_session(id).await?
            }
            None => {
                let goal = goal.ok_or_else(|| {
                    TaskWingError::GateViolation("clarify requires a goal when starting a new session".to_string())
                })?;
                self.store
                    .create_clarify_session(ClarifySession::new(goal, self.default_max_rounds))
                    .await?
            }
        };

        let result = self.run_clarify_loop(&mut session, &mut answers, auto_answer, retrieved_context).await;

        if session_id.is_some() {
            self.unlock_session(session_id.unwrap()).await;
        }
        result?;
        Ok(session)
    }

    async fn run_clarify_loop(
        &self,
        session: &mut ClarifySession,
        answers: &mut Vec<String>,
        auto_answer: bool,
        retrieved_context: Option<&str>,
    ) -> TaskWingResult<()> {
        if session.aborted {
            return Err(TaskWingError::GateViolation("session has been aborted".to_string()));
        }
        if matches!(derive_state(session), PlanningState::Ready | PlanningState::MaxRounds) {
            return Err(TaskWingError::GateViolation(
                "clarify never generates tasks and cannot run past a terminal round; call generate/decompose".to_string(),
            ));
        }

        loop {
            let round_questions = session.pending_questions.clone();
            let round_answers = if !round_questions.is_empty() && answers.is_empty() && auto_answer {
                synthesize_answers(self.provider.as_ref(), &round_questions, retrieved_context).await?
            } else {
                std::mem::take(answers)
            };

            if !round_questions.is_empty() && round_answers.len() != round_questions.len() {
                return Err(TaskWingError::Conflict(format!(
                    "expected {} answers for the current round, got {}",
                    round_questions.len(),
                    round_answers.len()
                )));
            }

            let decision = ask_clarify_agent(self.provider.as_ref(), session, &round_questions, &round_answers).await?;
            session.advance(
                QaRound {
                    questions: round_questions,
                    answers: round_answers,
                },
                decision.ready,
                decision.enriched_goal,
            );
            session.pending_questions = decision.questions;
            *session = self.store.update_clarify_session(session.clone()).await?;

            if !auto_answer || session.is_terminal() {
                return Ok(());
            }
        }
    }

    /// `Ready -> decompose -> Decomposed`.
    pub async fn decompose(&self, session_id: &str) -> TaskWingResult<ClarifySession> {
        self.lock_session(session_id).await?;
        let result = self.decompose_inner(session_id).await;
        self.unlock_session(session_id).await;
        result
    }

    async fn decompose_inner(&self, session_id: &str) -> TaskWingResult<ClarifySession> {
        let mut session = self.store.get_clarify_session(session_id).await?;
        gate(
            derive_state(&session) == PlanningState::Ready,
            "decompose requires the session to be in Ready state",
        )?;

        let enriched_goal = session.enriched_goal.clone().unwrap_or_else(|| session.goal.clone());
        let system = "You are a planning decomposition agent. Break the goal into ordered phases. \
            Respond with JSON: {\"phases\":[{\"title\":\"...\",\"description\":\"...\"}]}.";
        let value = chat_with_repair(
            self.provider.as_ref(),
            "decompose",
            system,
            &format!("Goal: {enriched_goal}"),
            &["phases"],
            None,
        )
        .await?;
        let parsed: DecomposeAgentResponse = serde_json::from_value(value)?;
        if parsed.phases.is_empty() {
            return Err(TaskWingError::Schema("decompose agent returned no phases".to_string()));
        }

        let mut plan = Plan::new(session.goal.clone());
        plan.enriched_goal = Some(enriched_goal);
        let plan = self.store.create_plan(plan).await?;
        session.plan_id = Some(plan.id);
        session.phases = parsed
            .phases
            .into_iter()
            .map(|p| Phase::new(p.title, p.description))
            .collect();
        self.store.update_clarify_session(session).await
    }

    /// `Decomposed -> expand(phase_id) -> Decomposed(n_remaining) |
    /// AwaitingFinalize`.
    pub async fn expand(&self, session_id: &str, phase_id: &str) -> TaskWingResult<(ClarifySession, Vec<Task>)> {
        self.lock_session(session_id).await?;
        let result = self.expand_inner(session_id, phase_id).await;
        self.unlock_session(session_id).await;
        result
    }

    async fn expand_inner(&self, session_id: &str, phase_id: &str) -> TaskWingResult<(ClarifySession, Vec<Task>)> {
        let mut session = self.store.get_clarify_session(session_id).await?;
        gate(
            matches!(derive_state(&session), PlanningState::Decomposed { .. }),
            "expand requires the session to be in Decomposed state",
        )?;
        let plan_id = session
            .plan_id
            .clone()
            .ok_or_else(|| TaskWingError::Integrity(format!("decomposed session {session_id} has no draft plan")))?;

        let phase = session
            .phases
            .iter_mut()
            .find(|p| p.id == phase_id)
            .ok_or_else(|| TaskWingError::NotFound(format!("phase {phase_id}")))?;
        gate(!phase.expanded, format!("phase {phase_id} has already been expanded"))?;

        let system = "You are a planning expansion agent. Produce concrete tasks for one phase of a plan. \
            Respond with JSON: {\"tasks\":[{\"title\":\"...\",\"description\":\"...\",\"acceptance_criteria\":[\"...\"],\"priority\":0}]}.";
        let user = format!("Phase: {}\nDetails: {}", phase.title, phase.description);
        let value = chat_with_repair(self.provider.as_ref(), "expand", system, &user, &["tasks"], None).await?;
        let parsed: ExpandAgentResponse = serde_json::from_value(value)?;

        let mut tasks = Vec::with_capacity(parsed.tasks.len());
        for t in parsed.tasks {
            let mut task = Task::new(plan_id.clone(), t.title, t.description)
                .with_priority(t.priority)
                .with_acceptance_criteria(t.acceptance_criteria);
            task.status = crate::domain::models::TaskStatus::Pending;
            tasks.push(self.store.create_task(task).await?);
        }

        phase.expanded = true;
        let session = self.store.update_clarify_session(session).await?;
        Ok((session, tasks))
    }

    /// `AwaitingFinalize -> finalize -> Finalized`.
    pub async fn finalize(&self, session_id: &str) -> TaskWingResult<PlanWithTasks> {
        self.lock_session(session_id).await?;
        let result = self.finalize_inner(session_id).await;
        self.unlock_session(session_id).await;
        result
    }

    async fn finalize_inner(&self, session_id: &str) -> TaskWingResult<PlanWithTasks> {
        let mut session = self.store.get_clarify_session(session_id).await?;
        gate(
            derive_state(&session) == PlanningState::AwaitingFinalize,
            "finalize requires every decomposed phase to be expanded",
        )?;
        let plan_id = session
            .plan_id
            .clone()
            .ok_or_else(|| TaskWingError::Integrity(format!("session {session_id} has no draft plan to finalize")))?;

        let mut plan = self.store.get_plan(&plan_id).await?;
        plan.transition(PlanStatus::Active).map_err(TaskWingError::GateViolation)?;
        let plan = self.store.update_plan(plan).await?;
        self.store.set_active_plan(Some(&plan.id)).await?;

        session.finalized = true;
        self.store.update_clarify_session(session).await?;

        let tasks = self.store.list_tasks(&plan.id).await?;
        Ok(PlanWithTasks { plan, tasks })
    }

    /// Batch shortcut: `Ready -> generate -> Finalized` in one call, writing
    /// the Plan and all Tasks directly without a decompose/expand round.
    pub async fn generate(&self, session_id: &str) -> TaskWingResult<PlanWithTasks> {
        self.lock_session(session_id).await?;
        let result = self.generate_inner(session_id).await;
        self.unlock_session(session_id).await;
        result
    }

    async fn generate_inner(&self, session_id: &str) -> TaskWingResult<PlanWithTasks> {
        let mut session = self.store.get_clarify_session(session_id).await?;
        gate(
            derive_state(&session) == PlanningState::Ready,
            "generate requires the session to be in Ready state",
        )?;

        let enriched_goal = session.enriched_goal.clone().unwrap_or_else(|| session.goal.clone());
        let system = "You are a planning agent. Produce the full task list for a goal in one pass. \
            Respond with JSON: {\"tasks\":[{\"title\":\"...\",\"description\":\"...\",\"acceptance_criteria\":[\"...\"],\"priority\":0}]}.";
        let value = chat_with_repair(
            self.provider.as_ref(),
            "generate",
            system,
            &format!("Goal: {enriched_goal}"),
            &["tasks"],
            None,
        )
        .await?;
        let parsed: GenerateAgentResponse = serde_json::from_value(value)?;

        let mut plan = Plan::new(session.goal.clone());
        plan.enriched_goal = Some(enriched_goal);
        let mut plan = self.store.create_plan(plan).await?;
        plan.transition(PlanStatus::Active).map_err(TaskWingError::GateViolation)?;
        let plan = self.store.update_plan(plan).await?;

        let mut tasks = Vec::with_capacity(parsed.tasks.len());
        for t in parsed.tasks {
            let mut task = Task::new(plan.id.clone(), t.title, t.description)
                .with_priority(t.priority)
                .with_acceptance_criteria(t.acceptance_criteria);
            task.status = crate::domain::models::TaskStatus::Pending;
            tasks.push(self.store.create_task(task).await?);
        }

        session.plan_id = Some(plan.id.clone());
        session.finalized = true;
        self.store.update_clarify_session(session).await?;
        self.store.set_active_plan(Some(&plan.id)).await?;

        Ok(PlanWithTasks { plan, tasks })
    }

    /// Any state -> abort -> Aborted.
    pub async fn abort(&self, session_id: &str) -> TaskWingResult<ClarifySession> {
        self.lock_session(session_id).await?;
        let result = async {
            let mut session = self.store.get_clarify_session(session_id).await?;
            session.aborted = true;
            self.store.update_clarify_session(session).await
        }
        .await;
        self.unlock_session(session_id).await;
        result
    }
}

async fn ask_clarify_agent(
    provider: &dyn ChatProvider,
    session: &ClarifySession,
    questions: &[String],
    answers: &[String],
) -> TaskWingResult<ClarifyAgentResponse> {
    let system = "You are a requirements-clarification agent. Given a goal and any answers so far, \
        decide whether enough is known to plan. Respond with JSON: \
        {\"ready\":bool,\"questions\":[\"...\"],\"enriched_goal\":\"...\"}.";
    let mut user = format!("Goal: {}\n", session.goal);
    for round in &session.history {
        user.push_str(&format!("Q: {:?}\nA: {:?}\n", round.questions, round.answers));
    }
    if !questions.is_empty() {
        user.push_str(&format!("Current questions: {questions:?}\nCurrent answers: {answers:?}\n"));
    }

    let value = chat_with_repair(provider, "clarify", system, &user, &["ready"], None).await?;
    Ok(serde_json::from_value(value)?)
}

/// `auto_answer=true`: synthesize answers from retrieved memory context
/// instead of blocking on user input.
async fn synthesize_answers(
    provider: &dyn ChatProvider,
    questions: &[String],
    retrieved_context: Option<&str>,
) -> TaskWingResult<Vec<String>> {
    let system = "Answer each clarifying question using only the given project context. \
        Respond with JSON: {\"answers\":[\"...\"]} in the same order as the questions.";
    let context = retrieved_context.unwrap_or("(no retrieved context available)");
    let user = format!("Questions: {questions:?}\nContext:\n{context}");
    let output = provider.chat(system, &user, &ChatOptions::default()).await?;
    let value = validate_json_shape(&output, &["answers"]).map_err(TaskWingError::Schema)?;
    #[derive(Deserialize)]
    struct Answers {
        answers: Vec<String>,
    }
    let parsed: Answers = serde_json::from_value(value)?;
    Ok(parsed.answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedProvider {
        responses: Mutex<Vec<&'static str>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(&self, _system: &str, _user: &str, _opts: &ChatOptions) -> TaskWingResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            Ok(responses.remove(0).to_string())
        }
    }

    #[tokio::test]
    async fn ask_clarify_agent_retries_a_malformed_response_before_failing() {
        let provider = ScriptedProvider {
            responses: Mutex::new(vec!["not json", r#"{"ready":true,"questions":[]}"#]),
            calls: AtomicUsize::new(0),
        };
        let session = ClarifySession::new("goal", 3);
        let decision = ask_clarify_agent(&provider, &session, &[], &[]).await.unwrap();
        assert!(decision.ready);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn ask_clarify_agent_gives_up_after_exhausting_repair_attempts() {
        let provider = ScriptedProvider {
            responses: Mutex::new(vec!["bad", "still bad", "still bad"]),
            calls: AtomicUsize::new(0),
        };
        let session = ClarifySession::new("goal", 3);
        let err = ask_clarify_agent(&provider, &session, &[], &[]).await.unwrap_err();
        assert!(matches!(err, TaskWingError::Schema(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    fn session_with(ready: bool, max_rounds_reached: bool) -> ClarifySession {
        let mut session = ClarifySession::new("goal", if max_rounds_reached { 0 } else { 3 });
        session.ready_to_plan = ready;
        session
    }

    #[test]
    fn derive_state_clarifying_by_default() {
        let session = ClarifySession::new("goal", 3);
        assert_eq!(derive_state(&session), PlanningState::Clarifying);
    }

    #[test]
    fn derive_state_ready_when_ready_to_plan() {
        let session = session_with(true, false);
        assert_eq!(derive_state(&session), PlanningState::Ready);
    }

    #[test]
    fn derive_state_max_rounds_when_cap_reached_and_not_ready() {
        let session = session_with(false, true);
        assert_eq!(derive_state(&session), PlanningState::MaxRounds);
    }

    #[test]
    fn derive_state_decomposed_tracks_remaining_phases() {
        let mut session = session_with(true, false);
        session.phases.push(Phase::new("p1", "d1"));
        session.phases.push(Phase::new("p2", "d2"));
        assert_eq!(derive_state(&session), PlanningState::Decomposed { remaining: 2 });
    }

    #[test]
    fn derive_state_awaiting_finalize_once_all_phases_expanded() {
        let mut session = session_with(true, false);
        session.phases.push(Phase::new("p1", "d1"));
        session.phases[0].expanded = true;
        assert_eq!(derive_state(&session), PlanningState::AwaitingFinalize);
    }

    #[test]
    fn derive_state_finalized_and_aborted_take_priority() {
        let mut session = session_with(true, false);
        session.finalized = true;
        assert_eq!(derive_state(&session), PlanningState::Finalized);

        session.aborted = true;
        assert_eq!(derive_state(&session), PlanningState::Aborted);
    }
}
