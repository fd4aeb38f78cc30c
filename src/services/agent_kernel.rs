//! Agent Kernel: a generic agent definition plus the runner
//! that turns one prompt into a list of Findings. Agents are pure with
//! respect to the store — they never write directly; callers persist the
//! returned Findings.

use crate::domain::error::{TaskWingError, TaskWingResult};
use crate::domain::models::Finding;
use crate::domain::ports::llm_provider::{validate_json_shape, ChatOptions, ChatProvider};

/// Streaming status emitted while an agent runs, consumed by callers that
/// want live progress (e.g. the bootstrap orchestrator).
#[derive(Debug, Clone)]
pub enum AgentStatus {
    Started { agent: String },
    Prompted { agent: String },
    Retrying { agent: String, attempt: u32, reason: String },
    Finished { agent: String, finding_count: usize },
    Failed { agent: String, reason: String },
}

/// Input to a single agent run: the goal plus optional retrieved memory
/// context and prior Q/A history, assembled into the user prompt.
#[derive(Debug, Clone, Default)]
pub struct AgentInput {
    pub goal: String,
    pub context: Option<String>,
    pub history: Vec<String>,
}

impl AgentInput {
    fn build_prompt(&self) -> String {
        let mut sections = vec![format!("Goal: {}", self.goal)];
        if let Some(context) = &self.context {
            sections.push(format!("Retrieved context:\n{context}"));
        }
        if !self.history.is_empty() {
            sections.push(format!("Prior turns:\n{}", self.history.join("\n")));
        }
        sections.join("\n\n")
    }
}

/// Turns a validated JSON value into zero or more Findings. A plain function
/// pointer: agents are stateless transformations, not objects carrying
/// their own fields beyond the prompt.
pub type PostProcessor = fn(&serde_json::Value) -> Vec<Finding>;

/// An agent definition: name, role, system prompt, required top-level JSON
/// keys, and the function that turns output into Findings.
#[derive(Clone, Copy)]
pub struct Agent {
    pub name: &'static str,
    pub role: &'static str,
    pub system_prompt: &'static str,
    pub required_keys: &'static [&'static str],
    pub post_process: PostProcessor,
}

/// Repair-prompt retries allowed before a call is given up on: one original
/// attempt plus this many re-prompts.
pub const MAX_REPAIR_ATTEMPTS: u32 = 2;

impl Agent {
    /// Build the prompt, call the provider, validate against the agent's
    /// required JSON shape, retrying with a repair prompt containing the
    /// validation error on schema failure, then post-process to Findings.
    pub async fn run(
        &self,
        provider: &dyn ChatProvider,
        input: &AgentInput,
        status: Option<&tokio::sync::mpsc::Sender<AgentStatus>>,
    ) -> TaskWingResult<Vec<Finding>> {
        emit(status, AgentStatus::Started { agent: self.name.to_string() });
        let value = chat_with_repair(
            provider,
            self.name,
            self.system_prompt,
            &input.build_prompt(),
            self.required_keys,
            status,
        )
        .await?;
        let findings = (self.post_process)(&value);
        emit(
            status,
            AgentStatus::Finished {
                agent: self.name.to_string(),
                finding_count: findings.len(),
            },
        );
        Ok(findings)
    }
}

/// Call `provider.chat` and validate the response against `required_keys`,
/// retrying up to [`MAX_REPAIR_ATTEMPTS`] times with a repair prompt that
/// names the validation failure. Shared by [`Agent::run`] and the planning
/// pipeline's LLM calls so a single malformed response doesn't abort the
/// whole call.
pub async fn chat_with_repair(
    provider: &dyn ChatProvider,
    agent_name: &str,
    system_prompt: &str,
    base_prompt: &str,
    required_keys: &[&str],
    status: Option<&tokio::sync::mpsc::Sender<AgentStatus>>,
) -> TaskWingResult<serde_json::Value> {
    let mut user_prompt = base_prompt.to_string();
    let mut last_err = None;

    for attempt in 0..=MAX_REPAIR_ATTEMPTS {
        emit(status, AgentStatus::Prompted { agent: agent_name.to_string() });
        let output = provider.chat(system_prompt, &user_prompt, &ChatOptions::default()).await?;

        match validate_json_shape(&output, required_keys) {
            Ok(value) => return Ok(value),
            Err(validation_err) => {
                emit(
                    status,
                    AgentStatus::Retrying {
                        agent: agent_name.to_string(),
                        attempt: attempt + 1,
                        reason: validation_err.clone(),
                    },
                );
                user_prompt = format!(
                    "{base_prompt}\n\nYour previous response failed validation: {validation_err}\nRespond again with corrected JSON only."
                );
                last_err = Some(validation_err);
            }
        }
    }

    let reason = last_err.unwrap_or_else(|| "output did not validate".to_string());
    emit(
        status,
        AgentStatus::Failed {
            agent: agent_name.to_string(),
            reason: reason.clone(),
        },
    );
    Err(TaskWingError::Schema(format!(
        "{agent_name} failed validation after retries: {reason}"
    )))
}

fn emit(status: Option<&tokio::sync::mpsc::Sender<AgentStatus>>, event: AgentStatus) {
    if let Some(sender) = status {
        let _ = sender.try_send(event);
    }
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

    fn noop_post_process(_value: &serde_json::Value) -> Vec<Finding> {
        vec![Finding::Feature(crate::domain::models::FeatureFinding {
            summary: "found".to_string(),
            content: "content".to_string(),
            confidence: 0.9,
        })]
    }

    const TEST_AGENT: Agent = Agent {
        name: "test-agent",
        role: "test",
        system_prompt: "system",
        required_keys: &["findings"],
        post_process: noop_post_process,
    };

    #[tokio::test]
    async fn valid_output_on_first_try_produces_findings() {
        let provider = ScriptedProvider {
            responses: Mutex::new(vec![r#"{"findings":[]}"#]),
            calls: AtomicUsize::new(0),
        };
        let input = AgentInput {
            goal: "map the codebase".to_string(),
            ..Default::default()
        };
        let findings = TEST_AGENT.run(&provider, &input, None).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_output_is_retried_with_repair_prompt() {
        let provider = ScriptedProvider {
            responses: Mutex::new(vec!["not json", r#"{"findings":[]}"#]),
            calls: AtomicUsize::new(0),
        };
        let input = AgentInput::default();
        let findings = TEST_AGENT.run(&provider, &input, None).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausting_repair_attempts_returns_schema_error() {
        let provider = ScriptedProvider {
            responses: Mutex::new(vec!["bad", "still bad", "still bad"]),
            calls: AtomicUsize::new(0),
        };
        let input = AgentInput::default();
        let err = TEST_AGENT.run(&provider, &input, None).await.unwrap_err();
        assert!(matches!(err, TaskWingError::Schema(_)));
    }

    #[tokio::test]
    async fn status_events_are_emitted_in_order() {
        let provider = ScriptedProvider {
            responses: Mutex::new(vec![r#"{"findings":[]}"#]),
            calls: AtomicUsize::new(0),
        };
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let input = AgentInput::default();
        TEST_AGENT.run(&provider, &input, Some(&tx)).await.unwrap();
        drop(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events[0], AgentStatus::Started { .. }));
        assert!(matches!(events.last().unwrap(), AgentStatus::Finished { .. }));
    }
}
