//! Bootstrap Orchestrator: a one-shot fan-out/fan-in pass
//! that scans a repository once and populates an empty Memory Store.
//!
//! A bounded mpsc channel, one `tokio::spawn` per runner, and a single
//! consumer task, sized down to a single-shot instance: no worktrees, no
//! DAG, no merge queue.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::domain::error::{TaskWingError, TaskWingResult};
use crate::domain::models::{Edge, Finding, Node, NodeKind, NodePayload};
use crate::domain::ports::llm_provider::{ChatProvider, EmbedOptions};
use crate::domain::ports::memory_store::MemoryStore;
use crate::services::agent_kernel::{Agent, AgentInput, AgentStatus};

/// The name the persistence step falls back to when a Decision's
/// `component` does not match any Feature created in this run.
const CORE_ARCHITECTURE_FEATURE: &str = "Core Architecture";

#[derive(Debug, Clone)]
pub enum BootstrapEvent {
    Started { agent_count: usize },
    AgentFinished { agent: String, finding_count: usize },
    AgentFailed { agent: String, reason: String },
    Cancelled { findings_drained: usize },
    Completed { nodes_created: usize },
}

#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    pub nodes_created: usize,
    pub features: usize,
    pub patterns: usize,
    pub decisions: usize,
    pub constraints: usize,
    pub cancelled: bool,
}

/// Clamp the default agent-runner count to the supported [2, 8] window.
pub fn default_agent_count() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(2)
        .clamp(2, 8)
}

fn documentation_agent() -> Agent {
    Agent {
        name: "documentation_agent",
        role: "bootstrap",
        system_prompt: "You read README, ADRs, and docs/ to extract project features, decisions, \
            and constraints. Respond with JSON: {\"findings\":[{\"kind\":\"feature\"|\"pattern\"|\"decision\"|\"constraint\", ...}]}.",
        required_keys: &["findings"],
        post_process: parse_findings,
    }
}

fn code_agent() -> Agent {
    Agent {
        name: "code_agent",
        role: "bootstrap",
        system_prompt: "You walk source files and sample representative code to extract features, \
            patterns, decisions, and constraints. Respond with JSON: {\"findings\":[{\"kind\":\"feature\"|\"pattern\"|\"decision\"|\"constraint\", ...}]}.",
        required_keys: &["findings"],
        post_process: parse_findings,
    }
}

fn parse_findings(value: &serde_json::Value) -> Vec<Finding> {
    value
        .get("findings")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|f| serde_json::from_value::<Finding>(f.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub struct BootstrapOrchestrator {
    store: Arc<dyn MemoryStore>,
    provider: Arc<dyn ChatProvider>,
    agents: Vec<Agent>,
}

impl BootstrapOrchestrator {
    /// Build the default runner set: the mandatory doc + code agents, plus
    /// `extra_agents` of the same kind repeated to reach `agent_count` (the
    /// spec only names a floor on the agent roster, not a ceiling on roles).
    pub fn new(store: Arc<dyn MemoryStore>, provider: Arc<dyn ChatProvider>, agent_count: usize) -> Self {
        let agent_count = agent_count.clamp(2, 8);
        let mut agents = vec![documentation_agent(), code_agent()];
        while agents.len() < agent_count {
            agents.push(code_agent());
        }
        Self { store, provider, agents }
    }

    /// Run the fan-out/fan-in pass. `cancel` is polled between sends; on
    /// cancellation the persistence step still drains and commits whatever
    /// Findings are already in the channel.
    pub async fn run(
        &self,
        input: AgentInput,
        mut cancel: watch::Receiver<bool>,
        events: Option<mpsc::Sender<BootstrapEvent>>,
    ) -> TaskWingResult<BootstrapReport> {
        emit(&events, BootstrapEvent::Started { agent_count: self.agents.len() }).await;

        let (tx, mut rx) = mpsc::channel::<(String, Vec<Finding>)>(self.agents.len().max(1) * 4);

        let mut runner_handles = Vec::with_capacity(self.agents.len());
        for agent in self.agents.clone() {
            let provider = self.provider.clone();
            let input = input.clone();
            let tx = tx.clone();
            let events = events.clone();
            let mut cancel = cancel.clone();
            runner_handles.push(tokio::spawn(async move {
                if *cancel.borrow() {
                    return;
                }
                let result = tokio::select! {
                    biased;
                    _ = cancel.changed() => None,
                    result = agent.run(provider.as_ref(), &input, None) => Some(result),
                };
                match result {
                    None => {}
                    Some(Ok(findings)) => {
                        emit(
                            &events,
                            BootstrapEvent::AgentFinished {
                                agent: agent.name.to_string(),
                                finding_count: findings.len(),
                            },
                        )
                        .await;
                        let _ = tx.send((agent.name.to_string(), findings)).await;
                    }
                    Some(Err(err)) => {
                        emit(
                            &events,
                            BootstrapEvent::AgentFailed {
                                agent: agent.name.to_string(),
                                reason: err.to_string(),
                            },
                        )
                        .await;
                    }
                }
            }));
        }
        drop(tx);

        let mut all_findings: Vec<(String, Finding)> = Vec::new();
        loop {
            tokio::select! {
                biased;
                changed = cancel.changed() => {
                    if changed.is_ok() && *cancel.borrow() {
                        break;
                    }
                }
                maybe_batch = rx.recv() => {
                    match maybe_batch {
                        Some((agent_name, findings)) => {
                            for finding in findings {
                                all_findings.push((agent_name.clone(), finding));
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        let cancelled = *cancel.borrow();
        if cancelled {
            while let Ok((agent_name, findings)) = rx.try_recv() {
                for finding in findings {
                    all_findings.push((agent_name.clone(), finding));
                }
            }
            emit(
                &events,
                BootstrapEvent::Cancelled { findings_drained: all_findings.len() },
            )
            .await;
        }

        for handle in runner_handles {
            let _ = handle.await;
        }

        let mut report = self.persist_findings(all_findings).await?;
        report.cancelled = cancelled;
        emit(&events, BootstrapEvent::Completed { nodes_created: report.nodes_created }).await;
        Ok(report)
    }

    /// Persist Findings in insertion order, deterministically tie-breaking
    /// equal-order items by `(kind, summary)`. Decisions
    /// are deferred to a second pass so every Feature they might link to
    /// already exists.
    async fn persist_findings(&self, mut findings: Vec<(String, Finding)>) -> TaskWingResult<BootstrapReport> {
        findings.sort_by(|(_, a), (_, b)| sort_key(a).cmp(&sort_key(b)));

        let mut report = BootstrapReport::default();
        let mut feature_ids_by_name: HashMap<String, String> = HashMap::new();
        let mut decisions = Vec::new();

        for (agent_name, finding) in findings {
            match finding {
                Finding::Feature(f) => {
                    let node = self.embed_and_create(
                        Node::new(NodeKind::Feature, f.summary.clone(), f.content)
                            .with_source_agent(agent_name)
                            .with_confidence(f.confidence),
                    )
                    .await?;
                    feature_ids_by_name.insert(f.summary.trim().to_lowercase(), node.id);
                    report.nodes_created += 1;
                    report.features += 1;
                }
                Finding::Pattern(p) => {
                    let payload = NodePayload {
                        why: Some(p.consequences.clone()),
                        description: Some(p.context.clone()),
                        ..Default::default()
                    };
                    self.embed_and_create(
                        Node::new(NodeKind::Pattern, p.summary.clone(), p.solution)
                            .with_source_agent(agent_name)
                            .with_confidence(p.confidence)
                            .with_payload(payload),
                    )
                    .await?;
                    report.nodes_created += 1;
                    report.patterns += 1;
                }
                Finding::Constraint(c) => {
                    self.embed_and_create(
                        Node::new(NodeKind::Constraint, c.summary, c.content)
                            .with_source_agent(agent_name)
                            .with_confidence(c.confidence),
                    )
                    .await?;
                    report.nodes_created += 1;
                    report.constraints += 1;
                }
                Finding::Decision(d) => decisions.push((agent_name, d)),
            }
        }

        let needs_core_fallback = decisions.iter().any(|(_, d)| d.component.trim().is_empty());
        if needs_core_fallback && !feature_ids_by_name.contains_key(&CORE_ARCHITECTURE_FEATURE.to_lowercase()) {
            let fallback = self
                .embed_and_create(Node::new(
                    NodeKind::Feature,
                    CORE_ARCHITECTURE_FEATURE,
                    "Synthesized fallback feature for decisions with no resolvable component.",
                ))
                .await?;
            feature_ids_by_name.insert(CORE_ARCHITECTURE_FEATURE.to_lowercase(), fallback.id);
            report.nodes_created += 1;
            report.features += 1;
        }

        for (agent_name, d) in decisions {
            let component = d.component.trim();
            let feature_id = if component.is_empty() {
                feature_ids_by_name.get(&CORE_ARCHITECTURE_FEATURE.to_lowercase()).cloned()
            } else if let Some(id) = feature_ids_by_name.get(&component.to_lowercase()) {
                Some(id.clone())
            } else {
                // Decision names a component no Feature finding declared;
                // synthesize one so the decision still has somewhere to
                // attach.
                let synthesized = self
                    .embed_and_create(Node::new(
                        NodeKind::Feature,
                        component,
                        format!("Synthesized from decision component reference: {component}"),
                    ))
                    .await?;
                feature_ids_by_name.insert(component.to_lowercase(), synthesized.id.clone());
                report.nodes_created += 1;
                report.features += 1;
                Some(synthesized.id)
            };

            let node = self
                .embed_and_create(
                    Node::new(NodeKind::Decision, d.summary, d.content)
                        .with_source_agent(agent_name)
                        .with_confidence(d.confidence),
                )
                .await?;
            report.nodes_created += 1;
            report.decisions += 1;

            if let Some(feature_id) = feature_id {
                self.store
                    .create_edge(Edge::new(node.id, feature_id, crate::domain::models::edge::kinds::APPLIES_TO))
                    .await?;
            }
        }

        Ok(report)
    }

    /// Generate an embedding if the provider supports it, persist without
    /// one otherwise (a warning, not a failure).
    async fn embed_and_create(&self, node: Node) -> TaskWingResult<Node> {
        let created = self.store.create_node(node).await?;
        if self.provider.supports_embed() {
            match self.provider.embed(&created.summary, &EmbedOptions::default()).await {
                Ok(vector) => self.store.update_node_embedding(&created.id, vector).await?,
                Err(TaskWingError::Fatal(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(created)
    }
}

fn sort_key(finding: &Finding) -> (u8, String) {
    let kind_rank = match finding {
        Finding::Feature(_) => 0,
        Finding::Pattern(_) => 1,
        Finding::Decision(_) => 2,
        Finding::Constraint(_) => 3,
    };
    (kind_rank, finding.summary().trim().to_lowercase())
}

async fn emit(events: &Option<mpsc::Sender<BootstrapEvent>>, event: BootstrapEvent) {
    if let Some(sender) = events {
        let _ = sender.send(event).await;
    }
}
