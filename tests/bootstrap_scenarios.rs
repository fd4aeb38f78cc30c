//! Bootstrap scenario: feature + decision linking, including a decision
//! whose component auto-creates its own feature and one that falls back to
//! the synthesized core-architecture feature.

mod common;

use std::sync::Arc;

use tokio::sync::watch;

use taskwing::domain::models::NodeKind;
use taskwing::domain::ports::llm_provider::ChatProvider;
use taskwing::domain::ports::memory_store::{MemoryStore, NodeFilter};
use taskwing::services::agent_kernel::AgentInput;
use taskwing::services::bootstrap_orchestrator::BootstrapOrchestrator;

use common::{test_store, ScriptedProvider};

const FINDINGS: &str = r#"{"findings":[
    {"kind":"feature","summary":"Core Feature","content":"the main feature","confidence":0.9},
    {"kind":"pattern","summary":"Hexagonal Architecture","solution":"ports and adapters","context":"Applied in internal/core","consequences":"testable boundaries","confidence":0.85},
    {"kind":"decision","summary":"Use SQLite","content":"embedded storage","component":"Core Feature","confidence":0.8},
    {"kind":"decision","summary":"Use Cobra","content":"CLI framework","component":"CLI Interface","confidence":0.8},
    {"kind":"decision","summary":"Orphan Decision","content":"no clear owner","component":"","confidence":0.5}
]}"#;

#[tokio::test]
async fn bootstrap_finds_feature_and_decision_with_correct_linking() {
    let (store, _dir) = test_store().await;
    let provider: Arc<dyn ChatProvider> = Arc::new(ScriptedProvider::new(vec![FINDINGS]));
    let orchestrator = BootstrapOrchestrator::new(store.clone(), provider, 2);
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let report = orchestrator
        .run(
            AgentInput {
                goal: "scan repo".into(),
                ..Default::default()
            },
            cancel_rx,
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.features, 3, "Core Feature + CLI Interface (auto) + Core Architecture (fallback)");
    assert_eq!(report.patterns, 1);
    assert_eq!(report.decisions, 3);

    let nodes = store.list_nodes(NodeFilter::default()).await.unwrap();
    let pattern = nodes.iter().find(|n| n.kind == NodeKind::Pattern).unwrap();
    assert_eq!(pattern.payload.description.as_deref(), Some("Applied in internal/core"));

    let cli_interface = nodes
        .iter()
        .find(|n| n.kind == NodeKind::Feature && n.summary == "CLI Interface")
        .expect("CLI Interface feature should have been auto-created");
    let use_cobra = nodes.iter().find(|n| n.summary == "Use Cobra").unwrap();
    let edges = store.list_edges_from(&use_cobra.id).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].to_id, cli_interface.id);

    let core_architecture = nodes
        .iter()
        .find(|n| n.kind == NodeKind::Feature && n.summary == "Core Architecture")
        .expect("Core Architecture fallback feature should have been created");
    let orphan = nodes.iter().find(|n| n.summary == "Orphan Decision").unwrap();
    let orphan_edges = store.list_edges_from(&orphan.id).await.unwrap();
    assert_eq!(orphan_edges.len(), 1);
    assert_eq!(orphan_edges[0].to_id, core_architecture.id);
}
