//! Recall (hybrid search) scenarios: summary mode before and after a node
//! insert, and query mode returning at least one result with exactly one
//! of `answer`/`warning` populated.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use taskwing::domain::models::{Node, NodeKind};
use taskwing::domain::ports::llm_provider::ChatProvider;
use taskwing::mcp::ToolContext;
use taskwing::services::hybrid_search::HybridSearcher;
use taskwing::services::planning_pipeline::PlanningPipeline;
use taskwing::services::session_state::{SessionStateConfig, SessionStateService};

use common::{test_store, ScriptedProvider};

fn context(store: Arc<dyn taskwing::domain::ports::memory_store::MemoryStore>, provider: Arc<dyn ChatProvider>) -> ToolContext {
    let embedder = provider.clone();
    let searcher = Arc::new(HybridSearcher::new(store.clone(), Some(embedder), Some(provider.clone())));
    let pipeline = Arc::new(PlanningPipeline::new(store.clone(), provider.clone(), 3));
    let session_state = Arc::new(SessionStateService::new(SessionStateConfig::default()));
    ToolContext {
        store,
        searcher,
        pipeline,
        session_state,
        provider,
        plans_root: PathBuf::from("plans"),
    }
}

#[tokio::test]
async fn recall_summary_mode_reflects_the_store_before_and_after_an_insert() {
    let (store, _dir) = test_store().await;
    let provider: Arc<dyn ChatProvider> = Arc::new(ScriptedProvider::new(vec![]));
    let ctx = context(store.clone(), provider);

    let before = ctx.dispatch("recall", &serde_json::json!({})).await.unwrap();
    assert_eq!(before["total"], 0);

    store
        .create_node(Node::new(NodeKind::Feature, "Core Feature", "the main feature"))
        .await
        .unwrap();

    let after = ctx.dispatch("recall", &serde_json::json!({})).await.unwrap();
    assert_eq!(after["total"], 1);
    let types = after["types"].as_array().unwrap();
    assert_eq!(types.len(), 1);
    assert_eq!(types[0]["kind"], "feature");
    assert_eq!(types[0]["count"], 1);
}

#[tokio::test]
async fn recall_with_query_returns_results_and_exactly_one_of_answer_or_warning() {
    let (store, _dir) = test_store().await;
    store
        .create_node(Node::new(NodeKind::Decision, "Use SQLite", "chose an embedded database"))
        .await
        .unwrap();

    // Literal scenario: a bare `{query:"sqlite"}` call with no embedding
    // provider configured. `answer` was never requested so it stays empty;
    // the missing embedder produces the one non-empty `warning`.
    let provider: Arc<dyn ChatProvider> = Arc::new(ScriptedProvider::new(vec![]));
    let searcher = Arc::new(HybridSearcher::new(store.clone(), None, None));
    let pipeline = Arc::new(PlanningPipeline::new(store.clone(), provider.clone(), 3));
    let session_state = Arc::new(SessionStateService::new(SessionStateConfig::default()));
    let ctx = ToolContext {
        store: store.clone(),
        searcher,
        pipeline,
        session_state,
        provider,
        plans_root: PathBuf::from("plans"),
    };

    let result = ctx.dispatch("recall", &serde_json::json!({"query": "sqlite"})).await.unwrap();
    let results = result["results"].as_array().unwrap();
    assert!(!results.is_empty(), "keyword pass alone should surface the SQLite decision");
    let answer_present = !result["answer"].is_null();
    let warning_present = !result["warning"].is_null();
    assert!(answer_present ^ warning_present, "exactly one of answer/warning should be non-empty");
    assert!(warning_present, "no embedder configured means the vector pass warns");

    // With both an embedder and an answerer configured and `answer:true`
    // requested, `answer` becomes the non-empty side instead.
    let provider: Arc<dyn ChatProvider> = Arc::new(ScriptedProvider::new(vec!["SQLite is used for storage."]));
    let ctx = context(store.clone(), provider);
    let result = ctx
        .dispatch("recall", &serde_json::json!({"query": "sqlite", "answer": true}))
        .await
        .unwrap();
    let results = result["results"].as_array().unwrap();
    assert!(!results.is_empty());
    assert!(result["answer"].is_string());
    assert!(result["warning"].is_null());
}
