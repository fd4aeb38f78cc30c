//! Planning pipeline scenarios: the clarify→generate happy path and the
//! gate violation raised by calling `expand` before `decompose`.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use taskwing::domain::error::TaskWingError;
use taskwing::domain::models::PlanStatus;
use taskwing::domain::ports::llm_provider::ChatProvider;
use taskwing::mcp::ToolContext;
use taskwing::services::hybrid_search::HybridSearcher;
use taskwing::services::planning_pipeline::PlanningPipeline;
use taskwing::services::session_state::{SessionStateConfig, SessionStateService};

use common::{test_store, ScriptedProvider};

const CLARIFY_READY: &str = r#"{"ready":true,"questions":[],"enriched_goal":"Build a well-tested widget"}"#;
const GENERATE_TASKS: &str = r#"{"tasks":[
    {"title":"Write widget core","description":"implement the core type","acceptance_criteria":["compiles"],"priority":1},
    {"title":"Write tests","description":"cover the happy path","acceptance_criteria":[],"priority":0}
]}"#;

fn context(store: Arc<dyn taskwing::domain::ports::memory_store::MemoryStore>, provider: Arc<dyn ChatProvider>, plans_root: PathBuf) -> ToolContext {
    let searcher = Arc::new(HybridSearcher::new(store.clone(), None, None));
    let pipeline = Arc::new(PlanningPipeline::new(store.clone(), provider.clone(), 3));
    let session_state = Arc::new(SessionStateService::new(SessionStateConfig::default()));
    ToolContext {
        store,
        searcher,
        pipeline,
        session_state,
        provider,
        plans_root,
    }
}

#[tokio::test]
async fn clarify_then_generate_creates_an_active_plan() {
    let (store, _dir) = test_store().await;
    let plans_dir = tempfile::tempdir().unwrap();
    let provider: Arc<dyn ChatProvider> = Arc::new(ScriptedProvider::new(vec![CLARIFY_READY, GENERATE_TASKS]));
    let ctx = context(store.clone(), provider, plans_dir.path().to_path_buf());

    let clarified = ctx
        .dispatch("plan", &serde_json::json!({"action": "clarify", "goal": "build a widget"}))
        .await
        .unwrap();
    let session_id = clarified["id"].as_str().unwrap().to_string();
    assert_eq!(clarified["ready_to_plan"], true);

    let generated = ctx
        .dispatch("plan", &serde_json::json!({"action": "generate", "session_id": session_id}))
        .await
        .unwrap();
    let plan_id = generated["plan_id"].as_str().unwrap().to_string();
    assert_eq!(generated["tasks"].as_array().unwrap().len(), 2);

    let active_plan = store.get_active_plan().await.unwrap();
    assert_eq!(active_plan.as_deref(), Some(plan_id.as_str()));

    let plan = store.get_plan(&plan_id).await.unwrap();
    assert_eq!(plan.status, PlanStatus::Active);
}

#[tokio::test]
async fn expand_before_decompose_is_a_gate_violation_mentioning_decompose() {
    let (store, _dir) = test_store().await;
    let plans_dir = tempfile::tempdir().unwrap();
    let provider: Arc<dyn ChatProvider> = Arc::new(ScriptedProvider::new(vec![CLARIFY_READY]));
    let ctx = context(store.clone(), provider, plans_dir.path().to_path_buf());

    let clarified = ctx
        .dispatch("plan", &serde_json::json!({"action": "clarify", "goal": "build a widget"}))
        .await
        .unwrap();
    let session_id = clarified["id"].as_str().unwrap().to_string();

    let err = ctx
        .dispatch(
            "plan",
            &serde_json::json!({"action": "expand", "session_id": session_id, "phase_id": "nonexistent"}),
        )
        .await
        .unwrap_err();

    match &err {
        TaskWingError::GateViolation(message) => {
            assert!(message.contains("decompose"), "gate violation should mention decompose, got: {message}");
        }
        other => panic!("expected GateViolation, got {other:?}"),
    }

    // The session and plan are untouched by the rejected call.
    let session = store.get_clarify_session(&session_id).await.unwrap();
    assert!(session.plan_id.is_none());
    assert!(session.phases.is_empty());
}
