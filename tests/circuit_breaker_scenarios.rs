//! Circuit breaker scenario: refusal after K consecutive `task(start)`
//! calls with no intervening `task(complete)`, leaving the refused task's
//! status untouched.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use taskwing::domain::error::TaskWingError;
use taskwing::domain::models::{Plan, PlanStatus, Task, TaskStatus};
use taskwing::domain::ports::llm_provider::ChatProvider;
use taskwing::mcp::ToolContext;
use taskwing::services::hybrid_search::HybridSearcher;
use taskwing::services::planning_pipeline::PlanningPipeline;
use taskwing::services::session_state::{SessionStateConfig, SessionStateService};

use common::{test_store, ScriptedProvider};

#[tokio::test]
async fn circuit_breaker_refuses_the_kth_consecutive_start_without_a_complete() {
    let (store, _dir) = test_store().await;
    let provider: Arc<dyn ChatProvider> = Arc::new(ScriptedProvider::new(vec![]));
    let searcher = Arc::new(HybridSearcher::new(store.clone(), None, None));
    let pipeline = Arc::new(PlanningPipeline::new(store.clone(), provider.clone(), 3));
    let threshold = 3;
    let session_state = Arc::new(SessionStateService::new(SessionStateConfig {
        consecutive_start_threshold: threshold,
    }));
    let ctx = ToolContext {
        store: store.clone(),
        searcher,
        pipeline,
        session_state,
        provider,
        plans_root: PathBuf::from("plans"),
    };

    let mut plan = Plan::new("ship a widget");
    plan.transition(PlanStatus::Active).unwrap();
    let plan = store.create_plan(plan).await.unwrap();
    store.set_active_plan(Some(&plan.id)).await.unwrap();

    let mut task_ids = Vec::new();
    for i in 0..threshold + 1 {
        let task = store
            .create_task(Task::new(plan.id.clone(), format!("task {i}"), "do it"))
            .await
            .unwrap();
        task_ids.push(task.id);
    }

    for (i, task_id) in task_ids.iter().take(threshold as usize).enumerate() {
        let result = ctx
            .dispatch(
                "task",
                &serde_json::json!({"action": "start", "task_id": task_id, "session_id": format!("session-{i}")}),
            )
            .await;
        assert!(result.is_ok(), "start {i} should be allowed below the threshold");
    }

    let refused_task_id = &task_ids[threshold as usize];
    let err = ctx
        .dispatch(
            "task",
            &serde_json::json!({"action": "start", "task_id": refused_task_id, "session_id": "session-overflow"}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TaskWingError::Refusal(_)));

    let refused_task = store.get_task(refused_task_id).await.unwrap();
    assert_eq!(refused_task.status, TaskStatus::Draft, "the refused task is never fetched or claimed");
    assert!(refused_task.claim.is_none());
}
