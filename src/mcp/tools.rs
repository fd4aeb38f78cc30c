//! Tool dispatch for the stable MCP surface: `recall`, `task`, `plan`,
//! `code`, `debug`. Each handler takes the tool's raw `arguments` object and
//! returns the stringified JSON that becomes the MCP response's
//! `content[0].text`: one method per tool, `Result<String, String>`,
//! `serde_json::to_string_pretty` at the end.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::domain::error::{TaskWingError, TaskWingResult};
use crate::domain::models::{NodeKind, TaskStatus};
use crate::domain::ports::llm_provider::{ChatOptions, ChatProvider};
use crate::domain::ports::memory_store::MemoryStore;
use crate::services::hybrid_search::{HybridSearcher, SearchFilter};
use crate::services::planning_pipeline::PlanningPipeline;
use crate::services::session_state::SessionStateService;
use crate::services::{plan_export, repair_planner};

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn bool_arg(args: &Value, key: &str) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn usize_arg(args: &Value, key: &str, default: usize) -> usize {
    args.get(key).and_then(Value::as_u64).map_or(default, |v| v as usize)
}

fn require_str<'a>(args: &'a Value, key: &str) -> TaskWingResult<&'a str> {
    str_arg(args, key).ok_or_else(|| TaskWingError::Schema(format!("missing required field: {key}")))
}

pub struct ToolContext {
    pub store: Arc<dyn MemoryStore>,
    pub searcher: Arc<HybridSearcher>,
    pub pipeline: Arc<PlanningPipeline>,
    pub session_state: Arc<SessionStateService>,
    pub provider: Arc<dyn ChatProvider>,
    pub plans_root: PathBuf,
}

impl ToolContext {
    pub async fn dispatch(&self, tool_name: &str, arguments: &Value) -> TaskWingResult<Value> {
        match tool_name {
            "recall" => self.recall(arguments).await,
            "task" => self.task(arguments).await,
            "plan" => self.plan(arguments).await,
            "code" => self.code(arguments).await,
            "debug" => self.debug(arguments).await,
            other => Err(TaskWingError::NotFound(format!("unknown tool: {other}"))),
        }
    }

    async fn recall(&self, args: &Value) -> TaskWingResult<Value> {
        let query = str_arg(args, "query").unwrap_or("");
        let want_answer = bool_arg(args, "answer");
        let all = bool_arg(args, "all");
        let limit = usize_arg(args, "limit", 10);
        let filter = SearchFilter {
            kind: str_arg(args, "type").and_then(NodeKind::from_str),
        };

        if query.trim().is_empty() || all {
            let summary = self.searcher.summary(filter).await?;
            return Ok(serde_json::json!({
                "mode": "summary",
                "total": summary.total,
                "types": summary.types.into_iter().map(|(k, v)| {
                    serde_json::json!({"kind": k, "count": v.count, "examples": v.examples})
                }).collect::<Vec<_>>(),
            }));
        }

        let result = self.searcher.search(query, limit, filter, want_answer).await?;
        Ok(serde_json::json!({
            "mode": "search",
            "results": result.results.iter().map(|r| serde_json::json!({
                "id": r.node.id,
                "kind": r.node.kind.as_str(),
                "summary": r.node.summary,
                "score": r.score,
            })).collect::<Vec<_>>(),
            "answer": result.answer,
            "warning": result.warning,
        }))
    }

    async fn task(&self, args: &Value) -> TaskWingResult<Value> {
        let action = require_str(args, "action")?;
        let plan_id = self
            .store
            .get_active_plan()
            .await?
            .ok_or_else(|| TaskWingError::NotFound("no active plan".to_string()))?;

        match action {
            "list" => {
                let tasks = self.store.list_tasks(&plan_id).await?;
                Ok(serde_json::json!(tasks.iter().map(task_summary).collect::<Vec<_>>()))
            }
            "next" => {
                let mut tasks = self.store.list_tasks(&plan_id).await?;
                tasks.retain(|t| t.status == TaskStatus::Pending);
                tasks.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.created_at.cmp(&b.created_at)));
                match tasks.into_iter().next() {
                    Some(task) => Ok(task_summary(&task)),
                    None => Ok(serde_json::json!({"task": Value::Null})),
                }
            }
            "current" => {
                let session_id = require_str(args, "session_id")?;
                let tasks = self.store.list_tasks(&plan_id).await?;
                let current = tasks.into_iter().find(|t| {
                    t.status == TaskStatus::InProgress
                        && t.claim.as_ref().is_some_and(|c| c.session_id == session_id)
                });
                match current {
                    Some(task) => Ok(task_summary(&task)),
                    None => Ok(serde_json::json!({"task": Value::Null})),
                }
            }
            "start" => {
                let task_id = require_str(args, "task_id")?;
                let session_id = require_str(args, "session_id")?;
                self.session_state.record_task_start().await?;

                let mut task = self.store.get_task(task_id).await?;
                // Implementation Start Gate: the brief is always assembled
                // before the claim is recorded, so a caller never observes a
                // claimed task without having first received its brief.
                let brief = serde_json::json!({
                    "id": task.id,
                    "title": task.title,
                    "description": task.description,
                    "acceptance_criteria": task.acceptance_criteria,
                });
                task.claim(session_id).map_err(TaskWingError::Refusal)?;
                self.store.update_task(task).await?;
                self.session_state.begin_mcp_session(session_id).await;
                Ok(brief)
            }
            "complete" => {
                let task_id = require_str(args, "task_id")?;
                let summary = require_str(args, "summary")?;
                let files_modified = args
                    .get("files_modified")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(Value::as_str).collect::<Vec<_>>());

                let full_summary = match files_modified {
                    Some(files) if !files.is_empty() => format!("{summary}\n\nFiles modified: {}", files.join(", ")),
                    _ => summary.to_string(),
                };

                let mut task = self.store.get_task(task_id).await?;
                task.complete(full_summary).map_err(TaskWingError::GateViolation)?;
                let task = self.store.update_task(task).await?;
                self.session_state.record_task_complete().await;
                Ok(task_summary(&task))
            }
            "update" => {
                let task_id = require_str(args, "task_id")?;
                let mut task = self.store.get_task(task_id).await?;
                if let Some(title) = str_arg(args, "title") {
                    task.title = title.to_string();
                }
                if let Some(description) = str_arg(args, "description") {
                    task.description = description.to_string();
                }
                task.updated_at = Utc::now();
                let task = self.store.update_task(task).await?;
                Ok(task_summary(&task))
            }
            other => Err(TaskWingError::Schema(format!("unknown task action: {other}"))),
        }
    }

    async fn plan(&self, args: &Value) -> TaskWingResult<Value> {
        let action = require_str(args, "action")?;
        match action {
            "clarify" => {
                let session_id = str_arg(args, "session_id");
                let goal = str_arg(args, "goal");
                let answers = args
                    .get("answers")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                let auto_answer = bool_arg(args, "auto_answer");
                let retrieved_context = str_arg(args, "retrieved_context");
                let session = self
                    .pipeline
                    .clarify(session_id, goal, answers, auto_answer, retrieved_context)
                    .await?;
                Ok(serde_json::to_value(&session)?)
            }
            "decompose" => {
                let session_id = require_str(args, "session_id")?;
                let session = self.pipeline.decompose(session_id).await?;
                Ok(serde_json::to_value(&session)?)
            }
            "expand" => {
                let session_id = require_str(args, "session_id")?;
                let phase_id = require_str(args, "phase_id")?;
                let (session, tasks) = self.pipeline.expand(session_id, phase_id).await?;
                Ok(serde_json::json!({
                    "session": session,
                    "tasks": tasks.iter().map(task_summary).collect::<Vec<_>>(),
                }))
            }
            "finalize" => {
                let session_id = require_str(args, "session_id")?;
                let plan_with_tasks = self.pipeline.finalize(session_id).await?;
                let export_path = self.export_active_plan(&plan_with_tasks).await?;
                Ok(serde_json::json!({
                    "plan_id": plan_with_tasks.plan.id,
                    "tasks": plan_with_tasks.tasks.iter().map(task_summary).collect::<Vec<_>>(),
                    "exported_to": export_path.to_string_lossy(),
                }))
            }
            "generate" => {
                let session_id = require_str(args, "session_id")?;
                let plan_with_tasks = self.pipeline.generate(session_id).await?;
                let export_path = self.export_active_plan(&plan_with_tasks).await?;
                Ok(serde_json::json!({
                    "plan_id": plan_with_tasks.plan.id,
                    "tasks": plan_with_tasks.tasks.iter().map(task_summary).collect::<Vec<_>>(),
                    "exported_to": export_path.to_string_lossy(),
                }))
            }
            "list" => {
                let plans = self.store.list_plans().await?;
                Ok(serde_json::json!(plans
                    .iter()
                    .map(|p| serde_json::json!({"id": p.id, "goal": p.original_goal, "status": p.status.as_str()}))
                    .collect::<Vec<_>>()))
            }
            "show" => {
                let plan_id = match str_arg(args, "plan_id") {
                    Some(id) => id.to_string(),
                    None => self
                        .store
                        .get_active_plan()
                        .await?
                        .ok_or_else(|| TaskWingError::NotFound("no active plan".to_string()))?,
                };
                let plan = self.store.get_plan(&plan_id).await?;
                let tasks = self.store.list_tasks(&plan_id).await?;
                Ok(serde_json::json!({
                    "plan": {"id": plan.id, "goal": plan.original_goal, "status": plan.status.as_str()},
                    "tasks": tasks.iter().map(task_summary).collect::<Vec<_>>(),
                }))
            }
            "delete" => {
                let plan_id = require_str(args, "plan_id")?;
                self.store.delete_plan(plan_id).await?;
                Ok(serde_json::json!({"deleted": plan_id}))
            }
            other => Err(TaskWingError::Schema(format!("unknown plan action: {other}"))),
        }
    }

    async fn export_active_plan(&self, plan_with_tasks: &crate::services::planning_pipeline::PlanWithTasks) -> TaskWingResult<PathBuf> {
        let today = Utc::now().date_naive();
        let path = plan_export::export_plan(&self.plans_root, &plan_with_tasks.plan, &plan_with_tasks.tasks, today)?;
        Ok(path)
    }

    async fn code(&self, args: &Value) -> TaskWingResult<Value> {
        let action = require_str(args, "action")?;
        let symbol = require_str(args, "symbol")?;
        let filter = SearchFilter::default();
        let context = self.searcher.search(symbol, 5, filter, false).await?;
        let context_text = context
            .results
            .iter()
            .map(|r| format!("- {}: {}", r.node.summary, r.node.content))
            .collect::<Vec<_>>()
            .join("\n");

        let system = match action {
            "explain" => "Explain what this symbol does, grounded only in the given project memory context.",
            "simplify" => "Suggest a simpler implementation of this symbol, grounded only in the given context.",
            "callers" => "List the likely callers or usages of this symbol implied by the given context.",
            other => return Err(TaskWingError::Schema(format!("unknown code action: {other}"))),
        };
        let user = format!("Symbol: {symbol}\n\nContext:\n{context_text}");
        let answer = self.provider.chat(system, &user, &ChatOptions::default()).await?;
        Ok(serde_json::json!({"symbol": symbol, "action": action, "answer": answer}))
    }

    async fn debug(&self, args: &Value) -> TaskWingResult<Value> {
        let problem = require_str(args, "problem")?;
        let error = str_arg(args, "error").unwrap_or("");
        let stack_trace = str_arg(args, "stack_trace").unwrap_or("");

        let filter = SearchFilter::default();
        let context = self.searcher.search(problem, 5, filter, false).await?;
        let context_text = context
            .results
            .iter()
            .map(|r| format!("- {}: {}", r.node.summary, r.node.content))
            .collect::<Vec<_>>()
            .join("\n");

        let system = "Diagnose the reported problem using only the given project memory context. \
            Suggest the most likely cause and a next debugging step.";
        let user = format!("Problem: {problem}\nError: {error}\nStack trace: {stack_trace}\n\nContext:\n{context_text}");
        let answer = self.provider.chat(system, &user, &ChatOptions::default()).await?;
        Ok(serde_json::json!({"problem": problem, "diagnosis": answer}))
    }
}

fn task_summary(task: &crate::domain::models::Task) -> Value {
    serde_json::json!({
        "id": task.id,
        "plan_id": task.plan_id,
        "title": task.title,
        "description": task.description,
        "priority": task.priority,
        "status": task.status.as_str(),
        "acceptance_criteria": task.acceptance_criteria,
        "completion_summary": task.completion_summary,
    })
}

/// Repair-planner-backed tool surface, exposed separately from the five
/// stable tools above since spec.md keeps it at the CLI boundary; retained
/// here only so the MCP server can offer it as an optional extra tool
/// without duplicating the evaluate/compile/apply wiring.
pub async fn run_repair_evaluate(planner: &repair_planner::RepairPlanner) -> Value {
    let reports = planner.evaluate();
    serde_json::json!(reports
        .iter()
        .map(|r| serde_json::json!({"tool_name": r.tool_name, "issues": r.issues, "is_adopted": r.is_adopted}))
        .collect::<Vec<_>>())
}
