//! `SqliteMemoryStore` - the production `MemoryStore` implementation.
//!
//! Owns the relational schema plus the derived-artifact adapters
//! (`index.json`, `features/*.md`, `state.json`) that live alongside it on
//! disk, since `Check`/`Repair`/`RebuildIndex` need to reconcile all three.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::adapters::{index, markdown, state::StateStore};
use crate::domain::error::{TaskWingError, TaskWingResult};
use crate::domain::models::{
    ClarifySession, Edge, Node, NodeKind, NodePayload, NodeUpdate, Plan, PlanStatus, QaRound, Task, TaskClaim,
    TaskStatus,
};
use crate::domain::ports::memory_store::{
    EmbeddingStats, IntegrityIssue, IntegrityIssueKind, MemoryStore, NodeFilter,
};

/// Decode a little-endian `f32` blob written by [`SqliteMemoryStore::update_node_embedding`].
fn decode_embedding_blob(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub struct SqliteMemoryStore {
    pool: SqlitePool,
    memory_root: PathBuf,
    state: StateStore,
}

impl SqliteMemoryStore {
    pub fn new(pool: SqlitePool, memory_root: impl Into<PathBuf>) -> Self {
        let memory_root = memory_root.into();
        let state = StateStore::new(&memory_root);
        Self {
            pool,
            memory_root,
            state,
        }
    }

    async fn fetch_all_nodes(&self) -> TaskWingResult<Vec<Node>> {
        self.list_nodes(NodeFilter {
            include_root: true,
            ..Default::default()
        })
        .await
    }

    fn row_to_node(row: &sqlx::sqlite::SqliteRow) -> TaskWingResult<Node> {
        let kind_str: String = row.try_get("kind")?;
        let kind = NodeKind::from_str(&kind_str)
            .ok_or_else(|| TaskWingError::Integrity(format!("unknown node kind: {kind_str}")))?;
        let payload_str: String = row.try_get("payload")?;
        let payload: NodePayload = serde_json::from_str(&payload_str)?;

        Ok(Node {
            id: row.try_get("id")?,
            kind,
            summary: row.try_get("summary")?,
            content: row.try_get("content")?,
            payload,
            source_agent: row.try_get("source_agent")?,
            confidence: row.try_get::<f64, _>("confidence")? as f32,
            workspace: row.try_get("workspace")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            // `nodes` carries no embedding columns; callers hydrate this
            // from `node_embeddings` via `get_node_embedding`.
            embedding: None,
            embedding_is_legacy: false,
        })
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> TaskWingResult<Task> {
        let status_str: String = row.try_get("status")?;
        let status = TaskStatus::from_str(&status_str)
            .ok_or_else(|| TaskWingError::Integrity(format!("unknown task status: {status_str}")))?;
        let acceptance_criteria: String = row.try_get("acceptance_criteria")?;
        let validation_steps: String = row.try_get("validation_steps")?;
        let claim_session_id: Option<String> = row.try_get("claim_session_id")?;
        let claim_claimed_at: Option<chrono::DateTime<chrono::Utc>> = row.try_get("claim_claimed_at")?;
        let claim = match (claim_session_id, claim_claimed_at) {
            (Some(session_id), Some(claimed_at)) => Some(TaskClaim { session_id, claimed_at }),
            _ => None,
        };

        Ok(Task {
            id: row.try_get("id")?,
            plan_id: row.try_get("plan_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            priority: row.try_get("priority")?,
            status,
            assigned_agent_hint: row.try_get("assigned_agent_hint")?,
            acceptance_criteria: serde_json::from_str(&acceptance_criteria)?,
            validation_steps: serde_json::from_str(&validation_steps)?,
            claim,
            completion_summary: row.try_get("completion_summary")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_plan(row: &sqlx::sqlite::SqliteRow) -> TaskWingResult<Plan> {
        let status_str: String = row.try_get("status")?;
        let status = PlanStatus::from_str(&status_str)
            .ok_or_else(|| TaskWingError::Integrity(format!("unknown plan status: {status_str}")))?;
        Ok(Plan {
            id: row.try_get("id")?,
            original_goal: row.try_get("original_goal")?,
            enriched_goal: row.try_get("enriched_goal")?,
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_clarify_session(row: &sqlx::sqlite::SqliteRow) -> TaskWingResult<ClarifySession> {
        let history: String = row.try_get("history")?;
        let ready_to_plan: i64 = row.try_get("ready_to_plan")?;
        let phases: String = row.try_get("phases")?;
        let pending_questions: String = row.try_get("pending_questions")?;
        let aborted: i64 = row.try_get("aborted")?;
        let finalized: i64 = row.try_get("finalized")?;
        Ok(ClarifySession {
            id: row.try_get("id")?,
            plan_id: row.try_get("plan_id")?,
            goal: row.try_get("goal")?,
            round_index: row.try_get::<i64, _>("round_index")? as u32,
            history: serde_json::from_str::<Vec<QaRound>>(&history)?,
            enriched_goal: row.try_get("enriched_goal")?,
            ready_to_plan: ready_to_plan != 0,
            max_rounds: row.try_get::<i64, _>("max_rounds")? as u32,
            pending_questions: serde_json::from_str(&pending_questions)?,
            phases: serde_json::from_str(&phases)?,
            aborted: aborted != 0,
            finalized: finalized != 0,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn create_node(&self, node: Node) -> TaskWingResult<Node> {
        node.validate().map_err(TaskWingError::Integrity)?;
        let payload = serde_json::to_string(&node.payload)?;
        sqlx::query(
            "INSERT INTO nodes (id, kind, summary, content, payload, source_agent, confidence, workspace, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&node.id)
        .bind(node.kind.as_str())
        .bind(&node.summary)
        .bind(&node.content)
        .bind(&payload)
        .bind(&node.source_agent)
        .bind(node.confidence as f64)
        .bind(&node.workspace)
        .bind(node.created_at)
        .bind(node.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(node)
    }

    async fn get_node(&self, id: &str) -> TaskWingResult<Node> {
        let row = sqlx::query("SELECT * FROM nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| TaskWingError::NotFound(format!("node {id}")))?;
        let mut node = Self::row_to_node(&row)?;
        if let Some((embedding, is_legacy)) = self.get_node_embedding(&node.id).await? {
            node.embedding = Some(embedding);
            node.embedding_is_legacy = is_legacy;
        }
        Ok(node)
    }

    async fn update_node(&self, id: &str, update: NodeUpdate) -> TaskWingResult<Node> {
        let mut node = self.get_node(id).await?;
        if let Some(summary) = update.summary {
            node.summary = summary;
        }
        if let Some(content) = update.content {
            node.content = content;
        }
        if let Some(payload) = update.payload {
            node.payload = payload;
        }
        if let Some(confidence) = update.confidence {
            node.confidence = confidence;
        }
        if let Some(workspace) = update.workspace {
            node.workspace = Some(workspace);
        }
        node.updated_at = chrono::Utc::now();
        node.validate().map_err(TaskWingError::Integrity)?;

        let payload = serde_json::to_string(&node.payload)?;
        sqlx::query(
            "UPDATE nodes SET summary = ?, content = ?, payload = ?, confidence = ?, workspace = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&node.summary)
        .bind(&node.content)
        .bind(&payload)
        .bind(node.confidence as f64)
        .bind(&node.workspace)
        .bind(node.updated_at)
        .bind(&node.id)
        .execute(&self.pool)
        .await?;
        Ok(node)
    }

    async fn delete_node(&self, id: &str) -> TaskWingResult<()> {
        sqlx::query("DELETE FROM nodes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.delete_edges_for_node(id).await?;
        Ok(())
    }

    async fn list_nodes(&self, filter: NodeFilter) -> TaskWingResult<Vec<Node>> {
        let mut sql = "SELECT * FROM nodes WHERE 1 = 1".to_string();
        if filter.kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        if filter.workspace.is_some() {
            sql.push_str(" AND workspace = ?");
        } else if !filter.include_root {
            sql.push_str(" AND workspace IS NOT NULL");
        }
        sql.push_str(" ORDER BY created_at ASC");

        let mut query = sqlx::query(&sql);
        if let Some(kind) = &filter.kind {
            query = query.bind(kind.as_str());
        }
        if let Some(workspace) = &filter.workspace {
            query = query.bind(workspace);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut nodes: Vec<Node> = rows.iter().map(Self::row_to_node).collect::<TaskWingResult<_>>()?;

        let embeddings: Vec<(String, Vec<u8>, i64)> =
            sqlx::query_as("SELECT node_id, blob, is_legacy FROM node_embeddings")
                .fetch_all(&self.pool)
                .await?;
        let mut by_node_id: std::collections::HashMap<String, (Vec<f32>, bool)> = embeddings
            .into_iter()
            .map(|(node_id, blob, is_legacy)| (node_id, (decode_embedding_blob(&blob), is_legacy != 0)))
            .collect();
        for node in &mut nodes {
            if let Some((embedding, is_legacy)) = by_node_id.remove(&node.id) {
                node.embedding = Some(embedding);
                node.embedding_is_legacy = is_legacy;
            }
        }
        Ok(nodes)
    }

    async fn update_node_embedding(&self, node_id: &str, vector: Vec<f32>) -> TaskWingResult<()> {
        let dim = vector.len() as i64;
        let is_new = sqlx::query_as::<_, (i64,)>("SELECT dim FROM node_embeddings WHERE node_id = ?")
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await?
            .is_none();

        if !is_new {
            // Store-wide current dimension: the dimension of the most
            // recently written vector across every node, not just this one.
            let current: Option<(i64,)> =
                sqlx::query_as("SELECT dim FROM node_embeddings ORDER BY updated_at DESC, rowid DESC LIMIT 1")
                    .fetch_optional(&self.pool)
                    .await?;
            if let Some((current_dim,)) = current {
                if current_dim != dim {
                    return Err(TaskWingError::Integrity(format!(
                        "embedding dimension mismatch: store has {current_dim}, got {dim}"
                    )));
                }
            }
        }

        let blob: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO node_embeddings (node_id, dim, blob, is_legacy, updated_at) VALUES (?, ?, ?, 0, ?)
             ON CONFLICT(node_id) DO UPDATE SET dim = excluded.dim, blob = excluded.blob, is_legacy = 0, updated_at = excluded.updated_at",
        )
        .bind(node_id)
        .bind(dim)
        .bind(blob)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_node_embedding(&self, node_id: &str) -> TaskWingResult<Option<(Vec<f32>, bool)>> {
        let row: Option<(Vec<u8>, i64)> = sqlx::query_as("SELECT blob, is_legacy FROM node_embeddings WHERE node_id = ?")
            .bind(node_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(blob, is_legacy)| (decode_embedding_blob(&blob), is_legacy != 0)))
    }

    async fn create_edge(&self, edge: Edge) -> TaskWingResult<Edge> {
        sqlx::query("INSERT INTO edges (id, from_id, to_id, kind, weight, created_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(&edge.id)
            .bind(&edge.from_id)
            .bind(&edge.to_id)
            .bind(&edge.kind)
            .bind(edge.weight.map(|w| w as f64))
            .bind(edge.created_at)
            .execute(&self.pool)
            .await?;
        Ok(edge)
    }

    async fn list_edges_from(&self, node_id: &str) -> TaskWingResult<Vec<Edge>> {
        let rows = sqlx::query("SELECT * FROM edges WHERE from_id = ? ORDER BY created_at ASC")
            .bind(node_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                Ok(Edge {
                    id: row.try_get("id")?,
                    from_id: row.try_get("from_id")?,
                    to_id: row.try_get("to_id")?,
                    kind: row.try_get("kind")?,
                    weight: row.try_get::<Option<f64>, _>("weight")?.map(|w| w as f32),
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn delete_edges_for_node(&self, node_id: &str) -> TaskWingResult<()> {
        sqlx::query("DELETE FROM edges WHERE from_id = ? OR to_id = ?")
            .bind(node_id)
            .bind(node_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_plan(&self, plan: Plan) -> TaskWingResult<Plan> {
        sqlx::query(
            "INSERT INTO plans (id, original_goal, enriched_goal, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&plan.id)
        .bind(&plan.original_goal)
        .bind(&plan.enriched_goal)
        .bind(plan.status.as_str())
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(plan)
    }

    async fn get_plan(&self, id: &str) -> TaskWingResult<Plan> {
        let row = sqlx::query("SELECT * FROM plans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| TaskWingError::NotFound(format!("plan {id}")))?;
        Self::row_to_plan(&row)
    }

    async fn update_plan(&self, plan: Plan) -> TaskWingResult<Plan> {
        sqlx::query(
            "UPDATE plans SET original_goal = ?, enriched_goal = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&plan.original_goal)
        .bind(&plan.enriched_goal)
        .bind(plan.status.as_str())
        .bind(plan.updated_at)
        .bind(&plan.id)
        .execute(&self.pool)
        .await?;
        Ok(plan)
    }

    async fn delete_plan(&self, id: &str) -> TaskWingResult<()> {
        sqlx::query("DELETE FROM plans WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_plans(&self) -> TaskWingResult<Vec<Plan>> {
        let rows = sqlx::query("SELECT * FROM plans ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_plan).collect()
    }

    async fn create_task(&self, task: Task) -> TaskWingResult<Task> {
        let acceptance_criteria = serde_json::to_string(&task.acceptance_criteria)?;
        let validation_steps = serde_json::to_string(&task.validation_steps)?;
        sqlx::query(
            "INSERT INTO tasks (id, plan_id, title, description, priority, status, assigned_agent_hint,
                acceptance_criteria, validation_steps, claim_session_id, claim_claimed_at, completion_summary,
                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&task.plan_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority)
        .bind(task.status.as_str())
        .bind(&task.assigned_agent_hint)
        .bind(&acceptance_criteria)
        .bind(&validation_steps)
        .bind(task.claim.as_ref().map(|c| c.session_id.clone()))
        .bind(task.claim.as_ref().map(|c| c.claimed_at))
        .bind(&task.completion_summary)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(task)
    }

    async fn get_task(&self, id: &str) -> TaskWingResult<Task> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| TaskWingError::NotFound(format!("task {id}")))?;
        Self::row_to_task(&row)
    }

    async fn update_task(&self, task: Task) -> TaskWingResult<Task> {
        let acceptance_criteria = serde_json::to_string(&task.acceptance_criteria)?;
        let validation_steps = serde_json::to_string(&task.validation_steps)?;
        sqlx::query(
            "UPDATE tasks SET title = ?, description = ?, priority = ?, status = ?, assigned_agent_hint = ?,
                acceptance_criteria = ?, validation_steps = ?, claim_session_id = ?, claim_claimed_at = ?,
                completion_summary = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority)
        .bind(task.status.as_str())
        .bind(&task.assigned_agent_hint)
        .bind(&acceptance_criteria)
        .bind(&validation_steps)
        .bind(task.claim.as_ref().map(|c| c.session_id.clone()))
        .bind(task.claim.as_ref().map(|c| c.claimed_at))
        .bind(&task.completion_summary)
        .bind(task.updated_at)
        .bind(&task.id)
        .execute(&self.pool)
        .await?;
        Ok(task)
    }

    async fn delete_task(&self, id: &str) -> TaskWingResult<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_tasks(&self, plan_id: &str) -> TaskWingResult<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE plan_id = ? ORDER BY priority DESC, created_at ASC")
            .bind(plan_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_task).collect()
    }

    async fn create_clarify_session(&self, session: ClarifySession) -> TaskWingResult<ClarifySession> {
        let history = serde_json::to_string(&session.history)?;
        let phases = serde_json::to_string(&session.phases)?;
        let pending_questions = serde_json::to_string(&session.pending_questions)?;
        sqlx::query(
            "INSERT INTO clarify_sessions (id, plan_id, goal, round_index, history, enriched_goal,
                ready_to_plan, max_rounds, phases, pending_questions, aborted, finalized, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.plan_id)
        .bind(&session.goal)
        .bind(session.round_index as i64)
        .bind(&history)
        .bind(&session.enriched_goal)
        .bind(session.ready_to_plan as i64)
        .bind(session.max_rounds as i64)
        .bind(&phases)
        .bind(&pending_questions)
        .bind(session.aborted as i64)
        .bind(session.finalized as i64)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(session)
    }

    async fn get_clarify_session(&self, id: &str) -> TaskWingResult<ClarifySession> {
        let row = sqlx::query("SELECT * FROM clarify_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| TaskWingError::NotFound(format!("clarify session {id}")))?;
        Self::row_to_clarify_session(&row)
    }

    async fn update_clarify_session(&self, session: ClarifySession) -> TaskWingResult<ClarifySession> {
        let history = serde_json::to_string(&session.history)?;
        let phases = serde_json::to_string(&session.phases)?;
        let pending_questions = serde_json::to_string(&session.pending_questions)?;
        sqlx::query(
            "UPDATE clarify_sessions SET plan_id = ?, round_index = ?, history = ?, enriched_goal = ?,
                ready_to_plan = ?, phases = ?, pending_questions = ?, aborted = ?, finalized = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&session.plan_id)
        .bind(session.round_index as i64)
        .bind(&history)
        .bind(&session.enriched_goal)
        .bind(session.ready_to_plan as i64)
        .bind(&phases)
        .bind(&pending_questions)
        .bind(session.aborted as i64)
        .bind(session.finalized as i64)
        .bind(session.updated_at)
        .bind(&session.id)
        .execute(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete_clarify_session(&self, id: &str) -> TaskWingResult<()> {
        sqlx::query("DELETE FROM clarify_sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn check(&self) -> TaskWingResult<Vec<IntegrityIssue>> {
        let mut issues = Vec::new();
        let nodes = self.fetch_all_nodes().await?;

        for node in nodes.iter().filter(|n| n.kind == NodeKind::Feature) {
            let path = markdown::feature_markdown_path(&self.memory_root, node);
            if !path.exists() {
                issues.push(IntegrityIssue {
                    kind: IntegrityIssueKind::MissingMarkdown,
                    message: format!("missing markdown mirror for feature {}", node.id),
                    feature_id: Some(node.id.clone()),
                });
            }
        }

        let node_ids: std::collections::HashSet<_> = nodes.iter().map(|n| n.id.clone()).collect();
        let edges = sqlx::query("SELECT * FROM edges").fetch_all(&self.pool).await?;
        for row in &edges {
            let from_id: String = row.try_get("from_id")?;
            let to_id: String = row.try_get("to_id")?;
            if !node_ids.contains(&from_id) || !node_ids.contains(&to_id) {
                issues.push(IntegrityIssue {
                    kind: IntegrityIssueKind::OrphanEdge,
                    message: format!("edge {from_id} -> {to_id} references a missing node"),
                    feature_id: None,
                });
            }
        }

        let stats = self.embedding_stats().await?;
        if stats.mixed_dimensions {
            issues.push(IntegrityIssue {
                kind: IntegrityIssueKind::DimensionMismatch,
                message: "node embeddings have inconsistent dimensions".to_string(),
                feature_id: None,
            });
        }

        match index::read_index(&self.memory_root)? {
            None => issues.push(IntegrityIssue {
                kind: IntegrityIssueKind::StaleIndex,
                message: "index.json is missing".to_string(),
                feature_id: None,
            }),
            Some(existing) => {
                let mut expected_ids: Vec<_> = nodes
                    .iter()
                    .filter(|n| n.kind == NodeKind::Feature)
                    .map(|n| n.id.clone())
                    .collect();
                expected_ids.sort();
                let mut actual_ids: Vec<_> = existing.features.iter().map(|f| f.id.clone()).collect();
                actual_ids.sort();
                if expected_ids != actual_ids {
                    issues.push(IntegrityIssue {
                        kind: IntegrityIssueKind::StaleIndex,
                        message: "index.json is out of sync with the feature set".to_string(),
                        feature_id: None,
                    });
                }
            }
        }

        Ok(issues)
    }

    async fn repair(&self) -> TaskWingResult<Vec<IntegrityIssue>> {
        let issues = self.check().await?;
        let nodes = self.fetch_all_nodes().await?;

        let has_orphan_edges = issues.iter().any(|i| i.kind == IntegrityIssueKind::OrphanEdge);
        if has_orphan_edges {
            let node_ids: std::collections::HashSet<_> = nodes.iter().map(|n| n.id.clone()).collect();
            let edges = sqlx::query("SELECT id, from_id, to_id FROM edges")
                .fetch_all(&self.pool)
                .await?;
            for row in &edges {
                let edge_id: String = row.try_get("id")?;
                let from_id: String = row.try_get("from_id")?;
                let to_id: String = row.try_get("to_id")?;
                if !node_ids.contains(&from_id) || !node_ids.contains(&to_id) {
                    sqlx::query("DELETE FROM edges WHERE id = ?")
                        .bind(&edge_id)
                        .execute(&self.pool)
                        .await?;
                }
            }
        }

        markdown::regenerate(&self.memory_root, &nodes)?;
        self.rebuild_index().await?;
        Ok(issues)
    }

    async fn rebuild_index(&self) -> TaskWingResult<()> {
        let nodes = self.fetch_all_nodes().await?;
        index::rebuild_index(&self.memory_root, &nodes)?;
        markdown::regenerate(&self.memory_root, &nodes)?;
        Ok(())
    }

    async fn embedding_stats(&self) -> TaskWingResult<EmbeddingStats> {
        let total_nodes: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nodes")
            .fetch_one(&self.pool)
            .await?;
        let with_embeddings: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM node_embeddings")
            .fetch_one(&self.pool)
            .await?;
        let distinct_dim_count: (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT dim) FROM node_embeddings")
            .fetch_one(&self.pool)
            .await?;
        let most_recent: Option<(i64,)> =
            sqlx::query_as("SELECT dim FROM node_embeddings ORDER BY updated_at DESC, rowid DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        let dimension = most_recent.map(|(d,)| d as usize).unwrap_or(0);
        let mixed_dimensions = distinct_dim_count.0 > 1;

        Ok(EmbeddingStats {
            total_nodes: total_nodes.0 as u64,
            with_embeddings: with_embeddings.0 as u64,
            without: (total_nodes.0 - with_embeddings.0).max(0) as u64,
            dimension,
            mixed_dimensions,
        })
    }

    async fn get_active_plan(&self) -> TaskWingResult<Option<String>> {
        Ok(self.state.read()?.active_plan_id)
    }

    async fn set_active_plan(&self, plan_id: Option<&str>) -> TaskWingResult<()> {
        let mut state = self.state.read()?;
        state.active_plan_id = plan_id.map(|s| s.to_string());
        self.state.write(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::migrations::Migrator;

    async fn test_store() -> (SqliteMemoryStore, tempfile::TempDir) {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        Migrator::new(pool.clone()).migrate().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        (SqliteMemoryStore::new(pool, dir.path()), dir)
    }

    #[tokio::test]
    async fn create_and_get_node_round_trips() {
        let (store, _dir) = test_store().await;
        let node = Node::new(NodeKind::Feature, "Auth flow", "uses OAuth2");
        let created = store.create_node(node.clone()).await.unwrap();
        let fetched = store.get_node(&created.id).await.unwrap();
        assert_eq!(fetched.summary, "Auth flow");
    }

    #[tokio::test]
    async fn get_missing_node_returns_not_found() {
        let (store, _dir) = test_store().await;
        let err = store.get_node("missing").await.unwrap_err();
        assert!(matches!(err, TaskWingError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_node_embedding_rejects_dimension_mismatch() {
        let (store, _dir) = test_store().await;
        let node = Node::new(NodeKind::Feature, "Feature", "content");
        let created = store.create_node(node).await.unwrap();
        store
            .update_node_embedding(&created.id, vec![0.1, 0.2, 0.3])
            .await
            .unwrap();
        let err = store
            .update_node_embedding(&created.id, vec![0.1, 0.2])
            .await
            .unwrap_err();
        assert!(matches!(err, TaskWingError::Integrity(_)));
    }

    #[tokio::test]
    async fn update_node_embedding_rejects_dimension_mismatch_against_a_different_node() {
        let (store, _dir) = test_store().await;
        let a = store
            .create_node(Node::new(NodeKind::Feature, "A", "content"))
            .await
            .unwrap();
        let b = store
            .create_node(Node::new(NodeKind::Feature, "B", "content"))
            .await
            .unwrap();
        store.update_node_embedding(&a.id, vec![0.1, 0.2, 0.3]).await.unwrap();
        // b is new, so it is exempt from the store-wide dimension check.
        store.update_node_embedding(&b.id, vec![0.4, 0.5]).await.unwrap();
        // a already has an embedding, so it must match the most recently
        // written dimension (b's, 2) rather than its own prior one (3).
        let err = store
            .update_node_embedding(&a.id, vec![0.6, 0.7, 0.8])
            .await
            .unwrap_err();
        assert!(matches!(err, TaskWingError::Integrity(_)));
    }

    #[tokio::test]
    async fn get_node_and_list_nodes_hydrate_persisted_embeddings() {
        let (store, _dir) = test_store().await;
        let created = store
            .create_node(Node::new(NodeKind::Feature, "Feature", "content"))
            .await
            .unwrap();
        store
            .update_node_embedding(&created.id, vec![0.25, 0.5, 0.75])
            .await
            .unwrap();

        let fetched = store.get_node(&created.id).await.unwrap();
        assert_eq!(fetched.embedding.as_deref(), Some([0.25, 0.5, 0.75].as_slice()));
        assert!(!fetched.embedding_is_legacy);

        let listed = store.fetch_all_nodes().await.unwrap();
        let listed_node = listed.iter().find(|n| n.id == created.id).unwrap();
        assert_eq!(listed_node.embedding.as_deref(), Some([0.25, 0.5, 0.75].as_slice()));
    }

    #[tokio::test]
    async fn embedding_stats_dimension_reflects_the_most_recently_written_vector() {
        let (store, _dir) = test_store().await;
        let a = store
            .create_node(Node::new(NodeKind::Feature, "A", "content"))
            .await
            .unwrap();
        let b = store
            .create_node(Node::new(NodeKind::Feature, "B", "content"))
            .await
            .unwrap();
        store.update_node_embedding(&a.id, vec![0.1, 0.2, 0.3]).await.unwrap();
        store.update_node_embedding(&b.id, vec![0.4, 0.5]).await.unwrap();

        let stats = store.embedding_stats().await.unwrap();
        assert_eq!(stats.dimension, 2, "b's write is the most recent");
        assert!(stats.mixed_dimensions);
    }

    #[tokio::test]
    async fn task_claim_round_trips_through_storage() {
        let (store, _dir) = test_store().await;
        let plan = store.create_plan(Plan::new("goal")).await.unwrap();
        let mut task = Task::new(&plan.id, "title", "description");
        task.status = TaskStatus::Pending;
        task.claim("session-a").unwrap();
        let created = store.create_task(task).await.unwrap();
        let fetched = store.get_task(&created.id).await.unwrap();
        assert_eq!(fetched.claim.unwrap().session_id, "session-a");
    }

    #[tokio::test]
    async fn rebuild_index_then_check_reports_no_issues() {
        let (store, _dir) = test_store().await;
        let node = Node::new(NodeKind::Feature, "Feature", "content");
        store.create_node(node).await.unwrap();
        store.rebuild_index().await.unwrap();
        let issues = store.check().await.unwrap();
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn check_detects_missing_markdown_mirror() {
        let (store, _dir) = test_store().await;
        let node = Node::new(NodeKind::Feature, "Feature", "content");
        store.create_node(node).await.unwrap();
        let issues = store.check().await.unwrap();
        assert!(issues.iter().any(|i| i.kind == IntegrityIssueKind::MissingMarkdown));
    }

    #[tokio::test]
    async fn set_and_get_active_plan_round_trips() {
        let (store, _dir) = test_store().await;
        assert_eq!(store.get_active_plan().await.unwrap(), None);
        store.set_active_plan(Some("plan-1")).await.unwrap();
        assert_eq!(store.get_active_plan().await.unwrap(), Some("plan-1".to_string()));
    }

    #[tokio::test]
    async fn delete_node_cascades_its_edges() {
        let (store, _dir) = test_store().await;
        let a = store.create_node(Node::new(NodeKind::Feature, "A", "c")).await.unwrap();
        let b = store.create_node(Node::new(NodeKind::Feature, "B", "c")).await.unwrap();
        store
            .create_edge(Edge::new(a.id.clone(), b.id.clone(), "applies_to"))
            .await
            .unwrap();
        store.delete_node(&a.id).await.unwrap();
        let edges = store.list_edges_from(&a.id).await.unwrap();
        assert!(edges.is_empty());
    }
}
