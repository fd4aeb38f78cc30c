//! `MemoryStore` - the single seam between services and the Storage Engine.
//!
//! One async trait per aggregate, implemented by the SQLite adapter and
//! mockable for service-layer tests.

use async_trait::async_trait;

use crate::domain::error::TaskWingResult;
use crate::domain::models::{ClarifySession, Edge, Node, NodeKind, NodeUpdate, Plan, Task};

/// Filter for `list_nodes`.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub kind: Option<NodeKind>,
    pub workspace: Option<String>,
    pub include_root: bool,
}

/// Result of `Check()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssueKind {
    MissingMarkdown,
    OrphanEdge,
    StaleIndex,
    DimensionMismatch,
}

#[derive(Debug, Clone)]
pub struct IntegrityIssue {
    pub kind: IntegrityIssueKind,
    pub message: String,
    pub feature_id: Option<String>,
}

/// Result of `EmbeddingStats()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingStats {
    pub total_nodes: u64,
    pub with_embeddings: u64,
    pub without: u64,
    pub dimension: usize,
    pub mixed_dimensions: bool,
}

/// The Storage Engine contract.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    // --- Nodes ---
    async fn create_node(&self, node: Node) -> TaskWingResult<Node>;
    async fn get_node(&self, id: &str) -> TaskWingResult<Node>;
    async fn update_node(&self, id: &str, update: NodeUpdate) -> TaskWingResult<Node>;
    async fn delete_node(&self, id: &str) -> TaskWingResult<()>;
    async fn list_nodes(&self, filter: NodeFilter) -> TaskWingResult<Vec<Node>>;
    /// Fails if `vector.len() != store dimension` unless the node is new
    /// (has no prior embedding).
    async fn update_node_embedding(&self, node_id: &str, vector: Vec<f32>) -> TaskWingResult<()>;
    /// Hydrate a node's persisted embedding: `(vector, is_legacy)`, or
    /// `None` if the node has never had one written. `list_nodes`/`get_node`
    /// use this to populate `Node.embedding` so the vector search pass has
    /// something to rank against.
    async fn get_node_embedding(&self, node_id: &str) -> TaskWingResult<Option<(Vec<f32>, bool)>>;

    // --- Edges ---
    async fn create_edge(&self, edge: Edge) -> TaskWingResult<Edge>;
    async fn list_edges_from(&self, node_id: &str) -> TaskWingResult<Vec<Edge>>;
    async fn delete_edges_for_node(&self, node_id: &str) -> TaskWingResult<()>;

    // --- Plans ---
    async fn create_plan(&self, plan: Plan) -> TaskWingResult<Plan>;
    async fn get_plan(&self, id: &str) -> TaskWingResult<Plan>;
    async fn update_plan(&self, plan: Plan) -> TaskWingResult<Plan>;
    async fn delete_plan(&self, id: &str) -> TaskWingResult<()>;
    /// Ordered by `created_at` descending.
    async fn list_plans(&self) -> TaskWingResult<Vec<Plan>>;

    // --- Tasks ---
    async fn create_task(&self, task: Task) -> TaskWingResult<Task>;
    async fn get_task(&self, id: &str) -> TaskWingResult<Task>;
    async fn update_task(&self, task: Task) -> TaskWingResult<Task>;
    async fn delete_task(&self, id: &str) -> TaskWingResult<()>;
    async fn list_tasks(&self, plan_id: &str) -> TaskWingResult<Vec<Task>>;

    // --- Clarify sessions ---
    async fn create_clarify_session(&self, session: ClarifySession) -> TaskWingResult<ClarifySession>;
    async fn get_clarify_session(&self, id: &str) -> TaskWingResult<ClarifySession>;
    async fn update_clarify_session(&self, session: ClarifySession) -> TaskWingResult<ClarifySession>;
    async fn delete_clarify_session(&self, id: &str) -> TaskWingResult<()>;

    // --- Integrity / derived artifacts ---
    async fn check(&self) -> TaskWingResult<Vec<IntegrityIssue>>;
    async fn repair(&self) -> TaskWingResult<Vec<IntegrityIssue>>;
    async fn rebuild_index(&self) -> TaskWingResult<()>;
    async fn embedding_stats(&self) -> TaskWingResult<EmbeddingStats>;

    // --- Session-wide state ---
    async fn get_active_plan(&self) -> TaskWingResult<Option<String>>;
    async fn set_active_plan(&self, plan_id: Option<&str>) -> TaskWingResult<()>;
}
