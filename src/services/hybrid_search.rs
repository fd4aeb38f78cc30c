//! Hybrid Searcher: keyword pass + vector pass + reciprocal
//! rank fusion, with a summary mode for empty queries and an optional
//! LLM-synthesized `answer`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::error::TaskWingResult;
use crate::domain::models::{Node, NodeKind};
use crate::domain::ports::llm_provider::{ChatOptions, ChatProvider};
use crate::domain::ports::memory_store::{MemoryStore, NodeFilter};
use crate::services::vector_index::cosine_similarity;

/// Default reciprocal-rank-fusion constant. 60 is the conventional default
/// for this technique and is treated as the sane tunable here.
pub const DEFAULT_RRF_K: f64 = 60.0;

#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub kind: Option<NodeKind>,
}

#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node: Node,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct KindSummary {
    pub count: usize,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SummaryModeResult {
    pub total: usize,
    pub types: HashMap<String, KindSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub results: Vec<ScoredNode>,
    pub answer: Option<String>,
    pub warning: Option<String>,
}

pub struct HybridSearcher {
    store: Arc<dyn MemoryStore>,
    embedder: Option<Arc<dyn ChatProvider>>,
    answerer: Option<Arc<dyn ChatProvider>>,
}

impl HybridSearcher {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Option<Arc<dyn ChatProvider>>,
        answerer: Option<Arc<dyn ChatProvider>>,
    ) -> Self {
        Self {
            store,
            embedder,
            answerer,
        }
    }

    /// Empty query ⇒ counts per kind plus up to three example summaries
    /// each.
    pub async fn summary(&self, filter: SearchFilter) -> TaskWingResult<SummaryModeResult> {
        let nodes = self
            .store
            .list_nodes(NodeFilter {
                kind: filter.kind,
                include_root: true,
                ..Default::default()
            })
            .await?;

        let mut types: HashMap<String, KindSummary> = HashMap::new();
        for node in &nodes {
            let entry = types.entry(node.kind.as_str().to_string()).or_default();
            entry.count += 1;
            if entry.examples.len() < 3 {
                entry.examples.push(node.summary.clone());
            }
        }

        Ok(SummaryModeResult {
            total: nodes.len(),
            types,
        })
    }

    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: SearchFilter,
        want_answer: bool,
    ) -> TaskWingResult<SearchResult> {
        if query.trim().is_empty() {
            return Ok(SearchResult::default());
        }

        let nodes = self
            .store
            .list_nodes(NodeFilter {
                kind: filter.kind,
                include_root: true,
                ..Default::default()
            })
            .await?;

        let keyword_ranked = keyword_rank(query, &nodes);

        let mut warning = None;
        let vector_ranked = if let Some(embedder) = &self.embedder {
            if embedder.supports_embed() {
                match embedder.embed(query, &Default::default()).await {
                    Ok(query_vec) => vector_rank(&query_vec, &nodes),
                    Err(_) => {
                        warning = Some("embedding provider call failed; returning keyword-only results".to_string());
                        Vec::new()
                    }
                }
            } else {
                warning = Some("configured provider does not support embeddings; returning keyword-only results".to_string());
                Vec::new()
            }
        } else {
            warning = Some("no embedding provider configured; returning keyword-only results".to_string());
            Vec::new()
        };

        let fused = reciprocal_rank_fusion(&keyword_ranked, &vector_ranked, DEFAULT_RRF_K);
        let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut results: Vec<ScoredNode> = fused
            .into_iter()
            .filter_map(|(id, score)| by_id.get(id.as_str()).map(|n| ScoredNode { node: (*n).clone(), score }))
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.node.confidence.partial_cmp(&a.node.confidence).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| b.node.created_at.cmp(&a.node.created_at))
        });
        results.truncate(k.max(1));

        let answer = if want_answer && !results.is_empty() {
            match &self.answerer {
                Some(provider) => match synthesize_answer(provider.as_ref(), query, &results).await {
                    Ok(answer) => Some(answer),
                    Err(_) => {
                        warning.get_or_insert_with(|| "failed to synthesize an answer".to_string());
                        None
                    }
                },
                None => {
                    warning.get_or_insert_with(|| "no LLM provider configured for answer synthesis".to_string());
                    None
                }
            }
        } else {
            None
        };

        Ok(SearchResult {
            results,
            answer,
            warning,
        })
    }
}

async fn synthesize_answer(
    provider: &dyn ChatProvider,
    query: &str,
    results: &[ScoredNode],
) -> TaskWingResult<String> {
    let context = results
        .iter()
        .map(|r| format!("- {}: {}", r.node.summary, r.node.content))
        .collect::<Vec<_>>()
        .join("\n");
    let system = "Answer the user's question in one paragraph, grounded only in the given context.";
    let user = format!("Question: {query}\n\nContext:\n{context}");
    provider.chat(system, &user, &ChatOptions::default()).await
}

/// Keyword pass: case-insensitive substring match over summary + content +
/// payload title, ranked by (exact_summary_match > title_match >
/// body_match) then recency, returned as a rank-ordered id list.
fn keyword_rank(query: &str, nodes: &[Node]) -> Vec<String> {
    let query_lower = query.to_lowercase();
    let mut matches: Vec<(&Node, u8)> = Vec::new();

    for node in nodes {
        let summary_lower = node.summary.to_lowercase();
        let title_lower = node.payload.title.as_deref().unwrap_or("").to_lowercase();
        let content_lower = node.content.to_lowercase();

        let rank = if summary_lower == query_lower {
            3
        } else if summary_lower.contains(&query_lower) {
            2
        } else if title_lower.contains(&query_lower) {
            1
        } else if content_lower.contains(&query_lower) {
            0
        } else {
            continue;
        };
        matches.push((node, rank));
    }

    matches.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.created_at.cmp(&a.0.created_at)));
    matches.into_iter().map(|(n, _)| n.id.clone()).collect()
}

fn vector_rank(query_vec: &[f32], nodes: &[Node]) -> Vec<String> {
    let mut scored: Vec<(&Node, f32)> = nodes
        .iter()
        .filter_map(|n| {
            let embedding = n.embedding.as_ref()?;
            if n.embedding_is_legacy || embedding.len() != query_vec.len() {
                return None;
            }
            Some((n, cosine_similarity(query_vec, embedding)))
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(n, _)| n.id.clone()).collect()
}

/// Standard RRF: score(id) = sum over lists containing id of 1/(k + rank).
fn reciprocal_rank_fusion(keyword: &[String], vector: &[String], k: f64) -> Vec<(String, f64)> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    for (rank, id) in keyword.iter().enumerate() {
        *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (k + rank as f64 + 1.0);
    }
    for (rank, id) in vector.iter().enumerate() {
        *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (k + rank as f64 + 1.0);
    }
    scores.into_iter().collect()
}
