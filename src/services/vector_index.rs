//! Vector Index - cosine similarity over node embeddings.
//!
//! Consumes embeddings produced elsewhere (an LLM provider's `Embed()`); it
//! never generates them, so there is no local tensor runtime here (see
//! DESIGN.md).

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Rank `(id, embedding)` pairs against `query` by cosine similarity,
/// ignoring embeddings whose dimension differs from the query's.
pub fn top_k<'a>(query: &[f32], candidates: &'a [(String, Vec<f32>)], k: usize) -> Vec<(&'a str, f32)> {
    let mut scored: Vec<(&str, f32)> = candidates
        .iter()
        .filter(|(_, vec)| vec.len() == query.len())
        .map(|(id, vec)| (id.as_str(), cosine_similarity(query, vec)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}
