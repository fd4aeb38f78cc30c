//! Infers a provider from a model name when the user has not configured one
//! explicitly. Pure and side-effect free so it can run ahead of any network
//! call; an inferred provider never overwrites a user-configured default
//!.

use crate::domain::models::config::Provider;

pub fn infer_provider_from_model(model: &str) -> Option<Provider> {
    let lower = model.to_lowercase();
    if lower.starts_with("claude") {
        Some(Provider::CloudA)
    } else if lower.starts_with("gpt") || lower.starts_with("text-embedding") || lower.starts_with("o1") {
        Some(Provider::CloudB)
    } else if lower.starts_with("gemini") {
        Some(Provider::CloudC)
    } else if lower.starts_with("llama") || lower.starts_with("mistral") || lower.starts_with("qwen") {
        Some(Provider::LocalD)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_known_model_prefixes() {
        assert_eq!(infer_provider_from_model("claude-3-5-sonnet"), Some(Provider::CloudA));
        assert_eq!(infer_provider_from_model("gpt-4o"), Some(Provider::CloudB));
        assert_eq!(infer_provider_from_model("gemini-1.5-pro"), Some(Provider::CloudC));
        assert_eq!(infer_provider_from_model("llama3:8b"), Some(Provider::LocalD));
    }

    #[test]
    fn unknown_model_infers_nothing() {
        assert_eq!(infer_provider_from_model("some-custom-finetune"), None);
    }
}
