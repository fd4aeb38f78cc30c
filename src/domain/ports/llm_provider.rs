//! LLM Provider Abstraction - a uniform contract across
//! multiple chat/embedding backends.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::TaskWingResult;

/// Options accepted by `Chat`.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub thinking_budget: Option<u32>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Options accepted by `Embed`.
#[derive(Debug, Clone, Default)]
pub struct EmbedOptions {
    pub model: Option<String>,
}

/// The uniform LLM provider contract. Not every provider implements
/// `Embed` — absence is a capability, not an error; callers check
/// `supports_embed()` before calling.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Human-readable provider name, used for logging and model-name
    /// inference tie-breaking.
    fn name(&self) -> &'static str;

    /// Issue a chat call. If `schema` is given, the response MUST validate
    /// against it; the caller (not this trait) owns the repair-prompt retry
    /// loop, since retry needs access to the schema-violation message to
    /// build the repair prompt.
    async fn chat(&self, system: &str, user: &str, opts: &ChatOptions) -> TaskWingResult<String>;

    fn supports_embed(&self) -> bool {
        false
    }

    async fn embed(&self, _text: &str, _opts: &EmbedOptions) -> TaskWingResult<Vec<f32>> {
        Err(crate::domain::error::TaskWingError::Fatal(
            "provider does not implement Embed".to_string(),
        ))
    }
}

/// Validate that `text` parses as JSON and, if `schema` is provided, that it
/// has the required top-level keys. This is an intentionally shallow
/// validator (full JSON Schema validation is out of scope) sufficient to
/// drive the repair loop in `services::agent_kernel`.
pub fn validate_json_shape(text: &str, required_keys: &[&str]) -> Result<Value, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if required_keys.is_empty() {
        return Ok(value);
    }
    let obj = value
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;
    for key in required_keys {
        if !obj.contains_key(*key) {
            return Err(format!("missing required field: {key}"));
        }
    }
    Ok(value)
}
