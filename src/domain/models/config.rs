//! Runtime configuration: database location, LLM provider selection, and
//! bootstrap concurrency. Loaded via `infrastructure::config::ConfigLoader`.

use serde::{Deserialize, Serialize};

/// Top-level configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default = "default_bootstrap_concurrency")]
    pub bootstrap_concurrency: usize,
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,
    #[serde(default = "default_clarify_max_rounds")]
    pub clarify_max_rounds: u32,
}

const fn default_bootstrap_concurrency() -> usize {
    4
}

const fn default_circuit_breaker_threshold() -> u32 {
    5
}

const fn default_clarify_max_rounds() -> u32 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            llm: LlmConfig::default(),
            bootstrap_concurrency: default_bootstrap_concurrency(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            clarify_max_rounds: default_clarify_max_rounds(),
        }
    }
}

/// Database configuration, rooted at `<project>/.taskwing/memory/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".taskwing/memory/memory.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Which concrete backend a `Provider` name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    CloudA,
    CloudB,
    CloudC,
    LocalD,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CloudA => "cloud_a",
            Self::CloudB => "cloud_b",
            Self::CloudC => "cloud_c",
            Self::LocalD => "local_d",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cloud_a" => Some(Self::CloudA),
            "cloud_b" => Some(Self::CloudB),
            "cloud_c" => Some(Self::CloudC),
            "local_d" => Some(Self::LocalD),
            _ => None,
        }
    }

    /// Whether this provider ever supports `Embed`. Capability absence is
    /// not an error; callers check this before configuring
    /// embeddings.
    pub fn supports_embed(&self) -> bool {
        matches!(self, Self::CloudB | Self::LocalD)
    }
}

/// Per-role provider override. Bootstrap favors a large-context model;
/// Query favors low cost/latency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RoleConfig {
    pub provider: Option<Provider>,
    pub model: Option<String>,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    pub provider: Option<Provider>,
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub thinking_budget: Option<u32>,
    #[serde(default)]
    pub bootstrap_role: RoleConfig,
    #[serde(default)]
    pub query_role: RoleConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            chat_model: None,
            embedding_model: None,
            api_key: None,
            base_url: None,
            thinking_budget: None,
            bootstrap_role: RoleConfig::default(),
            query_role: RoleConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Resolve the effective provider/model for a role. Role-specific
    /// config takes precedence over the default; an inferred provider (from
    /// the model name) never overwrites the user's configured default.
    pub fn resolve_for_role(&self, role: Role) -> (Option<Provider>, Option<String>) {
        let role_cfg = match role {
            Role::Bootstrap => &self.bootstrap_role,
            Role::Query => &self.query_role,
        };
        let provider = role_cfg.provider.or(self.provider);
        let model = role_cfg
            .model
            .clone()
            .or_else(|| self.chat_model.clone());
        (provider, model)
    }
}

/// LLM call roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Bootstrap,
    Query,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_override_takes_precedence_over_default() {
        let mut cfg = LlmConfig::default();
        cfg.provider = Some(Provider::CloudA);
        cfg.chat_model = Some("default-model".to_string());
        cfg.query_role.provider = Some(Provider::CloudB);
        cfg.query_role.model = Some("query-model".to_string());

        let (provider, model) = cfg.resolve_for_role(Role::Query);
        assert_eq!(provider, Some(Provider::CloudB));
        assert_eq!(model.as_deref(), Some("query-model"));

        let (provider, model) = cfg.resolve_for_role(Role::Bootstrap);
        assert_eq!(provider, Some(Provider::CloudA));
        assert_eq!(model.as_deref(), Some("default-model"));
    }

    #[test]
    fn local_provider_supports_embed_without_api_key() {
        assert!(Provider::LocalD.supports_embed());
    }
}
