pub mod inference;
pub mod provider_a;
pub mod provider_b;
pub mod provider_c;
pub mod provider_d;
pub mod retry;

use std::sync::Arc;

use crate::domain::error::{TaskWingError, TaskWingResult};
use crate::domain::models::config::{LlmConfig, Provider};
use crate::domain::ports::llm_provider::ChatProvider;

/// Construct the configured `ChatProvider` for a resolved `(provider, ..)`
/// pair. `LocalProviderD` is the only variant that tolerates a missing API
/// key.
pub fn build_provider(provider: Provider, config: &LlmConfig) -> TaskWingResult<Arc<dyn ChatProvider>> {
    match provider {
        Provider::CloudA => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| TaskWingError::Auth("provider_a requires an API key".to_string()))?;
            Ok(Arc::new(provider_a::CloudProviderA::new(api_key, config.base_url.clone())?))
        }
        Provider::CloudB => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| TaskWingError::Auth("provider_b requires an API key".to_string()))?;
            Ok(Arc::new(provider_b::CloudProviderB::new(api_key, config.base_url.clone())?))
        }
        Provider::CloudC => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| TaskWingError::Auth("provider_c requires an API key".to_string()))?;
            Ok(Arc::new(provider_c::CloudProviderC::new(api_key, config.base_url.clone())?))
        }
        Provider::LocalD => Ok(Arc::new(provider_d::LocalProviderD::new(config.base_url.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloud_provider_without_api_key_is_an_auth_error() {
        let config = LlmConfig::default();
        let err = build_provider(Provider::CloudA, &config).unwrap_err();
        assert!(matches!(err, TaskWingError::Auth(_)));
    }

    #[test]
    fn local_provider_builds_without_an_api_key() {
        let config = LlmConfig::default();
        assert!(build_provider(Provider::LocalD, &config).is_ok());
    }
}
