//! Standard policy engine.
//!
//! Wraps whichever policy query is registered for the configured language.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use vouch_core::errors::code::{POLICY_EVALUATION_FAILURE, POLICY_INVALID};
use vouch_core::policy::{PolicyEngine, PolicyEngineConfig, PolicyInput, PolicyQuery};
use vouch_core::{ComponentType, Result};

use super::PolicyQueryRegistry;

/// Registered engine name.
pub const NAME: &str = "standard";

pub struct StandardPolicyEngine {
    name: String,
    query_language: String,
    query: Arc<dyn PolicyQuery>,
}

impl StandardPolicyEngine {
    /// Build the engine and its query. Fails on an empty policy or a query
    /// that does not construct.
    pub fn new(config: PolicyEngineConfig, queries: &PolicyQueryRegistry) -> Result<Self> {
        config.validate()?;
        let PolicyEngineConfig {
            name,
            query_language,
            policy,
        } = config;

        let query = queries.create(&query_language, policy).map_err(|e| {
            POLICY_INVALID
                .with_detail(format!("failed to build '{}' policy query", query_language))
                .with_error(e)
                .with_component_type(ComponentType::PolicyProvider)
                .with_plugin_name(name.clone())
        })?;

        debug!(engine = %name, language = %query_language, "created policy engine");
        Ok(Self {
            name,
            query_language,
            query,
        })
    }

    /// Factory registered under [`NAME`], resolving queries from `queries`.
    pub fn factory(
        queries: Arc<PolicyQueryRegistry>,
    ) -> impl Fn(PolicyEngineConfig) -> Result<Arc<dyn PolicyEngine>> + Send + Sync + 'static {
        move |config: PolicyEngineConfig| -> Result<Arc<dyn PolicyEngine>> {
            Ok(Arc::new(Self::new(config, &queries)?))
        }
    }

    pub fn query_language(&self) -> &str {
        &self.query_language
    }
}

#[async_trait]
impl PolicyEngine for StandardPolicyEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, input: &PolicyInput) -> Result<bool> {
        let satisfied = self.query.evaluate(input).await.map_err(|e| {
            POLICY_EVALUATION_FAILURE
                .with_error(e)
                .with_component_type(ComponentType::Policy)
                .with_plugin_name(self.name.clone())
        })?;
        debug!(engine = %self.name, satisfied, "evaluated policy");
        Ok(satisfied)
    }
}

impl std::fmt::Debug for StandardPolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardPolicyEngine")
            .field("name", &self.name)
            .field("query_language", &self.query_language)
            .finish()
    }
}
