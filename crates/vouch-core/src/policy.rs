//! Policy query and policy engine contracts.
//!
//! A query is one language's evaluator, built from a raw policy document. An
//! engine is the uniform wrapper the orchestrator talks to; it picks the query
//! implementation by language name.
//!
//! `Ok(false)` means "the report does not satisfy the policy". Errors are
//! reserved for hard failures such as an unparsable document.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::code::POLICY_INVALID;
use crate::errors::{ComponentType, Result};

/// Verification report handed to a policy.
pub type PolicyInput = Map<String, Value>;

#[async_trait]
pub trait PolicyQuery: Send + Sync {
    async fn evaluate(&self, input: &PolicyInput) -> Result<bool>;
}

#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Name the engine was configured with.
    fn name(&self) -> &str;

    async fn evaluate(&self, input: &PolicyInput) -> Result<bool>;
}

/// Policy engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEngineConfig {
    /// Engine implementation to create.
    pub name: String,

    /// Registered policy query language the document is written in.
    pub query_language: String,

    /// Raw policy document.
    pub policy: String,
}

impl PolicyEngineConfig {
    pub fn new(
        name: impl Into<String>,
        query_language: impl Into<String>,
        policy: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            query_language: query_language.into(),
            policy: policy.into(),
        }
    }

    /// Reject configurations that can never produce an engine.
    pub fn validate(&self) -> Result<()> {
        if self.policy.trim().is_empty() {
            return Err(POLICY_INVALID
                .with_detail("policy document is empty")
                .with_component_type(ComponentType::PolicyProvider)
                .with_plugin_name(self.name.clone())
                .with_remediation("set 'policy' to a non-empty policy document"));
        }
        if self.query_language.trim().is_empty() {
            return Err(POLICY_INVALID
                .with_detail("query language is not set")
                .with_component_type(ComponentType::PolicyProvider)
                .with_plugin_name(self.name.clone()));
        }
        Ok(())
    }
}
