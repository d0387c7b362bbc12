//! JSON Schema policy query.
//!
//! The policy document is a JSON Schema (draft 2020-12), written as JSON or
//! YAML. A verification report satisfies the policy when it validates against
//! the schema. Compilation happens once, at construction.

use std::sync::Arc;

use async_trait::async_trait;
use jsonschema::{Draft, Validator};
use serde_json::Value;
use tracing::debug;

use vouch_core::errors::code::POLICY_INVALID;
use vouch_core::policy::{PolicyInput, PolicyQuery};
use vouch_core::{ComponentType, Result};

/// Registered query language name.
pub const LANGUAGE: &str = "jsonschema";

/// Upper bound on validation errors written to the debug log.
const MAX_LOGGED_ERRORS: usize = 5;

pub struct JsonSchemaQuery {
    validator: Validator,
}

impl JsonSchemaQuery {
    pub fn new(policy: &str) -> Result<Self> {
        let schema = parse_document(policy)?;
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .map_err(|e| {
                POLICY_INVALID
                    .with_detail(format!("schema does not compile: {}", e))
                    .with_component_type(ComponentType::PolicyProvider)
                    .with_plugin_name(LANGUAGE)
            })?;
        Ok(Self { validator })
    }

    /// Factory registered under [`LANGUAGE`].
    pub fn create(policy: String) -> Result<Arc<dyn PolicyQuery>> {
        Ok(Arc::new(Self::new(&policy)?))
    }
}

/// Parse as JSON, falling back to YAML.
fn parse_document(policy: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(policy) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_yaml::from_str::<Value>(policy).map_err(|yaml_err| {
            POLICY_INVALID
                .with_detail(format!(
                    "policy is neither JSON ({}) nor YAML",
                    json_err
                ))
                .with_error(yaml_err)
                .with_component_type(ComponentType::PolicyProvider)
                .with_plugin_name(LANGUAGE)
        }),
    }
}

#[async_trait]
impl PolicyQuery for JsonSchemaQuery {
    async fn evaluate(&self, input: &PolicyInput) -> Result<bool> {
        let instance = Value::Object(input.clone());
        let satisfied = self.validator.is_valid(&instance);
        if !satisfied {
            let reasons: Vec<String> = self
                .validator
                .iter_errors(&instance)
                .take(MAX_LOGGED_ERRORS)
                .map(|e| e.to_string())
                .collect();
            debug!(?reasons, "report does not satisfy policy");
        }
        Ok(satisfied)
    }
}

impl std::fmt::Debug for JsonSchemaQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaQuery").finish_non_exhaustive()
    }
}
