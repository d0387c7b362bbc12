//! Policy queries and engines.

pub mod engine;
pub mod json_schema;

use std::sync::Arc;

use vouch_core::policy::{PolicyEngine, PolicyEngineConfig, PolicyQuery};
use vouch_core::Registry;

pub use engine::StandardPolicyEngine;
pub use json_schema::JsonSchemaQuery;

/// Query language name → query built from a raw policy document.
pub type PolicyQueryRegistry = Registry<String, Arc<dyn PolicyQuery>>;

/// Engine name → engine built from its configuration.
pub type PolicyEngineRegistry = Registry<PolicyEngineConfig, Arc<dyn PolicyEngine>>;
