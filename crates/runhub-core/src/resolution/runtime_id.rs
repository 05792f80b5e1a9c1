use std::sync::Arc;

use serde_json::{Map, Value};

use super::{ResolutionStrategy, RuntimeSelector};
use crate::errors::ValidationError;
use crate::registry::{Registry, RuntimeDescriptor};

/// Resolves a numeric `runtime_id` (the registry index). Mounted as API v3.
///
/// Runtimes flagged `accepts_opaque_files` are exempt from the utf8-file rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeId;

impl ResolutionStrategy for RuntimeId {
    fn name(&self) -> &'static str {
        "runtime-id"
    }

    fn parse_selector(&self, raw: &Map<String, Value>) -> Result<RuntimeSelector, ValidationError> {
        match raw.get("runtime_id") {
            Some(Value::Number(n)) => Ok(RuntimeSelector::Id(n.clone())),
            _ => Err(ValidationError::new("runtime_id is required as a number")),
        }
    }

    fn lookup(
        &self,
        selector: &RuntimeSelector,
        registry: &Registry,
    ) -> Result<Arc<RuntimeDescriptor>, ValidationError> {
        let RuntimeSelector::Id(id) = selector else {
            return Err(ValidationError::new("runtime must be selected by runtime_id"));
        };

        id.as_u64()
            .and_then(|id| usize::try_from(id).ok())
            .and_then(|id| registry.get(id))
            .ok_or_else(|| ValidationError::new(format!("Runtime #{} is unknown", id)))
    }

    fn exempts_encoding(&self, runtime: &RuntimeDescriptor) -> bool {
        runtime.accepts_opaque_files
    }
}
