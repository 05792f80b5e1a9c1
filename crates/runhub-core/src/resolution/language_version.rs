use std::sync::Arc;

use serde_json::{Map, Value};

use super::{ResolutionStrategy, RuntimeSelector};
use crate::errors::ValidationError;
use crate::registry::{Registry, RuntimeDescriptor};

/// Resolves `language` + `version` (+ optional `runtime` engine) against the
/// registry's match predicate. Mounted as API v2.
#[derive(Debug, Clone, Copy, Default)]
pub struct LanguageVersion;

impl ResolutionStrategy for LanguageVersion {
    fn name(&self) -> &'static str {
        "language-version"
    }

    fn parse_selector(&self, raw: &Map<String, Value>) -> Result<RuntimeSelector, ValidationError> {
        let language = match raw.get("language") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(ValidationError::new("language is required as a string")),
        };
        let version = match raw.get("version") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(ValidationError::new("version is required as a string")),
        };
        let engine = match raw.get("runtime") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(ValidationError::new(
                    "runtime must be a string if specified",
                ))
            }
        };
        Ok(RuntimeSelector::Named {
            language,
            version,
            engine,
        })
    }

    fn lookup(
        &self,
        selector: &RuntimeSelector,
        registry: &Registry,
    ) -> Result<Arc<RuntimeDescriptor>, ValidationError> {
        let RuntimeSelector::Named {
            language,
            version,
            engine,
        } = selector
        else {
            return Err(ValidationError::new("runtime must be selected by language and version"));
        };

        registry
            .lookup(language, version, engine.as_deref())
            .ok_or_else(|| {
                let prefix = engine.as_ref().map(|e| format!("{}-", e)).unwrap_or_default();
                ValidationError::new(format!(
                    "{}{}-{} runtime is unknown",
                    prefix, language, version
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::descriptor;
    use serde_json::json;

    fn parse(body: Value) -> Result<RuntimeSelector, ValidationError> {
        LanguageVersion.parse_selector(body.as_object().unwrap())
    }

    #[test]
    fn test_selector_type_checks() {
        assert_eq!(
            parse(json!({"version": "*"})).unwrap_err().message,
            "language is required as a string"
        );
        assert_eq!(
            parse(json!({"language": 3, "version": "*"})).unwrap_err().message,
            "language is required as a string"
        );
        assert_eq!(
            parse(json!({"language": "python"})).unwrap_err().message,
            "version is required as a string"
        );
        assert_eq!(
            parse(json!({"language": "python", "version": "*", "runtime": 1}))
                .unwrap_err()
                .message,
            "runtime must be a string if specified"
        );
    }

    #[test]
    fn test_null_engine_is_absent() {
        let selector = parse(json!({"language": "python", "version": "*", "runtime": null})).unwrap();
        assert_eq!(
            selector,
            RuntimeSelector::Named {
                language: "python".to_string(),
                version: "*".to_string(),
                engine: None
            }
        );
    }

    #[test]
    fn test_unknown_message_names_the_triad() {
        let registry = Registry::new(vec![descriptor("javascript", "20.11.1", Some("node"))]);
        let selector = parse(json!({"language": "javascript", "version": "*", "runtime": "bun"})).unwrap();
        let err = LanguageVersion.lookup(&selector, &registry).unwrap_err();
        assert_eq!(err.message, "bun-javascript-* runtime is unknown");
    }
}
