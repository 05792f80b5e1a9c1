//! Turning raw job requests into [`JobSpec`]s.
//!
//! The checks are shared by every API version; what differs is how a request
//! names its runtime. A [`ResolutionStrategy`] supplies that part and the
//! pipeline in [`build_job`] does the rest, in this order:
//!
//! 1. the strategy's runtime selector fields
//! 2. `files`, `args` and `stdin` shapes, then each file's `content`
//! 3. runtime lookup
//! 4. at least one utf8 file, unless the strategy exempts the runtime
//! 5. client limits against the runtime's ceilings
//! 6. default substitution

mod language_version;
mod request;
mod runtime_id;

use std::sync::Arc;

use runhub_protocol::LimitField;
use serde_json::{Map, Value};

use crate::errors::ValidationError;
use crate::job::{JobSpec, ResourceLimits};
use crate::registry::{Registry, RuntimeDescriptor};

pub use language_version::LanguageVersion;
pub use request::{JobRequest, RequestedLimit};
pub use runtime_id::RuntimeId;

/// How a request identifies its runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeSelector {
    Named {
        language: String,
        version: String,
        engine: Option<String>,
    },
    Id(serde_json::Number),
}

/// One way of naming runtimes in requests.
pub trait ResolutionStrategy: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Read and type-check the selector fields of a request.
    fn parse_selector(&self, raw: &Map<String, Value>) -> Result<RuntimeSelector, ValidationError>;

    /// Find the runtime a selector names, or explain why there is none.
    fn lookup(
        &self,
        selector: &RuntimeSelector,
        registry: &Registry,
    ) -> Result<Arc<RuntimeDescriptor>, ValidationError>;

    /// Whether jobs for `runtime` may skip the utf8-file rule.
    fn exempts_encoding(&self, _runtime: &RuntimeDescriptor) -> bool {
        false
    }

    /// Validate `raw` against `registry` and build the job.
    fn resolve(&self, raw: &Map<String, Value>, registry: &Registry) -> Result<JobSpec, ValidationError> {
        build_job(self, raw, registry)
    }
}

/// The shared validation pipeline.
pub fn build_job<S: ResolutionStrategy + ?Sized>(
    strategy: &S,
    raw: &Map<String, Value>,
    registry: &Registry,
) -> Result<JobSpec, ValidationError> {
    let selector = strategy.parse_selector(raw)?;
    let request = JobRequest::parse(raw)?;
    let runtime = strategy.lookup(&selector, registry)?;

    if !strategy.exempts_encoding(&runtime) && !request.files.iter().any(|f| f.is_text()) {
        return Err(ValidationError::new(
            "files must include at least one utf8 encoded file",
        ));
    }

    let limits = resolve_limits(&request, &runtime)?;

    log::debug!(
        "Resolved {} job to {}-{} (runtime #{})",
        strategy.name(),
        runtime.language,
        runtime.version,
        runtime.id
    );

    Ok(JobSpec {
        runtime,
        args: request.args,
        stdin: request.stdin,
        files: request.files,
        limits,
    })
}

/// Check each requested limit against the runtime's ceiling and fill the rest
/// from the runtime's defaults.
fn resolve_limits(
    request: &JobRequest,
    runtime: &RuntimeDescriptor,
) -> Result<ResourceLimits, ValidationError> {
    let mut limits = runtime.defaults;

    for field in LimitField::ALL {
        let value = match request.limit(field) {
            RequestedLimit::Absent => continue,
            RequestedLimit::NotANumber => {
                return Err(ValidationError::new(format!(
                    "If specified, {} must be a number",
                    field
                )))
            }
            RequestedLimit::Value(value) => value,
        };

        let ceiling = runtime.limits.get(field);
        if ceiling > 0 && value > ceiling as f64 {
            return Err(ValidationError::new(format!(
                "{} cannot exceed the configured limit of {}",
                field, ceiling
            )));
        }
        if value < 0.0 {
            return Err(ValidationError::new(format!(
                "{} must be non-negative",
                field
            )));
        }

        limits.set(field, value as i64);
    }

    Ok(limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::StageLimits;
    use crate::registry::tests::descriptor;
    use serde_json::json;

    fn registry_with_limits(limits: ResourceLimits) -> Registry {
        let mut python = descriptor("python", "3.12.0", None);
        python.limits = limits;
        python.defaults = ResourceLimits {
            compile: StageLimits::new(-1, 10_000),
            run: StageLimits::new(-1, 3_000),
        };
        Registry::new(vec![python])
    }

    fn resolve(registry: &Registry, body: Value) -> Result<JobSpec, ValidationError> {
        LanguageVersion.resolve(body.as_object().unwrap(), registry)
    }

    fn request(extra: Value) -> Value {
        let mut body = json!({
            "language": "python",
            "version": "*",
            "files": [{"content": "print(1)"}],
        });
        for (k, v) in extra.as_object().unwrap() {
            body[k] = v.clone();
        }
        body
    }

    #[test]
    fn test_defaults_fill_missing_limits() {
        let registry = registry_with_limits(ResourceLimits {
            compile: StageLimits::new(-1, 10_000),
            run: StageLimits::new(-1, 3_000),
        });
        let job = resolve(&registry, request(json!({"run_timeout": 1500}))).unwrap();
        assert_eq!(job.limits.run.timeout, 1500);
        assert_eq!(job.limits.compile.timeout, 10_000);
        assert_eq!(job.limits.run.memory, -1);
    }

    #[test]
    fn test_zero_selects_default() {
        let registry = registry_with_limits(ResourceLimits {
            compile: StageLimits::new(-1, 10_000),
            run: StageLimits::new(-1, 3_000),
        });
        let job = resolve(&registry, request(json!({"run_timeout": 0}))).unwrap();
        assert_eq!(job.limits.run.timeout, 3_000);
    }

    #[test]
    fn test_ceiling_is_enforced() {
        let registry = registry_with_limits(ResourceLimits {
            compile: StageLimits::new(-1, 10_000),
            run: StageLimits::new(-1, 3_000),
        });
        let err = resolve(&registry, request(json!({"run_timeout": 3001}))).unwrap_err();
        assert_eq!(
            err.message,
            "run_timeout cannot exceed the configured limit of 3000"
        );
        assert!(resolve(&registry, request(json!({"run_timeout": 3000}))).is_ok());
        assert!(resolve(&registry, request(json!({"run_timeout": 1}))).is_ok());
    }

    #[test]
    fn test_unlimited_ceiling_accepts_any_non_negative_value() {
        let registry = registry_with_limits(ResourceLimits {
            compile: StageLimits::new(0, 10_000),
            run: StageLimits::new(-1, 3_000),
        });
        for value in [1.0, 512.0 * 1024.0 * 1024.0, 1e15] {
            let job = resolve(&registry, request(json!({"run_memory_limit": value}))).unwrap();
            assert_eq!(job.limits.run.memory, value as i64);
            assert!(resolve(&registry, request(json!({"compile_memory_limit": value}))).is_ok());
        }
        let err = resolve(&registry, request(json!({"run_memory_limit": -5}))).unwrap_err();
        assert_eq!(err.message, "run_memory_limit must be non-negative");
    }

    #[test]
    fn test_negative_value_under_ceiling_is_rejected() {
        let registry = registry_with_limits(ResourceLimits {
            compile: StageLimits::new(-1, 10_000),
            run: StageLimits::new(-1, 3_000),
        });
        let err = resolve(&registry, request(json!({"compile_timeout": -1}))).unwrap_err();
        assert_eq!(err.message, "compile_timeout must be non-negative");
    }

    #[test]
    fn test_non_numeric_limit() {
        let registry = registry_with_limits(ResourceLimits {
            compile: StageLimits::new(-1, 10_000),
            run: StageLimits::new(-1, 3_000),
        });
        let err = resolve(&registry, request(json!({"run_timeout": "fast"}))).unwrap_err();
        assert_eq!(err.message, "If specified, run_timeout must be a number");
    }

    #[test]
    fn test_fractional_limits_are_rejected() {
        let registry = registry_with_limits(ResourceLimits {
            compile: StageLimits::new(100, 10_000),
            run: StageLimits::new(100, 3_000),
        });
        let err = resolve(&registry, request(json!({"run_timeout": 0.5}))).unwrap_err();
        assert_eq!(err.message, "If specified, run_timeout must be a number");
        let err = resolve(&registry, request(json!({"run_memory_limit": 0.9}))).unwrap_err();
        assert_eq!(err.message, "If specified, run_memory_limit must be a number");

        let job = resolve(&registry, request(json!({"run_timeout": 1.0}))).unwrap();
        assert_eq!(job.limits.run.timeout, 1);
    }

    #[test]
    fn test_limits_are_checked_memory_first() {
        let registry = registry_with_limits(ResourceLimits {
            compile: StageLimits::new(100, 10_000),
            run: StageLimits::new(100, 3_000),
        });
        let err = resolve(
            &registry,
            request(json!({"run_timeout": 99_999, "run_memory_limit": 101})),
        )
        .unwrap_err();
        assert_eq!(
            err.message,
            "run_memory_limit cannot exceed the configured limit of 100"
        );
    }

    #[test]
    fn test_encoding_rule() {
        let registry = registry_with_limits(ResourceLimits {
            compile: StageLimits::new(-1, 10_000),
            run: StageLimits::new(-1, 3_000),
        });
        let err = resolve(
            &registry,
            request(json!({"files": [{"content": "AAEC", "encoding": "base64"}]})),
        )
        .unwrap_err();
        assert_eq!(err.message, "files must include at least one utf8 encoded file");

        let job = resolve(
            &registry,
            request(json!({"files": [
                {"content": "AAEC", "encoding": "base64"},
                {"content": "print(1)", "encoding": "utf8"}
            ]})),
        )
        .unwrap();
        assert_eq!(job.files.len(), 2);
    }

    #[test]
    fn test_missing_files_rejected_before_lookup() {
        let registry = Registry::default();
        for files in [Value::Null, json!("x"), json!({"content": "x"})] {
            let body = json!({"language": "nothing", "version": "0", "files": files});
            let err = resolve(&registry, body).unwrap_err();
            assert_eq!(err.message, "files is required as an array");
        }
    }

    #[test]
    fn test_empty_files_rejected_before_lookup() {
        let registry = Registry::default();
        let body = json!({"language": "nothing", "version": "0", "files": []});
        let err = resolve(&registry, body).unwrap_err();
        assert_eq!(err.message, "files must include at least one file");
    }

    #[test]
    fn test_content_checked_before_lookup() {
        let registry = Registry::default();
        let body = json!({"language": "nothing", "version": "0", "files": [{"content": null}]});
        let err = resolve(&registry, body).unwrap_err();
        assert_eq!(err.message, "files[0].content is required as a string");
    }

    #[test]
    fn test_unknown_runtime_reported_before_limits() {
        let registry = registry_with_limits(ResourceLimits {
            compile: StageLimits::new(-1, 10_000),
            run: StageLimits::new(-1, 3_000),
        });
        let mut body = request(json!({"run_timeout": "bad"}));
        body["version"] = json!("9.9.9");
        let err = resolve(&registry, body).unwrap_err();
        assert_eq!(err.message, "python-9.9.9 runtime is unknown");
    }
}
