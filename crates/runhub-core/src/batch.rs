//! The batch execution flow behind `POST /execute`.

use std::sync::Arc;

use runhub_protocol::ExecuteResponse;
use serde_json::{Map, Value};

use crate::errors::{BackendError, JobError};
use crate::executors::{ExecutionBackend, JobLease};
use crate::registry::Registry;
use crate::resolution::ResolutionStrategy;

/// Validate `raw`, run the job to completion and shape the result.
///
/// The job is cleaned up whether or not execution succeeded. A failed cleanup
/// fails the request.
pub async fn run_batch(
    strategy: &dyn ResolutionStrategy,
    registry: &Registry,
    backend: &dyn ExecutionBackend,
    raw: &Map<String, Value>,
) -> Result<ExecuteResponse, JobError> {
    let spec = Arc::new(strategy.resolve(raw, registry)?);
    let mut lease = JobLease::prime(backend, spec.clone()).await?;

    let executed = lease.execute().await;
    let cleaned = lease.cleanup().await;
    let result = executed?;
    cleaned?;

    result
        .into_response(spec.runtime.language.clone(), spec.runtime.version.clone())
        .ok_or_else(|| BackendError::execution("backend produced no stage results").into())
}
