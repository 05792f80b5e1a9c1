//! Route handlers shared by every API version.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{Json, Response};
use runhub_core::{
    run_batch, ExecutionBackend, JobError, Registry, ResolutionStrategy, SessionConfig,
    SessionController,
};
use runhub_protocol::{ExecuteResponse, RuntimeInfo};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::ws::WebSocketTransport;

/// State of one mounted API version.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<Registry>,
    pub backend: Arc<dyn ExecutionBackend>,
    pub strategy: Arc<dyn ResolutionStrategy>,
    pub session: SessionConfig,
}

/// Handler for the /execute POST endpoint.
pub async fn execute_handler(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> std::result::Result<Json<ExecuteResponse>, ApiError> {
    let Json(body) = payload?;
    // Non-object bodies fail field validation like an empty request.
    let raw = match body {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    match run_batch(
        state.strategy.as_ref(),
        &state.registry,
        state.backend.as_ref(),
        &raw,
    )
    .await
    {
        Ok(response) => {
            log::debug!(
                "Executed {}-{} job via {}",
                response.language,
                response.version,
                state.strategy.name()
            );
            Ok(Json(response))
        }
        Err(JobError::Validation(e)) => {
            log::warn!("Rejected execute request: {}", e);
            Err(e.into())
        }
        Err(JobError::Backend(e)) => {
            log::error!("Execute request failed in {} backend: {}", state.backend.name(), e);
            Err(e.into())
        }
    }
}

/// Handler for the /runtimes GET endpoint.
pub async fn runtimes_handler(State(state): State<ApiState>) -> Json<Vec<RuntimeInfo>> {
    Json(state.registry.list())
}

/// Handler for the /connect WebSocket endpoint.
pub async fn connect_handler(State(state): State<ApiState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        let controller = SessionController::new(
            WebSocketTransport::new(socket),
            state.strategy,
            state.registry,
            state.backend,
        )
        .with_config(state.session);
        controller.run().await;
    })
}
