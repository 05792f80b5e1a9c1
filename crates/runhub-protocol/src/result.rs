//! Execution results returned by the batch endpoint.

use serde::{Deserialize, Serialize};

use crate::messages::ExitStatus;

/// The captured outcome of one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub stdout: String,
    pub stderr: String,
    /// stdout and stderr interleaved in arrival order.
    pub output: String,
    pub code: Option<i32>,
    pub signal: Option<String>,
    /// Backend diagnostic, e.g. why the stage was terminated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Short termination status, e.g. `TO` for a timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Wall time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_time: Option<u64>,
    /// Peak memory in bytes, when the backend measures it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
}

impl StageResult {
    pub fn exit_status(&self) -> ExitStatus {
        ExitStatus {
            code: self.code,
            signal: self.signal.clone(),
        }
    }
}

/// What a backend produced for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile: Option<StageResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<StageResult>,
}

impl ExecutionResult {
    /// Shape the result for clients: a missing `run` stage is filled from `compile`.
    ///
    /// Returns `None` when the backend produced neither stage.
    pub fn into_response(
        self,
        language: impl Into<String>,
        version: impl Into<String>,
    ) -> Option<ExecuteResponse> {
        let run = match (&self.run, &self.compile) {
            (Some(run), _) => run.clone(),
            (None, Some(compile)) => compile.clone(),
            (None, None) => return None,
        };
        Some(ExecuteResponse {
            language: language.into(),
            version: version.into(),
            compile: self.compile,
            run,
        })
    }
}

/// Body of a successful `POST /execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub language: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile: Option<StageResult>,
    pub run: StageResult,
}
