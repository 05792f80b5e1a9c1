//! Execution backends.
//!
//! A backend turns a validated [`JobSpec`] into a primed job: files staged,
//! resources reserved, nothing running yet. The primed job is then executed
//! once, either to completion or interactively, and always cleaned up.
//!
//! Callers should hold primed jobs through a [`JobLease`], which makes
//! cleanup idempotent and reports leases dropped without it.

use std::sync::Arc;

use async_trait::async_trait;
use runhub_protocol::{ExecutionResult, ExitStatus, ServerMessage, Signal, Stage};
use tokio::sync::mpsc;

use crate::errors::BackendError;
use crate::job::JobSpec;

pub mod process;

pub use process::{ProcessBackend, ProcessBackendConfig};

/// Something a running interactive job reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Stdout(String),
    Stderr(String),
    Stage(Stage),
    Exit { stage: Stage, status: ExitStatus },
}

impl From<JobEvent> for ServerMessage {
    fn from(event: JobEvent) -> Self {
        match event {
            JobEvent::Stdout(data) => ServerMessage::stdout(data),
            JobEvent::Stderr(data) => ServerMessage::stderr(data),
            JobEvent::Stage(stage) => ServerMessage::stage(stage),
            JobEvent::Exit { stage, status } => ServerMessage::exit(stage, status),
        }
    }
}

/// Client input forwarded to a running interactive job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobInput {
    Stdin(String),
    Signal(Signal),
}

/// The job's half of an interactive session.
#[derive(Debug)]
pub struct JobChannels {
    pub events: mpsc::UnboundedSender<JobEvent>,
    pub inputs: mpsc::UnboundedReceiver<JobInput>,
}

/// The session's half of an interactive session.
#[derive(Debug)]
pub struct SessionChannels {
    pub events: mpsc::UnboundedReceiver<JobEvent>,
    pub inputs: mpsc::UnboundedSender<JobInput>,
}

/// Create the connected channel pair for one interactive job.
///
/// Events travel on a single channel, so their order is the order the job
/// emitted them.
pub fn job_channels() -> (JobChannels, SessionChannels) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    (
        JobChannels {
            events: event_tx,
            inputs: input_rx,
        },
        SessionChannels {
            events: event_rx,
            inputs: input_tx,
        },
    )
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Stage a job's files and reserve what it needs to run.
    async fn prime(&self, spec: Arc<JobSpec>) -> Result<Box<dyn PrimedJob>, BackendError>;
}

/// A job that has been primed and not yet cleaned up.
#[async_trait]
pub trait PrimedJob: Send {
    /// Run every stage to completion, buffering output.
    async fn execute(&mut self) -> Result<ExecutionResult, BackendError>;

    /// Run every stage, streaming events out and accepting input until the
    /// last stage exits.
    async fn execute_interactive(&mut self, channels: JobChannels) -> Result<(), BackendError>;

    /// Release everything `prime` acquired, killing anything still running.
    async fn cleanup(&mut self) -> Result<(), BackendError>;
}

/// Owns a primed job until it has been cleaned up.
pub struct JobLease {
    spec: Arc<JobSpec>,
    job: Box<dyn PrimedJob>,
    cleaned_up: bool,
}

impl JobLease {
    pub async fn prime(
        backend: &dyn ExecutionBackend,
        spec: Arc<JobSpec>,
    ) -> Result<Self, BackendError> {
        log::debug!(
            "Priming {}-{} job on {} backend",
            spec.runtime.language,
            spec.runtime.version,
            backend.name()
        );
        let job = backend.prime(spec.clone()).await?;
        Ok(Self {
            spec,
            job,
            cleaned_up: false,
        })
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub async fn execute(&mut self) -> Result<ExecutionResult, BackendError> {
        self.job.execute().await
    }

    pub async fn execute_interactive(&mut self, channels: JobChannels) -> Result<(), BackendError> {
        self.job.execute_interactive(channels).await
    }

    /// Clean up the job. Later calls are no-ops.
    pub async fn cleanup(&mut self) -> Result<(), BackendError> {
        if self.cleaned_up {
            return Ok(());
        }
        self.cleaned_up = true;
        self.job.cleanup().await
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }
}

impl Drop for JobLease {
    fn drop(&mut self) {
        if !self.cleaned_up {
            log::warn!(
                "{}-{} job dropped without cleanup",
                self.spec.runtime.language,
                self.spec.runtime.version
            );
        }
    }
}

impl std::fmt::Debug for JobLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLease")
            .field("runtime", &self.spec.runtime.language)
            .field("cleaned_up", &self.cleaned_up)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_map_to_server_messages() {
        assert_eq!(
            ServerMessage::from(JobEvent::Stdout("1\n".into())),
            ServerMessage::stdout("1\n")
        );
        assert_eq!(
            ServerMessage::from(JobEvent::Exit {
                stage: Stage::Run,
                status: ExitStatus::code(0)
            }),
            ServerMessage::exit(Stage::Run, ExitStatus::code(0))
        );
    }

    #[tokio::test]
    async fn test_channels_preserve_order() {
        let (job, mut session) = job_channels();
        job.events.send(JobEvent::Stage(Stage::Run)).unwrap();
        job.events.send(JobEvent::Stdout("a".into())).unwrap();
        job.events.send(JobEvent::Stderr("b".into())).unwrap();
        drop(job);

        let mut received = Vec::new();
        while let Some(event) = session.events.recv().await {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                JobEvent::Stage(Stage::Run),
                JobEvent::Stdout("a".into()),
                JobEvent::Stderr("b".into())
            ]
        );
    }
}
