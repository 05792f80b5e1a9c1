//! Interactive sessions.
//!
//! A [`SessionController`] owns one client connection for its whole life:
//!
//! ```text
//! AwaitingInit --init--> Priming --primed--> Running --job done--> Closed
//!      |                    |                   |
//!      +--------------------+-------------------+--> Closed (violation, error, disconnect)
//! ```
//!
//! Whatever path reaches `Closed`, a primed job is cleaned up exactly once.
//! The controller talks to the client through a [`SessionTransport`], so the
//! same state machine serves WebSockets and in-memory test connections.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use runhub_protocol::{ClientMessage, CloseCode, ProtocolError, ServerMessage, Signal};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::{BackendError, ValidationError};
use crate::executors::{job_channels, ExecutionBackend, JobInput, JobLease};
use crate::registry::Registry;
use crate::resolution::ResolutionStrategy;

/// How long a new session may take to send `init`.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("failed to encode message: {0}")]
    Encode(#[from] ProtocolError),
    #[error("transport error: {0}")]
    Other(String),
}

/// A duplex, message-oriented connection to one client.
#[async_trait]
pub trait SessionTransport: Send {
    /// Next text frame from the client. `None` once the client has gone.
    async fn recv(&mut self) -> Option<String>;

    async fn send(&mut self, message: &ServerMessage) -> Result<(), TransportError>;

    /// Close the connection with an application close code.
    async fn close(&mut self, code: CloseCode);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInit,
    Priming,
    Running,
    Closed,
}

/// What a finished session did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    /// The close code sent, or `None` if the client disconnected first.
    pub close: Option<CloseCode>,
    /// Whether a primed job was cleaned up.
    pub cleaned_up: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub init_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }
}

/// Failures reported to the client as an `error` message before closing.
#[derive(Error, Debug)]
enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

enum Ending {
    Closed(CloseCode),
    Disconnected,
}

pub struct SessionController<T: SessionTransport> {
    transport: T,
    strategy: Arc<dyn ResolutionStrategy>,
    registry: Arc<Registry>,
    backend: Arc<dyn ExecutionBackend>,
    config: SessionConfig,
    state: SessionState,
    id: Uuid,
}

impl<T: SessionTransport> SessionController<T> {
    pub fn new(
        transport: T,
        strategy: Arc<dyn ResolutionStrategy>,
        registry: Arc<Registry>,
        backend: Arc<dyn ExecutionBackend>,
    ) -> Self {
        Self {
            transport,
            strategy,
            registry,
            backend,
            config: SessionConfig::default(),
            state: SessionState::AwaitingInit,
            id: Uuid::new_v4(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session until it closes, then release its job.
    pub async fn run(mut self) -> SessionOutcome {
        log::info!("Session {} opened ({})", self.id, self.strategy.name());

        let mut lease = None;
        let close = match self.drive(&mut lease).await {
            Ok(Ending::Closed(code)) => Some(code),
            Ok(Ending::Disconnected) => None,
            Err(err) => {
                match &err {
                    SessionError::Backend(e) => log::error!("Session {} backend fault: {}", self.id, e),
                    other => log::warn!("Session {} rejected: {}", self.id, other),
                }
                let notified = self.transport.send(&ServerMessage::error(err.to_string())).await;
                notified.ok().map(|_| CloseCode::NotifiedError)
            }
        };

        if let Some(code) = close {
            self.transport.close(code).await;
        }

        let cleaned_up = match lease.as_mut() {
            Some(lease) => {
                if let Err(e) = lease.cleanup().await {
                    log::error!("Session {} cleanup failed: {}", self.id, e);
                }
                lease.is_cleaned_up()
            }
            None => false,
        };

        self.transition(SessionState::Closed);
        log::info!(
            "Session {} closed ({})",
            self.id,
            close.map_or_else(|| "client disconnected".to_string(), |code| code.to_string())
        );
        SessionOutcome { close, cleaned_up }
    }

    fn transition(&mut self, next: SessionState) {
        log::debug!("Session {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    async fn drive(&mut self, lease: &mut Option<JobLease>) -> Result<Ending, SessionError> {
        let request = match self.await_init().await? {
            Ok(request) => request,
            Err(ending) => return Ok(ending),
        };

        self.transition(SessionState::Priming);
        let spec = Arc::new(self.strategy.resolve(&request, &self.registry)?);
        let lease = lease.insert(JobLease::prime(self.backend.as_ref(), spec).await?);

        let runtime = &lease.spec().runtime;
        let primed = ServerMessage::runtime(runtime.language.clone(), runtime.version.clone());
        if self.transport.send(&primed).await.is_err() {
            return Ok(Ending::Disconnected);
        }

        self.transition(SessionState::Running);
        let (channels, mut session) = job_channels();
        let execution = lease.execute_interactive(channels);
        tokio::pin!(execution);

        loop {
            tokio::select! {
                biased;

                Some(event) = session.events.recv() => {
                    if self.transport.send(&event.into()).await.is_err() {
                        return Ok(Ending::Disconnected);
                    }
                }
                finished = &mut execution => {
                    finished?;
                    while let Ok(event) = session.events.try_recv() {
                        if self.transport.send(&event.into()).await.is_err() {
                            return Ok(Ending::Disconnected);
                        }
                    }
                    return Ok(Ending::Closed(CloseCode::JobCompleted));
                }
                frame = self.transport.recv() => {
                    let Some(text) = frame else {
                        return Ok(Ending::Disconnected);
                    };
                    let input = match ClientMessage::from_json(&text)? {
                        ClientMessage::Init(_) => return Ok(Ending::Closed(CloseCode::AlreadyInitialized)),
                        ClientMessage::Data { stream, data } => {
                            if stream != "stdin" {
                                return Ok(Ending::Closed(CloseCode::StdinOnly));
                            }
                            JobInput::Stdin(data)
                        }
                        ClientMessage::Signal { signal } => match signal.parse::<Signal>() {
                            Ok(signal) => JobInput::Signal(signal),
                            Err(_) => return Ok(Ending::Closed(CloseCode::InvalidSignal)),
                        },
                        ClientMessage::Unknown => {
                            log::debug!("Session {} ignoring unknown message", self.id);
                            continue;
                        }
                    };
                    if session.inputs.send(input).is_err() {
                        log::debug!("Session {} input arrived after the job stopped reading", self.id);
                    }
                }
            }
        }
    }

    /// Wait for the `init` message. The inner `Err` ends the session without an error report.
    async fn await_init(&mut self) -> Result<Result<Map<String, Value>, Ending>, SessionError> {
        let deadline = tokio::time::sleep(self.config.init_timeout);
        tokio::pin!(deadline);

        tokio::select! {
            _ = &mut deadline => Ok(Err(Ending::Closed(CloseCode::InitializationTimeout))),
            frame = self.transport.recv() => {
                let Some(text) = frame else {
                    return Ok(Err(Ending::Disconnected));
                };
                match ClientMessage::from_json(&text)? {
                    ClientMessage::Init(request) => Ok(Ok(request)),
                    _ => Ok(Err(Ending::Closed(CloseCode::NotInitialized))),
                }
            }
        }
    }
}
