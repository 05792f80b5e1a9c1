//! Core of the runhub remote code-execution service.
//!
//! This crate turns untrusted job requests into validated, bounded job
//! specifications and drives them through an execution backend, either as a
//! single buffered run or as a live interactive session.
//!
//! # Architecture Overview
//!
//! - **Registry**: ordered, immutable catalog of runtimes ([`registry`])
//! - **Resolution**: request validation and limit clamping behind a
//!   [`ResolutionStrategy`] ([`resolution`])
//! - **Execution backends**: the prime/execute/cleanup lifecycle contract and a
//!   local process implementation ([`executors`])
//! - **Batch flow**: validate, run to completion, normalise the result ([`batch`])
//! - **Interactive sessions**: the per-connection state machine and event
//!   multiplexer ([`session`])
//! - **Configuration**: YAML registry loading ([`config`])

pub mod batch;
pub mod config;
pub mod errors;
pub mod executors;
pub mod job;
pub mod registry;
pub mod resolution;
pub mod session;

pub use batch::run_batch;
pub use config::RegistryLoader;
pub use errors::{BackendError, JobError, RegistryError, ValidationError};
pub use executors::{
    job_channels, ExecutionBackend, JobChannels, JobEvent, JobInput, JobLease, PrimedJob,
    ProcessBackend, ProcessBackendConfig, SessionChannels,
};
pub use job::{JobSpec, ResourceLimits, StageLimits};
pub use registry::{Registry, RuntimeCommands, RuntimeDescriptor};
pub use resolution::{build_job, LanguageVersion, ResolutionStrategy, RuntimeId, RuntimeSelector};
pub use session::{
    SessionConfig, SessionController, SessionOutcome, SessionState, SessionTransport,
    TransportError, DEFAULT_INIT_TIMEOUT,
};
