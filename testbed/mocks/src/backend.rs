//! Mock execution backend for testing

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use runhub_core::{BackendError, ExecutionBackend, JobChannels, JobEvent, JobInput, JobSpec, PrimedJob};
use runhub_protocol::{ExecutionResult, ExitStatus, Stage, StageResult};

/// How a mock job behaves when run interactively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveMode {
    /// Emit the scripted events and finish.
    Script,
    /// Echo stdin back as stdout until a signal arrives, then exit with it.
    Echo,
    /// Record input and never finish on its own.
    Hang,
}

/// Calls observed by a [`MockBackend`] and every job it primed.
#[derive(Debug, Default)]
pub struct MockCounters {
    primes: AtomicUsize,
    executions: AtomicUsize,
    cleanups: AtomicUsize,
    inputs: Mutex<Vec<JobInput>>,
    specs: Mutex<Vec<Arc<JobSpec>>>,
}

impl MockCounters {
    fn record_input(&self, input: JobInput) {
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.push(input);
        }
    }
}

/// Mock backend with a scripted result
#[derive(Clone)]
pub struct MockBackend {
    result: ExecutionResult,
    events: Vec<JobEvent>,
    mode: InteractiveMode,
    fail_prime: bool,
    fail_execute: bool,
    fail_cleanup: bool,
    counters: Arc<MockCounters>,
}

impl MockBackend {
    /// A backend whose jobs print `1` and exit cleanly.
    pub fn new() -> Self {
        Self {
            result: ExecutionResult {
                compile: None,
                run: Some(StageResult {
                    stdout: "1\n".to_string(),
                    output: "1\n".to_string(),
                    code: Some(0),
                    ..Default::default()
                }),
            },
            events: vec![
                JobEvent::Stage(Stage::Run),
                JobEvent::Stdout("1\n".to_string()),
                JobEvent::Exit {
                    stage: Stage::Run,
                    status: ExitStatus::code(0),
                },
            ],
            mode: InteractiveMode::Script,
            fail_prime: false,
            fail_execute: false,
            fail_cleanup: false,
            counters: Arc::new(MockCounters::default()),
        }
    }

    pub fn with_result(mut self, result: ExecutionResult) -> Self {
        self.result = result;
        self
    }

    pub fn with_events(mut self, events: Vec<JobEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_mode(mut self, mode: InteractiveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_prime_error() -> Self {
        Self {
            fail_prime: true,
            ..Self::new()
        }
    }

    pub fn with_execute_error() -> Self {
        Self {
            fail_execute: true,
            ..Self::new()
        }
    }

    pub fn with_cleanup_error() -> Self {
        Self {
            fail_cleanup: true,
            ..Self::new()
        }
    }

    pub fn primes(&self) -> usize {
        self.counters.primes.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> usize {
        self.counters.executions.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.counters.cleanups.load(Ordering::SeqCst)
    }

    /// Inputs forwarded to any job, in arrival order.
    pub fn inputs(&self) -> Vec<JobInput> {
        self.counters
            .inputs
            .lock()
            .map(|inputs| inputs.clone())
            .unwrap_or_default()
    }

    /// The most recently primed job spec.
    pub fn last_spec(&self) -> Option<Arc<JobSpec>> {
        self.counters
            .specs
            .lock()
            .ok()
            .and_then(|specs| specs.last().cloned())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn prime(&self, spec: Arc<JobSpec>) -> Result<Box<dyn PrimedJob>, BackendError> {
        if self.fail_prime {
            return Err(BackendError::prime("Mock prime error"));
        }
        self.counters.primes.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut specs) = self.counters.specs.lock() {
            specs.push(spec);
        }
        Ok(Box::new(MockJob {
            backend: self.clone(),
        }))
    }
}

struct MockJob {
    backend: MockBackend,
}

#[async_trait]
impl PrimedJob for MockJob {
    async fn execute(&mut self) -> Result<ExecutionResult, BackendError> {
        self.backend.counters.executions.fetch_add(1, Ordering::SeqCst);
        if self.backend.fail_execute {
            return Err(BackendError::execution("Mock execution error"));
        }
        Ok(self.backend.result.clone())
    }

    async fn execute_interactive(&mut self, mut channels: JobChannels) -> Result<(), BackendError> {
        self.backend.counters.executions.fetch_add(1, Ordering::SeqCst);
        if self.backend.fail_execute {
            return Err(BackendError::execution("Mock execution error"));
        }

        let counters = &self.backend.counters;
        match self.backend.mode {
            InteractiveMode::Script => {
                for event in &self.backend.events {
                    let _ = channels.events.send(event.clone());
                }
            }
            InteractiveMode::Echo => {
                let _ = channels.events.send(JobEvent::Stage(Stage::Run));
                while let Some(input) = channels.inputs.recv().await {
                    counters.record_input(input.clone());
                    match input {
                        JobInput::Stdin(data) => {
                            let _ = channels.events.send(JobEvent::Stdout(data));
                        }
                        JobInput::Signal(signal) => {
                            let _ = channels.events.send(JobEvent::Exit {
                                stage: Stage::Run,
                                status: ExitStatus::signal(signal.as_str()),
                            });
                            break;
                        }
                    }
                }
            }
            InteractiveMode::Hang => {
                while let Some(input) = channels.inputs.recv().await {
                    counters.record_input(input);
                }
                std::future::pending::<()>().await;
            }
        }
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<(), BackendError> {
        self.backend.counters.cleanups.fetch_add(1, Ordering::SeqCst);
        if self.backend.fail_cleanup {
            return Err(BackendError::Cleanup("Mock cleanup error".to_string()));
        }
        Ok(())
    }
}
