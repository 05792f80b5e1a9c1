//! Validated job specifications.

use std::sync::Arc;

use runhub_protocol::{Constraint, FileInput, LimitField, Stage};
use serde::{Deserialize, Serialize};

use crate::registry::RuntimeDescriptor;

/// Memory and wall-time limits for one stage.
///
/// Memory is in bytes, timeouts in milliseconds. Values `<= 0` mean unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLimits {
    pub memory: i64,
    pub timeout: i64,
}

impl StageLimits {
    pub fn new(memory: i64, timeout: i64) -> Self {
        Self { memory, timeout }
    }

    pub fn get(&self, constraint: Constraint) -> i64 {
        match constraint {
            Constraint::MemoryLimit => self.memory,
            Constraint::Timeout => self.timeout,
        }
    }

    fn set(&mut self, constraint: Constraint, value: i64) {
        match constraint {
            Constraint::MemoryLimit => self.memory = value,
            Constraint::Timeout => self.timeout = value,
        }
    }
}

/// Per-stage limits. Used for runtime ceilings, runtime defaults and the
/// resolved limits of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub compile: StageLimits,
    pub run: StageLimits,
}

impl ResourceLimits {
    pub fn stage(&self, stage: Stage) -> &StageLimits {
        match stage {
            Stage::Compile => &self.compile,
            Stage::Run => &self.run,
        }
    }

    pub fn get(&self, field: LimitField) -> i64 {
        self.stage(field.stage).get(field.constraint)
    }

    pub(crate) fn set(&mut self, field: LimitField, value: i64) {
        match field.stage {
            Stage::Compile => self.compile.set(field.constraint, value),
            Stage::Run => self.run.set(field.constraint, value),
        }
    }
}

/// A fully validated job. Built once by a [`crate::ResolutionStrategy`] and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub runtime: Arc<RuntimeDescriptor>,
    pub args: Vec<String>,
    pub stdin: String,
    pub files: Vec<FileInput>,
    pub limits: ResourceLimits,
}
