//! Serde shapes of the registry file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::job::{ResourceLimits, StageLimits};
use crate::registry::{RuntimeCommands, RuntimeDescriptor};

/// Root of a registry file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub runtimes: Vec<RuntimeEntry>,
}

/// One runtime as declared in the registry file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeEntry {
    pub language: String,
    pub version: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Engine id, for several implementations of one language and version.
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub accepts_opaque_files: bool,
    /// Ceilings clients may ask for.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Limits applied when a client asks for none. Missing fields follow the ceiling.
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub compile: Option<Vec<String>>,
    pub run: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_compile_limits")]
    pub compile: StageLimitsConfig,
    #[serde(default = "default_run_limits")]
    pub run: StageLimitsConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            compile: default_compile_limits(),
            run: default_run_limits(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageLimitsConfig {
    /// Bytes; `-1` or `0` for unlimited.
    #[serde(default = "default_memory")]
    pub memory: i64,
    /// Milliseconds; `-1` or `0` for unlimited.
    pub timeout: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub compile: StageDefaultsConfig,
    #[serde(default)]
    pub run: StageDefaultsConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageDefaultsConfig {
    #[serde(default)]
    pub memory: Option<i64>,
    #[serde(default)]
    pub timeout: Option<i64>,
}

fn default_memory() -> i64 {
    -1
}

fn default_compile_limits() -> StageLimitsConfig {
    StageLimitsConfig {
        memory: default_memory(),
        timeout: 10_000,
    }
}

fn default_run_limits() -> StageLimitsConfig {
    StageLimitsConfig {
        memory: default_memory(),
        timeout: 3_000,
    }
}

impl StageLimitsConfig {
    fn limits(self) -> StageLimits {
        StageLimits::new(self.memory, self.timeout)
    }
}

impl StageDefaultsConfig {
    /// Fill unset fields from `ceiling`: its value where positive, else `-1`.
    fn resolve(self, ceiling: StageLimits) -> StageLimits {
        let follow = |value: i64| if value > 0 { value } else { -1 };
        StageLimits::new(
            self.memory.unwrap_or_else(|| follow(ceiling.memory)),
            self.timeout.unwrap_or_else(|| follow(ceiling.timeout)),
        )
    }
}

impl RuntimeEntry {
    pub fn ceilings(&self) -> ResourceLimits {
        ResourceLimits {
            compile: self.limits.compile.limits(),
            run: self.limits.run.limits(),
        }
    }

    pub fn resolved_defaults(&self) -> ResourceLimits {
        let ceilings = self.ceilings();
        ResourceLimits {
            compile: self.defaults.compile.resolve(ceilings.compile),
            run: self.defaults.run.resolve(ceilings.run),
        }
    }

    /// Convert into a descriptor. `id` is reassigned when the registry is built.
    pub fn into_descriptor(self) -> RuntimeDescriptor {
        let limits = self.ceilings();
        let defaults = self.resolved_defaults();
        RuntimeDescriptor {
            id: 0,
            language: self.language,
            version: self.version,
            aliases: self.aliases,
            engine: self.runtime,
            accepts_opaque_files: self.accepts_opaque_files,
            limits,
            defaults,
            commands: RuntimeCommands {
                compile: self.compile,
                run: self.run,
                env: self.env,
            },
        }
    }
}
