//! The runtime registry: an ordered, read-only catalog of execution runtimes.
//!
//! Lookups scan in registry order and the first match wins, so the order the
//! runtimes were loaded in is the tie-break between overlapping entries
//! (e.g. two `python` versions both matching `version: "*"`).

use std::collections::BTreeMap;
use std::sync::Arc;

use runhub_protocol::RuntimeInfo;
use serde::{Deserialize, Serialize};

use crate::job::ResourceLimits;

/// Commands a process-based backend uses to run a runtime's stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeCommands {
    /// Invoked with every staged file name appended. `None` for interpreted runtimes.
    #[serde(default)]
    pub compile: Option<Vec<String>>,
    /// Invoked with the entry file name and the job's args appended.
    pub run: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// One runtime in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDescriptor {
    /// Position in the registry, exposed to clients as `id`.
    pub id: usize,
    pub language: String,
    pub version: String,
    pub aliases: Vec<String>,
    /// Engine discriminator for several implementations of one language/version.
    pub engine: Option<String>,
    /// Jobs for this runtime may consist of opaque (non-utf8) files only.
    pub accepts_opaque_files: bool,
    /// Ceilings clients may request up to. `<= 0` disables the check.
    pub limits: ResourceLimits,
    /// Limits applied when the client does not ask for any.
    pub defaults: ResourceLimits,
    pub commands: RuntimeCommands,
}

impl RuntimeDescriptor {
    /// Whether this runtime answers to `language` by name or alias.
    pub fn answers_to(&self, language: &str) -> bool {
        self.language == language || self.aliases.iter().any(|a| a == language)
    }

    /// The registry match predicate.
    pub fn matches(&self, language: &str, version: &str, engine: Option<&str>) -> bool {
        self.answers_to(language)
            && (version == "*" || self.version == version)
            && engine.map_or(true, |e| self.engine.as_deref() == Some(e))
    }

    pub fn info(&self) -> RuntimeInfo {
        RuntimeInfo {
            language: self.language.clone(),
            version: self.version.clone(),
            aliases: self.aliases.clone(),
            runtime: self.engine.clone(),
            id: self.id,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    runtimes: Vec<Arc<RuntimeDescriptor>>,
}

impl Registry {
    /// Build a registry; each descriptor's `id` is reassigned to its position.
    pub fn new(runtimes: Vec<RuntimeDescriptor>) -> Self {
        let runtimes = runtimes
            .into_iter()
            .enumerate()
            .map(|(id, mut rt)| {
                rt.id = id;
                Arc::new(rt)
            })
            .collect();
        Self { runtimes }
    }

    /// First runtime matching `language`/`version`/`engine`, in registry order.
    pub fn lookup(
        &self,
        language: &str,
        version: &str,
        engine: Option<&str>,
    ) -> Option<Arc<RuntimeDescriptor>> {
        self.runtimes
            .iter()
            .find(|rt| rt.matches(language, version, engine))
            .cloned()
    }

    /// Runtime by registry index.
    pub fn get(&self, id: usize) -> Option<Arc<RuntimeDescriptor>> {
        self.runtimes.get(id).cloned()
    }

    /// Public projection of every runtime, in registry order.
    pub fn list(&self) -> Vec<RuntimeInfo> {
        self.runtimes.iter().map(|rt| rt.info()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RuntimeDescriptor>> {
        self.runtimes.iter()
    }

    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }
}
