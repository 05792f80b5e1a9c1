//! Job request building blocks shared by the batch and interactive paths.

use serde::{Deserialize, Serialize};

use crate::messages::Stage;

/// A source file submitted with a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInput {
    /// Path hint, relative to the job's working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
    /// Absent or `utf8` for text; anything else is an opaque payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl FileInput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            name: None,
            content: content.into(),
            encoding: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Whether this file counts as utf8 text for the encoding rule.
    pub fn is_text(&self) -> bool {
        matches!(self.encoding.as_deref(), None | Some("utf8"))
    }

    pub fn encoding(&self) -> FileEncoding {
        match self.encoding.as_deref() {
            None | Some("utf8") => FileEncoding::Utf8,
            Some("base64") => FileEncoding::Base64,
            Some("hex") => FileEncoding::Hex,
            Some(other) => FileEncoding::Other(other.to_string()),
        }
    }
}

/// Decoding applied to a file's `content` before it is staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEncoding {
    Utf8,
    Base64,
    Hex,
    Other(String),
}

/// A kind of resource constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    MemoryLimit,
    Timeout,
}

/// One client-settable limit field, e.g. `run_timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LimitField {
    pub stage: Stage,
    pub constraint: Constraint,
}

impl LimitField {
    /// Fields in validation order: memory limits first, compile before run.
    pub const ALL: [LimitField; 4] = [
        LimitField::new(Stage::Compile, Constraint::MemoryLimit),
        LimitField::new(Stage::Run, Constraint::MemoryLimit),
        LimitField::new(Stage::Compile, Constraint::Timeout),
        LimitField::new(Stage::Run, Constraint::Timeout),
    ];

    pub const fn new(stage: Stage, constraint: Constraint) -> Self {
        Self { stage, constraint }
    }

    /// The request field name.
    pub fn name(self) -> &'static str {
        match (self.stage, self.constraint) {
            (Stage::Compile, Constraint::MemoryLimit) => "compile_memory_limit",
            (Stage::Run, Constraint::MemoryLimit) => "run_memory_limit",
            (Stage::Compile, Constraint::Timeout) => "compile_timeout",
            (Stage::Run, Constraint::Timeout) => "run_timeout",
        }
    }
}

impl std::fmt::Display for LimitField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
