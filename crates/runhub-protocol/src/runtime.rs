//! Public runtime directory entries.

use serde::{Deserialize, Serialize};

/// A runtime as listed by `GET /runtimes`; limits and defaults stay internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub language: String,
    pub version: String,
    pub aliases: Vec<String>,
    /// Engine discriminator, when several engines serve one language/version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    /// Registry index, usable as `runtime_id`.
    pub id: usize,
}
