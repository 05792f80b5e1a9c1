//! Registry configuration.
//!
//! Runtimes are declared in a YAML file with a top-level `runtimes:` list and
//! loaded once at startup. File order is registry order.

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::*;
pub use types::*;

use crate::errors::RegistryError;
use crate::registry::Registry;
use std::path::Path;

/// Load a registry from a YAML file.
pub async fn load_registry<P: AsRef<Path>>(path: P) -> Result<Registry, RegistryError> {
    RegistryLoader::from_file(path).await
}
