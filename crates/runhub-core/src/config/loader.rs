//! Registry loader for YAML files.

use std::path::Path;

use tokio::fs;

use crate::config::types::RegistryFile;
use crate::errors::RegistryError;
use crate::registry::Registry;

pub struct RegistryLoader;

impl RegistryLoader {
    /// Load a registry from a YAML file.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Registry, RegistryError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| RegistryError::Read {
                path: path.display().to_string(),
                source,
            })?;

        let registry = Self::from_str(&content)?;
        log::info!(
            "Loaded {} runtime(s) from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Load a registry from a YAML string.
    pub fn from_str(content: &str) -> Result<Registry, RegistryError> {
        let file: RegistryFile = serde_yaml::from_str(content)?;
        file.validate()?;

        Ok(Registry::new(
            file.runtimes
                .into_iter()
                .map(|entry| entry.into_descriptor())
                .collect(),
        ))
    }
}
