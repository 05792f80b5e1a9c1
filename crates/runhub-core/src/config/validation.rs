//! Load-time checks on registry entries.

use std::collections::HashSet;

use runhub_protocol::LimitField;

use crate::config::types::{RegistryFile, RuntimeEntry};
use crate::errors::RegistryError;

impl RegistryFile {
    /// Reject entries the registry could not serve correctly.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for (index, entry) in self.runtimes.iter().enumerate() {
            let invalid = |message: String| RegistryError::InvalidEntry {
                index,
                language: entry.language.clone(),
                message,
            };

            entry.validate().map_err(invalid)?;

            let triad = (&entry.language, &entry.version, &entry.runtime);
            if !seen.insert(triad) {
                return Err(invalid(format!(
                    "duplicate runtime {}-{}{}",
                    entry.language,
                    entry.version,
                    entry
                        .runtime
                        .as_ref()
                        .map(|engine| format!(" ({})", engine))
                        .unwrap_or_default()
                )));
            }
        }
        Ok(())
    }
}

impl RuntimeEntry {
    fn validate(&self) -> Result<(), String> {
        if self.language.trim().is_empty() {
            return Err("language cannot be empty".to_string());
        }
        if self.version.trim().is_empty() {
            return Err("version cannot be empty".to_string());
        }
        semver::Version::parse(&self.version)
            .map_err(|e| format!("version {} is not a semantic version: {}", self.version, e))?;
        if self.run.first().map_or(true, |program| program.is_empty()) {
            return Err("run command cannot be empty".to_string());
        }
        if let Some(compile) = &self.compile {
            if compile.first().map_or(true, |program| program.is_empty()) {
                return Err("compile command cannot be empty when given".to_string());
            }
        }
        if self.aliases.iter().any(|alias| alias.is_empty()) {
            return Err("aliases cannot be empty".to_string());
        }

        let ceilings = self.ceilings();
        let defaults = self.resolved_defaults();
        for field in LimitField::ALL {
            let (ceiling, default) = (ceilings.get(field), defaults.get(field));
            if ceiling > 0 && default > ceiling {
                return Err(format!(
                    "default {} of {} exceeds the configured limit of {}",
                    field, default, ceiling
                ));
            }
        }
        Ok(())
    }
}
