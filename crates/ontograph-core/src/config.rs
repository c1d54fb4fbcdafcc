//! # Engine Configuration
//!
//! Runtime-tunable knobs of the concept engine. Values come from defaults,
//! optionally a TOML document, then environment overrides:
//!
//! - `ONTOGRAPH_SHARDING_THRESHOLD`
//! - `ONTOGRAPH_MERGE_ATTEMPTS`
//! - `ONTOGRAPH_VALIDATE_ON_COMMIT`

use crate::primitives::{DEFAULT_ATTRIBUTE_MERGE_ATTEMPTS, DEFAULT_SHARDING_THRESHOLD};
use crate::types::OntographError;
use serde::Deserialize;
use std::path::Path;

pub const ENV_SHARDING_THRESHOLD: &str = "ONTOGRAPH_SHARDING_THRESHOLD";
pub const ENV_MERGE_ATTEMPTS: &str = "ONTOGRAPH_MERGE_ATTEMPTS";
pub const ENV_VALIDATE_ON_COMMIT: &str = "ONTOGRAPH_VALIDATE_ON_COMMIT";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Instances per shard after which rotation is due.
    pub sharding_threshold: u64,
    /// Delete-and-retry rounds when an attribute index collides.
    pub attribute_merge_attempts: u32,
    /// Run the validator on commit.
    pub validate_on_commit: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sharding_threshold: DEFAULT_SHARDING_THRESHOLD,
            attribute_merge_attempts: DEFAULT_ATTRIBUTE_MERGE_ATTEMPTS,
            validate_on_commit: true,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, OntographError> {
        toml::from_str(source).map_err(|e| OntographError::Config(e.to_string()))
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OntographError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| OntographError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)?.with_env()
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, OntographError> {
        Self::default().with_env()
    }

    /// Apply environment overrides from the process environment.
    pub fn with_env(self) -> Result<Self, OntographError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Unset keys are left alone;
    /// set but unparseable keys are an error.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, OntographError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_SHARDING_THRESHOLD) {
            self.sharding_threshold = parse_override(ENV_SHARDING_THRESHOLD, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MERGE_ATTEMPTS) {
            self.attribute_merge_attempts = parse_override(ENV_MERGE_ATTEMPTS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_VALIDATE_ON_COMMIT) {
            self.validate_on_commit = parse_override(ENV_VALIDATE_ON_COMMIT, &raw)?;
        }
        self.check()?;
        Ok(self)
    }

    fn check(&self) -> Result<(), OntographError> {
        if self.sharding_threshold == 0 {
            return Err(OntographError::Config(
                "sharding_threshold must be positive".to_string(),
            ));
        }
        if self.attribute_merge_attempts == 0 {
            return Err(OntographError::Config(
                "attribute_merge_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, OntographError> {
    raw.trim()
        .parse()
        .map_err(|_| OntographError::Config(format!("{} has invalid value [{}]", key, raw)))
}

// =============================================================================
// TESTS
// =============================================================================
