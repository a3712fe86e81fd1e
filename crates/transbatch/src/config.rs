//! Service configuration.
//!
//! Configuration is plain data deserialised with `serde`. Keys are kebab-case;
//! the option names used by existing deployment files (`cpu-threads`,
//! `mini-batch-words`) are accepted as aliases.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::TranslatorError;

/// Priority assigned to every request until it is amended. Lower runs first.
pub const DEFAULT_PRIORITY: i32 = 20;

/// Top level configuration for a [`crate::Service`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServiceConfig {
    /// Number of worker tasks. `0` translates inline on the caller's task.
    #[serde(alias = "cpu-threads")]
    pub workers: usize,

    /// Total input bytes that may be in flight at once
    pub capacity_bytes: usize,

    /// Vocabulary files, source first and target last
    pub vocabs: Vec<PathBuf>,

    /// Batch sizing policy
    pub batching: BatchingConfig,
}

/// How the batcher sizes batches and orders pending work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BatchingConfig {
    /// Token budget of one batch
    #[serde(alias = "mini-batch-words")]
    pub max_batch_tokens: usize,

    /// Upper bound on segments in one batch
    pub max_batch_segments: usize,

    /// Priority given to new requests
    pub default_priority: i32,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_batch_tokens: 1024,
            max_batch_segments: 64,
            default_priority: DEFAULT_PRIORITY,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            capacity_bytes: 1 << 20,
            vocabs: vec![],
            batching: BatchingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Parses a configuration from a JSON document. The result is validated.
    pub fn from_json_str(json: &str) -> Result<Self, TranslatorError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TranslatorError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Checks the invariants the service relies on at startup.
    pub fn validate(&self) -> Result<(), TranslatorError> {
        if self.vocabs.len() < 2 {
            return Err(TranslatorError::InsufficientVocabularies(self.vocabs.len()));
        }
        if self.batching.max_batch_tokens == 0 {
            return Err(TranslatorError::InvalidConfig("max-batch-tokens must be positive".to_string()));
        }
        if self.batching.max_batch_segments == 0 {
            return Err(TranslatorError::InvalidConfig("max-batch-segments must be positive".to_string()));
        }
        Ok(())
    }
}
