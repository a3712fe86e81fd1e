use std::path::PathBuf;
use thiserror::Error;
use crate::backend::DeviceId;
use crate::request::RequestId;

/// Errors surfaced by the service itself.
///
/// Only configuration and startup failures abort; everything that can go
/// wrong for a single request is reported through its tracker status and
/// response instead.
#[derive(Debug, Error)]
pub enum TranslatorError {
    /// Fewer than the two vocabularies (source and target) were configured
    #[error("insufficient number of vocabularies: expected at least 2, got {0}")]
    InsufficientVocabularies(usize),

    /// A configured vocabulary could not be loaded
    #[error("failed to load vocabulary {path}: {reason}")]
    VocabularyLoad {
        path: PathBuf,
        reason: String,
    },

    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for [`crate::ServiceConfig`]
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// An engine failed to initialise on its device
    #[error("engine initialization failed on {device}: {source}")]
    EngineInit {
        device: DeviceId,
        #[source]
        source: EngineError,
    },

    /// The text processor rejected an input
    #[error("text processing failed: {0}")]
    Processing(String),

    /// The response promise was dropped without being fulfilled
    #[error("request {0} was dropped before a response was produced")]
    Abandoned(RequestId),
}

/// Failure of a single engine invocation. Contained to the batch it occurred in.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("translation failed: {0}")]
    Failed(String),

    #[error("engine panicked: {0}")]
    Panicked(String),

    #[error("engine returned {got} outputs for a batch of {expected}")]
    OutputMismatch {
        expected: usize,
        got: usize,
    },
}
