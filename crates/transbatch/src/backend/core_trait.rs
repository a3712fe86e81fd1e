use std::fmt;
use std::ops::Range;
use std::path::Path;
use async_trait::async_trait;
use crate::communication::Batch;
use crate::error::{EngineError, TranslatorError};
use super::vocab::Vocabularies;

/// Identifies the compute device an engine instance is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId {
    cpu: usize,
}

impl DeviceId {
    pub fn cpu(cpu: usize) -> Self {
        Self { cpu }
    }

    pub fn index(&self) -> usize {
        self.cpu
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu:{}", self.cpu)
    }
}

/// A tokenized unit of translation produced by a [`TextProcessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Token ids; opaque to the service, only their count is used for batching
    pub tokens: Vec<u32>,

    /// Zero-based line of the input this segment starts on
    pub line: usize,
}

impl Segment {
    pub fn new(tokens: Vec<u32>, line: usize) -> Self {
        Self { tokens, line }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Output of [`TextProcessor::process`]: segments paired with the byte range
/// of the input each one covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Processed {
    pub segments: Vec<Segment>,
    pub source_ranges: Vec<Range<usize>>,
}

/// Splits raw input into segments.
///
/// Implementations must be pure; the service calls `process` from whichever
/// task happens to prepare the request.
pub trait TextProcessor: Send + Sync + 'static {
    fn process(&self, input: &str) -> Result<Processed, TranslatorError>;
}

/// One translation engine instance. Each worker owns exactly one.
///
/// # Implementation Notes
///
/// * `initialize` runs once, on the worker that will use the engine
/// * `translate` must return one output per batch entry, in batch order
/// * Errors and panics fail only the batch that produced them
#[async_trait]
pub trait TranslationEngine: Send + 'static {
    async fn initialize(&mut self) -> Result<(), EngineError>;

    async fn translate(&mut self, batch: &Batch) -> Result<Vec<String>, EngineError>;
}

/// The bundle of collaborators a [`crate::Service`] is built from.
///
/// # Example
///
/// ```ignore
/// struct Marian { /* model files */ }
///
/// impl TranslationModel for Marian {
///     type Vocab = SentencePiece;
///     type Processor = SentenceSplitter;
///     type Engine = MarianEngine;
///
///     fn load_vocabulary(&self, path: &Path, index: usize) -> Result<SentencePiece, TranslatorError> {
///         SentencePiece::open(path).map_err(|e| TranslatorError::VocabularyLoad {
///             path: path.to_path_buf(),
///             reason: e.to_string(),
///         })
///     }
///     // ...
/// }
/// ```
pub trait TranslationModel: Send + Sync + 'static {
    /// Loaded vocabulary, shared read-only by the processor and every engine
    type Vocab: Send + Sync + 'static;
    type Processor: TextProcessor;
    type Engine: TranslationEngine;

    /// Loads the vocabulary at `path`, the `index`th configured entry.
    fn load_vocabulary(&self, path: &Path, index: usize) -> Result<Self::Vocab, TranslatorError>;

    fn text_processor(&self, vocabs: &Vocabularies<Self::Vocab>) -> Result<Self::Processor, TranslatorError>;

    /// Builds an uninitialised engine for `device`.
    fn engine(&self, device: DeviceId, vocabs: &Vocabularies<Self::Vocab>) -> Self::Engine;
}
