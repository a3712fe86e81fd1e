use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use tokio::sync::Semaphore;
use crate::backend::{DeviceId, Processed, Segment, TextProcessor, TranslationEngine, TranslationModel, Vocabularies};
use crate::communication::Batch;
use crate::error::{EngineError, TranslatorError};
use crate::request::RequestId;

/// (request, segment index) pairs of every batch an engine received
pub type BatchLog = Arc<Mutex<Vec<Vec<(RequestId, usize)>>>>;

#[derive(Debug)]
pub struct MockVocab {
    pub path: PathBuf,
}

/// One segment per non-empty line, one token per word.
pub struct MockProcessor;

impl TextProcessor for MockProcessor {
    fn process(&self, input: &str) -> Result<Processed, TranslatorError> {
        if input.contains("UNPROCESSABLE") {
            return Err(TranslatorError::Processing("unprocessable input".to_string()));
        }
        let mut processed = Processed::default();
        let mut offset = 0;
        for (line, text) in input.split('\n').enumerate() {
            if !text.trim().is_empty() {
                let tokens = text.split_whitespace().map(|w| w.len() as u32).collect();
                processed.segments.push(Segment::new(tokens, line));
                processed.source_ranges.push(offset..offset + text.len());
            }
            offset += text.len() + 1;
        }
        Ok(processed)
    }
}

/// Upper-cases each segment. Segments containing `FAIL` fail the batch,
/// segments containing `PANIC` panic inside the engine.
pub struct MockEngine {
    device: DeviceId,
    fail_init: bool,
    gate: Option<Arc<Semaphore>>,
    log: BatchLog,
}

#[async_trait]
impl TranslationEngine for MockEngine {
    async fn initialize(&mut self) -> Result<(), EngineError> {
        if self.fail_init {
            return Err(EngineError::Failed(format!("no model for {}", self.device)));
        }
        Ok(())
    }

    async fn translate(&mut self, batch: &Batch) -> Result<Vec<String>, EngineError> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.log
            .lock()
            .unwrap()
            .push(batch.entries().iter().map(|e| (e.request_id(), e.index())).collect());

        let mut outputs = Vec::with_capacity(batch.len());
        for entry in batch.entries() {
            let source = entry.source();
            if source.contains("PANIC") {
                panic!("mock engine asked to panic");
            }
            if source.contains("FAIL") {
                return Err(EngineError::Failed("mock failure".to_string()));
            }
            outputs.push(source.to_uppercase());
        }
        Ok(outputs)
    }
}

#[derive(Default)]
pub struct MockModel {
    loads: Arc<AtomicUsize>,
    log: BatchLog,
    gate: Option<Arc<Semaphore>>,
    fail_init_on: Option<usize>,
}

impl MockModel {
    /// Engines wait for one permit per batch before translating.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn failing_init_on(device: usize) -> Self {
        Self {
            fail_init_on: Some(device),
            ..Default::default()
        }
    }

    pub fn vocabulary_loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn batch_log(&self) -> BatchLog {
        self.log.clone()
    }
}

impl TranslationModel for MockModel {
    type Vocab = MockVocab;
    type Processor = MockProcessor;
    type Engine = MockEngine;

    fn load_vocabulary(&self, path: &Path, _index: usize) -> Result<MockVocab, TranslatorError> {
        if path.to_string_lossy().contains("missing") {
            return Err(TranslatorError::VocabularyLoad {
                path: path.to_path_buf(),
                reason: "not found".to_string(),
            });
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(MockVocab { path: path.to_path_buf() })
    }

    fn text_processor(&self, _vocabs: &Vocabularies<MockVocab>) -> Result<MockProcessor, TranslatorError> {
        Ok(MockProcessor)
    }

    fn engine(&self, device: DeviceId, _vocabs: &Vocabularies<MockVocab>) -> MockEngine {
        MockEngine {
            device,
            fail_init: self.fail_init_on == Some(device.index()),
            gate: self.gate.clone(),
            log: self.log.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_splits_lines() {
        let processed = MockProcessor.process("hello world\n\nbye").unwrap();
        assert_eq!(processed.segments, vec![Segment::new(vec![5, 5], 0), Segment::new(vec![3], 2)]);
        assert_eq!(processed.source_ranges, vec![0..11, 13..16]);
    }
}
