use std::path::{Path, PathBuf};
use std::time::Duration;
use async_trait::async_trait;
use tracing::debug;
use transbatch::{
    Batch, DeviceId, EngineError, Processed, Segment, TextProcessor, TranslationEngine, TranslationModel,
    TranslatorError, Vocabularies,
};

/// Toy model: sentences end at `.`, `!`, `?` or a newline, and each one is
/// "translated" by reversing its word order.
pub struct EchoModel {
    pub delay: Duration,
}

pub struct EchoVocab {
    pub path: PathBuf,
}

pub struct SentenceSplitter;

pub struct ReversingEngine {
    device: DeviceId,
    delay: Duration,
}

impl TranslationModel for EchoModel {
    type Vocab = EchoVocab;
    type Processor = SentenceSplitter;
    type Engine = ReversingEngine;

    fn load_vocabulary(&self, path: &Path, _index: usize) -> Result<Self::Vocab, TranslatorError> {
        Ok(EchoVocab { path: path.to_path_buf() })
    }

    fn text_processor(&self, vocabs: &Vocabularies<Self::Vocab>) -> Result<Self::Processor, TranslatorError> {
        debug!(source = %vocabs.source().path.display(), target = %vocabs.target().path.display(), "vocabularies loaded");
        Ok(SentenceSplitter)
    }

    fn engine(&self, device: DeviceId, _vocabs: &Vocabularies<Self::Vocab>) -> Self::Engine {
        ReversingEngine { device, delay: self.delay }
    }
}

impl TextProcessor for SentenceSplitter {
    fn process(&self, input: &str) -> Result<Processed, TranslatorError> {
        let mut processed = Processed::default();
        let mut line = 0;
        let mut start = 0;
        for (at, c) in input.char_indices() {
            if matches!(c, '.' | '!' | '?' | '\n') {
                let end = at + c.len_utf8();
                push_sentence(&mut processed, input, start..end, line);
                start = end;
                if c == '\n' {
                    line += 1;
                }
            }
        }
        push_sentence(&mut processed, input, start..input.len(), line);
        Ok(processed)
    }
}

fn push_sentence(processed: &mut Processed, input: &str, range: std::ops::Range<usize>, line: usize) {
    let text = &input[range.clone()];
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    let begin = range.start + (text.len() - text.trim_start().len());
    let tokens = trimmed.split_whitespace().map(|word| word.len() as u32).collect();
    processed.segments.push(Segment::new(tokens, line));
    processed.source_ranges.push(begin..begin + trimmed.len());
}

#[async_trait]
impl TranslationEngine for ReversingEngine {
    async fn initialize(&mut self) -> Result<(), EngineError> {
        debug!(device = %self.device, "engine ready");
        Ok(())
    }

    async fn translate(&mut self, batch: &Batch) -> Result<Vec<String>, EngineError> {
        tokio::time::sleep(self.delay).await;
        debug!(device = %self.device, segments = batch.len(), tokens = batch.tokens(), "batch translated");
        Ok(batch
            .entries()
            .iter()
            .map(|entry| entry.source().split_whitespace().rev().collect::<Vec<_>>().join(" "))
            .collect())
    }
}
