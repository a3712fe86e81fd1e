use std::ops::Range;
use crate::backend::Segment;

/// Final state of one segment, recorded as workers finish with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SegmentOutcome {
    Translated(String),
    Failed(String),
    Cancelled,
}

/// One translated segment, numbered the way the caller numbers lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedSentence {
    /// Caller-visible line: `line_number_begin` plus the segment's own line
    pub line: usize,

    /// Bytes of the source text this sentence was translated from
    pub source_range: Range<usize>,

    /// `None` when the segment was cancelled or its batch failed
    pub translation: Option<String>,
}

/// The assembled result of a translation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    source: String,
    target: String,
    sentences: Vec<TranslatedSentence>,
    error: Option<String>,
}

impl Response {
    /// The response given to rejected and cancelled requests.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A response carrying only an error, for requests that never reached
    /// the engine.
    pub(crate) fn failed(source: String, error: String) -> Self {
        Self {
            source,
            error: Some(error),
            ..Default::default()
        }
    }

    /// Builds the response from per-segment outcomes.
    ///
    /// The target text keeps whatever separated the segments in the source
    /// (whitespace, blank lines) and replaces each segment with its
    /// translation. Segments without a translation contribute nothing.
    pub(crate) fn assemble(
        source: &str,
        segments: &[Segment],
        source_ranges: &[Range<usize>],
        outcomes: Vec<SegmentOutcome>,
        line_number_begin: usize,
    ) -> Self {
        let mut target = String::with_capacity(source.len());
        let mut sentences = Vec::with_capacity(segments.len());
        let mut error = None;
        let mut cursor = 0;

        for ((segment, range), outcome) in segments.iter().zip(source_ranges).zip(outcomes) {
            if range.start >= cursor {
                target.push_str(source.get(cursor..range.start).unwrap_or_default());
                cursor = range.end;
            }
            let translation = match outcome {
                SegmentOutcome::Translated(text) => Some(text),
                SegmentOutcome::Failed(reason) => {
                    error.get_or_insert(reason);
                    None
                }
                SegmentOutcome::Cancelled => None,
            };
            if let Some(text) = &translation {
                target.push_str(text);
            }
            sentences.push(TranslatedSentence {
                line: line_number_begin + segment.line,
                source_range: range.clone(),
                translation,
            });
        }
        target.push_str(source.get(cursor..).unwrap_or_default());

        Self {
            source: source.to_string(),
            target,
            sentences,
            error,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn sentences(&self) -> &[TranslatedSentence] {
        &self.sentences
    }

    /// Set when a batch holding one of this request's segments failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.sentences.is_empty()
    }
}
