//! # Transbatch
//!
//! An asynchronous serving layer for batched machine translation.
//!
//! ## Overview
//!
//! Callers submit text concurrently. Each text becomes a request, split into
//! segments (sentences) by a text processor. Segments from many requests are
//! grouped into batches by priority and arrival, and a pool of workers, each
//! owning one translation engine, translates those batches. A request resolves
//! once every one of its segments has been translated, cancelled or failed.
//!
//! Key components include:
//!
//! - Admission control against a byte budget, so memory stays bounded
//! - A priority-ordered batcher with per-request cancel and amend
//! - A bounded queue that pushes back on the batcher when workers are busy
//! - A worker pool stopped by poison items after draining admitted work
//!
//! ## Architecture
//!
//! ### Backend Traits
//!
//! [`TranslationModel`] is the only thing a model implementation provides. It
//! loads vocabularies, builds a [`TextProcessor`] and creates one
//! [`TranslationEngine`] per worker. The serving logic never looks inside a
//! vocabulary or an engine.
//!
//! ### Requests
//!
//! [`Service::translate_part`] returns a [`RequestTracker`], which reports the
//! request's [`Status`] and resolves to its [`Response`]. Its
//! [`TrackerHandle`] is what [`Service::cancel`] and [`Service::amend`] take.
//!
//! ### Worker Modes
//!
//! With `workers = 0` translation happens on the calling task and every call
//! is synchronous. With `workers > 0` calls return immediately and the
//! workers translate in the background.
//!
//! ## Configuration
//!
//! [`ServiceConfig`] can be built in code or read from JSON with
//! [`ServiceConfig::from_path`].
//!

mod communication;
mod service;

pub mod backend;
pub mod config;
pub mod core;
pub mod error;
pub mod request;
pub mod response;

pub use backend::{DeviceId, Processed, Segment, TextProcessor, TranslationEngine, TranslationModel, Vocabularies};
pub use communication::{Batch, BatchEntry, QueueItem};
pub use config::{BatchingConfig, ServiceConfig, DEFAULT_PRIORITY};
pub use error::{EngineError, TranslatorError};
pub use request::{Completion, RequestId, RequestTracker, ResponseFuture, Status, TrackerHandle};
pub use response::{Response, TranslatedSentence};
pub use service::Service;
