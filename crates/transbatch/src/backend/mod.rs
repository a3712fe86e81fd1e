//! # Translation Backend
//!
//! The narrow interfaces the service consumes from its collaborators: text
//! segmentation, vocabulary loading and the translation engine itself.
//!
//! ## Usage
//!
//! Users of this crate plug a model in by:
//!
//! 1. Implementing [`TextProcessor`] and [`TranslationEngine`]
//! 2. Bundling them, with a vocabulary type, in a [`TranslationModel`]
//! 3. Passing the model to [`crate::Service::new`]
//!
//! The service never looks inside segments or vocabularies; it only counts
//! tokens for batch sizing.

mod core_trait;
mod vocab;

pub use core_trait::*;
pub use vocab::{load_vocabularies, Vocabularies};


#[cfg(test)]
/// Mock model.
///
/// Line-based segmentation and an upper-casing engine
pub(crate) mod mock;
