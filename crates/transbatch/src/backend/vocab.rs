use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use crate::error::TranslatorError;
use super::core_trait::TranslationModel;

/// The configured vocabularies, in configuration order.
///
/// Entries naming the same file share one loaded instance.
pub struct Vocabularies<V> {
    items: Vec<Arc<V>>,
}

impl<V> Vocabularies<V> {
    pub fn source(&self) -> &Arc<V> {
        &self.items[0]
    }

    pub fn target(&self) -> &Arc<V> {
        &self.items[self.items.len() - 1]
    }

    pub fn get(&self, index: usize) -> Option<&Arc<V>> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<V>> {
        self.items.iter()
    }
}

impl<V> Clone for Vocabularies<V> {
    fn clone(&self) -> Self {
        Self { items: self.items.clone() }
    }
}

/// Loads every configured vocabulary, at least a source and a target.
pub fn load_vocabularies<M: TranslationModel>(
    model: &M,
    paths: &[PathBuf],
) -> Result<Vocabularies<M::Vocab>, TranslatorError> {
    if paths.len() < 2 {
        return Err(TranslatorError::InsufficientVocabularies(paths.len()));
    }

    let mut loaded: HashMap<&Path, Arc<M::Vocab>> = HashMap::new();
    let mut items = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        let vocab = match loaded.get(path.as_path()) {
            Some(vocab) => vocab.clone(),
            None => {
                debug!(path = %path.display(), index, "loading vocabulary");
                let vocab = Arc::new(model.load_vocabulary(path, index)?);
                loaded.insert(path.as_path(), vocab.clone());
                vocab
            }
        };
        items.push(vocab);
    }
    Ok(Vocabularies { items })
}
