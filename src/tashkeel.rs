//! Arabic diacritic restoration (tashkeel)
//!
//! Models are loaded lazily, once per model path, and kept for the life of
//! the cache. Each path has its own slot lock: concurrent first calls for the
//! same path load it once and different paths load in parallel. A failed
//! load drops its slot, so a later call can try again and bad paths do not
//! accumulate.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::{PhonemizeError, Result};

/// Loaded restoration state: text in, diacritized text out.
pub trait DiacriticModel: Send + Sync {
    fn restore(&self, text: &str) -> Result<String>;
}

/// Builds a [`DiacriticModel`] from a model file.
pub trait DiacriticLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn DiacriticModel>>;
}

type ModelSlot = Arc<Mutex<Option<Arc<dyn DiacriticModel>>>>;

/// Diacritic models keyed by model path
pub struct TashkeelCache<L: DiacriticLoader = LexiconLoader> {
    loader: L,
    models: Mutex<HashMap<String, ModelSlot>>,
    loads: AtomicUsize,
}

impl<L: DiacriticLoader> TashkeelCache<L> {
    /// Empty cache loading models with `loader`
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            models: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// The loader used for cache misses
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Number of models loaded successfully so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of model paths with a slot (loaded or loading)
    pub fn len(&self) -> usize {
        self.models.lock().len()
    }

    /// True if no model path has a slot
    pub fn is_empty(&self) -> bool {
        self.models.lock().is_empty()
    }

    /// True if the model at `model_path` is loaded and cached
    pub fn is_loaded(&self, model_path: &str) -> bool {
        let slot = self.models.lock().get(model_path).cloned();
        slot.is_some_and(|slot| slot.lock().is_some())
    }

    /// Cached model for a path, loading it on first use
    pub fn model(&self, model_path: &str) -> Result<Arc<dyn DiacriticModel>> {
        let slot = self
            .models
            .lock()
            .entry(model_path.to_string())
            .or_default()
            .clone();

        let mut model = slot.lock();
        if let Some(model) = model.as_ref() {
            debug!("Using cached diacritic model {}", model_path);
            return Ok(model.clone());
        }

        info!("Loading diacritic model from {}", model_path);
        match self.loader.load(Path::new(model_path)) {
            Ok(loaded) => {
                self.loads.fetch_add(1, Ordering::SeqCst);
                *model = Some(loaded.clone());
                // The slot may have been dropped by a failed load we waited behind
                self.models
                    .lock()
                    .entry(model_path.to_string())
                    .or_insert_with(|| slot.clone());
                Ok(loaded)
            }
            Err(e) => {
                // Slot lock is still held; nobody waits on a slot while holding the map lock
                let mut models = self.models.lock();
                if models.get(model_path).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                    models.remove(model_path);
                }
                Err(match e {
                    PhonemizeError::ModelLoad { .. } => e,
                    other => PhonemizeError::model_load(model_path, other),
                })
            }
        }
    }

    /// Add diacritics to text with the model at `model_path`
    pub fn restore(&self, model_path: &str, text: &str) -> Result<String> {
        self.model(model_path)?.restore(text)
    }
}

impl Default for TashkeelCache<LexiconLoader> {
    fn default() -> Self {
        Self::new(LexiconLoader)
    }
}

/// Fathatan through sukun, plus the superscript alef
fn is_haraka(c: char) -> bool {
    matches!(c, '\u{064B}'..='\u{0652}' | '\u{0670}')
}

/// Remove Arabic harakat, leaving letters and everything else
pub fn strip_diacritics(text: &str) -> String {
    text.chars().filter(|c| !is_haraka(*c)).collect()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LexiconFile {
    words: HashMap<String, String>,
}

/// Word-level restoration from a JSON lexicon:
/// `{"words": {"كتب": "كَتَبَ", ...}}`.
///
/// Keys are matched after removing any diacritics already present in the
/// input word. Unknown words are left exactly as written.
#[derive(Debug, Clone, Default)]
pub struct LexiconModel {
    words: HashMap<String, String>,
}

impl LexiconModel {
    /// Lexicon from bare word -> diacritized word pairs
    pub fn new(words: HashMap<String, String>) -> Self {
        let words = words
            .into_iter()
            .map(|(word, diacritized)| (strip_diacritics(&word), diacritized))
            .collect();
        Self { words }
    }

    /// Parse a `{"words": {...}}` lexicon
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let file: LexiconFile = serde_json::from_str(json)?;
        Ok(Self::new(file.words))
    }

    /// Number of words in the lexicon
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True if the lexicon has no words
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn restore_word(&self, word: &str) -> Option<String> {
        let bare = strip_diacritics(word);
        let start = bare.find(char::is_alphanumeric)?;
        let end = bare
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_alphanumeric())
            .map(|(i, c)| i + c.len_utf8())?;

        self.words
            .get(&bare[start..end])
            .map(|diacritized| format!("{}{}{}", &bare[..start], diacritized, &bare[end..]))
    }
}

impl DiacriticModel for LexiconModel {
    fn restore(&self, text: &str) -> Result<String> {
        let mut result = String::with_capacity(text.len() * 2);
        let mut word = String::new();

        for c in text.chars() {
            if c.is_whitespace() {
                if !word.is_empty() {
                    result.push_str(&self.restore_word(&word).unwrap_or_else(|| word.clone()));
                    word.clear();
                }
                result.push(c);
            } else {
                word.push(c);
            }
        }
        if !word.is_empty() {
            result.push_str(&self.restore_word(&word).unwrap_or(word));
        }

        Ok(result)
    }
}

/// Loads [`LexiconModel`]s from JSON files
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconLoader;

impl DiacriticLoader for LexiconLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn DiacriticModel>> {
        let content = fs::read_to_string(path)
            .map_err(|e| PhonemizeError::model_load(path.display().to_string(), e))?;
        let model = LexiconModel::from_json(&content)
            .map_err(|e| PhonemizeError::model_load(path.display().to_string(), e))?;

        debug!("Loaded diacritic lexicon with {} words", model.len());
        Ok(Arc::new(model))
    }
}
