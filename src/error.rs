//! Error types for phonemization and phoneme id mapping

use thiserror::Error;

/// Errors surfaced by the phonemization pipeline.
///
/// Missing phonemes are not errors; they are reported alongside the ids
/// returned by [`crate::phoneme_ids::phonemes_to_ids`].
#[derive(Debug, Error)]
pub enum PhonemizeError {
    /// The external engine could not be initialized. Raised at most once per
    /// engine instance; every later call sees the same failure.
    #[error("Failed to initialize eSpeak: {0}")]
    EngineInitialization(String),

    #[error("eSpeak failed to phonemize text: {0}")]
    EngineInference(String),

    #[error("No phoneme/id map for language: {0}")]
    UnsupportedLanguage(String),

    #[error("Failed to load diacritic model '{path}': {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("Invalid casing mode '{0}' (expected ignore, lower, upper or fold)")]
    InvalidCasingMode(String),

    #[error("Invalid phoneme/id map: {0}")]
    InvalidIdMap(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl PhonemizeError {
    pub(crate) fn model_load(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PhonemizeError>;
