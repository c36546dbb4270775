//! Text to phonemes and phoneme ids for neural TTS voices
//!
//! Two phonemizers are available:
//! - espeak-ng, producing IPA phonemes grouped by clause
//! - codepoints, treating each (case-normalized) codepoint as a phoneme
//!
//! Phonemes are then mapped to ids in `0..MAX_PHONEMES` with either the
//! espeak-ng map or a per-language codepoint map. Phonemes without an id are
//! skipped and reported, never treated as errors.
//!
//! The free functions below share process-wide state: one espeak-ng engine
//! (initialized on first use) and one diacritic model cache.

pub mod casing;
pub mod codepoints;
pub mod config;
pub mod error;
pub mod espeak;
pub mod phoneme_ids;
pub mod tashkeel;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

pub use casing::CasingMode;
pub use config::{CodepointsConfig, EspeakConfig, PhonemeIdConfig, PhonemeMap};
pub use error::{PhonemizeError, Result};
pub use espeak::{EspeakNg, EspeakPhonemizer, G2pEngine};
pub use phoneme_ids::{
    MissingPhonemes, Phoneme, PhonemeId, PhonemeIdMap, PhonemeIdRegistry, PhonemeIds, MAX_PHONEMES,
};
pub use tashkeel::{DiacriticLoader, DiacriticModel, LexiconLoader, TashkeelCache};

fn espeak() -> &'static EspeakPhonemizer {
    static ESPEAK: OnceLock<EspeakPhonemizer> = OnceLock::new();
    ESPEAK.get_or_init(EspeakPhonemizer::default)
}

fn tashkeel() -> &'static TashkeelCache {
    static TASHKEEL: OnceLock<TashkeelCache> = OnceLock::new();
    TASHKEEL.get_or_init(TashkeelCache::default)
}

/// Phonemize text using espeak-ng.
///
/// `data_path` is only used by the first call in the process (empty means
/// espeak-ng's built-in location).
pub fn phonemize_espeak(text: &str, voice: &str, data_path: &str) -> Result<Vec<Vec<Phoneme>>> {
    let data_path = (!data_path.is_empty()).then(|| Path::new(data_path));
    espeak().phonemize(text, &EspeakConfig::with_voice(voice), data_path)
}

/// Phonemize text as codepoints. `casing` is one of "ignore", "lower",
/// "upper" or "fold"; anything else is rejected.
pub fn phonemize_codepoints(text: &str, casing: &str) -> Result<Vec<Vec<Phoneme>>> {
    let casing: CasingMode = casing.parse()?;
    Ok(codepoints::phonemize_codepoints(
        text,
        &CodepointsConfig::with_casing(casing),
    ))
}

/// Ids for espeak-ng phonemes
pub fn phoneme_ids_espeak<P: AsRef<str>>(phonemes: &[P]) -> Result<PhonemeIds> {
    phoneme_ids::phonemes_to_ids(phonemes, &PhonemeIdConfig::default())
}

/// Ids for a language's codepoints
pub fn phoneme_ids_codepoints<P: AsRef<str>>(language: &str, phonemes: &[P]) -> Result<PhonemeIds> {
    let map = phoneme_ids::registry()?.get_map(language)?;
    phoneme_ids::phonemes_to_ids(phonemes, &PhonemeIdConfig::with_map(map))
}

/// Maximum number of phonemes in any id map
pub fn get_max_phonemes() -> usize {
    MAX_PHONEMES
}

/// Phoneme/id map for espeak-ng phonemes
pub fn get_espeak_map() -> Result<Arc<PhonemeIdMap>> {
    Ok(phoneme_ids::registry()?.espeak_map().clone())
}

/// Codepoint/id maps for all supported languages
pub fn get_codepoints_map() -> Result<BTreeMap<String, Arc<PhonemeIdMap>>> {
    Ok(phoneme_ids::registry()?.codepoints_maps().clone())
}

/// Add diacritics to Arabic text, loading the model on first use
pub fn tashkeel_run(model_path: &str, text: &str) -> Result<String> {
    tashkeel().restore(model_path, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codepoints_to_ids() {
        let sentences = phonemize_codepoints("Hello, World!", "lower").unwrap();
        assert_eq!(sentences.len(), 1);

        let result = phoneme_ids_codepoints("en", &sentences[0]).unwrap();
        assert_eq!(result.ids.len(), sentences[0].len());
        assert!(result.missing.is_empty());
    }

    #[test]
    fn test_invalid_casing_rejected() {
        let err = phonemize_codepoints("Abc", "title").unwrap_err();
        assert!(matches!(err, PhonemizeError::InvalidCasingMode(_)));
    }

    #[test]
    fn test_unregistered_language() {
        let before = get_codepoints_map().unwrap();
        let err = phoneme_ids_codepoints("xx", &["a"]).unwrap_err();

        assert!(matches!(err, PhonemizeError::UnsupportedLanguage(_)));
        assert_eq!(get_codepoints_map().unwrap(), before);
    }

    #[test]
    fn test_uppercase_codepoints_missing_from_lowercase_alphabet() {
        let sentences = phonemize_codepoints("Ab", "ignore").unwrap();
        let result = phoneme_ids_codepoints("en", &sentences[0]).unwrap();

        assert_eq!(result.ids.len(), 1);
        assert_eq!(result.missing, MissingPhonemes::from([("A".to_string(), 1)]));
    }

    #[test]
    fn test_espeak_ids() {
        let result = phoneme_ids_espeak(&["h", "ə", "l", "ˈ", "o", "ʊ", "g"]).unwrap();
        assert_eq!(result.ids.len(), 6);
        // espeak writes the IPA "ɡ", not ASCII "g"
        assert_eq!(result.missing["g"], 1);
    }

    #[test]
    fn test_introspection() {
        assert_eq!(get_max_phonemes(), 256);
        let espeak = get_espeak_map().unwrap();
        assert_eq!(espeak.get("_"), Some(0));

        let maps = get_codepoints_map().unwrap();
        assert!(maps.contains_key("ar"));
        assert!(maps.values().all(|m| m.iter().all(|(_, id)| (id as usize) < get_max_phonemes())));
    }

    #[test]
    fn test_tashkeel_missing_model() {
        let err = tashkeel_run("/no/such/tashkeel.json", "كتب").unwrap_err();
        assert!(matches!(err, PhonemizeError::ModelLoad { .. }));
    }
}
