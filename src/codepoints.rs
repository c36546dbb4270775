//! Codepoint phonemizer
//!
//! Treats each Unicode codepoint of the (case-normalized) text as one
//! phoneme. Lines are the sentence units: text with N line breaks always
//! yields N + 1 phoneme sequences, empty lines included. A trailing `\r`
//! on a line is dropped so CRLF text splits the same way.
//!
//! With decomposition on (the default), precomposed characters never reach
//! the id map: "й" arrives as "и" + U+0306 and "أ" as "ا" + U+0654. The
//! bundled alphabets list those parts, so decomposed text maps fully; their
//! precomposed entries only match when decomposition is off.

use unicode_normalization::UnicodeNormalization;

use crate::casing;
use crate::config::CodepointsConfig;
use crate::phoneme_ids::Phoneme;

/// Split text into per-line codepoint phonemes after casing and optional NFD
pub fn phonemize_codepoints(text: &str, config: &CodepointsConfig) -> Vec<Vec<Phoneme>> {
    let cased = casing::normalize(text, config.casing);

    // e.g. "ç" -> "c" + U+0327
    let normalized: String = if config.decompose {
        cased.nfd().collect()
    } else {
        cased
    };

    normalized
        .split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let mut phonemes = Vec::with_capacity(line.len());
            for c in line.chars() {
                let phoneme = c.to_string();
                match config.phoneme_map.as_ref().and_then(|m| m.get(&phoneme)) {
                    Some(mapped) => phonemes.extend(mapped.iter().cloned()),
                    None => phonemes.push(phoneme),
                }
            }
            phonemes
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casing::CasingMode;
    use crate::config::{PhonemeIdConfig, PhonemeMap};

    fn phonemize(text: &str, casing: CasingMode) -> Vec<Vec<Phoneme>> {
        phonemize_codepoints(text, &CodepointsConfig::with_casing(casing))
    }

    #[test]
    fn test_lowercased_codepoints() {
        assert_eq!(phonemize("Abc", CasingMode::Lower), vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn test_casing_ignored() {
        assert_eq!(phonemize("Abc", CasingMode::Ignore), vec![vec!["A", "b", "c"]]);
    }

    #[test]
    fn test_one_phoneme_per_codepoint() {
        let config = CodepointsConfig {
            decompose: false,
            ..CodepointsConfig::default()
        };
        // 2-byte, 3-byte and 4-byte UTF-8 sequences
        let result = phonemize_codepoints("éअ𝄞", &config);
        assert_eq!(result, vec![vec!["é", "अ", "𝄞"]]);
    }

    #[test]
    fn test_decomposition() {
        let result = phonemize("ç", CasingMode::Ignore);
        assert_eq!(result, vec![vec!["c", "\u{0327}"]]);

        let result = phonemize("Ça", CasingMode::Lower);
        assert_eq!(result, vec![vec!["c", "\u{0327}", "a"]]);
    }

    #[test]
    fn test_precomposed_letters_map_after_decomposition() {
        let registry = crate::phoneme_ids::registry().unwrap();
        let config = PhonemeIdConfig::with_map(registry.get_map("ru").unwrap());
        let result = phonemize("йод", CasingMode::Ignore);
        assert_eq!(result[0], vec!["и", "\u{0306}", "о", "д"]);
        let ids = registry.phonemes_to_ids(&result[0], &config).unwrap();
        assert!(ids.missing.is_empty());

        let config = PhonemeIdConfig::with_map(registry.get_map("ar").unwrap());
        let result = phonemize("أإآؤئ", CasingMode::Ignore);
        assert_eq!(result[0].len(), 10);
        let ids = registry.phonemes_to_ids(&result[0], &config).unwrap();
        assert!(ids.missing.is_empty(), "{:?}", ids.missing);

        let composed = phonemize_codepoints(
            "й",
            &CodepointsConfig {
                decompose: false,
                ..CodepointsConfig::default()
            },
        );
        assert_eq!(composed, vec![vec!["й"]]);
        let config = PhonemeIdConfig::with_map(registry.get_map("ru").unwrap());
        assert!(registry.phonemes_to_ids(&composed[0], &config).unwrap().missing.is_empty());
    }

    #[test]
    fn test_lines_are_units() {
        let result = phonemize("ab\n\ncd\r\ne", CasingMode::Ignore);
        assert_eq!(
            result,
            vec![vec!["a", "b"], vec![], vec!["c", "d"], vec!["e"]]
        );

        assert_eq!(phonemize("a\n", CasingMode::Ignore).len(), 2);
        assert_eq!(phonemize("", CasingMode::Ignore), vec![Vec::<Phoneme>::new()]);
    }

    #[test]
    fn test_whitespace_is_kept() {
        let result = phonemize("a b", CasingMode::Ignore);
        assert_eq!(result, vec![vec!["a", " ", "b"]]);
    }

    #[test]
    fn test_phoneme_map() {
        let mut map = PhonemeMap::new();
        map.insert("x".to_string(), vec!["k".to_string(), "s".to_string()]);
        map.insert("-".to_string(), vec![]);

        let config = CodepointsConfig {
            casing: CasingMode::Lower,
            phoneme_map: Some(map),
            ..CodepointsConfig::default()
        };
        let result = phonemize_codepoints("X-a", &config);
        assert_eq!(result, vec![vec!["k", "s", "a"]]);
    }
}
