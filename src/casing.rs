//! Casing normalization applied before codepoint phonemization

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PhonemizeError;

/// How text casing is treated before it is split into codepoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasingMode {
    /// Leave text untouched
    #[default]
    Ignore,
    /// Full Unicode lowercase mapping, including multi-char results
    Lower,
    /// Full Unicode uppercase mapping (SpecialCasing), so "ß" -> "SS"
    Upper,
    /// Full Unicode case folding (e.g. "ß" -> "ss")
    Fold,
}

impl CasingMode {
    /// Token used by `FromStr`, `Display` and serde
    pub fn as_str(&self) -> &'static str {
        match self {
            CasingMode::Ignore => "ignore",
            CasingMode::Lower => "lower",
            CasingMode::Upper => "upper",
            CasingMode::Fold => "fold",
        }
    }
}

impl FromStr for CasingMode {
    type Err = PhonemizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(CasingMode::Ignore),
            "lower" => Ok(CasingMode::Lower),
            "upper" => Ok(CasingMode::Upper),
            "fold" => Ok(CasingMode::Fold),
            other => Err(PhonemizeError::InvalidCasingMode(other.to_string())),
        }
    }
}

impl fmt::Display for CasingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply a casing mode to text. Never fails.
///
/// `Lower` and `Upper` use the standard library's full Unicode mappings,
/// which may change the codepoint count: `Upper` turns "ß" into "SS" and
/// `Lower` turns "İ" into "i" + U+0307. Results are locale-independent.
pub fn normalize(text: &str, mode: CasingMode) -> String {
    match mode {
        CasingMode::Ignore => text.to_string(),
        CasingMode::Lower => text.to_lowercase(),
        CasingMode::Upper => text.to_uppercase(),
        CasingMode::Fold => caseless::default_case_fold_str(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &["Abc", "Straße", "ΣΊΣΥΦΟΣ", "İstanbul", "", "mixed 123 CASE!"];

    #[test]
    fn test_parse_tokens() {
        assert_eq!("ignore".parse::<CasingMode>().unwrap(), CasingMode::Ignore);
        assert_eq!("lower".parse::<CasingMode>().unwrap(), CasingMode::Lower);
        assert_eq!("upper".parse::<CasingMode>().unwrap(), CasingMode::Upper);
        assert_eq!("fold".parse::<CasingMode>().unwrap(), CasingMode::Fold);
    }

    #[test]
    fn test_unknown_token_is_rejected() {
        let err = "Lower".parse::<CasingMode>().unwrap_err();
        assert!(matches!(err, PhonemizeError::InvalidCasingMode(ref t) if t == "Lower"));
        assert!("".parse::<CasingMode>().is_err());
    }

    #[test]
    fn test_ignore_is_identity() {
        for sample in SAMPLES {
            assert_eq!(normalize(sample, CasingMode::Ignore), *sample);
        }
    }

    #[test]
    fn test_modes_are_idempotent() {
        for mode in [CasingMode::Lower, CasingMode::Upper, CasingMode::Fold] {
            for sample in SAMPLES {
                let once = normalize(sample, mode);
                assert_eq!(normalize(&once, mode), once, "{} on {:?}", mode, sample);
            }
        }
    }

    #[test]
    fn test_fold_is_stronger_than_lower() {
        assert_eq!(normalize("Straße", CasingMode::Lower), "straße");
        assert_eq!(normalize("Straße", CasingMode::Fold), "strasse");
        assert_eq!(normalize("Abc", CasingMode::Upper), "ABC");
    }

    #[test]
    fn test_upper_and_lower_use_full_mappings() {
        assert_eq!(normalize("ß", CasingMode::Upper), "SS");
        assert_eq!(normalize("ŉ", CasingMode::Upper), "ʼN");
        assert_eq!(normalize("İ", CasingMode::Lower), "i\u{0307}");
        // Final sigma follows its context
        assert_eq!(normalize("ΟΔΟΣ", CasingMode::Lower), "οδος");
    }

    #[test]
    fn test_display_round_trips_token() {
        for mode in [CasingMode::Ignore, CasingMode::Lower, CasingMode::Upper, CasingMode::Fold] {
            assert_eq!(mode.to_string().parse::<CasingMode>().unwrap(), mode);
        }
    }
}
