//! Configuration for phonemization and phoneme id mapping

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::casing::CasingMode;
use crate::phoneme_ids::{Phoneme, PhonemeIdMap};

/// Framing symbols of the bundled maps (ids 0, 1 and 2)
pub const DEFAULT_PAD: &str = "_";
pub const DEFAULT_BOS: &str = "^";
pub const DEFAULT_EOS: &str = "$";

/// espeak-ng voice and program used when none is configured
pub const DEFAULT_VOICE: &str = "en-us";
pub const DEFAULT_ESPEAK_PROGRAM: &str = "espeak-ng";

/// Substitutions applied to each phoneme after phonemization.
/// A phoneme may expand to zero or more phonemes.
pub type PhonemeMap = BTreeMap<Phoneme, Vec<Phoneme>>;

/// Codepoint phonemizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodepointsConfig {
    pub casing: CasingMode,
    /// Split precomposed characters into base + combining marks (NFD).
    /// Precomposed alphabet entries such as "й" or "آ" are only matched
    /// when this is off.
    pub decompose: bool,
    pub phoneme_map: Option<PhonemeMap>,
}

impl Default for CodepointsConfig {
    fn default() -> Self {
        Self {
            casing: CasingMode::Ignore,
            decompose: true,
            phoneme_map: None,
        }
    }
}

impl CodepointsConfig {
    /// Defaults with the given casing mode
    pub fn with_casing(casing: CasingMode) -> Self {
        Self {
            casing,
            ..Self::default()
        }
    }
}

/// espeak-ng phonemizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EspeakConfig {
    pub voice: String,
    pub program: PathBuf,
    pub phoneme_map: Option<PhonemeMap>,
}

impl Default for EspeakConfig {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            program: PathBuf::from(DEFAULT_ESPEAK_PROGRAM),
            phoneme_map: None,
        }
    }
}

impl EspeakConfig {
    /// Defaults with the given voice
    pub fn with_voice(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            ..Self::default()
        }
    }

    /// Reject voices that are empty or would be read as a flag
    pub fn validate(&self) -> Result<(), String> {
        if self.voice.trim().is_empty() {
            return Err("voice must not be empty".to_string());
        }
        if self.voice.starts_with('-') {
            return Err(format!("voice '{}' looks like a command line flag", self.voice));
        }
        if self.program.as_os_str().is_empty() {
            return Err("espeak program must not be empty".to_string());
        }
        Ok(())
    }
}

/// Phoneme id mapping configuration
///
/// With no `id_map`, the default espeak-ng map is used. Sentence framing
/// (`add_bos`, `add_eos`, `intersperse_pad`) is off by default, so the
/// emitted ids correspond one-to-one with mapped input phonemes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhonemeIdConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_map: Option<Arc<PhonemeIdMap>>,
    pub pad: Phoneme,
    pub bos: Phoneme,
    pub eos: Phoneme,
    /// Emit the pad id after every mapped phoneme (and after BOS)
    pub intersperse_pad: bool,
    pub add_bos: bool,
    pub add_eos: bool,
}

impl Default for PhonemeIdConfig {
    fn default() -> Self {
        Self {
            id_map: None,
            pad: DEFAULT_PAD.to_string(),
            bos: DEFAULT_BOS.to_string(),
            eos: DEFAULT_EOS.to_string(),
            intersperse_pad: false,
            add_bos: false,
            add_eos: false,
        }
    }
}

impl PhonemeIdConfig {
    /// Unframed mapping with a specific id map
    pub fn with_map(id_map: Arc<PhonemeIdMap>) -> Self {
        Self {
            id_map: Some(id_map),
            ..Self::default()
        }
    }

    /// BOS, pads between phonemes and EOS, as expected by VITS-style voices
    pub fn framed(mut self) -> Self {
        self.intersperse_pad = true;
        self.add_bos = true;
        self.add_eos = true;
        self
    }

    /// Framing symbols that are switched on must be non-empty
    pub fn validate(&self) -> Result<(), String> {
        if self.intersperse_pad && self.pad.is_empty() {
            return Err("pad symbol must not be empty when intersperse_pad is set".to_string());
        }
        if self.add_bos && self.bos.is_empty() {
            return Err("bos symbol must not be empty when add_bos is set".to_string());
        }
        if self.add_eos && self.eos.is_empty() {
            return Err("eos symbol must not be empty when add_eos is set".to_string());
        }
        Ok(())
    }
}
