//! Phoneme/id maps and phoneme to id conversion
//!
//! Every map shares the same id space, `0..MAX_PHONEMES`, so any of them can
//! index the same model embedding table. The bundled maps are built once on
//! first use and shared read-only afterwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::PhonemeIdConfig;
use crate::error::{PhonemizeError, Result};

/// A single phoneme: one codepoint, or a multi-codepoint token
pub type Phoneme = String;

/// Id of a phoneme within a map, always in `0..MAX_PHONEMES`
pub type PhonemeId = i64;

/// Size of the id space shared by every phoneme/id map
pub const MAX_PHONEMES: usize = 256;

/// Phonemes with no id in the selected map, with how often each was seen
pub type MissingPhonemes = BTreeMap<Phoneme, usize>;

const ESPEAK_PHONEME_IDS_JSON: &str = include_str!("../data/espeak_phoneme_ids.json");
const ALPHABETS_JSON: &str = include_str!("../data/alphabets.json");

/// Injective phoneme -> id table with every id below [`MAX_PHONEMES`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Phoneme, PhonemeId>", into = "BTreeMap<Phoneme, PhonemeId>")]
pub struct PhonemeIdMap {
    ids: BTreeMap<Phoneme, PhonemeId>,
}

impl PhonemeIdMap {
    /// Validate and wrap a table: non-empty, ids in range, no id shared
    pub fn new(ids: BTreeMap<Phoneme, PhonemeId>) -> Result<Self> {
        if ids.is_empty() {
            return Err(PhonemizeError::InvalidIdMap("map is empty".to_string()));
        }

        let mut seen: HashMap<PhonemeId, &str> = HashMap::with_capacity(ids.len());
        for (phoneme, &id) in &ids {
            if id < 0 || id as usize >= MAX_PHONEMES {
                return Err(PhonemizeError::InvalidIdMap(format!(
                    "id {} for {:?} is outside 0..{}",
                    id, phoneme, MAX_PHONEMES
                )));
            }
            if let Some(other) = seen.insert(id, phoneme) {
                return Err(PhonemizeError::InvalidIdMap(format!(
                    "id {} is shared by {:?} and {:?}",
                    id, other, phoneme
                )));
            }
        }

        Ok(Self { ids })
    }

    /// Build a map where each symbol's id is its position in `symbols`
    pub fn from_symbols<I, S>(symbols: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Phoneme>,
    {
        let mut ids = BTreeMap::new();
        for (index, symbol) in symbols.into_iter().enumerate() {
            let symbol = symbol.into();
            if ids.insert(symbol.clone(), index as PhonemeId).is_some() {
                return Err(PhonemizeError::InvalidIdMap(format!(
                    "symbol {:?} is listed twice",
                    symbol
                )));
            }
        }
        Self::new(ids)
    }

    /// Parse a JSON object of `{"phoneme": id}`
    pub fn from_json(json: &str) -> Result<Self> {
        let ids: BTreeMap<Phoneme, PhonemeId> = serde_json::from_str(json)
            .map_err(|e| PhonemizeError::InvalidIdMap(format!("Failed to parse map: {}", e)))?;
        Self::new(ids)
    }

    /// Id for a phoneme, if it has one
    pub fn get(&self, phoneme: &str) -> Option<PhonemeId> {
        self.ids.get(phoneme).copied()
    }

    /// True if the phoneme has an id
    pub fn contains(&self, phoneme: &str) -> bool {
        self.ids.contains_key(phoneme)
    }

    /// Number of phonemes in the map
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if the map has no phonemes
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Entries in phoneme order
    pub fn iter(&self) -> impl Iterator<Item = (&str, PhonemeId)> {
        self.ids.iter().map(|(p, &id)| (p.as_str(), id))
    }

    /// Map phonemes to ids, skipping (and counting) phonemes with no id.
    pub fn map_phonemes<P: AsRef<str>>(&self, phonemes: &[P], config: &PhonemeIdConfig) -> PhonemeIds {
        let mut result = PhonemeIds {
            ids: Vec::with_capacity(phonemes.len() * if config.intersperse_pad { 2 } else { 1 }),
            missing: MissingPhonemes::new(),
        };

        if config.add_bos {
            result.push_symbol(self, &config.bos);
            if config.intersperse_pad {
                result.push_symbol(self, &config.pad);
            }
        }

        for phoneme in phonemes {
            let phoneme = phoneme.as_ref();
            match self.get(phoneme) {
                Some(id) => {
                    result.ids.push(id);
                    if config.intersperse_pad {
                        result.push_symbol(self, &config.pad);
                    }
                }
                None => result.record_missing(phoneme),
            }
        }

        if config.add_eos {
            result.push_symbol(self, &config.eos);
        }

        result
    }
}

impl TryFrom<BTreeMap<Phoneme, PhonemeId>> for PhonemeIdMap {
    type Error = PhonemizeError;

    fn try_from(ids: BTreeMap<Phoneme, PhonemeId>) -> Result<Self> {
        Self::new(ids)
    }
}

impl From<PhonemeIdMap> for BTreeMap<Phoneme, PhonemeId> {
    fn from(map: PhonemeIdMap) -> Self {
        map.ids
    }
}

/// Output of id mapping: ids in input order plus the phonemes that had none
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhonemeIds {
    pub ids: Vec<PhonemeId>,
    pub missing: MissingPhonemes,
}

impl PhonemeIds {
    fn push_symbol(&mut self, map: &PhonemeIdMap, symbol: &str) {
        match map.get(symbol) {
            Some(id) => self.ids.push(id),
            None => self.record_missing(symbol),
        }
    }

    fn record_missing(&mut self, phoneme: &str) {
        *self.missing.entry(phoneme.to_string()).or_insert(0) += 1;
    }

    /// Total number of phoneme occurrences that had no id
    pub fn missing_count(&self) -> usize {
        self.missing.values().sum()
    }
}

/// Bundled phoneme/id maps: one for espeak-ng phonemes and one per language
/// for codepoint phonemes.
#[derive(Debug, Clone)]
pub struct PhonemeIdRegistry {
    espeak: Arc<PhonemeIdMap>,
    codepoints: BTreeMap<String, Arc<PhonemeIdMap>>,
}

impl PhonemeIdRegistry {
    /// Registry from an espeak map and codepoint maps keyed by language
    pub fn new(espeak: PhonemeIdMap, codepoints: BTreeMap<String, PhonemeIdMap>) -> Self {
        Self {
            espeak: Arc::new(espeak),
            codepoints: codepoints
                .into_iter()
                .map(|(language, map)| (language, Arc::new(map)))
                .collect(),
        }
    }

    /// Build the registry from the maps compiled into the crate
    pub fn bundled() -> Result<Self> {
        let espeak = PhonemeIdMap::from_json(ESPEAK_PHONEME_IDS_JSON)?;

        let alphabets: BTreeMap<String, Vec<Phoneme>> = serde_json::from_str(ALPHABETS_JSON)
            .map_err(|e| PhonemizeError::InvalidIdMap(format!("Failed to parse alphabets: {}", e)))?;

        let mut codepoints = BTreeMap::new();
        for (language, symbols) in alphabets {
            let map = PhonemeIdMap::from_symbols(symbols).map_err(|e| {
                PhonemizeError::InvalidIdMap(format!("alphabet '{}': {}", language, e))
            })?;
            codepoints.insert(language, map);
        }

        debug!(
            "Built phoneme/id registry: {} espeak phonemes, {} codepoint languages",
            espeak.len(),
            codepoints.len()
        );

        Ok(Self::new(espeak, codepoints))
    }

    /// Map for espeak-ng IPA phonemes
    pub fn espeak_map(&self) -> &Arc<PhonemeIdMap> {
        &self.espeak
    }

    /// Every codepoint map, keyed by language
    pub fn codepoints_maps(&self) -> &BTreeMap<String, Arc<PhonemeIdMap>> {
        &self.codepoints
    }

    /// Codepoint map for a language tag
    pub fn get_map(&self, language: &str) -> Result<Arc<PhonemeIdMap>> {
        self.codepoints
            .get(language)
            .cloned()
            .ok_or_else(|| PhonemizeError::UnsupportedLanguage(language.to_string()))
    }

    /// Languages with a codepoint map, in sorted order
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.codepoints.keys().map(String::as_str)
    }

    /// Map phonemes using the config's map, or the espeak map if it has none
    pub fn phonemes_to_ids<P: AsRef<str>>(
        &self,
        phonemes: &[P],
        config: &PhonemeIdConfig,
    ) -> Result<PhonemeIds> {
        config.validate().map_err(PhonemizeError::InvalidConfig)?;

        let map = config.id_map.as_ref().unwrap_or(&self.espeak);
        let result = map.map_phonemes(phonemes, config);

        if !result.missing.is_empty() {
            debug!(
                "{} of {} phonemes had no id: {:?}",
                result.missing_count(),
                phonemes.len(),
                result.missing
            );
        }

        Ok(result)
    }
}

static REGISTRY: OnceLock<std::result::Result<PhonemeIdRegistry, String>> = OnceLock::new();

/// Process-wide registry of the bundled maps
pub fn registry() -> Result<&'static PhonemeIdRegistry> {
    REGISTRY
        .get_or_init(|| PhonemeIdRegistry::bundled().map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| PhonemizeError::InvalidIdMap(e.clone()))
}

/// Map phonemes to ids with the bundled registry
pub fn phonemes_to_ids<P: AsRef<str>>(phonemes: &[P], config: &PhonemeIdConfig) -> Result<PhonemeIds> {
    registry()?.phonemes_to_ids(phonemes, config)
}
