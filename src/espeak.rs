//! espeak-ng phonemizer
//!
//! [`EspeakNg`] runs the system `espeak-ng` program to turn text into IPA.
//! [`EspeakPhonemizer`] wraps any [`G2pEngine`] with one-time
//! initialization: the first call initializes the engine with its data path,
//! later calls reuse it and ignore whatever data path they pass.
//!
//! `espeak-ng --ipa` does not print punctuation, so input is split into
//! clauses first ([`split_clauses`]) and each clause's closing punctuation is
//! appended to its phonemes ([`assemble_sentences`]). That keeps `,` `.` `?`
//! and friends available to the id map.
//!
//! Requires espeak-ng to be installed:
//! - macOS: `brew install espeak-ng`
//! - Linux: `apt-get install espeak-ng`

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use log::{debug, info};
use parking_lot::Mutex;
use regex::Regex;

use crate::config::{EspeakConfig, PhonemeMap};
use crate::error::{PhonemizeError, Result};
use crate::phoneme_ids::Phoneme;

/// A grapheme-to-phoneme engine that needs one-time global setup.
pub trait G2pEngine: Send + Sync {
    /// Prepare the engine. Called at most once per [`EspeakPhonemizer`].
    fn initialize(&self, data_path: Option<&Path>) -> Result<()>;

    /// Convert text to phonemes, one inner sequence per sentence as the
    /// engine itself splits them.
    fn phonemize(&self, text: &str, voice: &str) -> Result<Vec<Vec<Phoneme>>>;

    fn name(&self) -> &'static str;
}

/// espeak-ng invoked as a subprocess
pub struct EspeakNg {
    program: PathBuf,
    data_path: OnceLock<Option<PathBuf>>,
}

impl EspeakNg {
    /// Engine running `program`; no data path until [`G2pEngine::initialize`]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            data_path: OnceLock::new(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(Some(path)) = self.data_path.get() {
            command.arg(format!("--path={}", path.display()));
        }
        command
    }
}

impl Default for EspeakNg {
    fn default() -> Self {
        Self::new(EspeakConfig::default().program)
    }
}

impl G2pEngine for EspeakNg {
    fn initialize(&self, data_path: Option<&Path>) -> Result<()> {
        if let Some(path) = data_path {
            if !path.is_dir() {
                return Err(PhonemizeError::EngineInitialization(format!(
                    "data path {} is not a directory",
                    path.display()
                )));
            }
        }

        if self.data_path.set(data_path.map(Path::to_path_buf)).is_err() {
            return Err(PhonemizeError::EngineInitialization(
                "engine was already initialized".to_string(),
            ));
        }

        let output = self.command().arg("--version").output().map_err(|e| {
            PhonemizeError::EngineInitialization(format!(
                "Failed to run {}. Is it installed? Error: {}",
                self.program.display(),
                e
            ))
        })?;

        if !output.status.success() {
            return Err(PhonemizeError::EngineInitialization(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        info!(
            "Initialized {}",
            String::from_utf8_lossy(&output.stdout).lines().next().unwrap_or("espeak-ng")
        );
        Ok(())
    }

    fn phonemize(&self, text: &str, voice: &str) -> Result<Vec<Vec<Phoneme>>> {
        // `--ipa` drops punctuation, so each clause is run on its own and its
        // terminator is put back afterwards
        let clauses = split_clauses(text)?;
        assemble_sentences(&clauses, |clause| {
            let output = self.run_ipa(clause, voice)?;
            let lines = parse_ipa_output(&output)?;
            let mut phonemes = Vec::new();
            for (i, line) in lines.into_iter().enumerate() {
                if i > 0 {
                    phonemes.push(" ".to_string());
                }
                phonemes.extend(line);
            }
            Ok(phonemes)
        })
    }

    fn name(&self) -> &'static str {
        "EspeakNG"
    }
}

impl EspeakNg {
    /// Raw `--ipa` output for one piece of text
    fn run_ipa(&self, text: &str, voice: &str) -> Result<String> {
        // Text goes through stdin so input starting with '-' is never read as a flag
        let mut child = self
            .command()
            .args(["-q", "--ipa", "--stdin", "-v", voice])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PhonemizeError::EngineInference(format!("Failed to run espeak-ng: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PhonemizeError::EngineInference("espeak-ng stdin unavailable".to_string()))?;
        let input = text.to_string();
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|e| PhonemizeError::EngineInference(format!("espeak-ng did not finish: {}", e)))?;

        let written = writer.join();

        if !output.status.success() {
            return Err(PhonemizeError::EngineInference(format!(
                "espeak-ng failed for voice '{}': {}",
                voice,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(PhonemizeError::EngineInference(format!(
                    "Failed to send text to espeak-ng: {}",
                    e
                )))
            }
            Err(_) => {
                return Err(PhonemizeError::EngineInference(
                    "espeak-ng input writer panicked".to_string(),
                ))
            }
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

type CachedRegex = OnceLock<std::result::Result<Regex, regex::Error>>;

fn cached_regex(cell: &'static CachedRegex, pattern: &str) -> Result<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|e| PhonemizeError::EngineInference(format!("Invalid pattern {}: {}", pattern, e)))
}

fn language_switch_regex() -> Result<&'static Regex> {
    static RE: CachedRegex = OnceLock::new();
    // Markers such as "(en)" or "(fr-fr)" around words spoken in another language
    cached_regex(&RE, r"\([a-z]{2,3}(?:-[a-z0-9]+)*\)")
}

fn clause_boundary_regex() -> Result<&'static Regex> {
    static RE: CachedRegex = OnceLock::new();
    // Punctuation only ends a clause when followed by whitespace or the end of
    // text, so "3.5" stays one clause
    cached_regex(&RE, r"([.,!?:;])[.,!?:;]*(?:\s+|$)")
}

/// Punctuation that ends a sentence rather than just a clause
const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// A clause of input text and the punctuation that closed it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clause<'a> {
    pub text: &'a str,
    pub terminator: Option<char>,
}

/// Split text into clauses at `. , ! ? : ;` followed by whitespace or end of
/// text. Runs like "..." or "?!" count as one terminator, their first char.
pub fn split_clauses(text: &str) -> Result<Vec<Clause<'_>>> {
    let re = clause_boundary_regex()?;
    let mut clauses = Vec::new();
    let mut last = 0;

    for caps in re.captures_iter(text) {
        let (Some(whole), Some(punct)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        clauses.push(Clause {
            text: &text[last..whole.start()],
            terminator: punct.as_str().chars().next(),
        });
        last = whole.end();
    }

    let rest = &text[last..];
    if !rest.trim().is_empty() {
        clauses.push(Clause {
            text: rest,
            terminator: None,
        });
    }

    Ok(clauses)
}

/// Join per-clause phonemes into sentences.
///
/// Each clause keeps its terminator as a phoneme. `, : ;` are followed by a
/// space and continue the sentence; `. ! ?` close it. A trailing clause with
/// no terminator forms the last sentence.
pub fn assemble_sentences<F>(clauses: &[Clause<'_>], mut phonemize_clause: F) -> Result<Vec<Vec<Phoneme>>>
where
    F: FnMut(&str) -> Result<Vec<Phoneme>>,
{
    let mut sentences = Vec::new();
    let mut current: Vec<Phoneme> = Vec::new();

    for clause in clauses {
        let text = clause.text.trim();
        if !text.is_empty() {
            current.extend(phonemize_clause(text)?);
        }

        match clause.terminator {
            Some(t) if SENTENCE_TERMINATORS.contains(&t) => {
                current.push(t.to_string());
                sentences.push(std::mem::take(&mut current));
            }
            Some(t) => {
                current.push(t.to_string());
                current.push(" ".to_string());
            }
            None => {}
        }
    }

    if current.last().is_some_and(|p| p == " ") {
        current.pop();
    }
    if !current.is_empty() {
        sentences.push(current);
    }

    Ok(sentences)
}

/// Split espeak-ng `--ipa` output into per-line codepoint phonemes.
///
/// Blank lines are dropped.
pub fn parse_ipa_output(output: &str) -> Result<Vec<Vec<Phoneme>>> {
    let re = language_switch_regex()?;
    Ok(output
        .lines()
        .map(|line| re.replace_all(line, ""))
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                None
            } else {
                Some(line.chars().map(String::from).collect())
            }
        })
        .collect())
}

fn apply_phoneme_map(sentences: Vec<Vec<Phoneme>>, map: &PhonemeMap) -> Vec<Vec<Phoneme>> {
    sentences
        .into_iter()
        .map(|sentence| {
            let mut mapped = Vec::with_capacity(sentence.len());
            for phoneme in sentence {
                match map.get(&phoneme) {
                    Some(replacement) => mapped.extend(replacement.iter().cloned()),
                    None => mapped.push(phoneme),
                }
            }
            mapped
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InitState {
    Uninitialized,
    Ready,
    /// Initialization failed; the reason is returned on every later call
    Failed(String),
}

/// Phonemizer that initializes its engine exactly once
pub struct EspeakPhonemizer<E: G2pEngine = EspeakNg> {
    engine: E,
    state: Mutex<InitState>,
}

impl<E: G2pEngine> EspeakPhonemizer<E> {
    /// Wrap an engine; it is initialized by the first [`Self::phonemize`] call
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: Mutex::new(InitState::Uninitialized),
        }
    }

    /// The wrapped engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// True once initialization has succeeded
    pub fn is_initialized(&self) -> bool {
        *self.state.lock() == InitState::Ready
    }

    fn ensure_initialized(&self, data_path: Option<&Path>) -> Result<()> {
        // Held across initialize() so no caller can use a half-initialized engine
        let mut state = self.state.lock();
        match &*state {
            InitState::Ready => return Ok(()),
            InitState::Failed(reason) => {
                return Err(PhonemizeError::EngineInitialization(reason.clone()))
            }
            InitState::Uninitialized => {}
        }

        debug!("Initializing {} (data path: {:?})", self.engine.name(), data_path);
        match self.engine.initialize(data_path) {
            Ok(()) => {
                *state = InitState::Ready;
                Ok(())
            }
            Err(e) => {
                let reason = match e {
                    PhonemizeError::EngineInitialization(reason) => reason,
                    other => other.to_string(),
                };
                *state = InitState::Failed(reason.clone());
                Err(PhonemizeError::EngineInitialization(reason))
            }
        }
    }

    /// Phonemize text, initializing the engine with `data_path` on first use.
    pub fn phonemize(
        &self,
        text: &str,
        config: &EspeakConfig,
        data_path: Option<&Path>,
    ) -> Result<Vec<Vec<Phoneme>>> {
        config.validate().map_err(PhonemizeError::InvalidConfig)?;
        self.ensure_initialized(data_path)?;

        let sentences = self.engine.phonemize(text, &config.voice)?;
        debug!(
            "{} produced {} sentence(s) for voice '{}'",
            self.engine.name(),
            sentences.len(),
            config.voice
        );

        Ok(match &config.phoneme_map {
            Some(map) => apply_phoneme_map(sentences, map),
            None => sentences,
        })
    }
}

impl Default for EspeakPhonemizer<EspeakNg> {
    fn default() -> Self {
        Self::new(EspeakNg::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Splits on '.' and emits lowercase codepoints
    #[derive(Default)]
    struct FakeEngine {
        init_calls: AtomicUsize,
        fail_init: bool,
        data_paths: Mutex<Vec<Option<PathBuf>>>,
    }

    impl G2pEngine for FakeEngine {
        fn initialize(&self, data_path: Option<&Path>) -> Result<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            self.data_paths.lock().push(data_path.map(Path::to_path_buf));
            thread::sleep(Duration::from_millis(20));
            if self.fail_init {
                return Err(PhonemizeError::EngineInitialization("bad data path".to_string()));
            }
            Ok(())
        }

        fn phonemize(&self, text: &str, voice: &str) -> Result<Vec<Vec<Phoneme>>> {
            if voice == "missing" {
                return Err(PhonemizeError::EngineInference(format!("no voice {}", voice)));
            }
            Ok(text
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_lowercase().chars().map(String::from).collect())
                .collect())
        }

        fn name(&self) -> &'static str {
            "Fake"
        }
    }

    #[test]
    fn test_initializes_once_with_first_path() {
        let phonemizer = EspeakPhonemizer::new(FakeEngine::default());
        let config = EspeakConfig::default();

        assert!(!phonemizer.is_initialized());
        let first = phonemizer.phonemize("Hi. Yo", &config, Some(Path::new("/first"))).unwrap();
        let second = phonemizer.phonemize("Ok", &config, Some(Path::new("/second"))).unwrap();

        assert_eq!(first, vec![vec!["h", "i"], vec!["y", "o"]]);
        assert_eq!(second, vec![vec!["o", "k"]]);
        assert!(phonemizer.is_initialized());
        assert_eq!(phonemizer.engine().init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*phonemizer.engine().data_paths.lock(), vec![Some(PathBuf::from("/first"))]);
    }

    #[test]
    fn test_concurrent_first_calls_initialize_once() {
        let phonemizer = EspeakPhonemizer::new(FakeEngine::default());
        let config = EspeakConfig::default();

        thread::scope(|s| {
            for i in 0..8 {
                let phonemizer = &phonemizer;
                let config = &config;
                s.spawn(move || {
                    let text = format!("abc{}", i);
                    let result = phonemizer.phonemize(&text, config, None).unwrap();
                    assert_eq!(result[0].len(), 4);
                });
            }
        });

        assert_eq!(phonemizer.engine().init_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_init_is_not_retried() {
        let phonemizer = EspeakPhonemizer::new(FakeEngine {
            fail_init: true,
            ..FakeEngine::default()
        });
        let config = EspeakConfig::default();

        for path in ["/bad", "/good"] {
            let err = phonemizer.phonemize("a", &config, Some(Path::new(path))).unwrap_err();
            assert!(matches!(err, PhonemizeError::EngineInitialization(ref r) if r == "bad data path"));
        }
        assert!(!phonemizer.is_initialized());
        assert_eq!(phonemizer.engine().init_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_inference_error_keeps_engine_usable() {
        let phonemizer = EspeakPhonemizer::new(FakeEngine::default());

        let err = phonemizer
            .phonemize("a", &EspeakConfig::with_voice("missing"), None)
            .unwrap_err();
        assert!(matches!(err, PhonemizeError::EngineInference(_)));

        let ok = phonemizer.phonemize("a", &EspeakConfig::default(), None).unwrap();
        assert_eq!(ok, vec![vec!["a"]]);
    }

    #[test]
    fn test_invalid_voice_rejected_before_init() {
        let phonemizer = EspeakPhonemizer::new(FakeEngine::default());
        let err = phonemizer
            .phonemize("a", &EspeakConfig::with_voice(""), None)
            .unwrap_err();
        assert!(matches!(err, PhonemizeError::InvalidConfig(_)));
        assert_eq!(phonemizer.engine().init_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_phoneme_map_applied() {
        let phonemizer = EspeakPhonemizer::new(FakeEngine::default());
        let mut config = EspeakConfig::default();
        config.phoneme_map = Some(PhonemeMap::from([("c".to_string(), vec!["k".to_string()])]));

        let result = phonemizer.phonemize("cab", &config, None).unwrap();
        assert_eq!(result, vec![vec!["k", "a", "b"]]);
    }

    #[test]
    fn test_parse_ipa_output() {
        let output = " həlˈoʊ wˈɜːld\n\n (fr)bɔ̃ʒˈuʁ(en) ðɛɹ\n";
        let parsed = parse_ipa_output(output).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].concat(), "həlˈoʊ wˈɜːld");
        assert_eq!(parsed[1].concat(), "bɔ̃ʒˈuʁ ðɛɹ");
        assert!(parsed.iter().flatten().all(|p| p.chars().count() == 1));
    }

    /// Stands in for one espeak-ng run per clause
    fn fake_clause_ipa(clause: &str) -> Result<Vec<Phoneme>> {
        let ipa = match clause {
            "Hello" => "həlˈoʊ",
            "world" => "wˈɜːld",
            "How are you" => "hˈaʊ ɑːɹ juː",
            other => other,
        };
        Ok(ipa.chars().map(String::from).collect())
    }

    #[test]
    fn test_split_clauses() {
        let clauses = split_clauses("Hello, world. It costs 3.5 euros!? Fine").unwrap();
        let found: Vec<_> = clauses.iter().map(|c| (c.text, c.terminator)).collect();

        assert_eq!(
            found,
            vec![
                ("Hello", Some(',')),
                ("world", Some('.')),
                ("It costs 3.5 euros", Some('!')),
                ("Fine", None),
            ]
        );
        assert!(split_clauses("").unwrap().is_empty());
        assert!(split_clauses("  \n").unwrap().is_empty());
    }

    #[test]
    fn test_punctuation_survives_to_ids() {
        let clauses = split_clauses("Hello, world.").unwrap();
        let sentences = assemble_sentences(&clauses, fake_clause_ipa).unwrap();

        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].concat(), "həlˈoʊ, wˈɜːld.");

        let ids = crate::phoneme_ids::phonemes_to_ids(&sentences[0], &Default::default()).unwrap();
        assert!(ids.ids.contains(&8), "comma id missing: {:?}", ids.ids);
        assert!(ids.ids.contains(&10), "period id missing: {:?}", ids.ids);
        assert_eq!(ids.ids.last(), Some(&10));
    }

    #[test]
    fn test_sentence_terminators_split_sentences() {
        let clauses = split_clauses("Hello. How are you? world").unwrap();
        let sentences = assemble_sentences(&clauses, fake_clause_ipa).unwrap();

        let joined: Vec<String> = sentences.iter().map(|s| s.concat()).collect();
        assert_eq!(joined, vec!["həlˈoʊ.", "hˈaʊ ɑːɹ juː?", "wˈɜːld"]);
    }

    #[test]
    fn test_clause_errors_propagate() {
        let clauses = split_clauses("a, b").unwrap();
        let err = assemble_sentences(&clauses, |_| {
            Err(PhonemizeError::EngineInference("boom".to_string()))
        })
        .unwrap_err();
        assert!(matches!(err, PhonemizeError::EngineInference(_)));
    }

    #[test]
    fn test_missing_data_dir_fails_init() {
        let engine = EspeakNg::new("espeak-ng");
        let err = engine
            .initialize(Some(Path::new("/definitely/not/a/dir")))
            .unwrap_err();
        assert!(matches!(err, PhonemizeError::EngineInitialization(_)));
    }

    #[test]
    #[ignore = "Requires espeak-ng to be installed"]
    fn test_espeak_hello_world() {
        let phonemizer = EspeakPhonemizer::default();
        let result = phonemizer
            .phonemize("Hello world. How are you?", &EspeakConfig::default(), None)
            .unwrap();
        assert!(!result.is_empty());
        assert_eq!(result[0].last().map(String::as_str), Some("."));
        println!("{:?}", result);
    }
}
