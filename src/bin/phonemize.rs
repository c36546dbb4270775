//! Command line harness for the phonemizers
//!
//! Usage:
//!   cargo run --bin phonemize -- --text "Hello world" --voice en-us
//!   cargo run --bin phonemize -- --mode codepoints --language ar --casing ignore --text "..."
//!   cargo run --bin phonemize -- --dump-maps
//!
//! Prints a JSON report with the phonemes, ids and missing phonemes of each
//! sentence. Set RUST_LOG=debug for engine and cache logging.

use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use ctts_phonemize::config::{CodepointsConfig, EspeakConfig, PhonemeIdConfig};
use ctts_phonemize::phoneme_ids::{self, MissingPhonemes, PhonemeId};
use ctts_phonemize::{codepoints, CasingMode, EspeakNg, EspeakPhonemizer, TashkeelCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Espeak,
    Codepoints,
}

#[derive(Debug)]
struct Args {
    text: Option<String>,
    mode: Mode,
    voice: String,
    language: Option<String>,
    casing: CasingMode,
    data_path: Option<PathBuf>,
    espeak_program: Option<PathBuf>,
    tashkeel_model: Option<String>,
    framed: bool,
    dump_maps: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            text: None,
            mode: Mode::Espeak,
            voice: EspeakConfig::default().voice,
            language: None,
            casing: CasingMode::Ignore,
            data_path: None,
            espeak_program: None,
            tashkeel_model: None,
            framed: false,
            dump_maps: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct SentenceReport {
    phonemes: String,
    ids: Vec<PhonemeId>,
    missing: MissingPhonemes,
}

#[derive(Debug, Serialize)]
struct Report {
    text: String,
    mode: &'static str,
    sentences: Vec<SentenceReport>,
}

fn print_usage() {
    println!("Usage: phonemize [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -t, --text <TEXT>          Text to phonemize (default: read stdin)");
    println!("  -m, --mode <MODE>          espeak | codepoints (default: espeak)");
    println!("  -v, --voice <VOICE>        espeak-ng voice (default: en-us)");
    println!("  -l, --language <LANG>      Codepoint alphabet (required for codepoints mode)");
    println!("  -c, --casing <CASING>      ignore | lower | upper | fold (default: ignore)");
    println!("  --data-path <DIR>          espeak-ng data directory");
    println!("  --espeak <PROGRAM>         espeak-ng program to run");
    println!("  --tashkeel-model <FILE>    Restore Arabic diacritics before phonemizing");
    println!("  --framed                   Add BOS/EOS and pad between phonemes");
    println!("  --dump-maps                Print all phoneme/id maps and exit");
    println!("  -h, --help                 Show this help");
}

fn next_value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .with_context(|| format!("{} requires a value", flag))
}

fn parse_args() -> Result<Option<Args>> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--text" | "-t" => parsed.text = Some(next_value(&args, &mut i, flag)?),
            "--mode" | "-m" => {
                parsed.mode = match next_value(&args, &mut i, flag)?.as_str() {
                    "espeak" => Mode::Espeak,
                    "codepoints" => Mode::Codepoints,
                    other => bail!("Unknown mode: {}", other),
                }
            }
            "--voice" | "-v" => parsed.voice = next_value(&args, &mut i, flag)?,
            "--language" | "-l" => parsed.language = Some(next_value(&args, &mut i, flag)?),
            "--casing" | "-c" => parsed.casing = next_value(&args, &mut i, flag)?.parse()?,
            "--data-path" => parsed.data_path = Some(next_value(&args, &mut i, flag)?.into()),
            "--espeak" => parsed.espeak_program = Some(next_value(&args, &mut i, flag)?.into()),
            "--tashkeel-model" => parsed.tashkeel_model = Some(next_value(&args, &mut i, flag)?),
            "--framed" => parsed.framed = true,
            "--dump-maps" => parsed.dump_maps = true,
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            _ => {
                print_usage();
                bail!("Unknown argument: {}", flag);
            }
        }
        i += 1;
    }

    Ok(Some(parsed))
}

fn dump_maps() -> Result<()> {
    let registry = phoneme_ids::registry()?;
    let maps = serde_json::json!({
        "max_phonemes": phoneme_ids::MAX_PHONEMES,
        "espeak": registry.espeak_map(),
        "codepoints": registry.codepoints_maps(),
    });
    println!("{}", serde_json::to_string_pretty(&maps)?);
    Ok(())
}

fn run(args: Args) -> Result<()> {
    if args.dump_maps {
        return dump_maps();
    }

    let mut text = match args.text {
        Some(text) => text,
        None => std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?,
    };

    if let Some(model) = &args.tashkeel_model {
        text = TashkeelCache::default().restore(model, &text)?;
    }

    let registry = phoneme_ids::registry()?;
    let (sentences, id_config) = match args.mode {
        Mode::Espeak => {
            let program = args
                .espeak_program
                .unwrap_or_else(|| EspeakConfig::default().program);
            let phonemizer = EspeakPhonemizer::new(EspeakNg::new(program));
            let sentences = phonemizer.phonemize(
                &text,
                &EspeakConfig::with_voice(args.voice),
                args.data_path.as_deref(),
            )?;
            (sentences, PhonemeIdConfig::default())
        }
        Mode::Codepoints => {
            let Some(language) = args.language.as_deref() else {
                bail!("--language is required for codepoints mode");
            };
            let map = registry.get_map(language)?;
            let sentences =
                codepoints::phonemize_codepoints(&text, &CodepointsConfig::with_casing(args.casing));
            (sentences, PhonemeIdConfig::with_map(map))
        }
    };
    let id_config = if args.framed { id_config.framed() } else { id_config };

    let mut report = Report {
        text,
        mode: match args.mode {
            Mode::Espeak => "espeak",
            Mode::Codepoints => "codepoints",
        },
        sentences: Vec::with_capacity(sentences.len()),
    };

    for phonemes in sentences {
        let ids = registry.phonemes_to_ids(&phonemes, &id_config)?;
        report.sentences.push(SentenceReport {
            phonemes: phonemes.concat(),
            ids: ids.ids,
            missing: ids.missing,
        });
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() {
    env_logger::init();

    let result = parse_args().and_then(|args| match args {
        Some(args) => run(args),
        None => Ok(()),
    });

    if let Err(e) = result {
        eprintln!("ERROR: {:#}", e);
        process::exit(1);
    }
}
