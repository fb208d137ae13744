/// Corpus Trainer — trains a Markov chain from a text corpus and prints sentences.
///
/// Usage: corpus_trainer --input <corpus.txt> [--cache <model.json|csv|ron>]
///                       [--config <generator.ron>] [--seed <n>] [--sentences <n>]
///                       [--words]
///
/// The trained table is cached next to the corpus (`<stem>.model.json` unless
/// `--cache` says otherwise) and reused on later runs. `--words` prints one
/// raw run of `length` states instead of sentences.
use attain::core::codec;
use attain::core::config::GeneratorConfig;
use attain::core::markov::MarkovChain;
use attain::core::tokenize::tokenize_corpus;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tracing::{error, info};

const USAGE: &str = "Usage: corpus_trainer --input <corpus.txt> [--cache <model.json|csv|ron>] \
                     [--config <generator.ron>] [--seed <n>] [--sentences <n>] [--words]";

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();

    let mut input = None;
    let mut cache = None;
    let mut config_path = None;
    let mut seed = None;
    let mut sentences = 1usize;
    let mut words = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" if i + 1 < args.len() => {
                i += 1;
                input = Some(PathBuf::from(&args[i]));
            }
            "--cache" if i + 1 < args.len() => {
                i += 1;
                cache = Some(PathBuf::from(&args[i]));
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(PathBuf::from(&args[i]));
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = Some(args[i].parse::<u64>().unwrap_or_else(|_| {
                    eprintln!("Error: --seed must be a non-negative integer");
                    process::exit(1);
                }));
            }
            "--sentences" if i + 1 < args.len() => {
                i += 1;
                sentences = args[i].parse().unwrap_or_else(|_| {
                    eprintln!("Error: --sentences must be a non-negative integer");
                    process::exit(1);
                });
            }
            "--words" => words = true,
            "--help" | "-h" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("{}", USAGE);
                process::exit(1);
            }
        }
        i += 1;
    }

    let input_path = input.unwrap_or_else(|| {
        eprintln!("Error: --input is required");
        eprintln!("{}", USAGE);
        process::exit(1);
    });

    let config = match config_path {
        Some(path) => GeneratorConfig::load_from_ron(&path).unwrap_or_else(|e| {
            error!("Failed to load config '{}': {}", path.display(), e);
            process::exit(1);
        }),
        None => GeneratorConfig::default(),
    };

    let cache_path = cache.unwrap_or_else(|| default_cache_path(&input_path));
    if cache_path == input_path {
        error!(
            "Cache path '{}' is the corpus itself; pass a different --cache",
            cache_path.display()
        );
        process::exit(1);
    }
    let mut chain = load_or_train(&input_path, &cache_path);
    chain.set_options(config.sampler_options());

    let mut rng = match seed.or(config.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    if words {
        match chain.generate(config.length, None, &mut rng) {
            Ok(states) => println!("{}", states.join(" ")),
            Err(e) => {
                error!("Generation failed: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    for _ in 0..sentences {
        match chain.generate_sentence(
            config.min_sentence_length,
            config.max_sentence_length,
            &mut rng,
        ) {
            Ok(sentence) => println!("{}", sentence),
            Err(e) => {
                error!("Generation failed: {}", e);
                process::exit(1);
            }
        }
    }
}

/// `corpus.txt` caches to `corpus.model.json`, so a `.json` corpus is never
/// overwritten by its own model.
fn default_cache_path(input_path: &Path) -> PathBuf {
    input_path.with_extension("model.json")
}

/// Reuse the cached model when present, otherwise train from the corpus and
/// write the cache.
fn load_or_train(input_path: &Path, cache_path: &Path) -> MarkovChain {
    if cache_path.exists() {
        return codec::load_model(cache_path).unwrap_or_else(|e| {
            error!("Failed to load cached model '{}': {}", cache_path.display(), e);
            process::exit(1);
        });
    }

    let text = std::fs::read_to_string(input_path).unwrap_or_else(|e| {
        error!("Failed to read corpus '{}': {}", input_path.display(), e);
        process::exit(1);
    });
    let tokens = tokenize_corpus(&text);

    let started = Instant::now();
    let mut chain = MarkovChain::new();
    if let Err(e) = chain.train(&tokens) {
        error!("Training on '{}' failed: {}", input_path.display(), e);
        process::exit(1);
    }
    info!(
        tokens = tokens.len(),
        states = chain.len(),
        "Trained in {:?}",
        started.elapsed()
    );

    if let Err(e) = codec::save_model(&chain, cache_path) {
        error!("Failed to write cache '{}': {}", cache_path.display(), e);
        process::exit(1);
    }
    chain
}
