use bitsleuth_core::config::{BitsleuthConfig, CorpusSettings};
use bitsleuth_core::corpus::{CorpusFormat, MessageCorpus};
use bitsleuth_core::format_finder::FormatFinder;
use bitsleuth_core::generator::{FieldSpec, MessageTypeSpec, ProtocolGenerator};
use bitsleuth_core::range::CommonRangeContainer;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "bitsleuth")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    config_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Infer message types and field layouts from a capture
    Infer {
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// bits, hex or json
        #[arg(short, long)]
        format: Option<CorpusFormat>,
        #[arg(long)]
        shortest_field_length: Option<usize>,
        /// Print message types as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Write a synthetic capture with a known layout
    Generate {
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, default_value_t = 30)]
        messages: usize,
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
        #[arg(short, long, default_value = "bits")]
        format: CorpusFormat,
    },
}

fn init_logging(log_json: bool) {
    let json_logging = log_json
        || std::env::var("BITSLEUTH_LOG_JSON")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("bitsleuth=info")
            .add_directive(tracing::Level::INFO.into())
    });

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

fn load_config(config_file: Option<&Path>) -> Result<BitsleuthConfig, anyhow::Error> {
    match config_file {
        Some(config_path) => {
            info!(path = ?config_path, "loading configuration");
            BitsleuthConfig::load_from_file(config_path)
        }
        None => {
            let default_config_path = PathBuf::from("config.toml");
            if default_config_path.exists() {
                info!(path = ?default_config_path, "loading default configuration");
                BitsleuthConfig::load_from_file(&default_config_path)
            } else {
                debug!("no config.toml found, using built-in defaults");
                Ok(BitsleuthConfig::default())
            }
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let mut config = load_config(cli.config_file.as_deref())?;

    match cli.command {
        Command::Infer {
            corpus,
            format,
            shortest_field_length,
            json,
        } => {
            if let Some(n) = shortest_field_length {
                config.inference.shortest_field_length = n;
            }
            if let Some(path) = corpus {
                let settings = config.corpus.get_or_insert_with(|| CorpusSettings {
                    path: PathBuf::new(),
                    format: CorpusFormat::default(),
                });
                settings.path = path;
            }
            let corpus_settings = config.corpus.as_mut().ok_or_else(|| {
                anyhow::anyhow!("No corpus given: pass --corpus or set [corpus] path in config")
            })?;
            if let Some(format) = format {
                corpus_settings.format = format;
            }
            debug!(config = ?config, "effective configuration");
            run_infer(&config, json)
        }
        Command::Generate {
            output,
            messages,
            seed,
            format,
        } => run_generate(&output, messages, seed, format),
    }
}

fn run_infer(config: &BitsleuthConfig, json: bool) -> Result<(), anyhow::Error> {
    let corpus_settings = config
        .corpus
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Corpus settings missing"))?;
    let corpus = MessageCorpus::load_from_file(&corpus_settings.path, corpus_settings.format)
        .map_err(|e| anyhow::anyhow!("Failed to load corpus {:?}: {}", corpus_settings.path, e))?;
    if corpus.is_empty() {
        anyhow::bail!("Corpus {:?} holds no messages", corpus_settings.path);
    }
    info!(messages = corpus.len(), "corpus loaded");

    let start_time = Instant::now();
    let messages = corpus.into_messages();
    let preprocessor = config.preprocessor.build(messages.len());
    let finder = FormatFinder::new(messages, preprocessor.as_ref(), config.inference_config())?;
    let inference = finder.infer()?;
    info!(elapsed = ?start_time.elapsed(), "inference finished");

    if json {
        println!("{}", serde_json::to_string_pretty(&inference.message_types)?);
    } else {
        print_message_types(&inference.message_types);
    }
    Ok(())
}

fn print_message_types(message_types: &[CommonRangeContainer]) {
    for (i, mt) in message_types.iter().enumerate() {
        let indices: Vec<String> = mt.message_indices.iter().map(usize::to_string).collect();
        println!(
            "Message type {} ({} messages: {})",
            i + 1,
            mt.message_indices.len(),
            indices.join(", ")
        );
        if mt.is_empty() {
            println!("  (no fields found)");
        }
        for rng in mt {
            println!(
                "  {:>5}..{:<5} {:<16} score {:.2}",
                rng.start,
                rng.end(),
                rng.field_type.name(),
                rng.score
            );
        }
    }
}

fn run_generate(
    output: &Path,
    count: usize,
    seed: u64,
    format: CorpusFormat,
) -> Result<(), anyhow::Error> {
    let spec = MessageTypeSpec::new("demo")
        .field(FieldSpec::Preamble { length: 16 })
        .field(FieldSpec::Sync {
            bits: vec![1, 1, 0, 0, 1, 0, 1, 0, 1, 1, 1, 1, 1, 1, 1, 0],
        })
        .field(FieldSpec::SequenceNumber { length: 8 })
        .field(FieldSpec::Length { length: 8 })
        .field(FieldSpec::Address { length: 16 });
    let mut generator = ProtocolGenerator::new(seed)
        .with_participant("alice", 0x1234)
        .with_participant("bob", 0xbeef);

    const DATA_BITS: [usize; 3] = [16, 24, 40];
    for i in 0..count {
        let sender = if i % 2 == 0 { "alice" } else { "bob" };
        generator.generate_message(&spec, DATA_BITS[i % DATA_BITS.len()], Some(sender));
    }

    let corpus: MessageCorpus = generator.into_messages().into_iter().collect();
    corpus
        .save_to_file(output, format)
        .map_err(|e| anyhow::anyhow!("Failed to write corpus {:?}: {}", output, e))?;
    println!("Wrote {} messages to {:?}", corpus.len(), output);
    Ok(())
}
