//! Compile prompt templates, resolve slots and compress text from the
//! command line.
//!
//! Logs go to stderr; results are printed to stdout as JSON.
//!
//! # Examples
//!
//! ```sh
//! # Compile a request ({template, values, injectionStrategy, compressionStrategy?, options?})
//! promptloom compile request.json
//!
//! # Only the compiled prompt
//! promptloom compile request.json --prompt-only
//!
//! # Resolve slot values without compiling
//! promptloom resolve request.json
//!
//! # Compress stdin with a strategy file
//! cat notes.md | promptloom compress --strategy hybrid.json --target-ratio 0.6
//!
//! # Validate an export document
//! promptloom check-export export.json
//!
//! # Debug logging and a custom engine config
//! PROMPTLOOM_LOG=promptloom=trace promptloom --config engine.json compile request.json
//! ```

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use promptloom::compiler::{CompileConfig, PromptCompiler};
use promptloom::compress::{CompressOptions, Compressor};
use promptloom::config::EngineConfig;
use promptloom::error::EngineError;
use promptloom::export::{self, ConfigExport};
use promptloom::model::CompressionStrategy;
use promptloom::resolver::{ResolveOptions, SlotResolver};
use promptloom::value::SlotValues;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Prompt compilation engine.
#[derive(Parser)]
#[command(name = "promptloom", version)]
struct Cli {
    /// Engine configuration file (JSON); defaults apply when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a request and print the preview
    Compile {
        /// Request file
        request: PathBuf,

        /// Print only the compiled prompt
        #[arg(long)]
        prompt_only: bool,
    },

    /// Resolve slot values and print the resolution report
    Resolve {
        /// Request file
        request: PathBuf,
    },

    /// Compress text and print the result
    Compress {
        /// Text file to compress (stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Compression strategy file
        #[arg(long)]
        strategy: PathBuf,

        /// Override the strategy's target ratio
        #[arg(long)]
        target_ratio: Option<f64>,
    },

    /// Print the JSON Schema of export documents
    Schema,

    /// Validate an export document
    CheckExport {
        file: PathBuf,
    },
}

/// A compile configuration plus the caller's slot values.
#[derive(Deserialize)]
struct CompileRequest {
    #[serde(flatten)]
    config: CompileConfig,
    #[serde(default)]
    values: SlotValues,
}

// ── Helpers ────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("PROMPTLOOM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_text(path: &Path) -> Result<String, EngineError> {
    std::fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, EngineError> {
    Ok(serde_json::from_str(&read_text(path)?)?)
}

fn print_json(value: &impl serde::Serialize) -> Result<(), EngineError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── Commands ───────────────────────────────────────────────────────

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Compile {
            request,
            prompt_only,
        } => {
            let request: CompileRequest = read_json(&request)?;
            let compiler = PromptCompiler::new(config)?;
            let preview = compiler
                .compile_config(&request.config, &request.values)
                .await?;
            if prompt_only {
                println!("{}", preview.compiled_prompt);
            } else {
                print_json(&preview)?;
            }
        }

        Command::Resolve { request } => {
            let request: CompileRequest = read_json(&request)?;
            let resolver = SlotResolver::new(&config)?;
            let options = ResolveOptions::from_strategy(&request.config.injection_strategy)
                .strict(request.config.options.strict);
            let resolved = resolver
                .resolve_slots(
                    &request.config.template.slots,
                    &request.values,
                    &request.config.injection_strategy,
                    &options,
                )
                .await?;
            print_json(&resolved)?;
        }

        Command::Compress {
            input,
            strategy,
            target_ratio,
        } => {
            let text = match input {
                Some(path) => read_text(&path)?,
                None => {
                    let mut buf = String::new();
                    io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let strategy: CompressionStrategy = read_json(&strategy)?;
            let mut options = CompressOptions::default();
            if let Some(ratio) = target_ratio {
                options = options.with_target_ratio(ratio);
            }
            let result = Compressor::new().compress(&text, &strategy, &options)?;
            print_json(&result)?;
        }

        Command::Schema => print_json(&export::json_schema())?,

        Command::CheckExport { file } => {
            let document = ConfigExport::from_json(&read_text(&file)?)?;
            eprintln!(
                "ok: export v{} from {}",
                document.metadata.version, document.metadata.exported_at
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
