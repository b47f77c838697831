//! Main module for the Awful RAG CLI application (arag).
//!
//! Operator tooling around the retrieval core: checking that a persisted
//! index and its metadata belong together, running ad-hoc queries against
//! them, and writing a starter configuration.
//!
//! # Examples
//!
//! ```sh
//! arag init
//! arag check
//! arag query "How do I bake banana bread?" -k 2
//! arag --config ./rag.yaml check
//! ```

use awful_rag::{
    commands::{Cli, Commands},
    config::{self, RagConfig},
    config_dir, ConsistencyChecker, RetrievalService,
};
use clap::Parser;
use once_cell::sync::OnceCell;
use std::{error::Error, fs, path::PathBuf, process::ExitCode, sync::Arc};
use tracing::{debug, info};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<ExitCode, Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt::init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

/// Parse arguments, resolve the configuration and execute the subcommand.
async fn run() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            debug!("Initializing configuration");
            init()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            let rag_config = resolve_config(cli.config)?;
            let report = ConsistencyChecker::from_config(&rag_config).run();
            println!("\n{report}");
            Ok(if report.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Query { query, k } => {
            let rag_config = resolve_config(cli.config)?;
            let service = Arc::new(RetrievalService::load(&rag_config));
            if let Some(reason) = service.degraded_reason() {
                eprintln!("Retrieval is unavailable: {reason}");
                return Ok(ExitCode::FAILURE);
            }

            let k = k.unwrap_or(service.default_k());
            let documents = service.search_async(query, k).await;
            if documents.is_empty() {
                println!("No documents found.");
            }
            for (rank, document) in documents.iter().enumerate() {
                println!("{}. {}", rank + 1, document);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Use `--config`/`AWFUL_RAG_CONFIG` if given, else `config_dir()/config.yaml`,
/// else the built-in defaults.
fn resolve_config(explicit: Option<PathBuf>) -> Result<RagConfig, Box<dyn Error>> {
    let path = match explicit {
        Some(path) => path,
        None => {
            let default_path = config_dir()?.join("config.yaml");
            if !default_path.exists() {
                info!(
                    "No config at {}, using defaults. Run `arag init` to create one.",
                    default_path.display()
                );
                return Ok(RagConfig::default());
            }
            default_path
        }
    };

    debug!("Loading config from: {}", path.display());
    let path = path.to_str().ok_or("config path is not valid UTF-8")?;
    let rag_config = config::load_config(path)?;
    debug!("Config loaded: {:?}", rag_config);
    Ok(rag_config)
}

/// Writes the default configuration to `config_dir()/config.yaml`.
///
/// # Errors
///
/// Returns an error if there is an issue creating the directory or file, or
/// serializing the configuration to YAML.
fn init() -> Result<(), Box<dyn Error>> {
    let config_dir = config_dir()?;
    info!("Creating config directory: {}", config_dir.display());
    fs::create_dir_all(&config_dir)?;

    let config_path = config_dir.join("config.yaml");
    info!("Creating config file: {}", config_path.display());
    let config_yaml = serde_yaml::to_string(&RagConfig::default())?;
    fs::write(config_path, config_yaml)?;

    Ok(())
}
