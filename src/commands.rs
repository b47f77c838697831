//! This module defines the command-line interface for the application using `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line arguments,
//! and a `Commands` enum that represents the available subcommands and their
//! options.
//!
//! # Examples
//!
//! ```no_run
//! use clap::Parser;
//! use awful_rag::commands::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! match cli.command {
//!     Commands::Check => { /* run the consistency checker */ }
//!     Commands::Query { .. } => { /* load the service and search */ }
//!     Commands::Init => { /* write the default config */ }
//! }
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// Configuration file. Defaults to `config.yaml` in the platform config directory.
    #[arg(long, short = 'c', global = true, env = "AWFUL_RAG_CONFIG")]
    pub config: Option<PathBuf>,

    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Verify that the index and metadata files are consistent.
    ///
    /// Exits with a non-zero status if any check fails.
    #[clap(name = "check", alias = "c")]
    Check,

    /// Run a single retrieval and print the ranked documents.
    #[clap(name = "query", alias = "q")]
    Query {
        /// The query text.
        query: String,

        /// Maximum number of documents. Defaults to `default_k` from the config.
        #[arg(short = 'k')]
        k: Option<usize>,
    },

    /// Write a default configuration file.
    Init,
}
