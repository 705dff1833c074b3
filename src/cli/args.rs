//! CLI argument parsing: `Cli`, `Commands`, and the completion-shell enum.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Codebase intelligence engine.
#[derive(Parser)]
#[command(
    name = "codetrace",
    version = env!("CARGO_PKG_VERSION"),
    about = "Multi-language code intelligence: parsing, relationship graphs, hybrid retrieval.",
    long_about = "Index a repository into searchable code elements and relationship graphs, \
                  then answer natural-language questions with an LLM-driven retrieval agent."
)]
pub struct Cli {
    /// Path to a TOML config file (overrides the default workspace lookup).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build or refresh the index for a repository.
    Index {
        /// Path to the repository root.
        repo_path: PathBuf,

        /// Re-index even if a valid cache entry exists.
        #[arg(short, long)]
        force: bool,

        /// Print the result as JSON instead of a summary line.
        #[arg(long)]
        json: bool,

        /// Skip embedding generation (BM25-only retrieval).
        #[arg(long)]
        no_embeddings: bool,

        /// Override the configured cache directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Override the configured embedding model.
        #[arg(long)]
        embedding_model: Option<String>,
    },

    /// Ask a natural-language question about an indexed repository.
    Query {
        /// The question, as one or more words (joined with spaces).
        question: Vec<String>,

        /// Index this repository first, then query it.
        #[arg(long)]
        repo: Option<PathBuf>,

        /// Print the result as JSON instead of rendered markdown.
        #[arg(long)]
        json: bool,
    },

    /// Start the JSON tool-call HTTP endpoint server.
    #[command(name = "serve-mcp")]
    ServeMcp {
        /// Port to listen on.
        #[arg(long, default_value_t = 9999)]
        port: u16,

        /// Index this repository on startup before accepting requests.
        #[arg(long)]
        repo: Option<PathBuf>,
    },

    /// Generate and install shell completions.
    Completions {
        /// Shell to generate completions for (defaults to the detected shell).
        #[arg(value_enum)]
        shell: Option<CompletionShell>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
