use std::process::ExitCode;

use clap::Parser;

use codetrace::logging;
use codetrace::EngineConfig;
use codetrace::cli::args::{Cli, Commands};
use codetrace::cli::commands::{completions, index, query, serve};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.config.as_ref() {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    }
    .unwrap_or_default();
    logging::init_with_config(&config.logging);

    match cli.command {
        Commands::Index { repo_path, force, json, no_embeddings, cache_dir, embedding_model } => {
            index::run(index::IndexArgs {
                repo_path,
                force,
                json,
                no_embeddings,
                cache_dir,
                embedding_model,
                config_path: cli.config,
            })
            .await
        }
        Commands::Query { question, repo, json } => {
            query::run(query::QueryArgs { question, repo, json, config_path: cli.config }).await
        }
        Commands::ServeMcp { port, repo } => {
            serve::run(serve::ServeArgs { port, repo, config_path: cli.config }).await
        }
        Commands::Completions { shell } => completions::run(shell),
    }
}
