//! `index` command — builds or refreshes the index for a repository.

use std::path::PathBuf;
use std::process::ExitCode;

use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::build_engine;
use crate::config::EngineConfig;

pub struct IndexArgs {
    pub repo_path: PathBuf,
    pub force: bool,
    pub json: bool,
    pub no_embeddings: bool,
    pub cache_dir: Option<PathBuf>,
    pub embedding_model: Option<String>,
    pub config_path: Option<PathBuf>,
}

pub async fn run(args: IndexArgs) -> ExitCode {
    let mut config = match args.config_path.as_ref() {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    }
    .unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        EngineConfig::default()
    });

    if let Some(cache_dir) = &args.cache_dir {
        config.cache.dir = cache_dir.clone();
    }
    if let Some(model) = &args.embedding_model {
        config.embedding.model = model.clone();
    }

    let engine = build_engine(config);

    let spinner = if args.json {
        None
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
        bar.set_message(format!("indexing {}", args.repo_path.display()));
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(bar)
    };

    let result = engine.index(&args.repo_path, args.force, args.no_embeddings).await;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    match result {
        Ok(result) => {
            if args.json {
                match serde_json::to_string_pretty(&result) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("failed to serialize result: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!(
                    "Indexed {} ({} files, {} elements{})",
                    result.repo_name,
                    result.total_files,
                    result.total_elements,
                    if result.cached { ", from cache" } else { "" }
                );
                println!(
                    "  graphs: dependency={}n/{}e inheritance={}n/{}e call={}n/{}e",
                    result.graph_stats.dependency_nodes,
                    result.graph_stats.dependency_edges,
                    result.graph_stats.inheritance_nodes,
                    result.graph_stats.inheritance_edges,
                    result.graph_stats.call_nodes,
                    result.graph_stats.call_edges,
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("index failed: {e}");
            ExitCode::FAILURE
        }
    }
}
