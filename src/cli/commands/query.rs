//! `query` command — answers a natural-language question about an indexed repository.

use std::path::PathBuf;
use std::process::ExitCode;

use crate::cli::build_engine;
use crate::config::EngineConfig;

pub struct QueryArgs {
    pub question: Vec<String>,
    pub repo: Option<PathBuf>,
    pub json: bool,
    pub config_path: Option<PathBuf>,
}

pub async fn run(args: QueryArgs) -> ExitCode {
    let question = args.question.join(" ");
    if question.trim().is_empty() {
        eprintln!("query: no question given");
        return ExitCode::FAILURE;
    }

    let config = match args.config_path.as_ref() {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    }
    .unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        EngineConfig::default()
    });

    let engine = build_engine(config);

    if let Some(repo) = &args.repo {
        if let Err(e) = engine.index(repo, false, false).await {
            eprintln!("failed to index {}: {e}", repo.display());
            return ExitCode::FAILURE;
        }
    }

    match engine.query(&question).await {
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
                println!("{}", result.answer);
                println!(
                    "\n(confidence={} rounds={} stop_reason={})",
                    result.confidence, result.rounds, result.stop_reason
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("query failed: {e}");
            ExitCode::FAILURE
        }
    }
}
