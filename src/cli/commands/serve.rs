//! `serve-mcp` command — starts the JSON tool-call HTTP endpoint.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::cli::build_engine;
use crate::config::EngineConfig;

pub struct ServeArgs {
    pub port: u16,
    pub repo: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

#[cfg(feature = "http-server")]
pub async fn run(args: ServeArgs) -> ExitCode {
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

    let engine = Arc::new(engine);
    let engine_for_shutdown = engine.clone();

    tokio::select! {
        result = crate::mcp::serve(engine, args.port) => {
            if let Err(e) = result {
                eprintln!("mcp server error: {e}");
                return ExitCode::FAILURE;
            }
        }
        _ = shutdown_signal() => {
            eprintln!("shutting down mcp server");
            engine_for_shutdown.cancel();
        }
    }

    ExitCode::SUCCESS
}

#[cfg(feature = "http-server")]
async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl+c");
}

#[cfg(not(feature = "http-server"))]
pub async fn run(_args: ServeArgs) -> ExitCode {
    eprintln!("serve-mcp requires the \"http-server\" feature, which was not enabled at build time");
    ExitCode::FAILURE
}
