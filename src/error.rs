//! Crate-wide error taxonomy.
//!
//! Each subsystem gets its own `thiserror` enum; `EngineError` aggregates them
//! at the `Engine` boundary so callers match on one type regardless of which
//! component failed.

use std::path::PathBuf;

use thiserror::Error;

/// Failures from the loader.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("root path does not exist or is not a directory: {path}")]
    PathError { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,
}

/// Failures from the embedder. Persistent failures are not fatal to
/// indexing; they degrade gracefully to BM25-only retrieval.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding request failed after retries: {0}")]
    Persistent(String),

    #[error("embedding endpoint returned {count} vectors for {expected} inputs")]
    OrderMismatch { count: usize, expected: usize },

    #[error("embedding client not configured")]
    NotConfigured,

    #[error("operation cancelled")]
    Cancelled,
}

/// Failures from the LLM client used by the iterative agent and answer
/// generator.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("llm request failed after retries: {0}")]
    Persistent(String),

    #[error("llm client not configured")]
    NotConfigured,

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("operation cancelled")]
    Cancelled,
}

/// Failures from the cache store. `CacheCorruption` is never surfaced
/// to a caller as an error — it is translated into a cache miss.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot at {path} is corrupted: {reason}")]
    Corruption { path: PathBuf, reason: String },
}

/// Top-level error surfaced by `Engine::index` and `Engine::query`.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Loader(LoaderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Llm(LlmError),

    #[error("no repository loaded; run index first")]
    NoRepository,

    #[error("operation cancelled")]
    Cancelled,

    #[error("query exceeded its deadline of {0:?}")]
    DeadlineExceeded(std::time::Duration),
}

impl From<LoaderError> for EngineError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::Cancelled => EngineError::Cancelled,
            other => EngineError::Loader(other),
        }
    }
}

impl From<LlmError> for EngineError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Cancelled => EngineError::Cancelled,
            other => EngineError::Llm(other),
        }
    }
}

impl EngineError {
    /// Short, user-facing suggestions for recovering from this error. Mirrors
    /// the CLI's recovery-hint convention: always at least one suggestion.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            EngineError::Loader(LoaderError::PathError { .. }) => {
                vec!["check the path exists and is a directory"]
            }
            EngineError::Loader(LoaderError::IoError { .. }) => {
                vec!["check file permissions on the repository root"]
            }
            EngineError::Loader(LoaderError::Cancelled) => vec!["retry the operation"],
            EngineError::Storage(StorageError::Corruption { .. }) => {
                vec!["re-run with --force to rebuild the cache"]
            }
            EngineError::Storage(_) => vec!["check the cache directory is writable"],
            EngineError::Llm(LlmError::NotConfigured) => {
                vec!["set OPENAI_API_KEY and MODEL to enable the agent"]
            }
            EngineError::Llm(LlmError::Cancelled) => vec!["retry the operation"],
            EngineError::Llm(_) => vec!["check network connectivity to the LLM endpoint"],
            EngineError::NoRepository => vec!["run `index <path>` before `query`"],
            EngineError::Cancelled => vec!["retry the operation"],
            EngineError::DeadlineExceeded(_) => {
                vec!["increase query_deadline_secs or narrow the question"]
            }
        }
    }
}

pub type LoaderResult<T> = Result<T, LoaderError>;
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
pub type LlmResult<T> = Result<T, LlmError>;
pub type StorageResult<T> = Result<T, StorageError>;
pub type EngineResult<T> = Result<T, EngineError>;
