//! Embedder — batches text into groups and submits one remote call per
//! batch to a configured embedding endpoint (`EMBEDDING_URL`/
//! `EMBEDDING_MODEL`), retrying transient failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{EmbeddingError, EmbeddingResult};

pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_MAX_CONCURRENT_EMBEDDINGS: usize = 4;
const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(250);

/// Implemented by any remote or local embedding backend. Order of the
/// returned vectors must match the order of `texts`. `cancel` is checked
/// between batches; an already-cancelled token fails fast.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String], cancel: &CancellationToken) -> EmbeddingResult<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponseItem {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingResponseItem>,
}

/// Calls a remote embedding endpoint (`EMBEDDING_URL`) with a configured
/// model name, batching inputs and retrying transient (5xx/timeout)
/// failures with jittered exponential backoff.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    batch_size: usize,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(endpoint: String, model: String, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
            batch_size: DEFAULT_BATCH_SIZE,
            dimension,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    async fn embed_batch(&self, batch: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        embed_batch_with(&self.client, &self.endpoint, &self.model, batch).await
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    /// Dispatches batches concurrently, bounded by
    /// `DEFAULT_MAX_CONCURRENT_EMBEDDINGS` in-flight requests at a time. A
    /// batch's position in the output always matches its position in
    /// `texts`, regardless of which batch's request completes first.
    /// `cancel` firing aborts every in-flight batch and fails the call.
    async fn embed(&self, texts: &[String], cancel: &CancellationToken) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(EmbeddingError::Cancelled);
        }

        let chunks: Vec<Vec<String>> = texts.chunks(self.batch_size).map(|c| c.to_vec()).collect();
        let semaphore = Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_EMBEDDINGS));
        let mut join_set = tokio::task::JoinSet::new();

        for (index, chunk) in chunks.iter().cloned().enumerate() {
            let client = self.client.clone();
            let endpoint = self.endpoint.clone();
            let model = self.model.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                (index, embed_batch_with(&client, &endpoint, &model, &chunk).await)
            });
        }

        let mut ordered: Vec<Option<Vec<Vec<f32>>>> = vec![None; chunks.len()];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    return Err(EmbeddingError::Cancelled);
                }
                joined = join_set.join_next() => {
                    let Some(joined) = joined else { break };
                    let (index, outcome) = joined.expect("embedding task panicked");
                    let chunk_len = chunks[index].len();
                    let vectors = match outcome {
                        Ok(vectors) => vectors,
                        Err(err) => {
                            tracing::warn!(error = %err, "embedding batch failed persistently, skipping");
                            std::iter::repeat_with(Vec::new).take(chunk_len).collect()
                        }
                    };
                    ordered[index] = Some(vectors);
                }
            }
        }

        let results: Vec<Vec<f32>> = ordered.into_iter().flatten().flatten().collect();

        if results.len() != texts.len() {
            return Err(EmbeddingError::OrderMismatch { count: results.len(), expected: texts.len() });
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

async fn embed_batch_with(
    client: &reqwest::Client,
    endpoint: &str,
    model: &str,
    batch: &[String],
) -> EmbeddingResult<Vec<Vec<f32>>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let request = EmbeddingRequest { model, input: batch };
        let result = client.post(endpoint).json(&request).send().await;

        match result {
            Ok(response) if response.status().is_success() => {
                let parsed: EmbeddingResponse =
                    response.json().await.map_err(|e| EmbeddingError::Persistent(e.to_string()))?;
                let mut ordered = vec![Vec::new(); batch.len()];
                for item in parsed.data {
                    if item.index < ordered.len() {
                        ordered[item.index] = item.embedding;
                    }
                }
                return Ok(ordered);
            }
            Ok(response) if response.status().is_server_error() && attempt < MAX_ATTEMPTS => {
                backoff(attempt).await;
                continue;
            }
            Ok(response) => {
                return Err(EmbeddingError::Persistent(format!(
                    "embedding endpoint returned {}",
                    response.status()
                )));
            }
            Err(e) if e.is_timeout() && attempt < MAX_ATTEMPTS => {
                backoff(attempt).await;
                continue;
            }
            Err(e) => return Err(EmbeddingError::Persistent(e.to_string())),
        }
    }
}

async fn backoff(attempt: u32) {
    let multiplier = 2u32.pow(attempt.saturating_sub(1));
    let jitter_ms: u64 = rand::rng().random_range(0..50);
    let delay = BASE_BACKOFF * multiplier + Duration::from_millis(jitter_ms);
    tokio::time::sleep(delay).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockEmbedder {
        dim: usize,
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, texts: &[String], _cancel: &CancellationToken) -> EmbeddingResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32; self.dim]).collect())
        }

        fn dimension(&self) -> usize {
            self.dim
        }
    }

    #[tokio::test]
    async fn preserves_input_order() {
        let embedder = MockEmbedder { dim: 2 };
        let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let vectors = embedder.embed(&texts, &CancellationToken::new()).await.unwrap();
        assert_eq!(vectors[0][0], 1.0);
        assert_eq!(vectors[1][0], 2.0);
        assert_eq!(vectors[2][0], 3.0);
    }

    #[tokio::test]
    async fn fails_fast_when_already_cancelled() {
        let embedder =
            HttpEmbedder::new("http://localhost:0".to_string(), "test-model".to_string(), 8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = embedder.embed(&["a".to_string()], &cancel).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Cancelled));
    }
}
