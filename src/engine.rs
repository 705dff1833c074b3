//! Engine — binds every component behind the top-level operations `index`,
//! `query`, and `search`. Published state lives behind a lock readers never
//! block on during an in-progress re-index: a query clones a cheap `Arc`
//! snapshot rather than holding a lock across network calls.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::agent::iterative::{EvidenceEntry, StopReason};
use crate::agent::tools::PublishedState;
use crate::agent::{AnswerGenerator, IterativeAgent, ToolExecutor};
use crate::config::EngineConfig;
use crate::embedding::Embedder;
use crate::error::{EmbeddingError, EngineError, EngineResult, LoaderError};
use crate::graph::GraphSet;
use crate::llm::LlmClient;
use crate::loader::Loader;
use crate::parsing::extractor_for;
use crate::retrieval::bm25::Bm25Params;
use crate::retrieval::{Bm25Index, HybridRetriever, VectorIndex};
use crate::storage::{CacheStore, RepoSnapshot};
use crate::types::{CodeElement, ElementId, ElementKind};

#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub dependency_nodes: usize,
    pub dependency_edges: usize,
    pub inheritance_nodes: usize,
    pub inheritance_edges: usize,
    pub call_nodes: usize,
    pub call_edges: usize,
}

impl GraphStats {
    fn from_graphs(graphs: &GraphSet) -> Self {
        Self {
            dependency_nodes: graphs.dependency.node_count(),
            dependency_edges: graphs.dependency.edge_count(),
            inheritance_nodes: graphs.inheritance.node_count(),
            inheritance_edges: graphs.inheritance.edge_count(),
            call_nodes: graphs.call.node_count(),
            call_edges: graphs.call.edge_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexResult {
    pub repo_name: String,
    pub total_files: usize,
    pub total_elements: usize,
    pub graph_stats: GraphStats,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub answer: String,
    pub confidence: u8,
    pub rounds: u32,
    pub stop_reason: String,
    pub elements_used: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub relative_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub signature: String,
    pub score: f32,
}

pub struct Engine {
    config: EngineConfig,
    cache: CacheStore,
    embedder: Option<Arc<dyn Embedder>>,
    llm: Option<Arc<dyn LlmClient>>,
    state: RwLock<Option<PublishedState>>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        embedder: Option<Arc<dyn Embedder>>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Self {
        let cache = CacheStore::new(config.cache.dir.clone());
        Self { config, cache, embedder, llm, state: RwLock::new(None), cancel: CancellationToken::new() }
    }

    pub fn is_indexed(&self) -> bool {
        self.state.read().is_some()
    }

    /// Signals cancellation to any in-progress `index` or `query` call. Takes
    /// effect at the next check point (between files in the loader, between
    /// batches in the embedder, between rounds in the agent, or before the
    /// next LLM call) rather than interrupting mid-request work.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Orchestrates loading, parsing, graph/index building, and embedding. Honors the cache
    /// unless `force`.
    pub async fn index(&self, repo_path: &Path, force: bool, no_embeddings: bool) -> EngineResult<IndexResult> {
        if !repo_path.is_dir() {
            return Err(EngineError::Loader(LoaderError::PathError { path: repo_path.to_path_buf() }));
        }
        let repo_name = repo_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repo".to_string());

        if !force {
            if let Some(snapshot) = self.cache.load(&repo_name)? {
                return Ok(self.publish_from_snapshot(snapshot, true, None));
            }
        }

        let loader = Loader::new(self.config.cache.max_file_size);
        let records = loader.load(repo_path, &self.cancel)?;

        let mut elements: Vec<CodeElement> = records
            .par_iter()
            .flat_map(|record| match extractor_for(record.language) {
                Some(extractor) => extractor.extract(&repo_name, &record.relative_path, &record.bytes),
                None => vec![crate::parsing::unparsed_file_element(
                    &repo_name,
                    &record.relative_path,
                    &record.bytes,
                    record.language,
                    false,
                )],
            })
            .collect();

        // Deterministic order regardless of worker scheduling.
        elements.sort_by(|a, b| {
            (a.relative_path.as_str(), a.start_line, a.id.as_str()).cmp(&(
                b.relative_path.as_str(),
                b.start_line,
                b.id.as_str(),
            ))
        });

        let files: HashMap<String, String> =
            records.into_iter().map(|r| (r.relative_path, r.bytes)).collect();

        let vectors = if no_embeddings {
            HashMap::new()
        } else {
            self.embed_elements(&elements).await?
        };

        let snapshot = RepoSnapshot::new(repo_name.clone(), elements, vectors);
        self.cache.save(&snapshot)?;

        Ok(self.publish_from_snapshot(snapshot, false, Some(files)))
    }

    async fn embed_elements(&self, elements: &[CodeElement]) -> EngineResult<HashMap<ElementId, Vec<f32>>> {
        let Some(embedder) = &self.embedder else { return Ok(HashMap::new()) };

        let texts: Vec<String> = elements.iter().map(|e| e.searchable_text()).collect();
        match embedder.embed(&texts, &self.cancel).await {
            Ok(vectors) => Ok(elements
                .iter()
                .zip(vectors)
                .filter(|(_, v)| !v.is_empty())
                .map(|(e, v)| (e.id.clone(), v))
                .collect()),
            Err(EmbeddingError::Cancelled) => Err(EngineError::Cancelled),
            Err(err) => {
                tracing::warn!(error = %err, "embedding failed, continuing BM25-only");
                Ok(HashMap::new())
            }
        }
    }

    /// Rebuilds every derived index from a snapshot and publishes it.
    /// `files` carries raw source for the `read_file` tool; a cache hit has
    /// no fresh copy on hand, so it falls back to whatever was previously
    /// published for this repo (or empty, on a cold cache hit after restart).
    fn publish_from_snapshot(
        &self,
        snapshot: RepoSnapshot,
        cached: bool,
        files: Option<HashMap<String, String>>,
    ) -> IndexResult {
        let graphs = GraphSet::build(&snapshot.elements);
        let bm25_params = Bm25Params { k1: self.config.retrieval.bm25_k1, b: self.config.retrieval.bm25_b };
        let bm25 = Bm25Index::build(&snapshot.elements, bm25_params);

        let mut vector = VectorIndex::new();
        for (id, vec) in &snapshot.vectors {
            vector.insert(id.clone(), vec.clone());
        }

        let total_elements = snapshot.elements.len();
        let total_files =
            snapshot.elements.iter().filter(|e| e.kind == ElementKind::File).count();
        let graph_stats = GraphStats::from_graphs(&graphs);

        let elements_by_id: HashMap<ElementId, usize> =
            snapshot.elements.iter().enumerate().map(|(i, e)| (e.id.clone(), i)).collect();

        let files = files.unwrap_or_else(|| {
            self.state.read().as_ref().map(|s| (*s.files).clone()).unwrap_or_default()
        });

        let published = PublishedState {
            repo_name: snapshot.repo_name.clone(),
            elements: Arc::new(snapshot.elements),
            elements_by_id: Arc::new(elements_by_id),
            graphs: Arc::new(graphs),
            bm25: Arc::new(bm25),
            vector: Arc::new(vector),
            files: Arc::new(files),
        };

        *self.state.write() = Some(published);

        IndexResult {
            repo_name: snapshot.repo_name,
            total_files,
            total_elements,
            graph_stats,
            cached,
        }
    }

    /// Runs the iterative agent then the answer generator if an LLM is
    /// configured; otherwise performs a single hybrid search and synthesizes
    /// a structured listing. The whole agent+answer path is bounded by
    /// `query_deadline_secs`, checked as a single outer deadline rather than
    /// per-call, since individual LLM calls already carry their own
    /// `call_timeout_secs`.
    pub async fn query(&self, question: &str) -> EngineResult<QueryResult> {
        let published = self.state.read().clone().ok_or(EngineError::NoRepository)?;

        let Some(llm) = &self.llm else {
            return Ok(self.fallback_query(question, &published));
        };

        let tools = ToolExecutor::new(published.clone(), self.config.agent.max_neighbors);
        let agent = IterativeAgent::new(
            llm.as_ref(),
            tools,
            self.embedder.clone(),
            &self.config.agent,
            Duration::from_secs(self.config.llm.call_timeout_secs),
            self.cancel.clone(),
        );
        let answer_generator = AnswerGenerator::new(
            llm.as_ref(),
            self.config.agent.answer_context_budget,
            Duration::from_secs(self.config.llm.call_timeout_secs),
        );

        let deadline = Duration::from_secs(self.config.agent.query_deadline_secs);
        let query_path = async {
            let outcome = agent.run(question).await?;
            let answer = if outcome.stop_reason == StopReason::AgentGaveUp && outcome.evidence.is_empty() {
                "I could not find relevant evidence in the codebase to answer this question.".to_string()
            } else {
                answer_generator.generate(question, &outcome.evidence).await?
            };

            Ok::<QueryResult, EngineError>(QueryResult {
                answer,
                confidence: outcome.confidence,
                rounds: outcome.rounds,
                stop_reason: outcome.stop_reason.as_str().to_string(),
                elements_used: elements_used(&outcome.evidence),
            })
        };

        match tokio::time::timeout(deadline, query_path).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::DeadlineExceeded(deadline)),
        }
    }

    /// Raw hybrid search with no LLM involvement, used by the `search_code`
    /// MCP tool and the CLI's `--json` search path.
    pub async fn search(&self, query: &str, top_k: usize) -> EngineResult<Vec<SearchHit>> {
        let published = self.state.read().clone().ok_or(EngineError::NoRepository)?;

        let query_vec = match &self.embedder {
            Some(embedder) => embedder
                .embed(&[query.to_string()], &self.cancel)
                .await
                .ok()
                .and_then(|mut v| v.pop()),
            None => None,
        };
        let query_vec = query_vec.filter(|v| !v.is_empty());

        let retriever = HybridRetriever::new(&published.bm25, &published.vector)
            .with_alpha(self.config.retrieval.hybrid_alpha);
        let hits = retriever.search(query, query_vec.as_deref(), top_k);

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                published.element(&hit.id).map(|e| SearchHit {
                    id: hit.id.as_str().to_string(),
                    name: e.name.clone(),
                    kind: format!("{:?}", e.kind),
                    relative_path: e.relative_path.clone(),
                    start_line: e.start_line,
                    end_line: e.end_line,
                    signature: e.signature.clone(),
                    score: hit.score,
                })
            })
            .collect())
    }

    fn fallback_query(&self, question: &str, state: &PublishedState) -> QueryResult {
        let retriever = HybridRetriever::new(&state.bm25, &state.vector).with_alpha(self.config.retrieval.hybrid_alpha);
        let hits = retriever.search(question, None, self.config.retrieval.default_top_k);

        let mut lines = Vec::with_capacity(hits.len());
        let mut ids = Vec::with_capacity(hits.len());
        for hit in &hits {
            if let Some(element) = state.element(&hit.id) {
                lines.push(format!(
                    "- `{}` ({}:{}-{}) — {}",
                    element.name, element.relative_path, element.start_line, element.end_line, element.signature
                ));
                ids.push(hit.id.as_str().to_string());
            }
        }

        let answer = if lines.is_empty() {
            format!("No matches found for: {question}")
        } else {
            format!("Top matches for \"{question}\":\n{}", lines.join("\n"))
        };

        QueryResult { answer, confidence: 0, rounds: 0, stop_reason: "no_llm_configured".to_string(), elements_used: ids }
    }
}

fn elements_used(evidence: &[EvidenceEntry]) -> Vec<String> {
    let mut seen = Vec::new();
    for entry in evidence {
        for id in &entry.execution.ids {
            let s = id.as_str().to_string();
            if !seen.contains(&s) {
                seen.push(s);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn indexes_a_small_go_repo() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("main.go"),
            "package main\nfunc main(){}\nfunc helper() string { return \"\" }",
        )
        .unwrap();

        let mut config = EngineConfig::default();
        config.cache.dir = TempDir::new().unwrap().path().to_path_buf();
        let engine = Engine::new(config, None, None);

        let result = engine.index(dir.path(), true, true).await.unwrap();
        assert_eq!(result.total_files, 1);
        assert!(result.total_elements >= 3);
        assert!(!result.cached);
    }

    #[tokio::test]
    async fn second_index_call_hits_cache() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.go"), "package main\nfunc main(){}").unwrap();

        let mut config = EngineConfig::default();
        config.cache.dir = TempDir::new().unwrap().path().to_path_buf();
        let engine = Engine::new(config, None, None);

        let first = engine.index(dir.path(), false, true).await.unwrap();
        let second = engine.index(dir.path(), false, true).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.total_elements, first.total_elements);
    }

    #[tokio::test]
    async fn query_without_llm_falls_back_to_hybrid_search() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("main.go"),
            "package main\nfunc main(){}\nfunc helper() string { return \"\" }",
        )
        .unwrap();

        let mut config = EngineConfig::default();
        config.cache.dir = TempDir::new().unwrap().path().to_path_buf();
        let engine = Engine::new(config, None, None);
        engine.index(dir.path(), true, true).await.unwrap();

        let result = engine.query("helper function").await.unwrap();
        assert_eq!(result.stop_reason, "no_llm_configured");
        assert!(result.answer.contains("helper"));
    }

    #[tokio::test]
    async fn query_without_index_errors() {
        let config = EngineConfig::default();
        let engine = Engine::new(config, None, None);
        let err = engine.query("anything").await.unwrap_err();
        assert!(matches!(err, EngineError::NoRepository));
    }
}
