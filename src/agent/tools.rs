//! Tool Executor — exposes `search`, `skim`, `read_file`,
//! `expand_neighbors` to the agent over the published graph/retrieval state.
//! Every tool is pure with respect to engine state and safe to call
//! concurrently: all fields here are read-only `Arc` snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::embedding::Embedder;
use crate::graph::GraphSet;
use crate::llm::ToolCall;
use crate::retrieval::{Bm25Index, HybridRetriever, VectorIndex};
use crate::types::{CodeElement, ElementId};

const SKIM_LINES: usize = 20;

/// The repo-wide state published by `Engine::index`, snapshotted as cheap
/// `Arc` clones so a query can run against it without holding a lock.
#[derive(Clone)]
pub struct PublishedState {
    pub repo_name: String,
    pub elements: Arc<Vec<CodeElement>>,
    pub elements_by_id: Arc<HashMap<ElementId, usize>>,
    pub graphs: Arc<GraphSet>,
    pub bm25: Arc<Bm25Index>,
    pub vector: Arc<VectorIndex>,
    pub files: Arc<HashMap<String, String>>,
}

impl PublishedState {
    pub fn element(&self, id: &ElementId) -> Option<&CodeElement> {
        self.elements_by_id.get(id).map(|&idx| &self.elements[idx])
    }
}

/// One executed tool call, ready to be folded into agent evidence.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub ids: Vec<ElementId>,
    pub text: String,
    /// Used for context-eviction priority in the Answer Generator: higher is
    /// more relevant, kept longer under budget pressure.
    pub relevance: f32,
}

#[derive(Clone)]
pub struct ToolExecutor {
    state: PublishedState,
    max_neighbors: usize,
}

impl ToolExecutor {
    pub fn new(state: PublishedState, max_neighbors: usize) -> Self {
        Self { state, max_neighbors }
    }

    pub async fn execute(
        &self,
        call: &ToolCall,
        embedder: Option<&dyn Embedder>,
        cancel: &CancellationToken,
    ) -> ToolExecution {
        match call.name.as_str() {
            "search" => self.run_search(&call.arguments, embedder, cancel).await,
            "skim" => self.run_skim(&call.arguments),
            "read_file" => self.run_read_file(&call.arguments),
            "expand_neighbors" => self.run_expand_neighbors(&call.arguments),
            other => ToolExecution {
                ids: Vec::new(),
                text: format!("unknown tool: {other}"),
                relevance: 0.0,
            },
        }
    }

    async fn run_search(
        &self,
        arguments: &Value,
        embedder: Option<&dyn Embedder>,
        cancel: &CancellationToken,
    ) -> ToolExecution {
        #[derive(Deserialize, Default)]
        struct Args {
            query: String,
            #[serde(default = "default_top_k")]
            top_k: usize,
        }
        fn default_top_k() -> usize {
            10
        }

        let args: Args = serde_json::from_value(arguments.clone()).unwrap_or_default();
        if args.query.is_empty() {
            return ToolExecution { ids: Vec::new(), text: "search: missing query".to_string(), relevance: 0.0 };
        }

        let query_vec = match embedder {
            Some(embedder) => {
                embedder.embed(&[args.query.clone()], cancel).await.ok().and_then(|mut v| v.pop())
            }
            None => None,
        };
        let query_vec = query_vec.filter(|v| !v.is_empty());

        let retriever = HybridRetriever::new(&self.state.bm25, &self.state.vector);
        let hits = retriever.search(&args.query, query_vec.as_deref(), args.top_k);

        let mut ids = Vec::with_capacity(hits.len());
        let mut lines = Vec::with_capacity(hits.len());
        let mut best_score = 0.0f32;
        for hit in &hits {
            if let Some(element) = self.state.element(&hit.id) {
                lines.push(format!(
                    "{} | {} ({}:{}-{}) score={:.3}",
                    element.signature,
                    element.relative_path,
                    element.relative_path,
                    element.start_line,
                    element.end_line,
                    hit.score
                ));
                ids.push(hit.id.clone());
                best_score = best_score.max(hit.score);
            }
        }

        ToolExecution {
            ids,
            text: if lines.is_empty() {
                format!("search(\"{}\"): no results", args.query)
            } else {
                format!("search(\"{}\") results:\n{}", args.query, lines.join("\n"))
            },
            relevance: best_score,
        }
    }

    fn run_skim(&self, arguments: &Value) -> ToolExecution {
        #[derive(Deserialize, Default)]
        struct Args {
            #[serde(default)]
            ids: Vec<String>,
        }
        let args: Args = serde_json::from_value(arguments.clone()).unwrap_or_default();

        let mut ids = Vec::with_capacity(args.ids.len());
        let mut blocks = Vec::with_capacity(args.ids.len());
        for raw in &args.ids {
            let id = ElementId::from_raw(raw.clone());
            if let Some(element) = self.state.element(&id) {
                let excerpt: String =
                    element.code.lines().take(SKIM_LINES).collect::<Vec<_>>().join("\n");
                blocks.push(format!("{}\n{}", element.signature, excerpt));
                ids.push(id);
            }
        }

        ToolExecution {
            ids,
            text: if blocks.is_empty() {
                "skim: no matching ids".to_string()
            } else {
                blocks.join("\n---\n")
            },
            relevance: 0.6,
        }
    }

    fn run_read_file(&self, arguments: &Value) -> ToolExecution {
        #[derive(Deserialize, Default)]
        struct Args {
            path: String,
            start_line: Option<u32>,
            end_line: Option<u32>,
        }
        let args: Args = serde_json::from_value(arguments.clone()).unwrap_or_default();

        let Some(source) = self.state.files.get(&args.path) else {
            return ToolExecution {
                ids: Vec::new(),
                text: format!("read_file: unknown path {}", args.path),
                relevance: 0.0,
            };
        };

        let lines: Vec<&str> = source.lines().collect();
        let start = args.start_line.unwrap_or(1).max(1) as usize;
        let end = args.end_line.map(|e| e as usize).unwrap_or(lines.len()).min(lines.len());
        let slice = if start <= end && start <= lines.len() {
            lines[(start - 1)..end].join("\n")
        } else {
            String::new()
        };

        ToolExecution {
            ids: Vec::new(),
            text: format!("{}:{}-{}\n{}", args.path, start, end, slice),
            relevance: 0.4,
        }
    }

    fn run_expand_neighbors(&self, arguments: &Value) -> ToolExecution {
        #[derive(Deserialize, Default)]
        struct Args {
            #[serde(default)]
            ids: Vec<String>,
            #[serde(default = "default_hops")]
            hops: usize,
        }
        fn default_hops() -> usize {
            1
        }
        let args: Args = serde_json::from_value(arguments.clone()).unwrap_or_default();

        let mut seen: Vec<ElementId> = Vec::new();
        'outer: for raw in &args.ids {
            let id = ElementId::from_raw(raw.clone());
            for neighbor in self.state.graphs.related_within(&id, args.hops.max(1)) {
                if !seen.contains(&neighbor) {
                    seen.push(neighbor);
                }
                if seen.len() >= self.max_neighbors {
                    break 'outer;
                }
            }
        }
        seen.truncate(self.max_neighbors);

        let names: Vec<String> = seen
            .iter()
            .filter_map(|id| self.state.element(id))
            .map(|e| format!("{} ({})", e.name, e.relative_path))
            .collect();

        ToolExecution {
            text: if names.is_empty() {
                "expand_neighbors: no related elements".to_string()
            } else {
                format!("related elements:\n{}", names.join("\n"))
            },
            ids: seen,
            relevance: 0.3,
        }
    }
}

pub fn canonicalize(call: &ToolCall) -> String {
    format!("{}:{}", call.name, serde_json::to_string(&call.arguments).unwrap_or_default())
}

pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4 + 1
}
