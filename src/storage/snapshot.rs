//! `RepoSnapshot` — the cacheable state sufficient to rebuild derived
//! indexes (graphs, BM25) deterministically without re-parsing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{CodeElement, ElementId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSnapshot {
    pub repo_name: String,
    pub elements: Vec<CodeElement>,
    pub vectors: HashMap<ElementId, Vec<f32>>,
}

impl RepoSnapshot {
    pub fn new(repo_name: String, elements: Vec<CodeElement>, vectors: HashMap<ElementId, Vec<f32>>) -> Self {
        Self { repo_name, elements, vectors }
    }
}
