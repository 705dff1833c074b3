//! Hybrid Retriever — deterministic min-max fusion of BM25 and vector
//! results.

use std::collections::HashMap;

use super::{bm25::Bm25Index, vector::VectorIndex, ScoredId};
use crate::types::ElementId;

const DEFAULT_ALPHA: f32 = 0.5;

pub struct HybridRetriever<'a> {
    bm25: &'a Bm25Index,
    vector: &'a VectorIndex,
    alpha: f32,
}

impl<'a> HybridRetriever<'a> {
    pub fn new(bm25: &'a Bm25Index, vector: &'a VectorIndex) -> Self {
        Self { bm25, vector, alpha: DEFAULT_ALPHA }
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Fuses the top `4*top_k` candidates from each index. If the vector
    /// index is empty or `query_vec` is `None`, degrades to BM25-only
    /// (same ordering as `Bm25Index::search`).
    pub fn search(&self, text: &str, query_vec: Option<&[f32]>, top_k: usize) -> Vec<ScoredId> {
        let candidate_n = top_k.saturating_mul(4).max(top_k);
        let bm25_hits = self.bm25.search(text, candidate_n);

        let vector_hits = match query_vec {
            Some(vec) if !self.vector.is_empty() => self.vector.search(vec, candidate_n),
            _ => Vec::new(),
        };

        if vector_hits.is_empty() {
            let mut hits = bm25_hits;
            hits.truncate(top_k);
            return hits;
        }

        let bm25_norm = min_max_normalize(&bm25_hits);
        let vector_norm = min_max_normalize(&vector_hits);

        let mut fused: HashMap<ElementId, f32> = HashMap::new();
        for (id, score) in &bm25_norm {
            *fused.entry(id.clone()).or_insert(0.0) += self.alpha * score;
        }
        for (id, score) in &vector_norm {
            *fused.entry(id.clone()).or_insert(0.0) += (1.0 - self.alpha) * score;
        }

        let mut ranked: Vec<ScoredId> =
            fused.into_iter().map(|(id, score)| ScoredId { id, score }).collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(top_k);
        ranked
    }
}

fn min_max_normalize(hits: &[ScoredId]) -> Vec<(ElementId, f32)> {
    if hits.is_empty() {
        return Vec::new();
    }
    let min = hits.iter().map(|h| h.score).fold(f32::INFINITY, f32::min);
    let max = hits.iter().map(|h| h.score).fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    hits.iter()
        .map(|h| {
            let normalized = if range.abs() < f32::EPSILON { 1.0 } else { (h.score - min) / range };
            (h.id.clone(), normalized)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CodeElement, ElementKind, ElementMetadata, Language};

    fn element(name: &str) -> CodeElement {
        CodeElement {
            id: ElementId::new("r", ElementKind::Function, &["f.go", name]),
            kind: ElementKind::Function,
            name: name.to_string(),
            language: Language::Go,
            relative_path: "f.go".to_string(),
            start_line: 1,
            end_line: 2,
            signature: format!("func {name}()"),
            code: name.to_string(),
            doc: None,
            metadata: ElementMetadata::Function { calls: vec![] },
        }
    }

    #[test]
    fn degrades_to_bm25_only_with_empty_vector_store() {
        let helper = element("helper");
        let main = element("main");
        let bm25 = Bm25Index::build(&[helper, main], Default::default());
        let vector = VectorIndex::new();

        let bm25_only = bm25.search("helper", 10);
        let hybrid = HybridRetriever::new(&bm25, &vector).search("helper", None, 10);

        assert_eq!(
            hybrid.iter().map(|h| h.id.clone()).collect::<Vec<_>>(),
            bm25_only.iter().map(|h| h.id.clone()).collect::<Vec<_>>()
        );
    }
}
