//! Vector Index — a flat in-memory store of pre-normalized embeddings,
//! searched by cosine similarity (a dot product once normalized).

use std::collections::HashMap;

use super::ScoredId;
use crate::types::ElementId;

#[derive(Debug, Default)]
pub struct VectorIndex {
    vectors: HashMap<ElementId, Vec<f32>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a vector, normalizing it to unit length so similarity search
    /// reduces to a dot product. A zero vector is stored as-is (contributes
    /// zero similarity to every query).
    pub fn insert(&mut self, id: ElementId, vector: Vec<f32>) {
        self.vectors.insert(id, normalize(vector));
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.vectors.contains_key(id)
    }

    /// Top-k by cosine similarity against a (not necessarily normalized)
    /// query vector.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<ScoredId> {
        if self.vectors.is_empty() {
            return Vec::new();
        }
        let query = normalize(query.to_vec());

        let mut ranked: Vec<ScoredId> = self
            .vectors
            .iter()
            .map(|(id, vector)| ScoredId { id: id.clone(), score: dot(&query, vector) })
            .collect();

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

fn normalize(vector: Vec<f32>) -> Vec<f32> {
    let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if magnitude == 0.0 {
        return vector;
    }
    vector.into_iter().map(|v| v / magnitude).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ElementId {
        crate::types::ElementId::new("r", crate::types::ElementKind::Function, &[s])
    }

    #[test]
    fn search_returns_closest_vector_first() {
        let mut index = VectorIndex::new();
        index.insert(id("a"), vec![1.0, 0.0]);
        index.insert(id("b"), vec![0.0, 1.0]);
        let results = index.search(&[1.0, 0.1], 2);
        assert_eq!(results[0].id, id("a"));
    }

    #[test]
    fn empty_index_returns_no_results() {
        let index = VectorIndex::new();
        assert!(index.search(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn stored_vectors_are_normalized() {
        let mut index = VectorIndex::new();
        index.insert(id("a"), vec![3.0, 4.0]);
        let results = index.search(&[3.0, 4.0], 1);
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }
}
