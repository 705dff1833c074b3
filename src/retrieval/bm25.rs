//! BM25 Index — a hand-rolled inverted index with Okapi BM25 scoring.
//!
//! Not built on a full-text search engine crate: the scoring here needs
//! exact control over `k1`/`b`, a deterministic id-ascending tie-break, and
//! custom camelCase/snake_case sub-tokenization that off-the-shelf
//! tokenizers don't expose. See DESIGN.md.

use std::collections::HashMap;

use regex::Regex;
use std::sync::LazyLock;

use super::ScoredId;
use crate::types::{CodeElement, ElementId};

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "if", "is", "are", "was", "were", "be", "been", "to",
    "of", "in", "on", "for", "with", "as", "at", "by", "this", "that", "it", "from",
];

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{L}\p{N}_]+").unwrap());

#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

#[derive(Debug, Default)]
struct Posting {
    doc_id: usize,
    term_freq: u32,
}

#[derive(Debug, Default)]
pub struct Bm25Index {
    params: Bm25Params,
    postings: HashMap<String, Vec<Posting>>,
    doc_ids: Vec<ElementId>,
    doc_lengths: Vec<u32>,
    avg_doc_len: f32,
}

impl Bm25Index {
    pub fn new(params: Bm25Params) -> Self {
        Self { params, ..Default::default() }
    }

    /// Rebuilds the index from scratch over `elements`, in the order given
    /// (the Engine guarantees this order is the deterministic
    /// `(relative_path, start_line, id)` sort already).
    pub fn build(elements: &[CodeElement], params: Bm25Params) -> Self {
        let mut index = Bm25Index::new(params);
        for element in elements {
            index.insert(element);
        }
        index.recompute_avg_len();
        index
    }

    fn insert(&mut self, element: &CodeElement) {
        let doc_id = self.doc_ids.len();
        self.doc_ids.push(element.id.clone());

        let tokens = tokenize(&element.searchable_text());
        self.doc_lengths.push(tokens.len() as u32);

        let mut term_counts: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *term_counts.entry(token).or_insert(0) += 1;
        }
        for (term, term_freq) in term_counts {
            self.postings.entry(term).or_default().push(Posting { doc_id, term_freq });
        }
    }

    fn recompute_avg_len(&mut self) {
        if self.doc_lengths.is_empty() {
            self.avg_doc_len = 0.0;
        } else {
            self.avg_doc_len =
                self.doc_lengths.iter().sum::<u32>() as f32 / self.doc_lengths.len() as f32;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    /// Returns up to `top_k` `(id, score)` pairs, score descending, ties
    /// broken by id ascending for determinism.
    pub fn search(&self, text: &str, top_k: usize) -> Vec<ScoredId> {
        if self.doc_ids.is_empty() {
            return Vec::new();
        }
        let query_terms = tokenize(text);
        let n = self.doc_ids.len() as f32;

        let mut scores: HashMap<usize, f32> = HashMap::new();
        for term in &query_terms {
            let Some(postings) = self.postings.get(term) else { continue };
            let df = postings.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for posting in postings {
                let doc_len = self.doc_lengths[posting.doc_id] as f32;
                let tf = posting.term_freq as f32;
                let denom = tf
                    + self.params.k1
                        * (1.0 - self.params.b + self.params.b * doc_len / self.avg_doc_len.max(1.0));
                let contribution = idf * (tf * (self.params.k1 + 1.0)) / denom;
                *scores.entry(posting.doc_id).or_insert(0.0) += contribution;
            }
        }

        let mut ranked: Vec<ScoredId> = scores
            .into_iter()
            .map(|(doc_id, score)| ScoredId { id: self.doc_ids[doc_id].clone(), score })
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

/// Lowercase Unicode letter/digit/underscore runs, minimum length 2, stop
/// words dropped. Each qualifying token also contributes its
/// camelCase/snake_case sub-tokens alongside the original.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in TOKEN_RE.find_iter(text).map(|m| m.as_str()) {
        if raw.chars().count() < 2 {
            continue;
        }
        let lower = raw.to_lowercase();
        if STOP_WORDS.contains(&lower.as_str()) {
            continue;
        }
        tokens.push(lower);
        for sub in split_identifier(raw) {
            let sub_lower = sub.to_lowercase();
            if sub_lower.chars().count() >= 2 && !STOP_WORDS.contains(&sub_lower.as_str()) {
                tokens.push(sub_lower);
            }
        }
    }
    tokens
}

/// Splits `snake_case` on `_` and `camelCase`/`PascalCase` on
/// lowercase→uppercase and letter→digit boundaries.
fn split_identifier(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for underscore_part in raw.split('_') {
        if underscore_part.is_empty() {
            continue;
        }
        let mut current = String::new();
        let mut prev: Option<char> = None;
        for ch in underscore_part.chars() {
            if let Some(p) = prev {
                let boundary = (p.is_lowercase() && ch.is_uppercase())
                    || (p.is_alphabetic() != ch.is_alphabetic() && p.is_alphanumeric() && ch.is_alphanumeric());
                if boundary && !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            current.push(ch);
            prev = Some(ch);
        }
        if !current.is_empty() {
            parts.push(current);
        }
    }
    if parts.len() <= 1 {
        Vec::new()
    } else {
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ElementKind, ElementMetadata, Language};

    fn element(repo: &str, path: &str, name: &str, code: &str) -> CodeElement {
        CodeElement {
            id: ElementId::new(repo, ElementKind::Function, &[path, name]),
            kind: ElementKind::Function,
            name: name.to_string(),
            language: Language::Go,
            relative_path: path.to_string(),
            start_line: 1,
            end_line: 2,
            signature: format!("func {name}()"),
            code: code.to_string(),
            doc: None,
            metadata: ElementMetadata::Function { calls: vec![] },
        }
    }

    #[test]
    fn tokenize_splits_camel_and_snake_case() {
        let tokens = tokenize("getUserName get_user_name");
        assert!(tokens.contains(&"getusername".to_string()));
        assert!(tokens.contains(&"user".to_string()));
        assert!(tokens.contains(&"name".to_string()));
    }

    #[test]
    fn tokenize_drops_stop_words_and_short_tokens() {
        let tokens = tokenize("the a of it ok");
        assert_eq!(tokens, vec!["ok".to_string()]);
    }

    #[test]
    fn search_ranks_matching_doc_first() {
        let helper = element("r", "main.go", "helper", "return \"\"");
        let main = element("r", "main.go", "main", "helper()");
        let index = Bm25Index::build(&[helper.clone(), main], Bm25Params::default());
        let results = index.search("helper function", 10);
        assert_eq!(results[0].id, helper.id);
    }

    #[test]
    fn search_ties_break_by_id_ascending() {
        let a = element("r", "a.go", "dup", "x");
        let b = element("r", "b.go", "dup", "x");
        let index = Bm25Index::build(&[a.clone(), b.clone()], Bm25Params::default());
        let results = index.search("dup", 10);
        let mut ids: Vec<_> = results.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        assert_eq!(results.iter().map(|r| r.id.clone()).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn empty_index_returns_no_results() {
        let index = Bm25Index::new(Bm25Params::default());
        assert!(index.search("anything", 10).is_empty());
    }
}
