//! Integration tests for the cross-module scenarios: parsing feeding the
//! graph builder, cache round-trip and corruption, and the agent loop
//! against a scripted LLM.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use codetrace::error::LlmResult;
use codetrace::llm::LlmClient;
use codetrace::types::{ElementKind, Language};
use codetrace::{Engine, EngineConfig};

fn extract(language: Language, relative_path: &str, source: &str) -> Vec<codetrace::CodeElement> {
    codetrace::parsing::extractor_for(language)
        .expect("extractor for language")
        .extract("scenario-repo", relative_path, source)
}

/// S1: a Go file with two unrelated top-level functions indexes to one file
/// element plus both functions, an empty call graph, and BM25 ranks the
/// function whose name matches the query first.
#[test]
fn s1_two_unrelated_functions_have_no_call_edges() {
    let source = "package main\nfunc main(){}\nfunc helper() string { return \"\" }";
    let elements = extract(Language::Go, "main.go", source);

    assert_eq!(elements.iter().filter(|e| e.kind == ElementKind::File).count(), 1);
    let names: Vec<&str> = elements
        .iter()
        .filter(|e| e.kind == ElementKind::Function)
        .map(|e| e.name.as_str())
        .collect();
    assert!(names.contains(&"main"));
    assert!(names.contains(&"helper"));

    let graphs = codetrace::graph::GraphSet::build(&elements);
    assert_eq!(graphs.call.edge_count(), 0);

    let bm25 = codetrace::retrieval::Bm25Index::build(
        &elements,
        codetrace::retrieval::bm25::Bm25Params { k1: 1.2, b: 0.75 },
    );
    let hits = bm25.search("helper function", 5);
    let helper_id = elements.iter().find(|e| e.name == "helper").unwrap().id.clone();
    assert_eq!(hits.first().map(|h| &h.id), Some(&helper_id));
}

/// S2: `b.py` imports and subclasses `a.py`'s only class — the inheritance
/// graph gets exactly `B -> A`, the dependency graph gets `b.py -> a.py`.
#[test]
fn s2_inheritance_and_dependency_edges() {
    let mut elements = extract(Language::Python, "a.py", "class A:\n  pass");
    elements.extend(extract(Language::Python, "b.py", "from a import A\nclass B(A): pass"));

    let graphs = codetrace::graph::GraphSet::build(&elements);

    let a_class = elements.iter().find(|e| e.name == "A" && e.kind == ElementKind::Class).unwrap();
    let b_class = elements.iter().find(|e| e.name == "B" && e.kind == ElementKind::Class).unwrap();
    assert_eq!(graphs.inheritance.edge_count(), 1);
    assert_eq!(graphs.inheritance.successors(&b_class.id), vec![a_class.id.clone()]);

    let a_file = elements.iter().find(|e| e.relative_path == "a.py" && e.kind == ElementKind::File).unwrap();
    let b_file = elements.iter().find(|e| e.relative_path == "b.py" && e.kind == ElementKind::File).unwrap();
    assert_eq!(graphs.dependency.successors(&b_file.id), vec![a_file.id.clone()]);
}

/// S3: indexing the same repo twice reports a cache hit the second time,
/// with an identical element count.
#[tokio::test]
async fn s3_second_index_is_served_from_cache() {
    let repo_dir = TempDir::new().unwrap();
    std::fs::write(repo_dir.path().join("main.go"), "package main\nfunc main(){}").unwrap();

    let mut config = EngineConfig::default();
    config.cache.dir = TempDir::new().unwrap().path().to_path_buf();
    let engine = Engine::new(config, None, None);

    let first = engine.index(repo_dir.path(), false, true).await.unwrap();
    let second = engine.index(repo_dir.path(), false, true).await.unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(second.total_elements, first.total_elements);
}

/// S4: a corrupted cache file is treated as a miss, not an error — the next
/// non-forced `index` call re-parses and reports `cached=false` with the
/// same element count as the original run.
#[tokio::test]
async fn s4_corrupted_cache_falls_back_to_reindex() {
    let repo_dir = TempDir::new().unwrap();
    std::fs::write(repo_dir.path().join("main.go"), "package main\nfunc main(){}").unwrap();

    let cache_dir = TempDir::new().unwrap();
    let mut config = EngineConfig::default();
    config.cache.dir = cache_dir.path().to_path_buf();
    let engine = Engine::new(config, None, None);

    let first = engine.index(repo_dir.path(), false, true).await.unwrap();

    let cache_file = cache_dir.path().join(format!("{}.bin", first.repo_name));
    assert!(cache_file.exists());
    std::fs::write(&cache_file, b"not a valid cache file").unwrap();

    let second = engine.index(repo_dir.path(), false, true).await.unwrap();
    assert!(!second.cached);
    assert_eq!(second.total_elements, first.total_elements);
}

/// S5: a call resolves only when the callee name is unambiguous across the
/// element set; two same-named candidates leave the call unresolved.
#[test]
fn s5_ambiguous_callee_name_leaves_call_unresolved() {
    let mut unambiguous = extract(Language::Go, "foo.go", "package main\nfunc foo() { bar() }");
    unambiguous.extend(extract(Language::Go, "bar.go", "package main\nfunc bar() {}"));
    let graphs = codetrace::graph::GraphSet::build(&unambiguous);
    assert_eq!(graphs.call.edge_count(), 1);

    let mut ambiguous = extract(Language::Go, "foo.go", "package main\nfunc foo() { bar() }");
    ambiguous.extend(extract(Language::Go, "bar1.go", "package main\nfunc bar() {}"));
    ambiguous.extend(extract(Language::Go, "bar2.go", "package main\nfunc bar() {}"));
    let graphs = codetrace::graph::GraphSet::build(&ambiguous);
    assert_eq!(graphs.call.edge_count(), 0);
}

struct ScriptedLlm;

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat(&self, _system: &str, _user: &str, _timeout: Duration) -> LlmResult<String> {
        Ok(r#"{"confidence": 95, "reasoning": "certain", "tool_calls": []}"#.to_string())
    }
}

/// S6: an LLM that answers with high confidence and no tool calls on its
/// first turn stops the agent loop after exactly one round.
#[tokio::test]
async fn s6_high_confidence_plan_stops_after_one_round() {
    let repo_dir = TempDir::new().unwrap();
    std::fs::write(repo_dir.path().join("main.go"), "package main\nfunc main(){}").unwrap();

    let mut config = EngineConfig::default();
    config.cache.dir = TempDir::new().unwrap().path().to_path_buf();
    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm);
    let engine = Engine::new(config, None, Some(llm));
    engine.index(repo_dir.path(), true, true).await.unwrap();

    let result = engine.query("what does main do?").await.unwrap();
    assert_eq!(result.rounds, 1);
    assert_eq!(result.stop_reason, "high_confidence");
}
