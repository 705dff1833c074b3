//! Graph Builder — three independent labeled directed graphs
//! (dependency: file→file, inheritance: class→class, call: function→function)
//! built from the resolved element set in one pass.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::{CodeElement, ElementId, ElementKind};

/// A single directed graph over element ids. No self-loops; duplicate edges
/// collapse (forward/reverse adjacency are `HashSet`s).
#[derive(Debug, Default, Clone)]
pub struct Graph {
    forward: HashMap<ElementId, HashSet<ElementId>>,
    reverse: HashMap<ElementId, HashSet<ElementId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `a -> b`. Rejects self-loops; idempotent on repeats.
    pub fn add_edge(&mut self, a: ElementId, b: ElementId) {
        if a == b {
            return;
        }
        self.forward.entry(a.clone()).or_default().insert(b.clone());
        self.reverse.entry(b).or_default().insert(a);
    }

    pub fn successors(&self, id: &ElementId) -> Vec<ElementId> {
        self.forward.get(id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn predecessors(&self, id: &ElementId) -> Vec<ElementId> {
        self.reverse.get(id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        let mut nodes: HashSet<&ElementId> = self.forward.keys().collect();
        nodes.extend(self.reverse.keys());
        nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(|s| s.len()).sum()
    }
}

/// The three graphs built over one repo's elements.
#[derive(Debug, Default)]
pub struct GraphSet {
    pub dependency: Graph,
    pub inheritance: Graph,
    pub call: Graph,
}

impl GraphSet {
    /// Builds all three graphs from the full element set in one pass.
    pub fn build(elements: &[CodeElement]) -> Self {
        let mut set = GraphSet::default();

        let files_by_path: HashMap<&str, &CodeElement> = elements
            .iter()
            .filter(|e| e.kind == ElementKind::File)
            .map(|e| (e.relative_path.as_str(), e))
            .collect();

        let classes_by_name = index_by_name(elements, |k| k == ElementKind::Class);
        let functions_by_name = index_by_name(elements, |k| matches!(k, ElementKind::Function | ElementKind::Method));

        for element in elements {
            match element.kind {
                ElementKind::File => {
                    for import in element.metadata.imports() {
                        if let Some(target) = resolve_import(&import.module, &files_by_path, &element.relative_path) {
                            set.dependency.add_edge(element.id.clone(), target.id.clone());
                        }
                    }
                }
                ElementKind::Class => {
                    for base in element.metadata.bases() {
                        if let Some(target) = classes_by_name.get(base.as_str()) {
                            if target.len() == 1 {
                                set.inheritance.add_edge(element.id.clone(), target[0].id.clone());
                            }
                        }
                    }
                }
                ElementKind::Function | ElementKind::Method => {
                    for callee in element.metadata.calls() {
                        if let Some(target) = functions_by_name.get(callee.as_str()) {
                            if target.len() == 1 {
                                set.call.add_edge(element.id.clone(), target[0].id.clone());
                            }
                        }
                    }
                }
                ElementKind::ImportGroup => {}
            }
        }

        set
    }

    /// BFS across all three graphs combined, both directions, up to
    /// `max_hops` away from `id`. Returns the visited set excluding the seed.
    pub fn related_within(&self, id: &ElementId, max_hops: usize) -> Vec<ElementId> {
        let mut visited: HashSet<ElementId> = HashSet::new();
        visited.insert(id.clone());
        let mut frontier = VecDeque::new();
        frontier.push_back((id.clone(), 0usize));

        let mut result = Vec::new();
        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= max_hops {
                continue;
            }
            for neighbor in self.combined_neighbors(&current) {
                if visited.insert(neighbor.clone()) {
                    result.push(neighbor.clone());
                    frontier.push_back((neighbor, depth + 1));
                }
            }
        }
        result
    }

    fn combined_neighbors(&self, id: &ElementId) -> Vec<ElementId> {
        let mut neighbors = Vec::new();
        for graph in [&self.dependency, &self.inheritance, &self.call] {
            neighbors.extend(graph.successors(id));
            neighbors.extend(graph.predecessors(id));
        }
        neighbors
    }
}

fn index_by_name<'a>(
    elements: &'a [CodeElement],
    matches: impl Fn(ElementKind) -> bool,
) -> HashMap<&'a str, Vec<&'a CodeElement>> {
    let mut index: HashMap<&str, Vec<&CodeElement>> = HashMap::new();
    for element in elements {
        if matches(element.kind) {
            index.entry(element.name.as_str()).or_default().push(element);
        }
    }
    index
}

/// Resolution order: longest-suffix path match, then dot-to-slash
/// substitution with a substring match. Unresolved imports are dropped.
///
/// Preserves the source's substring matching (can false-positive on prefix
/// names) rather than the stricter exact-segment-boundary alternative. See
/// DESIGN.md for the reasoning.
fn resolve_import<'a>(
    module: &str,
    files_by_path: &HashMap<&'a str, &'a CodeElement>,
    importing_path: &str,
) -> Option<&'a CodeElement> {
    let candidates: Vec<&&CodeElement> = files_by_path
        .iter()
        .filter(|(path, _)| **path != importing_path)
        .map(|(_, element)| element)
        .collect();

    let by_suffix: Vec<&&CodeElement> = candidates
        .iter()
        .copied()
        .filter(|element| path_has_suffix(&element.relative_path, module))
        .collect();
    if let [only] = by_suffix.as_slice() {
        return Some(only);
    }

    let slashed = module.replace('.', "/");
    let by_substring: Vec<&&CodeElement> = candidates
        .iter()
        .copied()
        .filter(|element| element.relative_path.contains(&slashed))
        .collect();
    if let [only] = by_substring.as_slice() {
        return Some(only);
    }

    None
}

fn path_has_suffix(path: &str, module: &str) -> bool {
    let normalized_module = module.replace('.', "/");
    path.ends_with(&normalized_module)
        || path.ends_with(&format!("{normalized_module}.rs"))
        || stem(path) == normalized_module
}

fn stem(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ElementMetadata, ImportSpec, Language};

    fn file(repo: &str, path: &str, imports: Vec<ImportSpec>) -> CodeElement {
        CodeElement {
            id: ElementId::new(repo, ElementKind::File, &[path]),
            kind: ElementKind::File,
            name: path.to_string(),
            language: Language::Python,
            relative_path: path.to_string(),
            start_line: 1,
            end_line: 1,
            signature: path.to_string(),
            code: String::new(),
            doc: None,
            metadata: ElementMetadata::File { imports, parse_error: false },
        }
    }

    fn class(repo: &str, path: &str, name: &str, bases: Vec<String>) -> CodeElement {
        CodeElement {
            id: ElementId::new(repo, ElementKind::Class, &[path, name]),
            kind: ElementKind::Class,
            name: name.to_string(),
            language: Language::Python,
            relative_path: path.to_string(),
            start_line: 1,
            end_line: 1,
            signature: name.to_string(),
            code: String::new(),
            doc: None,
            metadata: ElementMetadata::Class { bases },
        }
    }

    #[test]
    fn graph_rejects_self_loops() {
        let mut g = Graph::new();
        let id = ElementId::new("r", ElementKind::File, &["a.py"]);
        g.add_edge(id.clone(), id.clone());
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn graph_edges_are_idempotent() {
        let mut g = Graph::new();
        let a = ElementId::new("r", ElementKind::File, &["a.py"]);
        let b = ElementId::new("r", ElementKind::File, &["b.py"]);
        g.add_edge(a.clone(), b.clone());
        g.add_edge(a.clone(), b.clone());
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn adjacency_is_symmetric() {
        let mut g = Graph::new();
        let a = ElementId::new("r", ElementKind::File, &["a.py"]);
        let b = ElementId::new("r", ElementKind::File, &["b.py"]);
        g.add_edge(a.clone(), b.clone());
        assert!(g.successors(&a).contains(&b));
        assert!(g.predecessors(&b).contains(&a));
    }

    #[test]
    fn inheritance_edge_added_for_unique_base() {
        let a = class("r", "a.py", "A", vec![]);
        let b = class("r", "b.py", "B", vec!["A".to_string()]);
        let set = GraphSet::build(&[a.clone(), b.clone()]);
        assert!(set.inheritance.successors(&b.id).contains(&a.id));
    }

    #[test]
    fn inheritance_edge_absent_for_ambiguous_base() {
        let a1 = class("r", "a.py", "A", vec![]);
        let a2 = class("r", "a2.py", "A", vec![]);
        let b = class("r", "b.py", "B", vec!["A".to_string()]);
        let set = GraphSet::build(&[a1, a2, b.clone()]);
        assert!(set.inheritance.successors(&b.id).is_empty());
    }

    #[test]
    fn dependency_edge_added_for_import() {
        let a = file("r", "a.py", vec![]);
        let b = file(
            "r",
            "b.py",
            vec![ImportSpec { module: "a".to_string(), line: 1, alias: None }],
        );
        let set = GraphSet::build(&[a.clone(), b.clone()]);
        assert!(set.dependency.successors(&b.id).contains(&a.id));
    }
}
