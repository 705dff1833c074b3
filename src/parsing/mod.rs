//! Parser — dispatches by language tag to a language-specific extractor,
//! each of which walks a tree-sitter parse tree and emits `CodeElement`s.

pub mod c;
pub mod cpp;
pub mod csharp;
pub mod go;
pub mod java;
pub mod javascript;
pub mod python;
pub mod rust;
pub mod typescript;

use tree_sitter::Node;

use crate::types::{CodeElement, ElementId, ElementKind, ElementMetadata, ImportSpec, Language};

/// Implemented once per supported language. `extract` never panics on
/// malformed input — a tree-sitter parse failure still yields a single file
/// element flagged `parse_error = true`, per spec.
pub trait LanguageExtractor: Send + Sync {
    fn language(&self) -> Language;

    /// Parses `source` and returns every element found in the file,
    /// including the file element itself (always first).
    fn extract(&self, repo_name: &str, relative_path: &str, source: &str) -> Vec<CodeElement>;
}

/// Returns the extractor for `language`, or `None` if unsupported (the file
/// is still emitted as a bare file element by the caller).
pub fn extractor_for(language: Language) -> Option<Box<dyn LanguageExtractor>> {
    match language {
        Language::Go => Some(Box::new(go::GoExtractor)),
        Language::Python => Some(Box::new(python::PythonExtractor)),
        Language::Javascript => Some(Box::new(javascript::JavascriptExtractor)),
        Language::Typescript => Some(Box::new(typescript::TypescriptExtractor)),
        Language::Java => Some(Box::new(java::JavaExtractor)),
        Language::Rust => Some(Box::new(rust::RustExtractor)),
        Language::C => Some(Box::new(c::CExtractor)),
        Language::Cpp => Some(Box::new(cpp::CppExtractor)),
        Language::Csharp => Some(Box::new(csharp::CsharpExtractor)),
        Language::Unknown => None,
    }
}

/// Builds the bare file element emitted when a language has no extractor or
/// a parse failed outright.
pub fn unparsed_file_element(
    repo_name: &str,
    relative_path: &str,
    source: &str,
    language: Language,
    parse_error: bool,
) -> CodeElement {
    let line_count = source.lines().count().max(1) as u32;
    CodeElement {
        id: ElementId::new(repo_name, ElementKind::File, &[relative_path]),
        kind: ElementKind::File,
        name: file_name(relative_path),
        language,
        relative_path: relative_path.to_string(),
        start_line: 1,
        end_line: line_count,
        signature: relative_path.to_string(),
        code: source.to_string(),
        doc: None,
        metadata: ElementMetadata::File { imports: Vec::new(), parse_error },
    }
}

pub(crate) fn file_name(relative_path: &str) -> String {
    relative_path.rsplit('/').next().unwrap_or(relative_path).to_string()
}

/// 1-based inclusive line range for a tree-sitter node.
pub(crate) fn line_range(node: Node) -> (u32, u32) {
    (node.start_position().row as u32 + 1, node.end_position().row as u32 + 1)
}

pub(crate) fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// Collapses a signature to one line: trims surrounding whitespace, then
/// replaces embedded newlines/runs of whitespace with a single space.
pub(crate) fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Walks preceding siblings to find a contiguous block of `comment` nodes
/// immediately above `node`, joined as the doc comment text. Language-generic
/// since tree-sitter grammars name comment nodes consistently.
pub(crate) fn preceding_doc_comment(node: Node, source: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = node.prev_sibling();
    let mut last_row = node.start_position().row;

    while let Some(sibling) = current {
        if sibling.kind() != "comment" && sibling.kind() != "line_comment" && sibling.kind() != "block_comment" {
            break;
        }
        if last_row.saturating_sub(sibling.end_position().row) > 1 {
            break;
        }
        lines.push(node_text(sibling, source).trim().to_string());
        last_row = sibling.start_position().row;
        current = sibling.prev_sibling();
    }

    if lines.is_empty() {
        None
    } else {
        lines.reverse();
        Some(lines.join("\n"))
    }
}

/// Recursively collects the name of every `call_kind`-shaped node under
/// `node`, reading the callee identifier from `ident_field` or, if absent,
/// the first child of kind `ident_child_kind`.
pub(crate) fn collect_call_names(
    node: Node,
    source: &str,
    call_kind: &str,
    out: &mut Vec<String>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == call_kind {
            if let Some(callee) = child.child_by_field_name("function").or_else(|| child.child(0)) {
                let name = leaf_identifier(callee, source);
                if let Some(name) = name {
                    out.push(name);
                }
            }
        }
        collect_call_names(child, source, call_kind, out);
    }
}

/// Extracts the right-most identifier segment from a (possibly member-access)
/// callee expression, e.g. `pkg.Foo` → `Foo`, `obj.method()` → `method`.
fn leaf_identifier(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" => {
            Some(node_text(node, source).to_string())
        }
        _ => {
            if let Some(field) = node.child_by_field_name("field").or_else(|| node.child_by_field_name("property")) {
                return leaf_identifier(field, source);
            }
            node.child(node.child_count().checked_sub(1)?).and_then(|c| leaf_identifier(c, source))
        }
    }
}
