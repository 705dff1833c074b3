//! C extractor: functions with bodies, `#include` as imports. C has no
//! class-shaped construct in the extraction contract.

use tree_sitter::{Node, Parser};

use super::{
    collect_call_names, line_range, node_text, one_line, preceding_doc_comment, LanguageExtractor,
};
use crate::types::{CodeElement, ElementId, ElementKind, ElementMetadata, ImportSpec, Language};

pub struct CExtractor;

impl LanguageExtractor for CExtractor {
    fn language(&self) -> Language {
        Language::C
    }

    fn extract(&self, repo_name: &str, relative_path: &str, source: &str) -> Vec<CodeElement> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_c::LANGUAGE.into()).is_err() {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::C,
                true,
            )];
        }
        extract_clike(parser, repo_name, relative_path, source, Language::C)
    }
}

pub(crate) fn extract_clike(
    mut parser: Parser,
    repo_name: &str,
    relative_path: &str,
    source: &str,
    language: Language,
) -> Vec<CodeElement> {
    let Some(tree) = parser.parse(source, None) else {
        return vec![super::unparsed_file_element(repo_name, relative_path, source, language, true)];
    };

    let root = tree.root_node();
    let mut imports = Vec::new();
    let mut functions = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "preproc_include" => push_include(child, source, &mut imports),
            "function_definition" => {
                if let Some(el) = function_element(repo_name, relative_path, child, source, language) {
                    functions.push(el);
                }
            }
            _ => {}
        }
    }

    let (start, end) = line_range(root);
    let file_element = CodeElement {
        id: ElementId::new(repo_name, ElementKind::File, &[relative_path]),
        kind: ElementKind::File,
        name: super::file_name(relative_path),
        language,
        relative_path: relative_path.to_string(),
        start_line: start,
        end_line: end,
        signature: relative_path.to_string(),
        code: source.to_string(),
        doc: None,
        metadata: ElementMetadata::File { imports, parse_error: false },
    };

    let mut out = vec![file_element];
    out.extend(functions);
    out
}

fn push_include(node: Node, source: &str, out: &mut Vec<ImportSpec>) {
    let Some(path_node) = node.child_by_field_name("path") else { return };
    let module = node_text(path_node, source).trim_matches(|c| c == '"' || c == '<' || c == '>').to_string();
    out.push(ImportSpec { module, line: node.start_position().row as u32 + 1, alias: None });
}

/// Recursively locates the identifier naming a (possibly nested, for
/// pointer-returning) function declarator.
fn declarator_name<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    match node.kind() {
        "identifier" | "field_identifier" => Some(node_text(node, source)),
        _ => {
            let inner = node.child_by_field_name("declarator")?;
            declarator_name(inner, source)
        }
    }
}

fn function_element(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
    language: Language,
) -> Option<CodeElement> {
    let declarator = node.child_by_field_name("declarator")?;
    let name = declarator_name(declarator, source)?.to_string();
    let (start, end) = line_range(node);

    let header_end = node.child_by_field_name("body").map(|b| b.start_byte()).unwrap_or(node.end_byte());
    let signature = one_line(&source[node.start_byte()..header_end]);

    let mut calls = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        collect_call_names(body, source, "call_expression", &mut calls);
    }

    Some(CodeElement {
        id: ElementId::new(
            repo_name,
            ElementKind::Function,
            &[relative_path, &name, &start.to_string()],
        ),
        kind: ElementKind::Function,
        name,
        language,
        relative_path: relative_path.to_string(),
        start_line: start,
        end_line: end,
        signature,
        code: node_text(node, source).to_string(),
        doc: preceding_doc_comment(node, source),
        metadata: ElementMetadata::Function { calls },
    })
}
