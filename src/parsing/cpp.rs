//! C++ extractor: functions with bodies, `class`/`struct` as classes (with a
//! base-clause), `#include` as imports.

use tree_sitter::{Node, Parser};

use super::{
    collect_call_names, line_range, node_text, one_line, preceding_doc_comment, LanguageExtractor,
};
use crate::types::{CodeElement, ElementId, ElementKind, ElementMetadata, ImportSpec, Language};

pub struct CppExtractor;

impl LanguageExtractor for CppExtractor {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn extract(&self, repo_name: &str, relative_path: &str, source: &str) -> Vec<CodeElement> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_cpp::LANGUAGE.into()).is_err() {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::Cpp,
                true,
            )];
        }
        let Some(tree) = parser.parse(source, None) else {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::Cpp,
                true,
            )];
        };

        let root = tree.root_node();
        let mut imports = Vec::new();
        let mut elements = Vec::new();
        walk(repo_name, relative_path, root, source, &mut imports, &mut elements);

        let (start, end) = line_range(root);
        let file_element = CodeElement {
            id: ElementId::new(repo_name, ElementKind::File, &[relative_path]),
            kind: ElementKind::File,
            name: super::file_name(relative_path),
            language: Language::Cpp,
            relative_path: relative_path.to_string(),
            start_line: start,
            end_line: end,
            signature: relative_path.to_string(),
            code: source.to_string(),
            doc: None,
            metadata: ElementMetadata::File { imports, parse_error: false },
        };

        let mut out = vec![file_element];
        out.extend(elements);
        out
    }
}

fn walk(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
    imports: &mut Vec<ImportSpec>,
    elements: &mut Vec<CodeElement>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "preproc_include" => push_include(child, source, imports),
            "function_definition" => {
                if let Some(el) = function_element(repo_name, relative_path, child, source) {
                    elements.push(el);
                }
            }
            "class_specifier" | "struct_specifier" => {
                if let Some(el) = class_element(repo_name, relative_path, child, source) {
                    elements.push(el);
                }
                if let Some(body) = child.child_by_field_name("body") {
                    walk(repo_name, relative_path, body, source, imports, elements);
                }
            }
            "namespace_definition" | "linkage_specification" => {
                if let Some(body) = child.child_by_field_name("body") {
                    walk(repo_name, relative_path, body, source, imports, elements);
                }
            }
            _ => {}
        }
    }
}

fn push_include(node: Node, source: &str, out: &mut Vec<ImportSpec>) {
    let Some(path_node) = node.child_by_field_name("path") else { return };
    let module = node_text(path_node, source).trim_matches(|c| c == '"' || c == '<' || c == '>').to_string();
    out.push(ImportSpec { module, line: node.start_position().row as u32 + 1, alias: None });
}

fn declarator_name<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    match node.kind() {
        "identifier" | "field_identifier" | "qualified_identifier" | "destructor_name" => {
            Some(node_text(node, source))
        }
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
        language: Language::Cpp,
        relative_path: relative_path.to_string(),
        start_line: start,
        end_line: end,
        signature,
        code: node_text(node, source).to_string(),
        doc: preceding_doc_comment(node, source),
        metadata: ElementMetadata::Function { calls },
    })
}

fn class_element(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
) -> Option<CodeElement> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source).to_string();
    let (start, end) = line_range(node);

    let mut bases = Vec::new();
    if let Some(base_clause) = node.children(&mut node.walk()).find(|n| n.kind() == "base_class_clause") {
        let mut cursor = base_clause.walk();
        for child in base_clause.children(&mut cursor) {
            if matches!(child.kind(), "type_identifier" | "qualified_identifier") {
                bases.push(node_text(child, source).to_string());
            }
        }
    }

    let header_end = node.child_by_field_name("body").map(|b| b.start_byte()).unwrap_or(node.end_byte());
    let signature = one_line(&source[node.start_byte()..header_end]);

    Some(CodeElement {
        id: ElementId::new(repo_name, ElementKind::Class, &[relative_path, &name]),
        kind: ElementKind::Class,
        name,
        language: Language::Cpp,
        relative_path: relative_path.to_string(),
        start_line: start,
        end_line: end,
        signature,
        code: node_text(node, source).to_string(),
        doc: preceding_doc_comment(node, source),
        metadata: ElementMetadata::Class { bases },
    })
}
