//! Rust extractor: `fn` at any scope, `struct`/`enum`/`trait` as classes,
//! `use ...;` as imports.

use tree_sitter::{Node, Parser};

use super::{
    collect_call_names, line_range, node_text, one_line, preceding_doc_comment, LanguageExtractor,
};
use crate::types::{CodeElement, ElementId, ElementKind, ElementMetadata, ImportSpec, Language};

pub struct RustExtractor;

impl LanguageExtractor for RustExtractor {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn extract(&self, repo_name: &str, relative_path: &str, source: &str) -> Vec<CodeElement> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_rust::LANGUAGE.into()).is_err() {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::Rust,
                true,
            )];
        }
        let Some(tree) = parser.parse(source, None) else {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::Rust,
                true,
            )];
        };

        let root = tree.root_node();
        let mut imports = Vec::new();
        let mut elements = Vec::new();
        walk(repo_name, relative_path, root, source, false, &mut imports, &mut elements);

        let (start, end) = line_range(root);
        let file_element = CodeElement {
            id: ElementId::new(repo_name, ElementKind::File, &[relative_path]),
            kind: ElementKind::File,
            name: super::file_name(relative_path),
            language: Language::Rust,
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
    in_impl: bool,
    imports: &mut Vec<ImportSpec>,
    elements: &mut Vec<CodeElement>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "use_declaration" => {
                if let Some(tree_node) = child.child_by_field_name("argument").or_else(|| child.child(1)) {
                    collect_use_tree(tree_node, source, String::new(), child.start_position().row as u32 + 1, imports);
                }
            }
            "function_item" => {
                if let Some(el) = function_element(repo_name, relative_path, child, source, in_impl) {
                    elements.push(el);
                }
            }
            "struct_item" | "enum_item" | "trait_item" => {
                if let Some(el) = type_element(repo_name, relative_path, child, source) {
                    elements.push(el);
                }
            }
            "impl_item" => {
                if let Some(body) = child.child_by_field_name("body") {
                    walk(repo_name, relative_path, body, source, true, imports, elements);
                }
            }
            "mod_item" => {
                if let Some(body) = child.child_by_field_name("body") {
                    walk(repo_name, relative_path, body, source, in_impl, imports, elements);
                }
            }
            _ => {}
        }
    }
}

fn collect_use_tree(node: Node, source: &str, prefix: String, line: u32, out: &mut Vec<ImportSpec>) {
    match node.kind() {
        "scoped_identifier" | "identifier" => {
            out.push(ImportSpec { module: node_text(node, source).to_string(), line, alias: None });
        }
        "use_as_clause" => {
            if let (Some(path), Some(alias)) =
                (node.child_by_field_name("path"), node.child_by_field_name("alias"))
            {
                out.push(ImportSpec {
                    module: node_text(path, source).to_string(),
                    line,
                    alias: Some(node_text(alias, source).to_string()),
                });
            }
        }
        "use_list" => {
            let mut cursor = node.walk();
            for item in node.children(&mut cursor) {
                collect_use_tree(item, source, prefix.clone(), line, out);
            }
        }
        "scoped_use_list" => {
            let path = node.child_by_field_name("path").map(|n| node_text(n, source).to_string()).unwrap_or_default();
            if let Some(list) = node.child_by_field_name("list") {
                let mut cursor = list.walk();
                for item in list.children(&mut cursor) {
                    collect_use_tree(item, source, path.clone(), line, out);
                }
            }
        }
        "use_wildcard" => {
            out.push(ImportSpec { module: format!("{prefix}::*"), line, alias: None });
        }
        _ => {}
    }
}

fn function_element(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
    in_impl: bool,
) -> Option<CodeElement> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source).to_string();
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
        kind: if in_impl { ElementKind::Method } else { ElementKind::Function },
        name,
        language: Language::Rust,
        relative_path: relative_path.to_string(),
        start_line: start,
        end_line: end,
        signature,
        code: node_text(node, source).to_string(),
        doc: preceding_doc_comment(node, source),
        metadata: ElementMetadata::Function { calls },
    })
}

fn type_element(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
) -> Option<CodeElement> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source).to_string();
    let (start, end) = line_range(node);

    let mut bases = Vec::new();
    if node.kind() == "trait_item" {
        if let Some(bounds) = node.child_by_field_name("bounds") {
            let mut cursor = bounds.walk();
            for child in bounds.children(&mut cursor) {
                if child.kind() == "type_identifier" {
                    bases.push(node_text(child, source).to_string());
                }
            }
        }
    }

    let header_end = node.child_by_field_name("body").map(|b| b.start_byte()).unwrap_or(node.end_byte());
    let signature = one_line(&source[node.start_byte()..header_end]);

    Some(CodeElement {
        id: ElementId::new(repo_name, ElementKind::Class, &[relative_path, &name]),
        kind: ElementKind::Class,
        name,
        language: Language::Rust,
        relative_path: relative_path.to_string(),
        start_line: start,
        end_line: end,
        signature,
        code: node_text(node, source).to_string(),
        doc: preceding_doc_comment(node, source),
        metadata: ElementMetadata::Class { bases },
    })
}
