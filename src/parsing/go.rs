//! Go extractor: top-level `func` and methods on receivers as functions,
//! `type T struct` as a class, `import (...)` blocks as imports.

use tree_sitter::{Node, Parser};

use super::{
    collect_call_names, line_range, node_text, one_line, preceding_doc_comment, LanguageExtractor,
};
use crate::types::{CodeElement, ElementId, ElementKind, ElementMetadata, ImportSpec, Language};

pub struct GoExtractor;

impl LanguageExtractor for GoExtractor {
    fn language(&self) -> Language {
        Language::Go
    }

    fn extract(&self, repo_name: &str, relative_path: &str, source: &str) -> Vec<CodeElement> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_go::LANGUAGE.into()).is_err() {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::Go,
                true,
            )];
        }
        let Some(tree) = parser.parse(source, None) else {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::Go,
                true,
            )];
        };

        let root = tree.root_node();
        let mut imports = Vec::new();
        let mut elements = Vec::new();

        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            match child.kind() {
                "import_declaration" => collect_imports(child, source, &mut imports),
                "function_declaration" => {
                    if let Some(el) = function_element(repo_name, relative_path, child, source, false) {
                        elements.push(el);
                    }
                }
                "method_declaration" => {
                    if let Some(el) = function_element(repo_name, relative_path, child, source, true) {
                        elements.push(el);
                    }
                }
                "type_declaration" => {
                    collect_struct_types(repo_name, relative_path, child, source, &mut elements);
                }
                _ => {}
            }
        }

        let (start, end) = line_range(root);
        let file_element = CodeElement {
            id: ElementId::new(repo_name, ElementKind::File, &[relative_path]),
            kind: ElementKind::File,
            name: super::file_name(relative_path),
            language: Language::Go,
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

fn collect_imports(node: Node, source: &str, out: &mut Vec<ImportSpec>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import_spec_list" {
            let mut inner = child.walk();
            for spec in child.children(&mut inner) {
                if spec.kind() == "import_spec" {
                    push_import_spec(spec, source, out);
                }
            }
        } else if child.kind() == "import_spec" {
            push_import_spec(child, source, out);
        }
    }
}

fn push_import_spec(node: Node, source: &str, out: &mut Vec<ImportSpec>) {
    let path_node = node.child_by_field_name("path");
    let alias_node = node.child_by_field_name("name");
    if let Some(path_node) = path_node {
        let module = node_text(path_node, source).trim_matches('"').to_string();
        let alias = alias_node.map(|n| node_text(n, source).to_string());
        out.push(ImportSpec { module, line: node.start_position().row as u32 + 1, alias });
    }
}

fn function_element(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
    is_method: bool,
) -> Option<CodeElement> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source).to_string();
    let (start, end) = line_range(node);
    let code = node_text(node, source).to_string();

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
        kind: if is_method { ElementKind::Method } else { ElementKind::Function },
        name,
        language: Language::Go,
        relative_path: relative_path.to_string(),
        start_line: start,
        end_line: end,
        signature,
        code,
        doc: preceding_doc_comment(node, source),
        metadata: ElementMetadata::Function { calls },
    })
}

fn collect_struct_types(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
    out: &mut Vec<CodeElement>,
) {
    let mut cursor = node.walk();
    for spec in node.children(&mut cursor) {
        if spec.kind() != "type_spec" {
            continue;
        }
        let Some(name_node) = spec.child_by_field_name("name") else { continue };
        let Some(type_node) = spec.child_by_field_name("type") else { continue };
        if type_node.kind() != "struct_type" {
            continue;
        }
        let name = node_text(name_node, source).to_string();
        let (start, end) = line_range(spec);
        out.push(CodeElement {
            id: ElementId::new(repo_name, ElementKind::Class, &[relative_path, &name]),
            kind: ElementKind::Class,
            name,
            language: Language::Go,
            relative_path: relative_path.to_string(),
            start_line: start,
            end_line: end,
            signature: one_line(node_text(spec, source)),
            code: node_text(spec, source).to_string(),
            doc: preceding_doc_comment(node, source),
            metadata: ElementMetadata::Class { bases: Vec::new() },
        });
    }
}
