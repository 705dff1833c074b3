//! Python extractor: `def` at any scope (including methods under classes),
//! `class` definitions with a base list, `import`/`from ... import`.

use tree_sitter::{Node, Parser};

use super::{
    collect_call_names, line_range, node_text, one_line, preceding_doc_comment, LanguageExtractor,
};
use crate::types::{CodeElement, ElementId, ElementKind, ElementMetadata, ImportSpec, Language};

pub struct PythonExtractor;

impl LanguageExtractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extract(&self, repo_name: &str, relative_path: &str, source: &str) -> Vec<CodeElement> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_python::LANGUAGE.into()).is_err() {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::Python,
                true,
            )];
        }
        let Some(tree) = parser.parse(source, None) else {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::Python,
                true,
            )];
        };

        let root = tree.root_node();
        let mut imports = Vec::new();
        let mut elements = Vec::new();
        walk_module(repo_name, relative_path, root, source, false, &mut imports, &mut elements);

        let (start, end) = line_range(root);
        let file_element = CodeElement {
            id: ElementId::new(repo_name, ElementKind::File, &[relative_path]),
            kind: ElementKind::File,
            name: super::file_name(relative_path),
            language: Language::Python,
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

fn walk_module(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
    in_class: bool,
    imports: &mut Vec<ImportSpec>,
    elements: &mut Vec<CodeElement>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_statement" => push_import(child, source, imports),
            "import_from_statement" => push_import_from(child, source, imports),
            "function_definition" => {
                if let Some(el) = function_element(repo_name, relative_path, child, source, in_class) {
                    elements.push(el);
                }
            }
            "class_definition" => {
                if let Some(el) = class_element(repo_name, relative_path, child, source) {
                    elements.push(el);
                }
                if let Some(body) = child.child_by_field_name("body") {
                    walk_module(repo_name, relative_path, body, source, true, imports, elements);
                }
            }
            _ => {
                walk_module(repo_name, relative_path, child, source, in_class, imports, elements);
            }
        }
    }
}

fn push_import(node: Node, source: &str, out: &mut Vec<ImportSpec>) {
    let line = node.start_position().row as u32 + 1;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "dotted_name" || child.kind() == "identifier" {
            out.push(ImportSpec {
                module: node_text(child, source).to_string(),
                line,
                alias: None,
            });
        } else if child.kind() == "aliased_import" {
            if let (Some(name), Some(alias)) =
                (child.child_by_field_name("name"), child.child_by_field_name("alias"))
            {
                out.push(ImportSpec {
                    module: node_text(name, source).to_string(),
                    line,
                    alias: Some(node_text(alias, source).to_string()),
                });
            }
        }
    }
}

fn push_import_from(node: Node, source: &str, out: &mut Vec<ImportSpec>) {
    let line = node.start_position().row as u32 + 1;
    let Some(module_node) = node.child_by_field_name("module_name") else { return };
    let module = node_text(module_node, source).to_string();
    out.push(ImportSpec { module, line, alias: None });
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
    let signature = one_line(&source[node.start_byte()..header_end]).trim_end_matches(':').to_string();

    let mut calls = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        collect_call_names(body, source, "call", &mut calls);
    }

    Some(CodeElement {
        id: ElementId::new(
            repo_name,
            ElementKind::Function,
            &[relative_path, &name, &start.to_string()],
        ),
        kind: if is_method { ElementKind::Method } else { ElementKind::Function },
        name,
        language: Language::Python,
        relative_path: relative_path.to_string(),
        start_line: start,
        end_line: end,
        signature,
        code,
        doc: docstring(node, source),
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
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for arg in superclasses.children(&mut cursor) {
            if arg.kind() == "identifier" {
                bases.push(node_text(arg, source).to_string());
            }
        }
    }

    let header_end = node.child_by_field_name("body").map(|b| b.start_byte()).unwrap_or(node.end_byte());
    let signature = one_line(&source[node.start_byte()..header_end]).trim_end_matches(':').to_string();

    Some(CodeElement {
        id: ElementId::new(repo_name, ElementKind::Class, &[relative_path, &name]),
        kind: ElementKind::Class,
        name,
        language: Language::Python,
        relative_path: relative_path.to_string(),
        start_line: start,
        end_line: end,
        signature,
        code: node_text(node, source).to_string(),
        doc: docstring(node, source),
        metadata: ElementMetadata::Class { bases },
    })
}

/// A leading string-expression statement inside the body is the docstring,
/// per Python convention; falls back to a preceding `#` comment block.
fn docstring(node: Node, source: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.child(0)?;
    if first.kind() == "expression_statement" {
        if let Some(string_node) = first.child(0) {
            if string_node.kind() == "string" {
                return Some(node_text(string_node, source).trim_matches(|c| c == '"' || c == '\'').trim().to_string());
            }
        }
    }
    preceding_doc_comment(node, source)
}
