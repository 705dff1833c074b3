//! C# extractor: methods; `class`/`interface` with a base list;
//! `using ...;` directives. Not named in the distilled per-language table
//! but required by the `Language` enum — follows the same shape as Java.

use tree_sitter::{Node, Parser};

use super::{
    collect_call_names, line_range, node_text, one_line, preceding_doc_comment, LanguageExtractor,
};
use crate::types::{CodeElement, ElementId, ElementKind, ElementMetadata, ImportSpec, Language};

pub struct CsharpExtractor;

impl LanguageExtractor for CsharpExtractor {
    fn language(&self) -> Language {
        Language::Csharp
    }

    fn extract(&self, repo_name: &str, relative_path: &str, source: &str) -> Vec<CodeElement> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_c_sharp::LANGUAGE.into()).is_err() {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::Csharp,
                true,
            )];
        }
        let Some(tree) = parser.parse(source, None) else {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::Csharp,
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
            language: Language::Csharp,
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
            "using_directive" => push_using(child, source, imports),
            "method_declaration" | "constructor_declaration" => {
                if let Some(el) = method_element(repo_name, relative_path, child, source) {
                    elements.push(el);
                }
            }
            "class_declaration" | "interface_declaration" => {
                if let Some(el) = type_element(repo_name, relative_path, child, source) {
                    elements.push(el);
                }
                if let Some(body) = child.child_by_field_name("body") {
                    walk(repo_name, relative_path, body, source, imports, elements);
                }
            }
            "namespace_declaration" => {
                if let Some(body) = child.child_by_field_name("body") {
                    walk(repo_name, relative_path, body, source, imports, elements);
                }
            }
            _ => {}
        }
    }
}

fn push_using(node: Node, source: &str, out: &mut Vec<ImportSpec>) {
    let line = node.start_position().row as u32 + 1;
    let module = node_text(node, source)
        .trim_start_matches("using")
        .trim_end_matches(';')
        .trim()
        .to_string();
    out.push(ImportSpec { module, line, alias: None });
}

fn method_element(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
) -> Option<CodeElement> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source).to_string();
    let (start, end) = line_range(node);

    let header_end = node.child_by_field_name("body").map(|b| b.start_byte()).unwrap_or(node.end_byte());
    let signature = one_line(&source[node.start_byte()..header_end]);

    let mut calls = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        collect_call_names(body, source, "invocation_expression", &mut calls);
    }

    Some(CodeElement {
        id: ElementId::new(
            repo_name,
            ElementKind::Function,
            &[relative_path, &name, &start.to_string()],
        ),
        kind: ElementKind::Method,
        name,
        language: Language::Csharp,
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
    if let Some(base_list) = node.child_by_field_name("bases") {
        let mut cursor = base_list.walk();
        for child in base_list.children(&mut cursor) {
            if child.kind() == "identifier" {
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
        language: Language::Csharp,
        relative_path: relative_path.to_string(),
        start_line: start,
        end_line: end,
        signature,
        code: node_text(node, source).to_string(),
        doc: preceding_doc_comment(node, source),
        metadata: ElementMetadata::Class { bases },
    })
}
