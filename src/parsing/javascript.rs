//! JavaScript/TypeScript shared extraction: `function`, arrow functions
//! assigned to `const`/`let`, class methods; `class ... extends`; ES
//! `import ...`. TypeScript reuses this logic over its own grammar.

use tree_sitter::{Node, Parser};

use super::{
    collect_call_names, line_range, node_text, one_line, preceding_doc_comment, LanguageExtractor,
};
use crate::types::{CodeElement, ElementId, ElementKind, ElementMetadata, ImportSpec, Language};

pub struct JavascriptExtractor;

impl LanguageExtractor for JavascriptExtractor {
    fn language(&self) -> Language {
        Language::Javascript
    }

    fn extract(&self, repo_name: &str, relative_path: &str, source: &str) -> Vec<CodeElement> {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_javascript::LANGUAGE.into()).is_err() {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::Javascript,
                true,
            )];
        }
        extract_jslike(parser, repo_name, relative_path, source, Language::Javascript)
    }
}

pub(crate) fn extract_jslike(
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
    let mut elements = Vec::new();
    walk(repo_name, relative_path, root, source, language, &mut imports, &mut elements);

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
    out.extend(elements);
    out
}

fn walk(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
    language: Language,
    imports: &mut Vec<ImportSpec>,
    elements: &mut Vec<CodeElement>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_statement" => push_import(child, source, imports),
            "function_declaration" => {
                if let Some(el) = function_element(repo_name, relative_path, child, source, language, false) {
                    elements.push(el);
                }
            }
            "class_declaration" => {
                if let Some(el) = class_element(repo_name, relative_path, child, source, language) {
                    elements.push(el);
                }
                if let Some(body) = child.child_by_field_name("body") {
                    walk(repo_name, relative_path, body, source, language, imports, elements);
                }
            }
            "method_definition" => {
                if let Some(el) = function_element(repo_name, relative_path, child, source, language, true) {
                    elements.push(el);
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                let mut inner = child.walk();
                for decl in child.children(&mut inner) {
                    if decl.kind() == "variable_declarator" {
                        if let Some(el) = arrow_element(repo_name, relative_path, decl, source, language) {
                            elements.push(el);
                        }
                    }
                }
            }
            _ => walk(repo_name, relative_path, child, source, language, imports, elements),
        }
    }
}

fn push_import(node: Node, source: &str, out: &mut Vec<ImportSpec>) {
    let line = node.start_position().row as u32 + 1;
    let Some(source_node) = node.child_by_field_name("source") else { return };
    let module = node_text(source_node, source).trim_matches(|c| c == '"' || c == '\'').to_string();
    out.push(ImportSpec { module, line, alias: None });
}

fn function_element(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
    language: Language,
    is_method: bool,
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
        kind: if is_method { ElementKind::Method } else { ElementKind::Function },
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

/// `const foo = (x) => {...}` / `const foo = function(x) {...}`.
fn arrow_element(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
    language: Language,
) -> Option<CodeElement> {
    let name_node = node.child_by_field_name("name")?;
    let value_node = node.child_by_field_name("value")?;
    if !matches!(value_node.kind(), "arrow_function" | "function" | "function_expression") {
        return None;
    }
    let name = node_text(name_node, source).to_string();
    let (start, end) = line_range(node);

    let header_end = value_node
        .child_by_field_name("body")
        .map(|b| b.start_byte())
        .unwrap_or(value_node.end_byte());
    let signature = one_line(&source[node.start_byte()..header_end]);

    let mut calls = Vec::new();
    if let Some(body) = value_node.child_by_field_name("body") {
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

fn class_element(
    repo_name: &str,
    relative_path: &str,
    node: Node,
    source: &str,
    language: Language,
) -> Option<CodeElement> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source).to_string();
    let (start, end) = line_range(node);

    let mut bases = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "class_heritage" {
            let mut inner = child.walk();
            for ident in child.children(&mut inner) {
                if ident.kind() == "identifier" {
                    bases.push(node_text(ident, source).to_string());
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
        language,
        relative_path: relative_path.to_string(),
        start_line: start,
        end_line: end,
        signature,
        code: node_text(node, source).to_string(),
        doc: preceding_doc_comment(node, source),
        metadata: ElementMetadata::Class { bases },
    })
}
