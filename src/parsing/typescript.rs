//! TypeScript extractor: the JavaScript grammar shape plus type annotations,
//! which are immaterial to the extraction contract (same node kinds for
//! functions, classes, and imports) — reuses `javascript::extract_jslike`
//! over the TypeScript grammar.

use tree_sitter::Parser;

use super::javascript::extract_jslike;
use super::LanguageExtractor;
use crate::types::{CodeElement, Language};

pub struct TypescriptExtractor;

impl LanguageExtractor for TypescriptExtractor {
    fn language(&self) -> Language {
        Language::Typescript
    }

    fn extract(&self, repo_name: &str, relative_path: &str, source: &str) -> Vec<CodeElement> {
        let mut parser = Parser::new();
        let is_tsx = relative_path.ends_with(".tsx");
        let language = if is_tsx {
            tree_sitter_typescript::LANGUAGE_TSX
        } else {
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT
        };
        if parser.set_language(&language.into()).is_err() {
            return vec![super::unparsed_file_element(
                repo_name,
                relative_path,
                source,
                Language::Typescript,
                true,
            )];
        }
        extract_jslike(parser, repo_name, relative_path, source, Language::Typescript)
    }
}
