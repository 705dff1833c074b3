//! The universal data model: `CodeElement`, its id, kind, and metadata.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable string id for a `CodeElement`.
///
/// Derived deterministically from `(repo_name, kind, identifying parts)` —
/// two runs over identical bytes produce bytewise-identical ids. Backed by
/// `Box<str>` rather than an interned integer because the format is part of
/// the wire/cache contract (`RepoSnapshot`), not an in-process optimization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(Box<str>);

impl ElementId {
    /// Builds an id from the repo name, element kind, and an ordered list of
    /// identifying parts (e.g. relative path, then symbol name, then line).
    /// The hash salts on `kind` so a file and a class that happen to share a
    /// name never collide.
    pub fn new(repo_name: &str, kind: ElementKind, parts: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(repo_name.as_bytes());
        hasher.update(b"\0");
        hasher.update(kind.as_str().as_bytes());
        for part in parts {
            hasher.update(b"\0");
            hasher.update(part.as_bytes());
        }
        let digest = hasher.finalize();
        let hex = digest.iter().take(16).map(|b| format!("{b:02x}")).collect::<String>();
        ElementId(format!("{}:{hex}", kind.as_str()).into_boxed_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wraps an id string verbatim without hashing — used when an id arrives
    /// from outside the process (agent tool arguments, cache round-trips)
    /// and is already in its canonical `kind:hex` form.
    pub fn from_raw(raw: impl Into<Box<str>>) -> Self {
        ElementId(raw.into())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ElementId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    File,
    Class,
    Function,
    Method,
    ImportGroup,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::File => "file",
            ElementKind::Class => "class",
            ElementKind::Function => "function",
            ElementKind::Method => "method",
            ElementKind::ImportGroup => "import_group",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Python,
    Javascript,
    Typescript,
    Java,
    Rust,
    C,
    Cpp,
    Csharp,
    Unknown,
}

impl Language {
    /// Maps a file extension (without the leading dot) to a `Language`.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "go" => Language::Go,
            "py" | "pyi" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::Javascript,
            "ts" | "tsx" => Language::Typescript,
            "java" => Language::Java,
            "rs" => Language::Rust,
            "c" | "h" => Language::C,
            "cc" | "cpp" | "cxx" | "hpp" | "hh" => Language::Cpp,
            "cs" => Language::Csharp,
            _ => Language::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Java => "java",
            Language::Rust => "rust",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Csharp => "csharp",
            Language::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One import statement observed inside a file element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSpec {
    pub module: String,
    pub line: u32,
    pub alias: Option<String>,
}

/// Per-kind metadata. A tagged variant rather than an untyped map —
/// wrong-kind access is a compile-time impossibility, not a silently-skipped
/// runtime check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementMetadata {
    File {
        imports: Vec<ImportSpec>,
        parse_error: bool,
    },
    Class {
        bases: Vec<String>,
    },
    Function {
        calls: Vec<String>,
    },
    None,
}

impl ElementMetadata {
    pub fn imports(&self) -> &[ImportSpec] {
        match self {
            ElementMetadata::File { imports, .. } => imports,
            _ => &[],
        }
    }

    pub fn bases(&self) -> &[String] {
        match self {
            ElementMetadata::Class { bases } => bases,
            _ => &[],
        }
    }

    pub fn calls(&self) -> &[String] {
        match self {
            ElementMetadata::Function { calls } => calls,
            _ => &[],
        }
    }

    pub fn parse_error(&self) -> bool {
        matches!(self, ElementMetadata::File { parse_error: true, .. })
    }
}

/// The universal unit indexed, searched, and returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeElement {
    pub id: ElementId,
    pub kind: ElementKind,
    pub name: String,
    pub language: Language,
    pub relative_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub signature: String,
    pub code: String,
    pub doc: Option<String>,
    pub metadata: ElementMetadata,
}

impl CodeElement {
    /// Concatenated textual representation used as a BM25 document and, when
    /// no more specific text is given, as embedding input.
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(
            self.name.len() + self.signature.len() + self.code.len() + 32,
        );
        text.push_str(&self.name);
        text.push('\n');
        text.push_str(&self.signature);
        text.push('\n');
        text.push_str(&self.code);
        if let Some(doc) = &self.doc {
            text.push('\n');
            text.push_str(doc);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic_across_runs() {
        let a = ElementId::new("repo", ElementKind::Function, &["main.go", "helper", "3"]);
        let b = ElementId::new("repo", ElementKind::Function, &["main.go", "helper", "3"]);
        assert_eq!(a, b);
    }

    #[test]
    fn id_salts_on_kind() {
        let file_id = ElementId::new("repo", ElementKind::File, &["a"]);
        let class_id = ElementId::new("repo", ElementKind::Class, &["a"]);
        assert_ne!(file_id, class_id);
    }

    #[test]
    fn language_from_extension_covers_all_target_languages() {
        assert_eq!(Language::from_extension("go"), Language::Go);
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("ts"), Language::Typescript);
        assert_eq!(Language::from_extension("tsx"), Language::Typescript);
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("cpp"), Language::Cpp);
        assert_eq!(Language::from_extension("xyz"), Language::Unknown);
    }

    #[test]
    fn metadata_accessors_return_empty_for_wrong_kind() {
        let meta = ElementMetadata::Function { calls: vec!["bar".into()] };
        assert_eq!(meta.calls(), &["bar".to_string()]);
        assert!(meta.bases().is_empty());
        assert!(meta.imports().is_empty());
    }
}
