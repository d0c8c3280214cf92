//! Choice of parser for each file.

use crate::file::{probe_content, ContentHint, PathEntry};
use serde::Serialize;
use std::path::Path;
use tracing::trace;

/// Handler selected for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// Python source
    Python,
    /// Markdown document
    Markdown,
    /// Dockerfile
    Dockerfile,
    /// License text
    License,
    /// Any other text file, chunked by lines
    Text,
    /// Binary content, skipped
    Binary,
}

impl ParserKind {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Markdown => "markdown",
            Self::Dockerfile => "dockerfile",
            Self::License => "license",
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }

    /// Returns true for kinds with a structural parser.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(
            self,
            Self::Python | Self::Markdown | Self::Dockerfile | Self::License
        )
    }
}

/// Chooses the handler for an entry.
///
/// Names and extensions decide first; other files fall back to the
/// walker's content hint, or a fresh probe when there is none. Never fails:
/// a file that cannot be probed is treated as binary.
#[must_use]
pub fn classify(entry: &PathEntry) -> ParserKind {
    if let Some(kind) = kind_from_name(&entry.path) {
        return kind;
    }

    match entry.content_hint {
        ContentHint::Text => ParserKind::Text,
        ContentHint::Binary => ParserKind::Binary,
        ContentHint::Unknown => match probe_content(&entry.path) {
            Ok(ContentHint::Text) => ParserKind::Text,
            Ok(_) => ParserKind::Binary,
            Err(e) => {
                trace!("Probe failed for {}: {}", entry.relative_path, e);
                ParserKind::Binary
            }
        },
    }
}

fn kind_from_name(path: &Path) -> Option<ParserKind> {
    let name = path.file_name()?.to_str()?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    if name.to_ascii_uppercase().starts_with("LICENSE") {
        return Some(ParserKind::License);
    }

    if name == "Dockerfile" || extension.as_deref() == Some("dockerfile") {
        return Some(ParserKind::Dockerfile);
    }

    match extension.as_deref() {
        Some("py") => Some(ParserKind::Python),
        Some("md" | "markdown") => Some(ParserKind::Markdown),
        _ => None,
    }
}

/// Language label for code fences and file metadata.
#[must_use]
pub fn language_for(path: &Path, kind: ParserKind) -> &'static str {
    if kind != ParserKind::Text {
        return kind.as_str();
    }

    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    match name {
        "Makefile" | "makefile" | "GNUmakefile" => return "makefile",
        "CMakeLists.txt" => return "cmake",
        _ => {}
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "rs" => "rust",
        "pyi" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" => "typescript",
        "jsx" => "jsx",
        "tsx" => "tsx",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "sh" | "bash" => "bash",
        "zsh" => "zsh",
        "ps1" => "powershell",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "xml" => "xml",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "ini" | "cfg" => "ini",
        "sql" => "sql",
        "graphql" | "gql" => "graphql",
        "proto" => "protobuf",
        "rst" => "rst",
        _ => "text",
    }
}
