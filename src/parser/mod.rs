//! Language-aware decomposition of files into segments.

mod dockerfile;
mod license;
mod markdown;
mod python;

use crate::classify::ParserKind;
use crate::error::Result;
use crate::source::SourceLines;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Structural role of a [`ParsedSegment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Module docstring
    Docstring,
    /// Run of consecutive import statements
    Import,
    /// Top-level class definition
    Class,
    /// Top-level function definition
    Function,
    /// Run of other top-level statements
    Code,
    /// Markdown text before the first heading
    Preamble,
    /// Markdown heading section
    Section,
    /// Dockerfile instruction
    Instruction,
    /// Whole license text
    License,
}

impl SegmentKind {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Docstring => "docstring",
            Self::Import => "import",
            Self::Class => "class",
            Self::Function => "function",
            Self::Code => "code",
            Self::Preamble => "preamble",
            Self::Section => "section",
            Self::Instruction => "instruction",
            Self::License => "license",
        }
    }
}

/// A structural unit of a file with a 1-indexed inclusive line range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedSegment {
    /// Segment kind
    pub kind: SegmentKind,
    /// Function, class, heading or instruction name
    pub name: Option<String>,
    /// First line
    pub start_line: usize,
    /// Last line
    pub end_line: usize,
    /// Source slice of the line range
    pub text: String,
}

impl ParsedSegment {
    fn new(
        lines: &SourceLines<'_>,
        kind: SegmentKind,
        name: Option<String>,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            kind,
            name,
            start_line,
            end_line,
            text: lines.slice(start_line, end_line).to_string(),
        }
    }

    /// Number of lines covered.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.end_line + 1 - self.start_line
    }
}

/// Per-language metadata extracted alongside the segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileMetadata {
    /// Python module
    Python {
        /// Top-level function names
        functions: Vec<String>,
        /// Top-level class names
        classes: Vec<String>,
    },
    /// Markdown document
    Markdown {
        /// Heading texts in order
        headers: Vec<String>,
    },
    /// Dockerfile
    Dockerfile {
        /// Base image of the final stage
        image: Option<String>,
        /// Last `WORKDIR`
        workdir: Option<String>,
        /// Last `ENTRYPOINT`
        entrypoint: Option<String>,
        /// Last `CMD`
        cmd: Option<String>,
        /// `ENV` variables
        env: BTreeMap<String, String>,
    },
    /// License file
    License {
        /// First non-blank line
        header: Option<String>,
        /// Detected SPDX-style identifier
        license: Option<String>,
    },
}

/// Result of a successful structural parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// Ordered, non-overlapping segments
    pub segments: Vec<ParsedSegment>,
    /// Language metadata
    pub metadata: FileMetadata,
}

/// Parses `text` with the parser for `kind`.
///
/// Returns `Ok(None)` for kinds without a structural parser.
///
/// # Errors
///
/// Returns [`crate::Error::Parse`] if the parser rejects the input.
pub fn parse(kind: ParserKind, text: &str) -> Result<Option<ParsedFile>> {
    let lines = SourceLines::new(text);
    let parsed = match kind {
        ParserKind::Python => python::parse(&lines)?,
        ParserKind::Markdown => markdown::parse(&lines),
        ParserKind::Dockerfile => dockerfile::parse(&lines),
        ParserKind::License => license::parse(&lines),
        ParserKind::Text | ParserKind::Binary => return Ok(None),
    };
    Ok(Some(parsed))
}

/// Parses `text`, turning any parser failure into `None`.
///
/// `None` sends the file to raw line chunking.
#[must_use]
pub fn parse_or_fallback(kind: ParserKind, path: &str, text: &str) -> Option<ParsedFile> {
    match parse(kind, text) {
        Ok(Some(parsed)) => {
            debug!(
                "Parsed {} as {}: {} segments",
                path,
                kind.as_str(),
                parsed.segments.len()
            );
            Some(parsed)
        }
        Ok(None) => None,
        Err(e) => {
            warn!("{}: {}; falling back to line chunking", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_has_no_structural_parser() {
        assert!(parse(ParserKind::Text, "hello\n").unwrap().is_none());
        assert!(parse(ParserKind::Binary, "").unwrap().is_none());
    }

    #[test]
    fn test_invalid_python_falls_back() {
        assert!(parse(ParserKind::Python, "def broken(:\n    pass\n").is_err());
        assert!(parse_or_fallback(ParserKind::Python, "bad.py", "def broken(:\n").is_none());
    }

    #[test]
    fn test_segment_line_count() {
        let lines = SourceLines::new("a\nb\nc\n");
        let segment = ParsedSegment::new(&lines, SegmentKind::Code, None, 2, 3);
        assert_eq!(segment.line_count(), 2);
        assert_eq!(segment.text, "b\nc\n");
    }

    #[test]
    fn test_metadata_serializes_flat() {
        let metadata = FileMetadata::Markdown {
            headers: vec!["Intro".to_string()],
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json, serde_json::json!({ "headers": ["Intro"] }));
    }
}
