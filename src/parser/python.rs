use super::{FileMetadata, ParsedFile, ParsedSegment, SegmentKind};
use crate::error::{Error, Result};
use crate::source::SourceLines;
use tree_sitter::{Node, Parser};

const LANGUAGE: &str = "python";

/// Splits a module into docstring, import runs, top-level definitions and
/// runs of other statements. Comments attach to the statement after them.
pub(super) fn parse(lines: &SourceLines<'_>) -> Result<ParsedFile> {
    let source = lines.text();

    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| Error::parse(LANGUAGE, e.to_string()))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::parse(LANGUAGE, "parser produced no tree"))?;
    let root = tree.root_node();

    if root.has_error() {
        let line = first_error(root).map_or(0, |node| node.start_position().row + 1);
        return Err(Error::parse(LANGUAGE, format!("syntax error near line {line}")));
    }

    let mut builder = SegmentBuilder::new(lines);
    let mut functions = Vec::new();
    let mut classes = Vec::new();
    let mut seen_statement = false;

    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        let (start, end) = line_range(node);

        if node.kind() == "comment" {
            builder.comment(start, end);
            continue;
        }

        let first_statement = !seen_statement;
        seen_statement = true;

        let definition = if node.kind() == "decorated_definition" {
            node.child_by_field_name("definition").unwrap_or(node)
        } else {
            node
        };

        match definition.kind() {
            "function_definition" => {
                let name = node_name(definition, source);
                if let Some(name) = &name {
                    functions.push(name.clone());
                }
                builder.push(SegmentKind::Function, name, start, end);
            }
            "class_definition" => {
                let name = node_name(definition, source);
                if let Some(name) = &name {
                    classes.push(name.clone());
                }
                builder.push(SegmentKind::Class, name, start, end);
            }
            "import_statement" | "import_from_statement" | "future_import_statement" => {
                builder.push(SegmentKind::Import, None, start, end);
            }
            _ if first_statement && is_docstring(node) => {
                builder.push(SegmentKind::Docstring, None, start, end);
            }
            _ => builder.push(SegmentKind::Code, None, start, end),
        }
    }

    Ok(ParsedFile {
        segments: builder.finish(),
        metadata: FileMetadata::Python { functions, classes },
    })
}

/// Accumulates segments, merging runs and attaching pending comments.
struct SegmentBuilder<'s, 'a> {
    lines: &'s SourceLines<'a>,
    spans: Vec<(SegmentKind, Option<String>, usize, usize)>,
    pending_comments: Option<(usize, usize)>,
}

impl<'s, 'a> SegmentBuilder<'s, 'a> {
    fn new(lines: &'s SourceLines<'a>) -> Self {
        Self {
            lines,
            spans: Vec::new(),
            pending_comments: None,
        }
    }

    fn comment(&mut self, start: usize, end: usize) {
        // a trailing comment on the previous statement's last line
        if self.pending_comments.is_none() {
            if let Some(last) = self.spans.last_mut().filter(|last| start <= last.3) {
                last.3 = last.3.max(end);
                return;
            }
        }

        self.pending_comments = Some(match self.pending_comments {
            Some((first, _)) => (first, end),
            None => (start, end),
        });
    }

    fn push(&mut self, kind: SegmentKind, name: Option<String>, start: usize, end: usize) {
        let pending = self.pending_comments.take();

        if let Some(last) = self.spans.last_mut() {
            let same_line = start <= last.3;
            let continues_run =
                last.0 == kind && matches!(kind, SegmentKind::Import | SegmentKind::Code);
            if same_line || continues_run {
                last.3 = last.3.max(end);
                return;
            }
        }

        let start = pending.map_or(start, |(first, _)| first.min(start));
        self.spans.push((kind, name, start, end));
    }

    fn finish(mut self) -> Vec<ParsedSegment> {
        if let Some((start, end)) = self.pending_comments.take() {
            match self.spans.last_mut() {
                Some(last) if last.0 == SegmentKind::Code => last.3 = end,
                _ => self.spans.push((SegmentKind::Code, None, start, end)),
            }
        }

        let lines = self.lines;
        self.spans
            .into_iter()
            .map(|(kind, name, start, end)| ParsedSegment::new(lines, kind, name, start, end))
            .collect()
    }
}

/// 1-indexed inclusive line range of a node.
fn line_range(node: Node<'_>) -> (usize, usize) {
    let start = node.start_position();
    let end = node.end_position();
    let end_line = if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    };
    (start.row + 1, end_line)
}

fn node_name(node: Node<'_>, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .and_then(|name| name.utf8_text(source.as_bytes()).ok())
        .map(str::to_string)
}

fn is_docstring(node: Node<'_>) -> bool {
    node.kind() == "expression_statement"
        && node.named_child_count() == 1
        && node
            .named_child(0)
            .is_some_and(|child| matches!(child.kind(), "string" | "concatenated_string"))
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }

    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(text: &str) -> Vec<(SegmentKind, Option<String>, usize, usize)> {
        let lines = SourceLines::new(text);
        parse(&lines)
            .unwrap()
            .segments
            .into_iter()
            .map(|s| (s.kind, s.name, s.start_line, s.end_line))
            .collect()
    }

    const MODULE: &str = r#""""Utilities for the app."""

import os
import sys
from pathlib import Path

DEFAULT = 3
LIMIT = 10


@cache
def load(path):
    return Path(path).read_text()


class Store:
    def get(self, key):
        return key


if __name__ == "__main__":
    load(sys.argv[1])
"#;

    #[test]
    fn test_module_structure() {
        assert_eq!(
            segments(MODULE),
            vec![
                (SegmentKind::Docstring, None, 1, 1),
                (SegmentKind::Import, None, 3, 5),
                (SegmentKind::Code, None, 7, 8),
                (SegmentKind::Function, Some("load".to_string()), 11, 13),
                (SegmentKind::Class, Some("Store".to_string()), 16, 18),
                (SegmentKind::Code, None, 21, 22),
            ]
        );
    }

    #[test]
    fn test_metadata_lists_top_level_names() {
        let lines = SourceLines::new(MODULE);
        let parsed = parse(&lines).unwrap();

        assert_eq!(
            parsed.metadata,
            FileMetadata::Python {
                functions: vec!["load".to_string()],
                classes: vec!["Store".to_string()],
            }
        );
    }

    #[test]
    fn test_segments_are_ordered_and_disjoint() {
        let lines = SourceLines::new(MODULE);
        let parsed = parse(&lines).unwrap();

        for pair in parsed.segments.windows(2) {
            assert!(pair[0].start_line <= pair[0].end_line);
            assert!(pair[0].end_line < pair[1].start_line);
        }
    }

    #[test]
    fn test_segment_text_is_source_slice() {
        let lines = SourceLines::new(MODULE);
        let parsed = parse(&lines).unwrap();
        let function = &parsed.segments[3];

        assert_eq!(
            function.text,
            "@cache\ndef load(path):\n    return Path(path).read_text()\n"
        );
    }

    #[test]
    fn test_leading_comments_attach_to_definition() {
        let text = "import os\n\n# helper\n# more\ndef f():\n    pass\n";
        assert_eq!(
            segments(text),
            vec![
                (SegmentKind::Import, None, 1, 1),
                (SegmentKind::Function, Some("f".to_string()), 3, 6),
            ]
        );
    }

    #[test]
    fn test_statements_on_one_line_share_a_segment() {
        let text = "import os; x = 1\ny = 2\n";
        assert_eq!(
            segments(text),
            vec![
                (SegmentKind::Import, None, 1, 1),
                (SegmentKind::Code, None, 2, 2),
            ]
        );
    }

    #[test]
    fn test_async_function() {
        let text = "async def main():\n    await run()\n";
        assert_eq!(
            segments(text),
            vec![(SegmentKind::Function, Some("main".to_string()), 1, 2)]
        );
    }

    #[test]
    fn test_docstring_only_when_first() {
        let text = "x = 1\n\"\"\"not a docstring\"\"\"\n";
        assert_eq!(segments(text), vec![(SegmentKind::Code, None, 1, 2)]);
    }

    #[test]
    fn test_empty_module() {
        assert!(segments("").is_empty());
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let lines = SourceLines::new("def f(:\n    pass\n");
        let err = parse(&lines).unwrap_err();
        assert!(err.to_string().contains("python"));
    }
}
