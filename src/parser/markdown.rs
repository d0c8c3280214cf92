use super::{FileMetadata, ParsedFile, ParsedSegment, SegmentKind};
use crate::source::SourceLines;

/// Splits a document at ATX headings outside fenced code blocks.
pub(super) fn parse(lines: &SourceLines<'_>) -> ParsedFile {
    let mut headings: Vec<(usize, String)> = Vec::new();
    let mut fence: Option<(char, usize)> = None;

    for (number, line) in lines.iter() {
        if let Some(marker) = fence_marker(line) {
            fence = match fence {
                None => Some(marker),
                Some((ch, len)) if marker.0 == ch && marker.1 >= len && is_bare_fence(line) => {
                    None
                }
                open => open,
            };
            continue;
        }

        if fence.is_none() {
            if let Some(text) = atx_heading(line) {
                headings.push((number, text));
            }
        }
    }

    let mut segments = Vec::new();
    let first_heading = headings.first().map_or(lines.len() + 1, |(number, _)| *number);

    if first_heading > 1 && has_content(lines, 1, first_heading - 1) {
        segments.push(ParsedSegment::new(
            lines,
            SegmentKind::Preamble,
            None,
            1,
            first_heading - 1,
        ));
    }

    for (index, (start, text)) in headings.iter().enumerate() {
        let end = headings
            .get(index + 1)
            .map_or(lines.len(), |(next, _)| next - 1);
        segments.push(ParsedSegment::new(
            lines,
            SegmentKind::Section,
            Some(text.clone()),
            *start,
            end,
        ));
    }

    ParsedFile {
        segments,
        metadata: FileMetadata::Markdown {
            headers: headings.into_iter().map(|(_, text)| text).collect(),
        },
    }
}

fn has_content(lines: &SourceLines<'_>, start: usize, end: usize) -> bool {
    (start..=end).any(|number| lines.line(number).is_some_and(|line| !line.trim().is_empty()))
}

/// Indentation of at most three spaces, as CommonMark allows.
fn strip_indent(line: &str) -> Option<&str> {
    let trimmed = line.trim_start_matches(' ');
    (line.len() - trimmed.len() <= 3).then_some(trimmed)
}

fn fence_marker(line: &str) -> Option<(char, usize)> {
    let body = strip_indent(line)?;
    let ch = body.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let len = body.chars().take_while(|c| *c == ch).count();
    (len >= 3).then_some((ch, len))
}

fn is_bare_fence(line: &str) -> bool {
    line.trim()
        .trim_start_matches(['`', '~'])
        .trim()
        .is_empty()
}

fn atx_heading(line: &str) -> Option<String> {
    let body = strip_indent(line)?;
    let level = body.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }

    let rest = &body[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }

    let text = rest.trim();
    let text = text.trim_end_matches('#');
    // a closing sequence must be preceded by whitespace
    let text = if text.len() < rest.trim().len() && !text.is_empty() && !text.ends_with([' ', '\t'])
    {
        rest.trim()
    } else {
        text.trim_end()
    };

    Some(text.to_string())
}
