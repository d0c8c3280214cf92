//! Packing of segments or raw lines into bounded chunks.

use crate::parser::{ParsedSegment, SegmentKind};
use crate::source::SourceLines;
use serde::Serialize;
use tracing::trace;

/// Position and role of a segment packed into a [`Chunk`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentSpan {
    /// Segment kind
    pub kind: SegmentKind,

    /// Segment name, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// First line
    pub start_line: usize,

    /// Last line
    pub end_line: usize,
}

impl From<&ParsedSegment> for SegmentSpan {
    fn from(segment: &ParsedSegment) -> Self {
        Self {
            kind: segment.kind,
            name: segment.name.clone(),
            start_line: segment.start_line,
            end_line: segment.end_line,
        }
    }
}

/// A bounded slice of one file's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Sequential chunk index within the file (0-based)
    pub index: usize,

    /// First line (1-indexed)
    pub start_line: usize,

    /// Last line (inclusive)
    pub end_line: usize,

    /// Source text of the line range
    pub content: String,

    /// Segments packed into this chunk; empty in raw mode
    pub segments: Vec<SegmentSpan>,
}

impl Chunk {
    /// Number of lines covered.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.end_line + 1 - self.start_line
    }

    /// Returns true if the chunk was built from parser segments.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !self.segments.is_empty()
    }
}

/// Packs segments or raw lines into chunks of at most `chunk_size` lines.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    /// Creates a chunker. A zero size is treated as one line.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Maximum lines per chunk.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Chunks a file, using `segments` when there are any.
    ///
    /// Segments are packed while the span from the first packed segment's
    /// start to the candidate's end fits in `chunk_size` lines. A single
    /// segment longer than that becomes its own chunk. Without segments the
    /// file is cut into runs of exactly `chunk_size` lines.
    #[must_use]
    pub fn chunk(&self, lines: &SourceLines<'_>, segments: &[ParsedSegment]) -> Vec<Chunk> {
        if segments.is_empty() {
            self.chunk_lines(lines)
        } else {
            self.chunk_segments(lines, segments)
        }
    }

    /// Structural mode.
    #[must_use]
    pub fn chunk_segments(&self, lines: &SourceLines<'_>, segments: &[ParsedSegment]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut builder: Option<ChunkBuilder> = None;

        for segment in segments {
            if let Some(current) = builder
                .as_mut()
                .filter(|current| current.can_fit(segment, self.chunk_size))
            {
                current.add(segment);
                continue;
            }

            if let Some(done) = builder.take() {
                chunks.push(done.build(chunks.len(), lines));
            }
            builder = Some(ChunkBuilder::new(segment));
        }

        if let Some(done) = builder {
            chunks.push(done.build(chunks.len(), lines));
        }

        trace!(
            "Packed {} segments into {} chunks",
            segments.len(),
            chunks.len()
        );
        chunks
    }

    /// Raw mode.
    #[must_use]
    pub fn chunk_lines(&self, lines: &SourceLines<'_>) -> Vec<Chunk> {
        let total = lines.len();

        (1..=total)
            .step_by(self.chunk_size)
            .enumerate()
            .map(|(index, start)| {
                let end = (start + self.chunk_size - 1).min(total);
                Chunk {
                    index,
                    start_line: start,
                    end_line: end,
                    content: lines.slice(start, end).to_string(),
                    segments: Vec::new(),
                }
            })
            .collect()
    }
}

/// Accumulates consecutive segments for one chunk.
struct ChunkBuilder {
    start_line: usize,
    end_line: usize,
    spans: Vec<SegmentSpan>,
}

impl ChunkBuilder {
    fn new(segment: &ParsedSegment) -> Self {
        Self {
            start_line: segment.start_line,
            end_line: segment.end_line,
            spans: vec![SegmentSpan::from(segment)],
        }
    }

    fn can_fit(&self, segment: &ParsedSegment, chunk_size: usize) -> bool {
        segment.end_line + 1 - self.start_line <= chunk_size
    }

    fn add(&mut self, segment: &ParsedSegment) {
        self.end_line = segment.end_line;
        self.spans.push(SegmentSpan::from(segment));
    }

    fn build(self, index: usize, lines: &SourceLines<'_>) -> Chunk {
        Chunk {
            index,
            start_line: self.start_line,
            end_line: self.end_line,
            content: lines.slice(self.start_line, self.end_line).to_string(),
            segments: self.spans,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize) -> String {
        (1..=count).map(|n| format!("line {n}\n")).collect()
    }

    fn segment(lines: &SourceLines<'_>, start: usize, end: usize) -> ParsedSegment {
        ParsedSegment {
            kind: SegmentKind::Code,
            name: None,
            start_line: start,
            end_line: end,
            text: lines.slice(start, end).to_string(),
        }
    }

    #[test]
    fn test_raw_mode_exact_groups() {
        let text = numbered(120);
        let lines = SourceLines::new(&text);
        let chunks = Chunker::new(50).chunk(&lines, &[]);

        let counts: Vec<_> = chunks.iter().map(Chunk::line_count).collect();
        assert_eq!(counts, vec![50, 50, 20]);
        assert_eq!(chunks[1].start_line, 51);
        assert_eq!(chunks[2].end_line, 120);
        assert!(chunks[2].content.starts_with("line 101\n"));
    }

    #[test]
    fn test_raw_mode_content_round_trips() {
        let text = numbered(7);
        let lines = SourceLines::new(&text);
        let chunks = Chunker::new(3).chunk_lines(&lines);

        let joined: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_empty_file_has_no_chunks() {
        let lines = SourceLines::new("");
        assert!(Chunker::new(50).chunk(&lines, &[]).is_empty());
    }

    #[test]
    fn test_segments_packed_by_span() {
        let text = numbered(30);
        let lines = SourceLines::new(&text);
        let segments = vec![
            segment(&lines, 1, 4),
            segment(&lines, 6, 9),
            segment(&lines, 11, 20),
            segment(&lines, 22, 30),
        ];

        let chunks = Chunker::new(10).chunk(&lines, &segments);
        let ranges: Vec<_> = chunks.iter().map(|c| (c.start_line, c.end_line)).collect();

        assert_eq!(ranges, vec![(1, 9), (11, 20), (22, 30)]);
        assert_eq!(chunks[0].segments.len(), 2);
        // gap lines inside a span are kept
        assert_eq!(chunks[0].content, lines.slice(1, 9));
    }

    #[test]
    fn test_oversized_segment_is_not_split() {
        let text = numbered(40);
        let lines = SourceLines::new(&text);
        let segments = vec![segment(&lines, 1, 2), segment(&lines, 3, 35), segment(&lines, 36, 40)];

        let chunks = Chunker::new(10).chunk(&lines, &segments);
        let ranges: Vec<_> = chunks.iter().map(|c| (c.start_line, c.end_line)).collect();

        assert_eq!(ranges, vec![(1, 2), (3, 35), (36, 40)]);
        assert!(chunks.iter().all(|c| c.line_count() <= 10 || c.segments.len() == 1));
    }

    #[test]
    fn test_indices_are_contiguous() {
        let text = numbered(25);
        let lines = SourceLines::new(&text);
        let segments: Vec<_> = (0..5).map(|i| segment(&lines, i * 5 + 1, i * 5 + 5)).collect();

        let chunks = Chunker::new(7).chunk(&lines, &segments);
        let indices: Vec<_> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
    }
}
