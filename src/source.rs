//! Line-indexed view over file text.

use memchr::memchr_iter;

/// A file's text with precomputed line boundaries.
///
/// Lines follow [`str::lines`]: a trailing newline does not start a new
/// line. All line numbers are 1-indexed and ranges are inclusive.
#[derive(Debug, Clone)]
pub struct SourceLines<'a> {
    text: &'a str,
    starts: Vec<usize>,
}

impl<'a> SourceLines<'a> {
    /// Indexes `text`.
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        let mut starts = Vec::new();
        if !text.is_empty() {
            starts.push(0);
            starts.extend(
                memchr_iter(b'\n', text.as_bytes())
                    .map(|index| index + 1)
                    .filter(|&start| start < text.len()),
            );
        }
        Self { text, starts }
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Returns true for empty text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// The underlying text.
    #[must_use]
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Source slice covering lines `start..=end`, including the newline
    /// that terminates `end` when there is one. Out-of-range bounds are
    /// clamped.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        let start = start.max(1);
        let end = end.min(self.len());
        if start > end {
            return "";
        }

        let from = self.starts[start - 1];
        let to = self.starts.get(end).copied().unwrap_or(self.text.len());
        &self.text[from..to]
    }

    /// Text of line `number` without its line terminator.
    #[must_use]
    pub fn line(&self, number: usize) -> Option<&'a str> {
        if number == 0 || number > self.len() {
            return None;
        }
        let line = self.slice(number, number);
        let line = line.strip_suffix('\n').unwrap_or(line);
        Some(line.strip_suffix('\r').unwrap_or(line))
    }

    /// Iterates over `(number, text)` for every line.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a str)> + '_ {
        (1..=self.len()).filter_map(|number| self.line(number).map(|line| (number, line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_count_matches_str_lines() {
        for text in ["", "a", "a\n", "a\nb", "a\nb\n", "\n", "\n\n", "a\r\nb\r\n"] {
            assert_eq!(SourceLines::new(text).len(), text.lines().count(), "{text:?}");
        }
    }

    #[test]
    fn test_slice_is_byte_identical() {
        let text = "one\ntwo\nthree\n";
        let lines = SourceLines::new(text);

        assert_eq!(lines.slice(1, 1), "one\n");
        assert_eq!(lines.slice(2, 3), "two\nthree\n");
        assert_eq!(lines.slice(1, 3), text);
    }

    #[test]
    fn test_slice_without_trailing_newline() {
        let lines = SourceLines::new("one\ntwo");
        assert_eq!(lines.slice(2, 2), "two");
    }

    #[test]
    fn test_slice_clamps_bounds() {
        let lines = SourceLines::new("a\nb\n");
        assert_eq!(lines.slice(0, 10), "a\nb\n");
        assert_eq!(lines.slice(3, 4), "");
    }

    #[test]
    fn test_line_strips_crlf() {
        let lines = SourceLines::new("a\r\nb\r\n");
        assert_eq!(lines.line(1), Some("a"));
        assert_eq!(lines.line(2), Some("b"));
        assert_eq!(lines.line(3), None);
    }
}
