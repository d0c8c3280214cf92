use super::{FileMetadata, ParsedFile, ParsedSegment, SegmentKind};
use crate::source::SourceLines;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Settings {
    image: Option<String>,
    workdir: Option<String>,
    entrypoint: Option<String>,
    cmd: Option<String>,
    env: BTreeMap<String, String>,
}

/// One segment per instruction, spanning line continuations and heredoc
/// bodies. Comments, parser directives and blank lines between
/// instructions are dropped.
pub(super) fn parse(lines: &SourceLines<'_>) -> ParsedFile {
    let total = lines.len();
    let mut escape = '\\';
    let mut seen_instruction = false;
    let mut settings = Settings::default();
    let mut segments = Vec::new();

    let mut number = 1;
    while number <= total {
        let line = lines.line(number).unwrap_or_default();
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            if !seen_instruction {
                if let Some(ch) = escape_directive(trimmed) {
                    escape = ch;
                }
            }
            number += 1;
            continue;
        }

        seen_instruction = true;
        let start = number;
        let mut end = number;
        let mut logical = strip_escape(trimmed, escape).to_string();
        let mut continued = ends_with_escape(line, escape);

        while continued && end < total {
            end += 1;
            let next = lines.line(end).unwrap_or_default();
            let next_trimmed = next.trim();
            if next_trimmed.is_empty() || next_trimmed.starts_with('#') {
                continue;
            }
            logical.push(' ');
            logical.push_str(strip_escape(next_trimmed, escape));
            continued = ends_with_escape(next, escape);
        }

        let (keyword, args) = split_instruction(&logical);

        for (delimiter, strip_tabs) in heredoc_delimiters(&keyword, args) {
            while end < total {
                end += 1;
                let body = lines.line(end).unwrap_or_default();
                let body = if strip_tabs {
                    body.trim_start_matches('\t')
                } else {
                    body
                };
                if body == delimiter {
                    break;
                }
            }
        }

        settings.apply(&keyword, args);

        segments.push(ParsedSegment::new(
            lines,
            SegmentKind::Instruction,
            Some(keyword),
            start,
            end,
        ));
        number = end + 1;
    }

    ParsedFile {
        segments,
        metadata: FileMetadata::Dockerfile {
            image: settings.image,
            workdir: settings.workdir,
            entrypoint: settings.entrypoint,
            cmd: settings.cmd,
            env: settings.env,
        },
    }
}

impl Settings {
    fn apply(&mut self, keyword: &str, args: &str) {
        match keyword {
            "FROM" => {
                self.image = args
                    .split_whitespace()
                    .find(|word| !word.starts_with("--"))
                    .map(str::to_string);
            }
            "WORKDIR" => self.workdir = Some(args.to_string()),
            "ENTRYPOINT" => self.entrypoint = Some(args.to_string()),
            "CMD" => self.cmd = Some(args.to_string()),
            "ENV" => self.env.extend(parse_env(args)),
            _ => {}
        }
    }
}

fn escape_directive(comment: &str) -> Option<char> {
    let body = comment.strip_prefix('#')?.trim();
    let (key, value) = body.split_once('=')?;
    if !key.trim().eq_ignore_ascii_case("escape") {
        return None;
    }
    value.trim().chars().next().filter(|c| matches!(c, '\\' | '`'))
}

fn ends_with_escape(line: &str, escape: char) -> bool {
    line.trim_end().ends_with(escape)
}

fn strip_escape(line: &str, escape: char) -> &str {
    line.trim_end()
        .strip_suffix(escape)
        .map_or(line, str::trim_end)
}

fn split_instruction(logical: &str) -> (String, &str) {
    let logical = logical.trim();
    match logical.split_once(char::is_whitespace) {
        Some((keyword, args)) => (keyword.to_ascii_uppercase(), args.trim()),
        None => (logical.to_ascii_uppercase(), ""),
    }
}

/// Delimiters of `<<EOF`, `<<-EOF` and quoted heredoc openers, in order.
///
/// Only `RUN`, `COPY` and `ADD` take heredocs, and an opener must start a
/// word (after an optional fd number), so `$((1<<4))` is not one.
fn heredoc_delimiters(keyword: &str, args: &str) -> Vec<(String, bool)> {
    if !matches!(keyword, "RUN" | "COPY" | "ADD") {
        return Vec::new();
    }

    args.split_whitespace()
        .filter_map(heredoc_opener)
        .collect()
}

fn heredoc_opener(word: &str) -> Option<(String, bool)> {
    let rest = word.trim_start_matches(|c: char| c.is_ascii_digit());
    let rest = rest.strip_prefix("<<")?;
    let strip_tabs = rest.starts_with('-');
    let rest = rest.strip_prefix('-').unwrap_or(rest);

    let (rest, quote) = match rest.chars().next() {
        Some(q @ ('"' | '\'')) => (&rest[1..], Some(q)),
        _ => (rest, None),
    };

    let delimiter: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if delimiter.is_empty() {
        return None;
    }

    let tail = &rest[delimiter.len()..];
    let closed = match quote {
        Some(q) => tail.starts_with(q),
        None => true,
    };
    closed.then_some((delimiter, strip_tabs))
}

/// `KEY=VALUE ...` pairs, or the legacy `KEY VALUE` form.
fn parse_env(args: &str) -> Vec<(String, String)> {
    let words = split_words(args);
    let Some(first) = words.first() else {
        return Vec::new();
    };

    if !first.contains('=') {
        let value = args
            .trim_start()
            .split_once(char::is_whitespace)
            .map_or("", |(_, value)| value.trim());
        return vec![(first.clone(), value.to_string())];
    }

    words
        .into_iter()
        .filter_map(|word| {
            word.split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Whitespace-separated words with quotes removed.
fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => {
                quote = Some(ch);
                in_word = true;
            }
            (_, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (_, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_word {
        words.push(current);
    }
    words
}
