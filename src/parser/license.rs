use super::{FileMetadata, ParsedFile, ParsedSegment, SegmentKind};
use crate::source::SourceLines;

/// Keyword checks in order; the first match wins, so more specific
/// licenses come before the ones whose text they contain.
const SIGNATURES: &[(&str, &[&str])] = &[
    ("AGPL-3.0", &["gnu affero general public license"]),
    ("LGPL", &["gnu lesser general public license", "gnu library general public license"]),
    ("GPL-3.0", &["gnu general public license", "version 3"]),
    ("GPL-2.0", &["gnu general public license", "version 2"]),
    ("Apache-2.0", &["apache license", "version 2.0"]),
    ("MPL-2.0", &["mozilla public license", "2.0"]),
    (
        "BSD-3-Clause",
        &["redistribution and use in source and binary forms", "neither the name"],
    ),
    ("BSD-2-Clause", &["redistribution and use in source and binary forms"]),
    ("ISC", &["permission to use, copy, modify, and/or distribute this software"]),
    ("MIT", &["permission is hereby granted, free of charge"]),
    ("Unlicense", &["this is free and unencumbered software released into the public domain"]),
];

/// The whole file as one segment.
pub(super) fn parse(lines: &SourceLines<'_>) -> ParsedFile {
    let segments = if lines.is_empty() {
        Vec::new()
    } else {
        vec![ParsedSegment::new(
            lines,
            SegmentKind::License,
            None,
            1,
            lines.len(),
        )]
    };

    let header = lines
        .iter()
        .map(|(_, line)| line.trim())
        .find(|line| !line.is_empty())
        .map(str::to_string);

    ParsedFile {
        segments,
        metadata: FileMetadata::License {
            header,
            license: detect(lines.text()).map(str::to_string),
        },
    }
}

/// Identifies a license by keywords in its text.
fn detect(text: &str) -> Option<&'static str> {
    let normalized = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    SIGNATURES
        .iter()
        .find(|(_, keywords)| keywords.iter().all(|keyword| normalized.contains(keyword)))
        .map(|(id, _)| *id)
}
