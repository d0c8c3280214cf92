//! Walked entries, skip reasons and binary detection.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "so", "dylib", "a", "o", "obj", "png", "jpg", "jpeg", "gif", "bmp", "ico",
        "webp", "mp3", "mp4", "avi", "mkv", "mov", "wav", "flac", "pdf", "doc", "docx", "xls",
        "xlsx", "ppt", "pptx", "zip", "tar", "gz", "bz2", "xz", "7z", "rar", "wasm", "pyc",
        "pyo", "class", "jar", "whl", "woff", "woff2", "ttf", "otf", "sqlite", "db",
    ]
    .into_iter()
    .collect()
});

/// Kind of filesystem entry seen during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link (never followed)
    Symlink,
}

/// What the walker's content probe learned about a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentHint {
    /// Leading sample is valid UTF-8 without NUL bytes
    Text,
    /// Leading sample looks like binary data
    Binary,
    /// Not probed
    Unknown,
}

/// Why a file that passed pattern matching was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// File exceeds the configured size threshold
    TooLarge {
        /// File size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },
    /// Binary by extension or content
    Binary,
    /// Content is not valid UTF-8
    InvalidUtf8,
    /// Metadata or content could not be read
    Unreadable {
        /// Underlying error message
        message: String,
    },
    /// Symbolic links are not followed
    Symlink,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLarge { size, limit } => {
                write!(f, "too large ({size} bytes, limit {limit})")
            }
            Self::Binary => f.write_str("binary"),
            Self::InvalidUtf8 => f.write_str("invalid UTF-8"),
            Self::Unreadable { message } => write!(f, "unreadable: {message}"),
            Self::Symlink => f.write_str("symlink"),
        }
    }
}

/// Exclusion verdict attached to a [`PathEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Entry takes part in the run
    Included,
    /// Entry was left out after pattern matching
    Excluded(SkipReason),
}

/// A filesystem entry produced by the tree walker.
#[derive(Debug, Clone)]
pub struct PathEntry {
    /// Absolute (or root-joined) path
    pub path: PathBuf,

    /// Path relative to the root, `/`-separated
    pub relative_path: String,

    /// Entry kind
    pub kind: EntryKind,

    /// Size in bytes (0 for directories)
    pub size: u64,

    /// Depth below the root (direct children are depth 1)
    pub depth: usize,

    /// Exclusion verdict
    pub verdict: Verdict,

    /// Result of the content probe, if one ran
    pub content_hint: ContentHint,
}

impl PathEntry {
    /// Creates an included file entry that has not been probed yet.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>, relative_path: impl Into<String>, size: u64) -> Self {
        let relative_path = relative_path.into();
        let depth = relative_path.split('/').count();
        Self {
            path: path.into(),
            relative_path,
            kind: EntryKind::File,
            size,
            depth,
            verdict: Verdict::Included,
            content_hint: ContentHint::Unknown,
        }
    }

    /// Returns true for files that take part in the run.
    #[must_use]
    pub fn is_included_file(&self) -> bool {
        self.kind == EntryKind::File && self.verdict == Verdict::Included
    }

    /// Returns the file name component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// Renders `path` relative to `root` with `/` separators.
pub(crate) fn relative_path(path: &Path, root: &Path) -> String {
    let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());

    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Probes the leading bytes of a file to tell text from binary.
///
/// # Algorithm
///
/// 1. Reads the first 8KB of the file
/// 2. A NUL byte means binary
/// 3. A sample that is not valid UTF-8 means binary, unless the only
///    problem is a multi-byte character cut off at the end of the sample
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub(crate) fn probe_content(path: &Path) -> Result<ContentHint> {
    const BUFFER_SIZE: usize = 8192;

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = [0u8; BUFFER_SIZE];

    let bytes_read = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;

    if bytes_read == 0 {
        return Ok(ContentHint::Text);
    }

    let sample = &buffer[..bytes_read];

    if memchr::memchr(0, sample).is_some() {
        return Ok(ContentHint::Binary);
    }

    match std::str::from_utf8(sample) {
        Ok(_) => Ok(ContentHint::Text),
        Err(e) if e.error_len().is_none() => Ok(ContentHint::Text),
        Err(_) => Ok(ContentHint::Binary),
    }
}

/// Checks if a file extension suggests a binary file.
#[must_use]
pub(crate) fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| BINARY_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
