//! The assembled, serializer-ready representation of a repository.

use crate::chunker::Chunk;
use crate::classify::ParserKind;
use crate::file::SkipReason;
use crate::history::HistoryBlock;
use crate::parser::FileMetadata;
use crate::walker::WalkStats;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Chunked content and metadata of one included file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Root-relative path
    pub path: String,
    /// Handler that processed the file
    pub kind: ParserKind,
    /// Language label
    pub language: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Number of lines
    pub line_count: usize,
    /// Number of parser segments (0 in raw mode)
    pub segment_count: usize,
    /// Whether a structural parse succeeded
    pub structured: bool,
    /// Language metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FileMetadata>,
    /// Ordered chunks
    pub chunks: Vec<Chunk>,
}

/// A file that passed pattern matching but was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    /// Root-relative path
    pub path: String,
    /// Why it was skipped
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Totals for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    /// Files with a record
    pub file_count: usize,
    /// Chunks across all records
    pub total_chunks: usize,
    /// Lines across all records
    pub total_lines: usize,
    /// Skipped stubs
    pub skipped_count: usize,
    /// Paths dropped by exclusion patterns
    pub excluded_count: usize,
    /// Whether the file cap cut the run short
    pub cap_hit: bool,
}

/// Repository identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    /// Directory name of the root
    pub name: String,
    /// Root path as given
    pub root: String,
}

/// Folder structure of the included files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    /// A file
    File {
        /// File name
        name: String,
    },
    /// A directory with its children, directories first
    Directory {
        /// Directory name
        name: String,
        /// Children
        children: Vec<TreeNode>,
    },
}

impl TreeNode {
    /// Node name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File { name } | Self::Directory { name, .. } => name,
        }
    }

    /// Builds the tree for `paths` under a root named `root_name`.
    #[must_use]
    pub fn from_paths<'a>(root_name: &str, paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut root = DirBuilder::default();
        for path in paths {
            let parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
            root.insert(&parts);
        }
        root.into_node(root_name.to_string())
    }

    /// Indented text rendering, one line per node, directories with a
    /// trailing `/`.
    #[must_use]
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.render_into(0, &mut lines);
        lines
    }

    fn render_into(&self, depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        match self {
            Self::File { name } => lines.push(format!("{indent}{name}")),
            Self::Directory { name, children } => {
                lines.push(format!("{indent}{name}/"));
                for child in children {
                    child.render_into(depth + 1, lines);
                }
            }
        }
    }
}

#[derive(Default)]
struct DirBuilder {
    dirs: BTreeMap<String, DirBuilder>,
    files: Vec<String>,
}

impl DirBuilder {
    fn insert(&mut self, parts: &[&str]) {
        match parts {
            [] => {}
            [file] => self.files.push((*file).to_string()),
            [dir, rest @ ..] => self.dirs.entry((*dir).to_string()).or_default().insert(rest),
        }
    }

    fn into_node(mut self, name: String) -> TreeNode {
        self.files.sort();
        let mut children: Vec<TreeNode> = self
            .dirs
            .into_iter()
            .map(|(name, dir)| dir.into_node(name))
            .collect();
        children.extend(self.files.into_iter().map(|name| TreeNode::File { name }));
        TreeNode::Directory { name, children }
    }
}

/// Everything a serializer needs. Contains no timestamps, so runs over an
/// unchanged tree produce equal documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentTree {
    /// Repository identity
    pub project: ProjectInfo,
    /// Folder structure of included files
    pub structure: TreeNode,
    /// Records in path order
    pub files: Vec<FileRecord>,
    /// Skipped stubs in path order
    pub skipped: Vec<SkippedFile>,
    /// Git history, when requested and available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryBlock>,
    /// Totals
    pub summary: DocumentSummary,
}

/// Combines per-file results into a [`DocumentTree`].
#[must_use]
pub fn assemble(
    root: &Path,
    mut records: Vec<FileRecord>,
    mut skipped: Vec<SkippedFile>,
    history: Option<HistoryBlock>,
    walk_stats: &WalkStats,
) -> DocumentTree {
    records.sort_by(|a, b| a.path.cmp(&b.path));
    skipped.sort_by(|a, b| a.path.cmp(&b.path));

    let name = crate::config::project_name(root);
    let structure = TreeNode::from_paths(&name, records.iter().map(|r| r.path.as_str()));

    let summary = DocumentSummary {
        file_count: records.len(),
        total_chunks: records.iter().map(|r| r.chunks.len()).sum(),
        total_lines: records.iter().map(|r| r.line_count).sum(),
        skipped_count: skipped.len(),
        excluded_count: walk_stats.pattern_excluded,
        cap_hit: walk_stats.cap_hit,
    };

    DocumentTree {
        project: ProjectInfo {
            name,
            root: root.display().to_string(),
        },
        structure,
        files: records,
        skipped,
        history,
        summary,
    }
}
