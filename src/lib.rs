//! # tria
//!
//! Turns a source repository into one structured summary document that a
//! language model can read in a single pass.
//!
//! ## Features
//!
//! - Deterministic, sorted traversal with `.gitignore` and glob exclusions
//! - Structural parsing of Python, Markdown, Dockerfiles and license files
//! - Chunking that keeps functions, classes and sections whole when they fit
//! - Optional git history (recent commits, branches, contributors)
//! - Output as TOON, Markdown, JSON or XML
//!
//! ## Quick Start
//!
//! ```no_run
//! use tria::{Config, OutputFormat, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./my-project")
//!     .format(OutputFormat::Markdown)
//!     .exclude("tests")
//!     .build()?;
//!
//! Pipeline::new(config)?.run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Walker**: visits the tree in sorted order, pruning excluded paths
//! 2. **Classifier**: picks a parser per file
//! 3. **Parsers**: split files into typed segments and collect metadata
//! 4. **Chunker**: groups segments (or raw lines) into bounded chunks
//! 5. **Writer**: serializes the assembled document atomically

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod pipeline;
mod template;
mod writer;

pub mod chunker;
pub mod classify;
pub mod document;
pub mod exclusion;
pub mod file;
pub mod history;
pub mod parser;
pub mod source;
pub mod toon;
pub mod walker;

pub use chunker::{Chunk, Chunker, SegmentSpan};
pub use classify::ParserKind;
pub use config::{Config, ConfigBuilder, OutputFormat};
pub use document::{DocumentTree, FileRecord, SkippedFile};
pub use error::{Error, Result};
pub use exclusion::{ExclusionRule, RuleSet, RuleSource};
pub use file::{PathEntry, SkipReason};
pub use history::{GitHistory, HistoryBlock, HistorySource, HistorySummary};
pub use parser::{FileMetadata, ParsedFile, ParsedSegment, SegmentKind};
pub use pipeline::{Pipeline, PipelineStats};
pub use walker::{TreeWalker, WalkStats};
pub use writer::WriteSummary;

/// Runs the complete pipeline with the given configuration.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Root directory doesn't exist or is inaccessible
/// - No processable files are found
/// - The output file cannot be written
///
/// # Examples
///
/// ```no_run
/// use tria::{Config, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir(".")
///     .dry_run(true)
///     .build()?;
///
/// run(config)?;
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<PipelineStats> {
    Pipeline::new(config)?.run()
}
