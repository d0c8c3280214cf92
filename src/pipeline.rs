use crate::{
    chunker::Chunker,
    classify::{classify, language_for, ParserKind},
    config::Config,
    document::{assemble, DocumentTree, FileRecord, SkippedFile},
    error::{Error, Result},
    exclusion::RuleSet,
    file::{EntryKind, PathEntry, SkipReason, Verdict},
    history::{GitHistory, HistoryBlock, HistorySource},
    parser::parse_or_fallback,
    source::SourceLines,
    walker::TreeWalker,
    writer::Writer,
};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Statistics collected during pipeline execution.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// Files with a record in the output
    pub files_processed: usize,

    /// Chunks across all files
    pub total_chunks: usize,

    /// Lines across all files
    pub total_lines: usize,

    /// Files skipped after pattern matching
    pub skipped_files: usize,

    /// Paths dropped by exclusion patterns
    pub excluded_paths: usize,

    /// Whether the file cap was reached
    pub cap_hit: bool,

    /// Whether git history was attached
    pub history_included: bool,

    /// Output file (`None` in dry run mode)
    pub output_path: Option<PathBuf>,

    /// Bytes written (0 in dry run mode)
    pub bytes_written: usize,

    /// Total execution time
    pub duration: Duration,

    /// Time spent walking, parsing and chunking
    pub extract_duration: Duration,

    /// Time spent rendering and writing
    pub write_duration: Duration,
}

impl PipelineStats {
    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║               Repository Summary                      ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Files Processed:      {:>8}                        ║",
            self.files_processed
        );
        println!(
            "║ Chunks Created:       {:>8}                        ║",
            self.total_chunks
        );
        println!(
            "║ Lines:                {:>8}                        ║",
            self.total_lines
        );
        println!(
            "║ Files Skipped:        {:>8}                        ║",
            self.skipped_files
        );
        println!(
            "║ Paths Excluded:       {:>8}                        ║",
            self.excluded_paths
        );
        if self.cap_hit {
            println!("║ ⚠ File limit reached; remaining files not included    ║");
        }
        if self.history_included {
            println!("║ Git history included                                  ║");
        }
        println!("║                                                       ║");
        match &self.output_path {
            Some(path) => {
                println!("║ Output File:                                          ║");
                println!("║   {}", path.display());
                println!(
                    "║ Bytes Written:        {:>8}                        ║",
                    self.bytes_written
                );
            }
            None => println!("║ ⚠ No output written (dry run mode)                    ║"),
        }
        println!("║                                                       ║");
        println!("║ Timing Breakdown:                                     ║");
        println!(
            "║   - Extracting:       {:>8.2}s                     ║",
            self.extract_duration.as_secs_f64()
        );
        println!(
            "║   - Writing:          {:>8.2}s                     ║",
            self.write_duration.as_secs_f64()
        );
        println!(
            "║   - Total:            {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Main pipeline orchestrator for summarizing a repository.
pub struct Pipeline {
    config: Config,
    rules: Arc<RuleSet>,
    chunker: Chunker,
    writer: Writer,
    history: Box<dyn HistorySource>,
}

impl Pipeline {
    /// Creates a new pipeline with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - An exclude pattern is not a valid glob
    /// - Writer initialization fails
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let rules = Arc::new(RuleSet::from_config(&config)?);
        let chunker = Chunker::new(config.chunk_size);
        let writer = Writer::new(&config)?;

        Ok(Self {
            config,
            rules,
            chunker,
            writer,
            history: Box::new(GitHistory),
        })
    }

    /// Replaces the history source used when git history is enabled.
    #[must_use]
    pub fn with_history_source(mut self, source: Box<dyn HistorySource>) -> Self {
        self.history = source;
        self
    }

    /// Executes the complete pipeline and returns statistics.
    ///
    /// # Process
    ///
    /// 1. **Extract**: walks, classifies, parses and chunks the repository
    /// 2. **Write**: serializes the document and writes it atomically
    ///
    /// # Errors
    ///
    /// Returns an error if no files could be processed or the output cannot
    /// be written.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tria::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .root_dir("./my-project")
    ///     .build()?;
    ///
    /// let stats = Pipeline::new(config)?.run()?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();

        info!("Stage 1/2: Extracting repository...");
        let doc = self.extract()?;
        let extract_duration = start_time.elapsed();

        info!(
            "✓ Extracted {} files into {} chunks in {:.2}s",
            doc.summary.file_count,
            doc.summary.total_chunks,
            extract_duration.as_secs_f64()
        );

        let write_start = Instant::now();
        let written = if self.config.dry_run {
            warn!("Dry run mode enabled - skipping output write");
            None
        } else {
            info!("Stage 2/2: Writing output...");
            Some(self.writer.write(&doc)?)
        };
        let write_duration = write_start.elapsed();

        let duration = start_time.elapsed();
        info!("✓ Completed in {:.2}s", duration.as_secs_f64());

        Ok(PipelineStats {
            files_processed: doc.summary.file_count,
            total_chunks: doc.summary.total_chunks,
            total_lines: doc.summary.total_lines,
            skipped_files: doc.summary.skipped_count,
            excluded_paths: doc.summary.excluded_count,
            cap_hit: doc.summary.cap_hit,
            history_included: doc.history.is_some(),
            bytes_written: written.as_ref().map_or(0, |w| w.bytes_written),
            output_path: written.map(|w| w.path),
            duration,
            extract_duration,
            write_duration,
        })
    }

    /// Builds the [`DocumentTree`] without writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFiles`] if no file produced a record.
    pub fn extract(&self) -> Result<DocumentTree> {
        let walker = TreeWalker::new(&self.config, Arc::clone(&self.rules));
        let mut cursor = walker.walk();

        let mut records = Vec::new();
        let mut skipped = Vec::new();

        while let Some(entry) = cursor.next() {
            if entry.kind == EntryKind::Directory {
                continue;
            }

            let outcome = match &entry.verdict {
                Verdict::Excluded(reason) => Err(reason.clone()),
                Verdict::Included => self.process_file(&entry).inspect_err(|_| {
                    // unusable files must not hold a slot under max_files
                    cursor.release();
                }),
            };

            match outcome {
                Ok(record) => records.push(record),
                Err(reason) => {
                    debug!("Skipping {}: {}", entry.relative_path, reason);
                    skipped.push(SkippedFile {
                        path: entry.relative_path,
                        reason,
                    });
                }
            }
        }

        let walk_stats = cursor.stats();
        debug!(
            "Walk visited {} entries, {} excluded by pattern, {} errors",
            walk_stats.visited, walk_stats.pattern_excluded, walk_stats.errors
        );

        if walk_stats.cap_hit {
            info!(
                "Stopped at the limit of {} files; increase --max-files to include more",
                self.config.max_files
            );
        }

        if records.is_empty() {
            return Err(Error::no_files(&self.config.root_dir));
        }

        let history = self.collect_history();

        Ok(assemble(
            &self.config.root_dir,
            records,
            skipped,
            history,
            &walk_stats,
        ))
    }

    /// Classifies, reads, parses and chunks one included file.
    fn process_file(&self, entry: &PathEntry) -> std::result::Result<FileRecord, SkipReason> {
        let kind = classify(entry);
        if kind == ParserKind::Binary {
            return Err(SkipReason::Binary);
        }

        let text = fs::read_to_string(&entry.path).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => SkipReason::InvalidUtf8,
            _ => SkipReason::Unreadable {
                message: e.to_string(),
            },
        })?;

        let lines = SourceLines::new(&text);
        let parsed = if kind.is_structured() {
            parse_or_fallback(kind, &entry.relative_path, &text)
        } else {
            None
        };

        let chunks = match &parsed {
            Some(parsed) => self.chunker.chunk(&lines, &parsed.segments),
            None => self.chunker.chunk_lines(&lines),
        };

        debug!(
            "{}: {} lines, {} chunks ({})",
            entry.relative_path,
            lines.len(),
            chunks.len(),
            kind.as_str()
        );

        Ok(FileRecord {
            path: entry.relative_path.clone(),
            kind,
            language: language_for(&entry.path, kind).to_string(),
            size_bytes: text.len() as u64,
            line_count: lines.len(),
            segment_count: parsed.as_ref().map_or(0, |p| p.segments.len()),
            structured: parsed.is_some(),
            metadata: parsed.map(|p| p.metadata),
            chunks,
        })
    }

    fn collect_history(&self) -> Option<HistoryBlock> {
        if !self.config.git_history {
            return None;
        }

        match self
            .history
            .collect(&self.config.root_dir, self.config.git_commits)
        {
            Ok(block) => {
                info!(
                    "Attached git history: {} commits, {} branches",
                    block.commits.len(),
                    block.branches.len()
                );
                Some(block)
            }
            Err(e) => {
                warn!("{}; continuing without git history", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::CommitRecord;
    use crate::parser::SegmentKind;
    use assert_fs::prelude::*;
    use std::path::Path;

    fn dry_config(root: &Path) -> Config {
        Config::builder().root_dir(root).dry_run(true).build().unwrap()
    }

    fn numbered(count: usize, prefix: &str) -> String {
        (1..=count).map(|n| format!("{prefix}{n}\n")).collect()
    }

    fn scenario(temp: &assert_fs::TempDir) {
        let mut python = String::from("def compute(x):\n");
        python.push_str(&numbered(28, "    x += "));
        python.push_str("    return x\n");
        temp.child("a.py").write_str(&python).unwrap();

        temp.child("README.md")
            .write_str("# Demo\n\nA demo project.\n\n## Usage\n\nRun it:\n\n    demo\n\n")
            .unwrap();

        let mut license = String::from("MIT License\n\n");
        license.push_str("Permission is hereby granted, free of charge, to any person\n");
        license.push_str(&numbered(17, "clause "));
        temp.child("LICENSE").write_str(&license).unwrap();

        temp.child("big.txt").write_str(&numbered(120, "line ")).unwrap();
    }

    fn record<'a>(doc: &'a DocumentTree, path: &str) -> &'a FileRecord {
        doc.files.iter().find(|r| r.path == path).unwrap()
    }

    #[test]
    fn test_mixed_repository() {
        let temp = assert_fs::TempDir::new().unwrap();
        scenario(&temp);

        let doc = Pipeline::new(dry_config(temp.path()))
            .unwrap()
            .extract()
            .unwrap();

        let paths: Vec<_> = doc.files.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["LICENSE", "README.md", "a.py", "big.txt"]);

        let python = record(&doc, "a.py");
        assert_eq!(python.line_count, 30);
        assert_eq!(python.chunks.len(), 1);
        assert_eq!(python.chunks[0].segments[0].kind, SegmentKind::Function);

        let readme = record(&doc, "README.md");
        assert_eq!(readme.line_count, 10);
        assert_eq!(readme.segment_count, 2);
        assert_eq!(readme.chunks.len(), 1);

        let license = record(&doc, "LICENSE");
        assert_eq!(license.line_count, 20);
        assert_eq!(license.chunks.len(), 1);

        let big = record(&doc, "big.txt");
        let counts: Vec<_> = big.chunks.iter().map(|c| c.line_count()).collect();
        assert_eq!(counts, vec![50, 50, 20]);
        assert!(!big.structured);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let temp = assert_fs::TempDir::new().unwrap();
        scenario(&temp);
        temp.child("pkg/mod.py").write_str("import os\n").unwrap();

        let pipeline = Pipeline::new(dry_config(temp.path())).unwrap();
        assert_eq!(pipeline.extract().unwrap(), pipeline.extract().unwrap());
    }

    #[test]
    fn test_oversized_file_is_skipped() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("small.py").write_str("x = 1\n").unwrap();
        temp.child("huge.txt")
            .write_str(&"a".repeat(200 * 1024))
            .unwrap();

        let doc = Pipeline::new(dry_config(temp.path()))
            .unwrap()
            .extract()
            .unwrap();

        assert_eq!(doc.files.len(), 1);
        assert_eq!(doc.summary.skipped_count, 1);
        assert_eq!(doc.skipped[0].path, "huge.txt");
        assert!(matches!(doc.skipped[0].reason, SkipReason::TooLarge { .. }));
    }

    #[test]
    fn test_cap_enforced() {
        let temp = assert_fs::TempDir::new().unwrap();
        for i in 0..5 {
            temp.child(format!("f{i}.txt")).write_str("x\n").unwrap();
        }

        let config = Config::builder()
            .root_dir(temp.path())
            .max_files(3)
            .dry_run(true)
            .build()
            .unwrap();
        let doc = Pipeline::new(config).unwrap().extract().unwrap();

        assert_eq!(doc.files.len(), 3);
        assert!(doc.summary.cap_hit);
    }

    #[test]
    fn test_unreadable_file_does_not_use_up_cap() {
        let temp = assert_fs::TempDir::new().unwrap();
        // invalid UTF-8 only past the 8 KiB probe window
        let mut bad = vec![b'a'; 9000];
        bad.push(0xff);
        temp.child("a_bad.txt").write_binary(&bad).unwrap();
        temp.child("b.txt").write_str("b\n").unwrap();
        temp.child("c.txt").write_str("c\n").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .max_files(2)
            .dry_run(true)
            .build()
            .unwrap();
        let doc = Pipeline::new(config).unwrap().extract().unwrap();

        let paths: Vec<_> = doc.files.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["b.txt", "c.txt"]);
        assert!(!doc.summary.cap_hit);
        assert_eq!(doc.skipped[0].path, "a_bad.txt");
        assert_eq!(doc.skipped[0].reason, SkipReason::InvalidUtf8);
    }

    #[test]
    fn test_single_slot_survives_unreadable_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let mut bad = vec![b'a'; 9000];
        bad.push(0xff);
        temp.child("a_bad.txt").write_binary(&bad).unwrap();
        temp.child("b.txt").write_str("b\n").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .max_files(1)
            .dry_run(true)
            .build()
            .unwrap();
        let doc = Pipeline::new(config).unwrap().extract().unwrap();

        assert_eq!(doc.files.len(), 1);
        assert_eq!(doc.files[0].path, "b.txt");
    }

    #[test]
    fn test_excluded_paths_never_appear() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/app.py").write_str("x = 1\n").unwrap();
        temp.child("tests/test_app.py").write_str("y = 2\n").unwrap();
        temp.child("src/tests/helper.py").write_str("z = 3\n").unwrap();
        temp.child(".gitignore").write_str("*.log\n").unwrap();
        temp.child("debug.log").write_str("noise\n").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .exclude("tests")
            .dry_run(true)
            .build()
            .unwrap();
        let doc = Pipeline::new(config).unwrap().extract().unwrap();

        let paths: Vec<_> = doc.files.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec![".gitignore", "src/app.py"]);
        assert_eq!(doc.summary.excluded_count, 3);
    }

    #[test]
    fn test_binary_and_invalid_files_become_stubs() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.py").write_str("print('hi')\n").unwrap();
        temp.child("image.png").write_binary(&[0x89, b'P', b'N', b'G']).unwrap();
        temp.child("notes.md").write_binary(&[b'#', b' ', 0xff, 0xfe, b'\n']).unwrap();

        let doc = Pipeline::new(dry_config(temp.path()))
            .unwrap()
            .extract()
            .unwrap();

        let stubs: Vec<_> = doc
            .skipped
            .iter()
            .map(|s| (s.path.as_str(), s.reason.clone()))
            .collect();
        assert_eq!(
            stubs,
            vec![
                ("image.png", SkipReason::Binary),
                ("notes.md", SkipReason::Binary),
            ]
        );
    }

    #[test]
    fn test_syntax_error_falls_back_to_lines() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("broken.py").write_str("def broken(:\n    pass\n").unwrap();

        let doc = Pipeline::new(dry_config(temp.path()))
            .unwrap()
            .extract()
            .unwrap();

        let broken = record(&doc, "broken.py");
        assert!(!broken.structured);
        assert_eq!(broken.chunks.len(), 1);
        assert!(broken.chunks[0].segments.is_empty());
    }

    #[test]
    fn test_no_files_is_an_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("blob.bin").write_binary(&[0, 1, 2]).unwrap();

        let result = Pipeline::new(dry_config(temp.path())).unwrap().extract();
        assert!(matches!(result, Err(Error::NoFiles { .. })));
    }

    #[test]
    fn test_run_writes_output() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("app.py").write_str("def main():\n    pass\n").unwrap();
        let output = temp.child("summary.json");

        let config = Config::builder()
            .root_dir(temp.path())
            .output(output.path())
            .format(crate::OutputFormat::Json)
            .build()
            .unwrap();
        let stats = Pipeline::new(config).unwrap().run().unwrap();

        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.output_path.as_deref(), Some(output.path()));
        assert!(stats.bytes_written > 0);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(output.path()).unwrap()).unwrap();
        assert_eq!(json["files"][0]["path"], "app.py");

        // the previous output is never read back in
        let again = Config::builder()
            .root_dir(temp.path())
            .output(output.path())
            .format(crate::OutputFormat::Json)
            .build()
            .unwrap();
        let stats = Pipeline::new(again).unwrap().run().unwrap();
        assert_eq!(stats.files_processed, 1);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("app.py").write_str("x = 1\n").unwrap();
        let output = temp.child("out.toon");

        let config = Config::builder()
            .root_dir(temp.path())
            .output(output.path())
            .dry_run(true)
            .build()
            .unwrap();
        let stats = Pipeline::new(config).unwrap().run().unwrap();

        assert!(stats.output_path.is_none());
        assert_eq!(stats.bytes_written, 0);
        assert!(!output.exists());
    }

    struct FixedHistory;

    impl HistorySource for FixedHistory {
        fn collect(&self, _root: &Path, limit: usize) -> Result<HistoryBlock> {
            Ok(HistoryBlock {
                commits: vec![CommitRecord {
                    hash: "abc1234".to_string(),
                    author: "alice".to_string(),
                    date: "2024-01-01T00:00:00+00:00".to_string(),
                    message: format!("limit {limit}"),
                }],
                ..HistoryBlock::default()
            })
        }
    }

    struct BrokenHistory;

    impl HistorySource for BrokenHistory {
        fn collect(&self, _root: &Path, _limit: usize) -> Result<HistoryBlock> {
            Err(Error::history("not a git repository"))
        }
    }

    fn history_config(root: &Path) -> Config {
        Config::builder()
            .root_dir(root)
            .git_history(true)
            .git_commits(5)
            .dry_run(true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_history_attached_verbatim() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("app.py").write_str("x = 1\n").unwrap();

        let doc = Pipeline::new(history_config(temp.path()))
            .unwrap()
            .with_history_source(Box::new(FixedHistory))
            .extract()
            .unwrap();

        let history = doc.history.unwrap();
        assert_eq!(history.commits[0].message, "limit 5");
    }

    #[test]
    fn test_history_failure_is_not_fatal() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("app.py").write_str("x = 1\n").unwrap();

        let doc = Pipeline::new(history_config(temp.path()))
            .unwrap()
            .with_history_source(Box::new(BrokenHistory))
            .extract()
            .unwrap();

        assert!(doc.history.is_none());
    }

    #[test]
    fn test_history_absent_by_default() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("app.py").write_str("x = 1\n").unwrap();

        let doc = Pipeline::new(dry_config(temp.path()))
            .unwrap()
            .with_history_source(Box::new(FixedHistory))
            .extract()
            .unwrap();

        assert!(doc.history.is_none());
    }
}
