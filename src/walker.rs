//! Pull-based repository traversal.

use crate::config::Config;
use crate::exclusion::RuleSet;
use crate::file::{
    has_binary_extension, probe_content, relative_path, ContentHint, EntryKind, PathEntry,
    SkipReason, Verdict,
};
use ignore::{DirEntry, Walk, WalkBuilder};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Counters collected by one [`WalkCursor`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    /// Entries inspected by the exclusion filter
    pub visited: usize,

    /// Entries dropped by pattern (pruned directories count once)
    pub pattern_excluded: usize,

    /// Directory read errors
    pub errors: usize,

    /// Included files yielded
    pub included: usize,

    /// More eligible files existed beyond `max_files`
    pub cap_hit: bool,
}

/// Walks a repository, consulting a shared [`RuleSet`].
#[derive(Debug, Clone)]
pub struct TreeWalker {
    root: PathBuf,
    rules: Arc<RuleSet>,
    max_files: usize,
    max_file_bytes: u64,
}

impl TreeWalker {
    /// Creates a walker with the limits taken from `config`.
    #[must_use]
    pub fn new(config: &Config, rules: Arc<RuleSet>) -> Self {
        Self {
            root: config.root_dir.clone(),
            rules,
            max_files: config.max_files,
            max_file_bytes: config.max_file_bytes,
        }
    }

    /// Root directory being walked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts a fresh traversal from the root.
    ///
    /// Entries of each directory come sorted by file name. Directories
    /// matching a rule are pruned before descent.
    #[must_use]
    pub fn walk(&self) -> WalkCursor {
        let visited = Arc::new(AtomicUsize::new(0));
        let pattern_excluded = Arc::new(AtomicUsize::new(0));

        let filter = {
            let rules = Arc::clone(&self.rules);
            let root = self.root.clone();
            let visited = Arc::clone(&visited);
            let pattern_excluded = Arc::clone(&pattern_excluded);

            move |entry: &DirEntry| {
                visited.fetch_add(1, Ordering::Relaxed);
                let relative = relative_path(entry.path(), &root);
                if rules.is_excluded(&relative) {
                    trace!("Pruned by pattern: {}", relative);
                    pattern_excluded.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
                true
            }
        };

        let inner = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(filter)
            .build();

        debug!("Starting walk of {}", self.root.display());

        WalkCursor {
            inner,
            root: self.root.clone(),
            max_files: self.max_files,
            max_file_bytes: self.max_file_bytes,
            visited,
            pattern_excluded,
            errors: 0,
            included: 0,
            cap_hit: false,
            done: false,
        }
    }
}

/// A single traversal in progress.
pub struct WalkCursor {
    inner: Walk,
    root: PathBuf,
    max_files: usize,
    max_file_bytes: u64,
    visited: Arc<AtomicUsize>,
    pattern_excluded: Arc<AtomicUsize>,
    errors: usize,
    included: usize,
    cap_hit: bool,
    done: bool,
}

impl WalkCursor {
    /// Counters so far; final once the cursor returned `None`.
    #[must_use]
    pub fn stats(&self) -> WalkStats {
        WalkStats {
            visited: self.visited.load(Ordering::Relaxed),
            pattern_excluded: self.pattern_excluded.load(Ordering::Relaxed),
            errors: self.errors,
            included: self.included,
            cap_hit: self.cap_hit,
        }
    }

    /// Gives back the cap slot of the last included file yielded.
    ///
    /// For files that turn out to be unusable after they were yielded
    /// (unreadable, invalid UTF-8 past the probe window). Must be called
    /// before the next `next()`, while the cap cannot have been hit yet.
    pub fn release(&mut self) {
        self.included = self.included.saturating_sub(1);
    }

    fn evaluate(&self, dent: &DirEntry) -> Option<PathEntry> {
        let file_type = dent.file_type()?;
        let path = dent.path().to_path_buf();
        let relative = relative_path(&path, &self.root);
        let depth = dent.depth();

        let (kind, size, verdict, content_hint) = if file_type.is_symlink() {
            (
                EntryKind::Symlink,
                0,
                Verdict::Excluded(SkipReason::Symlink),
                ContentHint::Unknown,
            )
        } else if file_type.is_dir() {
            (EntryKind::Directory, 0, Verdict::Included, ContentHint::Unknown)
        } else if file_type.is_file() {
            let (size, verdict, hint) = self.evaluate_file(dent);
            (EntryKind::File, size, verdict, hint)
        } else {
            trace!("Skipping special file: {}", relative);
            return None;
        };

        Some(PathEntry {
            path,
            relative_path: relative,
            kind,
            size,
            depth,
            verdict,
            content_hint,
        })
    }

    fn evaluate_file(&self, dent: &DirEntry) -> (u64, Verdict, ContentHint) {
        let size = match dent.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                let reason = SkipReason::Unreadable {
                    message: e.to_string(),
                };
                return (0, Verdict::Excluded(reason), ContentHint::Unknown);
            }
        };

        if size > self.max_file_bytes {
            let reason = SkipReason::TooLarge {
                size,
                limit: self.max_file_bytes,
            };
            return (size, Verdict::Excluded(reason), ContentHint::Unknown);
        }

        if has_binary_extension(dent.path()) {
            return (
                size,
                Verdict::Excluded(SkipReason::Binary),
                ContentHint::Binary,
            );
        }

        match probe_content(dent.path()) {
            Ok(ContentHint::Binary) => (
                size,
                Verdict::Excluded(SkipReason::Binary),
                ContentHint::Binary,
            ),
            Ok(hint) => (size, Verdict::Included, hint),
            Err(e) => {
                let reason = SkipReason::Unreadable {
                    message: e.to_string(),
                };
                (size, Verdict::Excluded(reason), ContentHint::Unknown)
            }
        }
    }
}

impl Iterator for WalkCursor {
    type Item = PathEntry;

    fn next(&mut self) -> Option<PathEntry> {
        while !self.done {
            let dent = match self.inner.next() {
                None => {
                    self.done = true;
                    break;
                }
                Some(Err(e)) => {
                    warn!("Walk error: {}", e);
                    self.errors += 1;
                    continue;
                }
                Some(Ok(dent)) => dent,
            };

            // the root itself
            if dent.depth() == 0 {
                continue;
            }

            let Some(entry) = self.evaluate(&dent) else {
                continue;
            };

            let capped = self.included >= self.max_files;
            if entry.is_included_file() {
                if capped {
                    info!(
                        "File cap of {} reached; remaining files are not included",
                        self.max_files
                    );
                    self.cap_hit = true;
                    self.done = true;
                    break;
                }
                self.included += 1;
            } else if capped {
                continue;
            }

            return Some(entry);
        }

        None
    }
}
