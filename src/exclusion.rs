//! Pattern-based path exclusion.
//!
//! Rules come from three sources: the built-in default ignore list, the
//! repository's root `.gitignore`, and user-supplied patterns. They are kept
//! in precedence order but combined with OR: a path that matches any rule is
//! excluded. Negated ignore-file entries (`!pattern`) are not supported and
//! are skipped.

use crate::config::Config;
use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// Built-in patterns excluded from every run.
pub static DEFAULT_IGNORES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        ".git",
        ".hg",
        ".svn",
        ".DS_Store",
        ".idea",
        ".vscode",
        "__pycache__",
        "*.pyc",
        "*.pyo",
        ".mypy_cache",
        ".pytest_cache",
        ".ruff_cache",
        ".tox",
        ".nox",
        ".venv",
        "venv",
        "*.egg-info",
        ".eggs",
        "node_modules",
        "bower_components",
        "target",
        "dist",
        "build",
        ".next",
        ".cache",
        "coverage",
        ".coverage",
        "htmlcov",
    ]
});

/// Where an exclusion rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    /// `--exclude` flags (and the output file itself)
    User,
    /// Entries of the root `.gitignore`
    IgnoreFile,
    /// Built-in default ignore list
    Default,
}

impl RuleSource {
    /// Precedence rank; lower wins when several rules match.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::User => 0,
            Self::IgnoreFile => 1,
            Self::Default => 2,
        }
    }
}

/// A single exclusion pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExclusionRule {
    /// Glob pattern
    pub pattern: String,
    /// Rule origin
    pub source: RuleSource,
}

impl ExclusionRule {
    /// Creates a new rule.
    #[must_use]
    pub fn new(pattern: impl Into<String>, source: RuleSource) -> Self {
        Self {
            pattern: pattern.into(),
            source,
        }
    }

    /// Precedence rank of this rule's source.
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        self.source.precedence()
    }
}

/// The compiled, read-only set of exclusion rules for one run.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<ExclusionRule>,
    globs: GlobSet,
}

impl RuleSet {
    /// Compiles rules into a matcher. Rules are stored in precedence order.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid glob.
    pub fn new(mut rules: Vec<ExclusionRule>) -> Result<Self> {
        // stable: keeps insertion order within a source
        rules.sort_by_key(ExclusionRule::precedence);

        let mut builder = GlobSetBuilder::new();
        for rule in &rules {
            let glob = GlobBuilder::new(&rule.pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| Error::invalid_pattern(&rule.pattern, e.kind().to_string()))?;
            builder.add(glob);
        }

        let globs = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))?;

        Ok(Self { rules, globs })
    }

    /// Assembles defaults, `.gitignore` entries and user patterns for a run.
    ///
    /// When the output file lies inside the root it is excluded too, so a
    /// second run never reads the previous run's summary.
    ///
    /// # Errors
    ///
    /// Returns an error if a user pattern is not a valid glob.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut rules: Vec<ExclusionRule> = DEFAULT_IGNORES
            .iter()
            .map(|pattern| ExclusionRule::new(*pattern, RuleSource::Default))
            .collect();

        if config.use_gitignore {
            rules.extend(load_ignore_file(&config.root_dir.join(".gitignore")));
        }

        rules.extend(
            config
                .exclude_patterns
                .iter()
                .map(|pattern| ExclusionRule::new(pattern.trim_end_matches('/'), RuleSource::User)),
        );

        if let Some(rule) = output_rule(config) {
            rules.push(rule);
        }

        let set = Self::new(rules)?;
        debug!("Loaded {} exclusion rules", set.len());
        Ok(set)
    }

    /// Returns the rules in precedence order.
    #[must_use]
    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns true if `relative_path` matches any rule.
    ///
    /// The pattern is tried against the whole path, each ancestor prefix and
    /// each single component, so `tests` excludes a `tests` directory at any
    /// depth and everything below it.
    #[must_use]
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        candidates(relative_path).any(|candidate| self.globs.is_match(candidate))
    }

    /// Returns the highest-precedence rule matching `relative_path`.
    #[must_use]
    pub fn matching_rule(&self, relative_path: &str) -> Option<&ExclusionRule> {
        candidates(relative_path)
            .flat_map(|candidate| self.globs.matches(candidate))
            .min()
            .map(|index| &self.rules[index])
    }
}

/// Returns true if `path` matches any rule in `rules`.
#[must_use]
pub fn is_excluded(path: &str, rules: &RuleSet) -> bool {
    let excluded = rules.is_excluded(path);
    if excluded {
        trace!("Excluded by pattern: {}", path);
    }
    excluded
}

/// Every string a pattern is matched against: ancestor prefixes
/// (`a`, `a/b`, `a/b/c`) followed by single components (`b`, `c`).
fn candidates(relative_path: &str) -> impl Iterator<Item = &str> {
    let path = relative_path.trim_matches('/');
    let prefixes = path
        .match_indices('/')
        .map(move |(index, _)| &path[..index])
        .chain(std::iter::once(path));
    let components = path.split('/').skip(1);

    prefixes.chain(components).filter(|candidate| !candidate.is_empty())
}

/// Reads ignore-file entries as [`RuleSource::IgnoreFile`] rules.
///
/// A missing or unreadable file yields no rules. Comments, blank lines and
/// negations are skipped; anchoring slashes are dropped.
#[must_use]
pub fn load_ignore_file(path: &Path) -> Vec<ExclusionRule> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            trace!("No ignore file at {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let rules: Vec<ExclusionRule> = content
        .lines()
        .filter_map(|line| parse_ignore_line(line, path))
        .map(|pattern| ExclusionRule::new(pattern, RuleSource::IgnoreFile))
        .collect();

    debug!("Read {} rules from {}", rules.len(), path.display());
    rules
}

fn parse_ignore_line(line: &str, path: &Path) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    if line.starts_with('!') {
        debug!(
            "Ignoring negated pattern '{}' in {} (re-inclusion is not supported)",
            line,
            path.display()
        );
        return None;
    }

    let pattern = line
        .strip_prefix('\\')
        .unwrap_or(line)
        .trim_start_matches('/')
        .trim_end_matches('/');

    (!pattern.is_empty()).then(|| pattern.to_string())
}

fn output_rule(config: &Config) -> Option<ExclusionRule> {
    let root = config.root_dir.canonicalize().ok()?;
    let output = config.output_path();
    let output = if output.is_absolute() {
        output
    } else {
        std::env::current_dir().ok()?.join(output)
    };

    let output = output.parent()?.canonicalize().ok()?.join(output.file_name()?);
    if !output.starts_with(&root) {
        return None;
    }

    let relative = crate::file::relative_path(&output, &root);
    Some(ExclusionRule::new(globset::escape(&relative), RuleSource::User))
}
