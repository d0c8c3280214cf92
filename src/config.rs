use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

const DEFAULT_CHUNK_SIZE: usize = 50;
const DEFAULT_MAX_FILES: usize = 1_000;
const DEFAULT_GIT_COMMITS: usize = 20;
const DEFAULT_MAX_FILE_BYTES: u64 = 100 * 1024;

/// Output format for the generated summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Token-Oriented Object Notation, compact and tabular
    #[default]
    Toon,
    /// Markdown with fenced code blocks
    Markdown,
    /// Pretty-printed JSON
    Json,
    /// XML with structured tags
    Xml,
}

impl OutputFormat {
    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Toon => "toon",
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }

    /// Returns the template name for this format.
    #[must_use]
    pub const fn template_name(self) -> &'static str {
        match self {
            Self::Toon => "toon",
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }
}

/// Configuration for the tria pipeline.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory of the repository to summarize
    pub root_dir: PathBuf,

    /// Output file; `None` resolves to `./<project>_summary.<ext>`
    pub output: Option<PathBuf>,

    /// Output format
    pub format: OutputFormat,

    /// User-supplied exclude patterns
    pub exclude_patterns: Vec<String>,

    /// Whether entries of the root `.gitignore` become exclusion rules
    pub use_gitignore: bool,

    /// Whether to attach git history
    pub git_history: bool,

    /// Number of recent commits in the history block
    pub git_commits: usize,

    /// Maximum lines per chunk
    pub chunk_size: usize,

    /// Hard cap on the number of included files
    pub max_files: usize,

    /// Files larger than this are skipped before classification
    pub max_file_bytes: u64,

    /// Run everything but the final write
    pub dry_run: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use tria::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir(".")
    ///     .chunk_size(80)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root directory doesn't exist or is not a directory
    /// - Chunk size, file cap or commit count is zero
    /// - The output path points at a directory or a missing parent directory
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.exists() {
            return Err(Error::config(format!(
                "Root directory does not exist: {}",
                self.root_dir.display()
            )));
        }

        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "Root path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }

        if self.max_files == 0 {
            return Err(Error::config("max_files must be greater than 0"));
        }

        if self.git_history && self.git_commits == 0 {
            return Err(Error::config(
                "git_commits must be greater than 0 when git history is enabled",
            ));
        }

        if !self.dry_run {
            let output = self.output_path();
            if output.is_dir() {
                return Err(Error::config(format!(
                    "Output path is a directory: {}",
                    output.display()
                )));
            }

            let parent = output
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            if !parent.is_dir() {
                return Err(Error::config(format!(
                    "Output directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        Ok(())
    }

    /// Returns the project name, taken from the root directory's name.
    #[must_use]
    pub fn project_name(&self) -> String {
        project_name(&self.root_dir)
    }

    /// Returns the resolved output file path.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "{}_summary.{}",
                self.project_name(),
                self.format.extension()
            ))
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            output: None,
            format: OutputFormat::Toon,
            exclude_patterns: Vec::new(),
            use_gitignore: true,
            git_history: false,
            git_commits: DEFAULT_GIT_COMMITS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_files: DEFAULT_MAX_FILES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            dry_run: false,
            verbose: false,
        }
    }
}

/// Name of the directory at `root`, resolving `.` and relative paths.
pub(crate) fn project_name(root: &Path) -> String {
    let resolved = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repository".to_string())
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    output: Option<PathBuf>,
    format: Option<OutputFormat>,
    exclude_patterns: Vec<String>,
    use_gitignore: Option<bool>,
    git_history: bool,
    git_commits: Option<usize>,
    chunk_size: Option<usize>,
    max_files: Option<usize>,
    max_file_bytes: Option<u64>,
    dry_run: bool,
    verbose: bool,
}

impl ConfigBuilder {
    /// Sets the repository root.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the output file path.
    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Adds one exclude pattern.
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    /// Replaces the exclude patterns.
    #[must_use]
    pub fn exclude_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Enables or disables `.gitignore` rules.
    #[must_use]
    pub fn use_gitignore(mut self, enabled: bool) -> Self {
        self.use_gitignore = Some(enabled);
        self
    }

    /// Enables or disables git history.
    #[must_use]
    pub fn git_history(mut self, enabled: bool) -> Self {
        self.git_history = enabled;
        self
    }

    /// Sets the number of recent commits to include.
    #[must_use]
    pub fn git_commits(mut self, count: usize) -> Self {
        self.git_commits = Some(count);
        self
    }

    /// Sets the maximum lines per chunk.
    #[must_use]
    pub fn chunk_size(mut self, lines: usize) -> Self {
        self.chunk_size = Some(lines);
        self
    }

    /// Sets the cap on included files.
    #[must_use]
    pub fn max_files(mut self, count: usize) -> Self {
        self.max_files = Some(count);
        self
    }

    /// Sets the size above which files are skipped.
    #[must_use]
    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = Some(bytes);
        self
    }

    /// Enables dry run mode (no output written).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Enables verbose logging.
    #[must_use]
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            root_dir: self.root_dir.unwrap_or_else(|| PathBuf::from(".")),
            output: self.output,
            format: self.format.unwrap_or_default(),
            exclude_patterns: self.exclude_patterns,
            use_gitignore: self.use_gitignore.unwrap_or(true),
            git_history: self.git_history,
            git_commits: self.git_commits.unwrap_or(DEFAULT_GIT_COMMITS),
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            max_files: self.max_files.unwrap_or(DEFAULT_MAX_FILES),
            max_file_bytes: self.max_file_bytes.unwrap_or(DEFAULT_MAX_FILE_BYTES),
            dry_run: self.dry_run,
            verbose: self.verbose,
        };

        config.validate()?;
        Ok(config)
    }
}
