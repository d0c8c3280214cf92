use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tria::{Config, OutputFormat, Pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "tria",
    version,
    author,
    about = "Summarize a repository into one structured, LLM-friendly document",
    long_about = "Summarize a repository into one structured, LLM-friendly document.\n\n\
    tria walks the directory tree, parses Python, Markdown, Dockerfile and license \
    files into segments, chunks every text file and writes a single summary. It \
    respects .gitignore and can attach recent git history.\n\n\
    USAGE EXAMPLES:\n  \
      # Summarize the current directory as TOON\n  \
      tria\n\n  \
      # Markdown summary of a project, skipping tests\n  \
      tria ./my-project -f md --exclude tests\n\n  \
      # JSON with the last 10 commits\n  \
      tria ./my-project -f json --git-history --git-commits 10"
)]
struct Cli {
    /// Repository root to summarize
    #[arg(default_value = ".", value_name = "PATH")]
    path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "toon")]
    format: CliFormat,

    /// Output file (defaults to <project>_summary.<ext> in the current directory)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Glob pattern to exclude (can be used multiple times)
    #[arg(long, value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Ignore the root .gitignore
    #[arg(long)]
    no_gitignore: bool,

    /// Include recent commits, branches and contributors
    #[arg(long)]
    git_history: bool,

    /// Number of commits to include with --git-history
    #[arg(long, default_value_t = 20, value_name = "N")]
    git_commits: usize,

    /// Lines per chunk
    #[arg(long, default_value_t = 50, value_name = "LINES")]
    chunk_size: usize,

    /// Maximum number of files to include
    #[arg(long, default_value_t = 1_000, value_name = "N")]
    max_files: usize,

    /// Skip files larger than this many bytes
    #[arg(long = "max-file-size", default_value_t = 102_400, value_name = "BYTES")]
    max_file_size: u64,

    /// Dry run (don't write the output file)
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliFormat {
    Toon,
    #[value(alias = "markdown")]
    Md,
    Json,
    Xml,
}

impl From<CliFormat> for OutputFormat {
    fn from(f: CliFormat) -> Self {
        match f {
            CliFormat::Toon => Self::Toon,
            CliFormat::Md => Self::Markdown,
            CliFormat::Json => Self::Json,
            CliFormat::Xml => Self::Xml,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let mut builder = Config::builder()
        .root_dir(cli.path)
        .format(cli.format.into())
        .exclude_patterns(cli.exclude)
        .use_gitignore(!cli.no_gitignore)
        .git_history(cli.git_history)
        .git_commits(cli.git_commits)
        .chunk_size(cli.chunk_size)
        .max_files(cli.max_files)
        .max_file_bytes(cli.max_file_size)
        .dry_run(cli.dry_run)
        .verbose(cli.verbose > 0);

    if let Some(output) = cli.output {
        builder = builder.output(output);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let stats = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run()
        .context("Pipeline execution failed")?;

    stats.print_summary();

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("tria=info"),
        1 => EnvFilter::new("tria=debug"),
        _ => EnvFilter::new("tria=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();

    Ok(())
}
