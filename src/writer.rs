use crate::{
    config::{Config, OutputFormat},
    document::DocumentTree,
    error::{Error, Result},
    template::TemplateEngine,
    toon,
};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Result of writing the summary file.
#[derive(Debug, Clone, Serialize)]
pub struct WriteSummary {
    /// File written
    pub path: PathBuf,

    /// Bytes written
    pub bytes_written: usize,

    /// Output format used
    pub format: String,
}

/// The document plus a generation timestamp, as serialized to JSON and TOON.
#[derive(Serialize)]
struct Envelope<'a> {
    generated_at: &'a str,
    #[serde(flatten)]
    document: &'a DocumentTree,
}

/// Serializes a [`DocumentTree`] and writes it atomically.
pub(crate) struct Writer {
    output_path: PathBuf,
    format: OutputFormat,
    template_engine: TemplateEngine,
}

impl Writer {
    /// Creates a new writer from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if template engine initialization fails.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            output_path: config.output_path(),
            format: config.format,
            template_engine: TemplateEngine::new()?,
        })
    }

    /// Renders `doc` in the configured format, stamped with the current
    /// local time.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or template rendering fails.
    pub(crate) fn render(&self, doc: &DocumentTree) -> Result<String> {
        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.render_at(doc, &generated_at)
    }

    fn render_at(&self, doc: &DocumentTree, generated_at: &str) -> Result<String> {
        let envelope = Envelope {
            generated_at,
            document: doc,
        };

        match self.format {
            OutputFormat::Json => {
                let mut json = serde_json::to_string_pretty(&envelope)?;
                json.push('\n');
                Ok(json)
            }
            OutputFormat::Toon => Ok(toon::encode(&serde_json::to_value(&envelope)?)),
            OutputFormat::Markdown | OutputFormat::Xml => {
                self.template_engine.render(self.format, doc, generated_at)
            }
        }
    }

    /// Renders and writes `doc` to the output path.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub(crate) fn write(&self, doc: &DocumentTree) -> Result<WriteSummary> {
        let content = self.render(doc)?;
        write_file_atomic(&self.output_path, &content)?;

        info!(
            "Wrote {} output to {} ({} bytes)",
            self.format.extension(),
            self.output_path.display(),
            content.len()
        );

        Ok(WriteSummary {
            path: self.output_path.clone(),
            bytes_written: content.len(),
            format: self.format.extension().to_string(),
        })
    }
}

/// Writes a file atomically.
///
/// # Process
///
/// 1. Writes content to a temporary file next to the target
/// 2. Syncs the temporary file to disk
/// 3. Renames it over the target path
fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::config(format!("Invalid output path: {}", path.display())))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .sync_all()
        .map_err(|e| Error::io(&temp_path, e))?;

    drop(temp_file);

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

    debug!("Renamed {} to {}", temp_path.display(), path.display());
    Ok(())
}
