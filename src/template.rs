use crate::{
    config::OutputFormat,
    document::{DocumentSummary, DocumentTree, FileRecord},
    error::{Error, Result},
    history::HistoryBlock,
    parser::FileMetadata,
};
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera, Value};

#[derive(Serialize)]
struct DocumentView<'a> {
    project_name: &'a str,
    root: &'a str,
    generated_at: &'a str,
    tree_lines: Vec<String>,
    summary: &'a DocumentSummary,
    files: Vec<FileView<'a>>,
    skipped: Vec<SkippedView<'a>>,
    history: Option<&'a HistoryBlock>,
}

#[derive(Serialize)]
struct FileView<'a> {
    path: &'a str,
    kind: &'static str,
    language: &'a str,
    size_bytes: u64,
    line_count: usize,
    structured: bool,
    details: Vec<String>,
    chunks: Vec<ChunkView<'a>>,
}

#[derive(Serialize)]
struct ChunkView<'a> {
    index: usize,
    number: usize,
    start_line: usize,
    end_line: usize,
    segments: String,
    fence: String,
    body: String,
    content: &'a str,
}

#[derive(Serialize)]
struct SkippedView<'a> {
    path: &'a str,
    reason: String,
}

/// Template engine for the Markdown and XML layouts.
pub(crate) struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Creates the engine with the bundled templates.
    ///
    /// # Errors
    ///
    /// Returns an error if a bundled template fails to compile.
    pub(crate) fn new() -> Result<Self> {
        let mut tera = Tera::default();

        Self::register_builtin_templates(&mut tera)?;
        tera.register_filter("xml_escape", Self::xml_escape_filter);

        Ok(Self { tera })
    }

    fn register_builtin_templates(tera: &mut Tera) -> Result<()> {
        tera.add_raw_template("markdown", include_str!("../templates/markdown.tera"))
            .map_err(|e| Error::template("markdown", e))?;

        tera.add_raw_template("xml", include_str!("../templates/xml.tera"))
            .map_err(|e| Error::template("xml", e))?;

        Ok(())
    }

    /// Escapes XML special characters and drops control characters XML
    /// 1.0 cannot carry.
    fn xml_escape_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        match value {
            Value::String(s) => Ok(Value::String(xml_escape(s))),
            Value::Null => Ok(Value::String(String::new())),
            other => Ok(other.clone()),
        }
    }

    /// Renders `doc` with the template for `format`.
    ///
    /// # Errors
    ///
    /// Returns an error if `format` has no template or rendering fails.
    pub(crate) fn render(
        &self,
        format: OutputFormat,
        doc: &DocumentTree,
        generated_at: &str,
    ) -> Result<String> {
        let template_name = format.template_name();

        let view = DocumentView {
            project_name: &doc.project.name,
            root: &doc.project.root,
            generated_at,
            tree_lines: doc.structure.render_lines(),
            summary: &doc.summary,
            files: doc.files.iter().map(file_view).collect(),
            skipped: doc
                .skipped
                .iter()
                .map(|stub| SkippedView {
                    path: &stub.path,
                    reason: stub.reason.to_string(),
                })
                .collect(),
            history: doc.history.as_ref(),
        };

        let mut context = Context::new();
        context.insert("doc", &view);

        self.tera
            .render(template_name, &context)
            .map_err(|e| Error::template(template_name, e))
    }
}

fn file_view(record: &FileRecord) -> FileView<'_> {
    FileView {
        path: &record.path,
        kind: record.kind.as_str(),
        language: &record.language,
        size_bytes: record.size_bytes,
        line_count: record.line_count,
        structured: record.structured,
        details: record.metadata.as_ref().map(details).unwrap_or_default(),
        chunks: record
            .chunks
            .iter()
            .map(|chunk| {
                let mut body = chunk.content.clone();
                if !body.ends_with('\n') {
                    body.push('\n');
                }

                ChunkView {
                    index: chunk.index,
                    number: chunk.index + 1,
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                    segments: chunk
                        .segments
                        .iter()
                        .map(|span| match &span.name {
                            Some(name) => format!("{} {}", span.kind.as_str(), name),
                            None => span.kind.as_str().to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(", "),
                    fence: code_fence(&chunk.content),
                    body,
                    content: &chunk.content,
                }
            })
            .collect(),
    }
}

/// Human-readable metadata lines.
fn details(metadata: &FileMetadata) -> Vec<String> {
    let mut lines = Vec::new();

    match metadata {
        FileMetadata::Python { functions, classes } => {
            push_list(&mut lines, "Functions", functions);
            push_list(&mut lines, "Classes", classes);
        }
        FileMetadata::Markdown { headers } => push_list(&mut lines, "Headers", headers),
        FileMetadata::Dockerfile {
            image,
            workdir,
            entrypoint,
            cmd,
            env,
        } => {
            let fields = [
                ("Image", image),
                ("Workdir", workdir),
                ("Entrypoint", entrypoint),
                ("Cmd", cmd),
            ];
            for (label, value) in fields {
                if let Some(value) = value {
                    lines.push(format!("{label}: {value}"));
                }
            }
            if !env.is_empty() {
                let pairs: Vec<_> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
                lines.push(format!("Env: {}", pairs.join(", ")));
            }
        }
        FileMetadata::License { header, license } => {
            if let Some(license) = license {
                lines.push(format!("License: {license}"));
            }
            if let Some(header) = header {
                lines.push(format!("Header: {header}"));
            }
        }
    }

    lines
}

fn push_list(lines: &mut Vec<String>, label: &str, items: &[String]) {
    if !items.is_empty() {
        lines.push(format!("{label}: {}", items.join(", ")));
    }
}

/// A backtick fence longer than any backtick run inside `content`.
fn code_fence(content: &str) -> String {
    let longest = content
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

fn xml_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' | '\n' | '\r' => escaped.push(c),
            c if c.is_control() && (c as u32) < 0x20 => {}
            c => escaped.push(c),
        }
    }
    escaped
}
