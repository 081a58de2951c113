//! Document loading: file extension → format-specific text parser.
//!
//! Parsers are looked up in a [`ParserRegistry`] keyed by lower-cased
//! extension (with the leading dot). New formats are added with
//! [`ParserRegistry::register`]; dispatch never changes.
//!
//! | Extension | Parser |
//! |-----------|--------|
//! | `.pdf` | [`PdfParser`] (pdf-extract) |
//! | `.md` | [`MarkdownParser`] (pulldown-cmark) |
//! | `.html` | [`HtmlParser`] (scraper) |
//! | `.txt`, `.json` | [`PlainTextParser`] |
//!
//! Batch loading isolates failures: a file that cannot be parsed is logged
//! and skipped, the rest of the batch still loads.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pulldown_cmark::{Event, Parser as MdParser, TagEnd};
use scraper::Html;

use crate::error::LoadError;
use crate::models::DocumentRecord;

/// Turns one file into plain text.
pub trait DocumentParser: Send + Sync {
    /// Short label used in logs (e.g. `"pdf"`).
    fn name(&self) -> &str;

    fn parse(&self, path: &Path) -> Result<String, LoadError>;
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_utf8(path: &Path) -> Result<String, LoadError> {
    let bytes = read_bytes(path)?;
    String::from_utf8(bytes).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        message: format!("not valid UTF-8: {}", e),
    })
}

// ============ PDF ============

pub struct PdfParser;

impl DocumentParser for PdfParser {
    fn name(&self) -> &str {
        "pdf"
    }

    fn parse(&self, path: &Path) -> Result<String, LoadError> {
        let bytes = read_bytes(path)?;
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            message: format!("PDF extraction failed: {}", e),
        })
    }
}

// ============ Markdown ============

/// Keeps text, inline code and code blocks; drops markup and raw HTML.
pub struct MarkdownParser;

impl DocumentParser for MarkdownParser {
    fn name(&self) -> &str {
        "markdown"
    }

    fn parse(&self, path: &Path) -> Result<String, LoadError> {
        let source = read_utf8(path)?;
        Ok(markdown_to_text(&source))
    }
}

pub fn markdown_to_text(source: &str) -> String {
    let mut out = String::new();
    for event in MdParser::new(source) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::CodeBlock)
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::TableRow)
            | Event::End(TagEnd::TableHead) => out.push_str("\n\n"),
            Event::End(TagEnd::TableCell) => out.push(' '),
            _ => {}
        }
    }
    out.trim().to_string()
}

// ============ HTML ============

/// Visible text of an HTML page, one text node per line.
pub struct HtmlParser;

impl DocumentParser for HtmlParser {
    fn name(&self) -> &str {
        "html"
    }

    fn parse(&self, path: &Path) -> Result<String, LoadError> {
        let source = read_utf8(path)?;
        Ok(html_to_text(&source))
    }
}

const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

pub fn html_to_text(source: &str) -> String {
    let document = Html::parse_document(source);
    let mut lines: Vec<String> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| INVISIBLE_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !cleaned.is_empty() {
            lines.push(cleaned);
        }
    }

    lines.join("\n")
}

// ============ Plain text ============

pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn name(&self) -> &str {
        "text"
    }

    fn parse(&self, path: &Path) -> Result<String, LoadError> {
        read_utf8(path)
    }
}

// ============ Registry ============

/// Extension → parser lookup table.
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn DocumentParser>>,
}

/// Outcome of loading a batch of files.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<DocumentRecord>,
    pub failures: Vec<LoadError>,
}

impl ParserRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in parsers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let text: Arc<dyn DocumentParser> = Arc::new(PlainTextParser);
        registry.register(".pdf", Arc::new(PdfParser));
        registry.register(".md", Arc::new(MarkdownParser));
        registry.register(".html", Arc::new(HtmlParser));
        registry.register(".txt", text.clone());
        registry.register(".json", text);
        registry
    }

    /// Register (or replace) the parser for `extension`.
    ///
    /// Accepts `"md"`, `".md"` or `".MD"` alike.
    pub fn register(&mut self, extension: &str, parser: Arc<dyn DocumentParser>) {
        self.parsers.insert(normalize_extension(extension), parser);
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.parsers.contains_key(&extension_of(path))
    }

    /// Supported extensions, sorted.
    pub fn extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.parsers.keys().cloned().collect();
        exts.sort();
        exts
    }

    /// Load one file into a [`DocumentRecord`].
    pub fn load(&self, path: &Path) -> Result<DocumentRecord, LoadError> {
        let extension = extension_of(path);
        let parser = self
            .parsers
            .get(&extension)
            .ok_or_else(|| LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: extension.clone(),
            })?;

        let text = parser.parse(path)?;
        tracing::debug!(
            parser = parser.name(),
            path = %path.display(),
            chars = text.chars().count(),
            "parsed document"
        );

        Ok(DocumentRecord {
            text,
            source: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }

    /// Load every file, logging and collecting per-file failures.
    ///
    /// A parser that panics is recorded as a [`LoadError::Parse`] for its
    /// file only.
    pub fn load_all(&self, paths: &[PathBuf]) -> LoadReport {
        let mut report = LoadReport::default();
        for path in paths {
            let loaded = std::panic::catch_unwind(AssertUnwindSafe(|| self.load(path)))
                .unwrap_or_else(|payload| {
                    Err(LoadError::Parse {
                        path: path.clone(),
                        message: format!("parser panicked: {}", panic_message(&*payload)),
                    })
                });
            match loaded {
                Ok(doc) => report.documents.push(doc),
                Err(e) => {
                    tracing::error!("Failed to load {}: {}", path.display(), e);
                    report.failures.push(e);
                }
            }
        }
        report
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn normalize_extension(ext: &str) -> String {
    format!(".{}", ext.trim_start_matches('.').to_lowercase())
}

fn extension_of(path: &Path) -> String {
    match path.extension() {
        Some(ext) => normalize_extension(&ext.to_string_lossy()),
        None => String::new(),
    }
}
