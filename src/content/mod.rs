//! Source file parsing.
//!
//! Two parsers turn raw files into [`Article`]s: [`MarkdownParser`] for `.md`
//! files with optional frontmatter, and [`HtmlParser`] for hand-written
//! `.html` pages. Both implement [`ContentParser`], which only *extracts*:
//! metadata, rendered content and the raw resource references a page makes.
//!
//! The shared fallback rules live here and run after either parser:
//!
//! | Field | Resolution (first available wins) |
//! |-------|-----------------------------------|
//! | title | metadata → file name without extension |
//! | created | metadata → date in the source path → file mtime |
//! | updated | metadata → file mtime |
//!
//! A creation date in the future is clamped to the current time.
//!
//! Parsers never decide which references are worth copying; that is the
//! resource resolver's job.

pub mod html;
pub mod markdown;

pub use html::HtmlParser;
pub use markdown::MarkdownParser;

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::dates::DatePatterns;
use crate::types::{Article, SourceKind};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid frontmatter: {0}")]
    Frontmatter(String),
    #[error("unsupported source file {0}")]
    Unsupported(PathBuf),
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the input root.
    pub relative: PathBuf,
}

impl SourceFile {
    pub fn new(input_root: &Path, path: PathBuf) -> SourceFile {
        let relative = path
            .strip_prefix(input_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());
        SourceFile { path, relative }
    }
}

/// Metadata a parser found in the document itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub cover_image: Option<String>,
    pub share_url: Option<String>,
    pub canonical_url: Option<String>,
}

/// Everything a parser extracts from one file.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub metadata: Metadata,
    pub text_content: String,
    /// Content fragment without page chrome.
    pub body_html: String,
    /// Complete page, when the source already is one (HTML sources).
    pub html_content: String,
    /// Raw resource references in document order, unfiltered.
    pub references: Vec<String>,
}

/// Extraction strategy for one source format.
pub trait ContentParser: Sync {
    fn extract(&self, raw: &str, dates: &DatePatterns) -> Result<Extracted, ParseError>;
}

/// A parsed article plus the references the resolver should consider.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub article: Article,
    pub references: Vec<String>,
}

/// The parsers and date patterns, built once and shared by all workers.
pub struct Parsers {
    markdown: MarkdownParser,
    html: HtmlParser,
    dates: DatePatterns,
}

impl Parsers {
    pub fn new() -> Result<Parsers, ParseError> {
        Ok(Parsers {
            markdown: MarkdownParser::new()?,
            html: HtmlParser::new(),
            dates: DatePatterns::new()?,
        })
    }

    pub fn dates(&self) -> &DatePatterns {
        &self.dates
    }

    fn parser_for(&self, kind: SourceKind) -> &dyn ContentParser {
        match kind {
            SourceKind::Markdown => &self.markdown,
            SourceKind::Html => &self.html,
        }
    }

    /// Read, extract and apply the fallback rules to one source file.
    pub fn parse_file(&self, source: &SourceFile) -> Result<Parsed, ParseError> {
        let kind = SourceKind::from_path(&source.path)
            .ok_or_else(|| ParseError::Unsupported(source.path.clone()))?;

        let read_err = |e: std::io::Error| ParseError::Read {
            path: source.path.clone(),
            source: e,
        };
        let bytes = fs::read(&source.path).map_err(read_err)?;
        let modified = fs::metadata(&source.path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .map_err(read_err)?;
        let raw = String::from_utf8_lossy(&bytes);

        let extracted = self.parser_for(kind).extract(&raw, &self.dates)?;
        let references = extracted.references.clone();
        let article = self.assemble(source, kind, extracted, modified, Utc::now());
        Ok(Parsed {
            article,
            references,
        })
    }

    /// Apply the title and date fallback chain.
    fn assemble(
        &self,
        source: &SourceFile,
        kind: SourceKind,
        extracted: Extracted,
        modified: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Article {
        let Extracted {
            metadata,
            text_content,
            body_html,
            html_content,
            ..
        } = extracted;

        let title = metadata
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| file_stem(&source.path));

        let created = metadata
            .created
            .or_else(|| self.date_from_path(&source.relative))
            .unwrap_or(modified);
        let created = if created > now {
            warn!(
                "{}: creation date {created} is in the future, using the current time",
                source.path.display()
            );
            now
        } else {
            created
        };
        let updated = metadata.updated.unwrap_or(modified);

        Article {
            title,
            description: metadata.description.unwrap_or_default(),
            tags: metadata.tags,
            created,
            updated,
            text_content,
            html_content,
            body_html,
            source_path: source.path.clone(),
            kind,
            link_to_self: String::new(),
            link_to_save: PathBuf::new(),
            cover_image: metadata.cover_image.filter(|c| !c.trim().is_empty()),
            share_url: metadata.share_url.filter(|u| !u.trim().is_empty()),
            canonical_url: metadata.canonical_url.filter(|u| !u.trim().is_empty()),
        }
    }

    fn date_from_path(&self, relative: &Path) -> Option<DateTime<Utc>> {
        let text = relative.to_string_lossy();
        match self.dates.datetime_from_str(&text) {
            Ok(dt) => Some(dt),
            Err(e) => {
                debug!("no path date: {e}");
                None
            }
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parse a date written in metadata, logging and discarding malformed ones.
pub(crate) fn metadata_date(dates: &DatePatterns, key: &str, value: &str) -> Option<DateTime<Utc>> {
    match dates.datetime_from_str(value) {
        Ok(dt) => Some(dt),
        Err(e) => {
            warn!("ignoring '{key}': {e}");
            None
        }
    }
}

/// Split a tag list written as one string (`"a, b; c"`).
pub(crate) fn split_tags(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Append tags, skipping blanks and ones already present.
pub(crate) fn push_tags<I, S>(tags: &mut Vec<String>, new: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for tag in new {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
}
