//! Shared types used across pipeline stages.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Tag that turns an article into a standalone page (navigation link on the
/// index instead of a dated entry).
pub const PAGE_TAG: &str = "PAGE";

/// Which parser handles a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Markdown,
    Html,
}

impl SourceKind {
    /// Classify by extension (case-insensitive). `None` for anything that is
    /// not `.md` or `.html`.
    pub fn from_path(path: &Path) -> Option<SourceKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" => Some(SourceKind::Markdown),
            "html" => Some(SourceKind::Html),
            _ => None,
        }
    }
}

/// One published unit of content.
///
/// Parsers fill in metadata and content; the resource resolver adds tags from
/// the path, the output location and the cover image; the presentation layer
/// fills `html_content` for Markdown sources.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Plain text used for search: the Markdown body, or the visible text of
    /// an HTML document.
    pub text_content: String,
    /// The complete page written to `link_to_save`.
    pub html_content: String,
    /// Rendered content fragment without any page chrome.
    pub body_html: String,
    pub source_path: PathBuf,
    pub kind: SourceKind,
    /// Output path relative to the site root, `/`-separated.
    pub link_to_self: String,
    /// Where the page is written on disk.
    pub link_to_save: PathBuf,
    /// Site-root-relative path or absolute URL.
    pub cover_image: Option<String>,
    pub share_url: Option<String>,
    pub canonical_url: Option<String>,
}

impl Article {
    pub fn is_page(&self) -> bool {
        self.tags.iter().any(|t| t == PAGE_TAG)
    }

    /// Directory part of `link_to_self` (empty at the site root).
    pub fn link_dir(&self) -> &str {
        self.link_to_self
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }

    /// Prefix that leads from this article's page back to the site root.
    pub fn root_prefix(&self) -> String {
        "../".repeat(self.link_to_self.matches('/').count())
    }
}
