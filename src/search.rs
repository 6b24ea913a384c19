//! Client-side search index.
//!
//! Every published article contributes one [`SearchRecord`] to
//! `search_index.json`. The index page's script loads that file and filters
//! the article cards by matching `url` against each card's `data-url`.

use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::Article;

pub const SEARCH_INDEX_FILE: &str = "search_index.json";

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRecord {
    pub title: String,
    /// Lowercased plain text, punctuation folded to spaces.
    pub content: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Site-root-relative link, same as the article's `link_to_self`.
    pub url: String,
    pub html_content: String,
}

impl SearchRecord {
    pub fn from_article(article: &Article) -> SearchRecord {
        SearchRecord {
            title: article.title.clone(),
            content: clean_content(&article.text_content),
            description: article.description.clone(),
            tags: article.tags.clone(),
            url: article.link_to_self.clone(),
            html_content: article.body_html.clone(),
        }
    }
}

/// Normalize text for matching: tags dropped, lowercased, anything that is
/// not a letter or digit replaced by a space, whitespace collapsed.
pub fn clean_content(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                stripped.push(' ');
            }
            _ if in_tag => {}
            _ => stripped.push(c),
        }
    }

    let folded: String = stripped
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Write the records as a JSON array to `<output>/search_index.json`.
pub fn write_index(records: &[SearchRecord], output_dir: &Path) -> Result<(), SearchError> {
    let json = serde_json::to_string(records)?;
    fs::write(output_dir.join(SEARCH_INDEX_FILE), json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::article;
    use tempfile::TempDir;

    #[test]
    fn clean_content_folds_punctuation() {
        assert_eq!(
            clean_content("Hello, World!  It's   <b>Rust</b>-time."),
            "hello world it s rust time"
        );
    }

    #[test]
    fn clean_content_keeps_unicode_letters() {
        assert_eq!(clean_content("Café NAÏVE 42"), "café naïve 42");
    }

    #[test]
    fn record_uses_link_and_body() {
        let mut a = article("Post");
        a.text_content = "Some Text.".into();
        a.body_html = "<p>Some Text.</p>".into();
        a.html_content = "<html>full page</html>".into();
        a.tags = vec!["rust".into()];

        let record = SearchRecord::from_article(&a);
        assert_eq!(record.url, "Post/index.html");
        assert_eq!(record.content, "some text");
        assert_eq!(record.html_content, "<p>Some Text.</p>");
        assert_eq!(record.tags, vec!["rust"]);
    }

    #[test]
    fn write_index_is_json_array() {
        let tmp = TempDir::new().unwrap();
        let records = vec![SearchRecord::from_article(&article("One"))];
        write_index(&records, tmp.path()).unwrap();

        let raw = std::fs::read_to_string(tmp.path().join(SEARCH_INDEX_FILE)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed[0]["title"], "One");
        assert_eq!(parsed[0]["url"], "One/index.html");
        assert!(parsed[0].get("html_content").is_some());
    }

    #[test]
    fn empty_index_is_empty_array() {
        let tmp = TempDir::new().unwrap();
        write_index(&[], tmp.path()).unwrap();
        let raw = std::fs::read_to_string(tmp.path().join(SEARCH_INDEX_FILE)).unwrap();
        assert_eq!(raw, "[]");
    }
}
