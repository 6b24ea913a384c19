//! RSS 2.0 feed generation.
//!
//! The feed lists every article, most recent first by creation date no
//! matter how the site itself is sorted. Item bodies are the article's
//! content fragment cleaned up for feed readers: active or heavy elements
//! are dropped, presentation attributes stripped, and relative links made
//! absolute so they still resolve outside the site.

use chrono::Utc;
use regex::{Captures, Regex};
use rss::{Category, Channel, ChannelBuilder, GuidBuilder, Item, ItemBuilder};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::Settings;
use crate::generate::absolute_url;
use crate::resources::join_url_path;
use crate::types::{Article, PAGE_TAG};

pub const FEED_FILE: &str = "rss.xml";

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid feed pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Compiled rewriting rules for feed item bodies.
pub struct FeedSanitizer {
    blocks: Regex,
    voids: Regex,
    ui_icons: Regex,
    noise_attrs: Regex,
    url_attrs: Regex,
}

impl FeedSanitizer {
    pub fn new() -> Result<FeedSanitizer, regex::Error> {
        Ok(FeedSanitizer {
            blocks: Regex::new(
                r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<iframe\b.*?</iframe\s*>|<form\b.*?</form\s*>|<object\b.*?</object\s*>|<button\b.*?</button\s*>",
            )?,
            voids: Regex::new(r"(?i)<(?:embed|input|script|iframe)\b[^>]*/?>")?,
            ui_icons: Regex::new(r#"(?i)<img\b[^>]*?src\s*=\s*["'][^"']*(?:copy|rss)\.svg["'][^>]*>"#)?,
            noise_attrs: Regex::new(
                r#"(?i)\s(?:style|class|id|on[a-z]+)\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#,
            )?,
            url_attrs: Regex::new(r#"(?i)(\s(?:src|href|poster|data)\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)?,
        })
    }

    /// Clean an article's content fragment for use as a feed item body.
    pub fn sanitize(&self, html: &str, article: &Article, base_url: &str) -> String {
        let html = self.blocks.replace_all(html, "");
        let html = self.voids.replace_all(&html, "");
        let html = self.ui_icons.replace_all(&html, "");
        let html = self.noise_attrs.replace_all(&html, "");
        let dir = article.link_dir();
        self.url_attrs
            .replace_all(&html, |caps: &Captures| {
                let value = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or("");
                format!("{}\"{}\"", &caps[1], feed_url(value, dir, base_url))
            })
            .into_owned()
    }
}

/// Absolute, percent-encoded URL for a reference found in an article
/// living in `dir`. Fragments, mail links and empty values pass through.
fn feed_url(value: &str, dir: &str, base_url: &str) -> String {
    let value = value.trim();
    let lower = value.to_ascii_lowercase();
    if value.is_empty() || value.starts_with('#') || lower.starts_with("mailto:") {
        return value.to_string();
    }
    let target = if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//") {
        value.to_string()
    } else if let Some(rooted) = value.strip_prefix('/') {
        absolute_url(rooted, base_url)
    } else {
        absolute_url(&join_url_path(dir, value), base_url)
    };
    match Url::parse(&target) {
        Ok(url) => url.to_string(),
        Err(_) => target,
    }
}

fn item(article: &Article, settings: &Settings, sanitizer: &FeedSanitizer) -> Item {
    let link = feed_url(&article.link_to_self, "", &settings.base_url);
    let guid = GuidBuilder::default().value(link.clone()).permalink(true).build();

    let body = if article.body_html.trim().is_empty() {
        article.description.clone()
    } else {
        sanitizer.sanitize(&article.body_html, article, &settings.base_url)
    };

    let categories: Vec<Category> = article
        .tags
        .iter()
        .filter(|t| *t != PAGE_TAG)
        .map(|tag| Category {
            name: tag.clone(),
            domain: None,
        })
        .collect();

    let mut builder = ItemBuilder::default();
    builder
        .title(Some(article.title.clone()))
        .link(Some(link))
        .guid(Some(guid))
        .pub_date(Some(article.created.to_rfc2822()))
        .description(Some(body))
        .categories(categories);
    builder.build()
}

/// Build the feed channel. `articles` is left in its given order.
pub fn channel(articles: &[Article], settings: &Settings) -> Result<Channel, FeedError> {
    let sanitizer = FeedSanitizer::new()?;

    let mut newest_first: Vec<&Article> = articles.iter().collect();
    newest_first.sort_by(|a, b| b.created.cmp(&a.created));

    debug!(count = newest_first.len(), "generating RSS feed");

    let items: Vec<Item> = newest_first
        .iter()
        .map(|a| item(a, settings, &sanitizer))
        .collect();

    let description = if settings.description.trim().is_empty() {
        settings.title.clone()
    } else {
        settings.description.trim().to_string()
    };

    Ok(ChannelBuilder::default()
        .title(settings.title.clone())
        .link(format!("{}/", settings.base_url.trim_end_matches('/')))
        .description(description)
        .last_build_date(Some(Utc::now().to_rfc2822()))
        .items(items)
        .build())
}

/// Write `rss.xml` into the output directory.
pub fn write_feed(articles: &[Article], settings: &Settings, output_dir: &Path) -> Result<(), FeedError> {
    let xml = channel(articles, settings)?.to_string();
    fs::write(output_dir.join(FEED_FILE), xml)?;
    Ok(())
}
