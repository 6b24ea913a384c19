//! Site configuration.
//!
//! Settings are layered: stock defaults, then an optional `plainpress.toml`,
//! then command-line flags. The merged result is validated once and
//! finalized (derived values filled in) before the build starts. After that
//! the [`Settings`] snapshot is shared read-only by every worker.
//!
//! ## Config File
//!
//! ```toml
//! # All options are optional - defaults shown below
//! title = "My Blog"
//! description = ""               # Markdown, rendered on the index page
//! input_path = "content"
//! output_path = "public"
//! date_format = "%Y %m %d"       # chrono strftime syntax
//! index_name = "index.html"
//! theme = "default"              # default | dark | paper
//! sort = "date-created"
//! base_url = ""                  # empty = http://localhost:<port>
//! port = 8666
//!
//! extract_tags_from_paths = true
//! remove_date_from_paths = true
//! remove_date_from_titles = true
//! open_in_new_tab = false
//! ignore_errors = false
//!
//! [[share_buttons]]
//! name = "Mastodon"
//! display = "icons/mastodon.svg" # optional; text label or local image
//! url = "https://mastodon.social/share?text={TITLE}%20{URL}"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use chrono::format::{Item, StrftimeItems};
use pulldown_cmark::{Parser, html};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::theme::Theme;

/// Default config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "plainpress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("cannot read snippet {path}: {source}")]
    Snippet {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Article ordering on the index page and in the search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Newest first.
    #[default]
    DateCreated,
    ReverseDateCreated,
    /// Most recently updated first.
    DateUpdated,
    ReverseDateUpdated,
    /// A to Z.
    Title,
    ReverseTitle,
    /// Source path, A to Z.
    Path,
    ReversePath,
}

impl SortOrder {
    pub const ALL: [SortOrder; 8] = [
        SortOrder::DateCreated,
        SortOrder::ReverseDateCreated,
        SortOrder::DateUpdated,
        SortOrder::ReverseDateUpdated,
        SortOrder::Title,
        SortOrder::ReverseTitle,
        SortOrder::Path,
        SortOrder::ReversePath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::DateCreated => "date-created",
            SortOrder::ReverseDateCreated => "reverse-date-created",
            SortOrder::DateUpdated => "date-updated",
            SortOrder::ReverseDateUpdated => "reverse-date-updated",
            SortOrder::Title => "title",
            SortOrder::ReverseTitle => "reverse-title",
            SortOrder::Path => "path",
            SortOrder::ReversePath => "reverse-path",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SortOrder::ALL
            .into_iter()
            .find(|order| order.as_str() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = SortOrder::ALL.iter().map(SortOrder::as_str).collect();
                ConfigError::Validation(format!(
                    "unknown sort order '{s}' (expected one of: {})",
                    valid.join(", ")
                ))
            })
    }
}

/// A share button shown under each article.
///
/// `url` is a template; see `generate::share_url` for the placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShareButton {
    pub name: String,
    /// Label text, or a local image path used as the icon. Empty = `name`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display: String,
    pub url: String,
}

impl ShareButton {
    pub fn label(&self) -> &str {
        if self.display.is_empty() {
            &self.name
        } else {
            &self.display
        }
    }

    /// Whether the display value points at an image rather than being text.
    pub fn has_icon(&self) -> bool {
        is_image_path(&self.display)
    }
}

/// Parses `Name|UrlTemplate` or `Name|Display|UrlTemplate`.
impl FromStr for ShareButton {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('|').map(str::trim).collect();
        let (name, display, url) = match parts.as_slice() {
            [name, url] => (*name, "", *url),
            [name, display, url] => (*name, *display, *url),
            _ => {
                return Err(ConfigError::Validation(format!(
                    "share button '{s}' must be 'Name|URL' or 'Name|Display|URL'"
                )));
            }
        };
        if name.is_empty() || url.is_empty() {
            return Err(ConfigError::Validation(format!(
                "share button '{s}' needs a name and a URL"
            )));
        }
        Ok(ShareButton {
            name: name.to_string(),
            display: display.to_string(),
            url: url.to_string(),
        })
    }
}

pub(crate) fn is_image_path(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    if lower.contains("://") {
        return false;
    }
    [".png", ".svg", ".jpg", ".jpeg", ".gif", ".webp", ".ico"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

/// Site settings.
///
/// All fields have defaults; config files need only specify the values they
/// change. Fields marked `serde(skip)` are derived by [`Settings::finalize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub title: String,
    /// Site description in Markdown.
    pub description: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// chrono strftime format for displayed dates.
    pub date_format: String,
    /// File name every article and the site index are written as.
    pub index_name: String,
    pub theme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_css: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_js: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_favicon: Option<PathBuf>,
    /// HTML snippet injected into every `<head>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements_top: Option<PathBuf>,
    /// HTML snippet injected at the end of every `<body>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elements_bottom: Option<PathBuf>,
    pub base_url: String,
    pub author_name: String,
    pub publisher_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher_logo: Option<PathBuf>,
    pub share_buttons: Vec<ShareButton>,
    pub sort: SortOrder,
    pub extract_tags_from_paths: bool,
    pub remove_date_from_paths: bool,
    pub remove_date_from_titles: bool,
    pub open_in_new_tab: bool,
    /// Skip failing articles and missing resources instead of aborting.
    pub ignore_errors: bool,
    /// Clear a non-empty output directory without asking.
    pub force_overwrite: bool,
    pub port: u16,
    /// Upper bound on worker threads. `None` = one per core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    #[serde(skip)]
    pub description_html: String,
    #[serde(skip)]
    pub highlight_theme: String,
    #[serde(skip)]
    pub head_snippet: String,
    #[serde(skip)]
    pub body_snippet: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: "My Blog".to_string(),
            description: String::new(),
            input_path: PathBuf::from("content"),
            output_path: PathBuf::from("public"),
            date_format: "%Y %m %d".to_string(),
            index_name: "index.html".to_string(),
            theme: "default".to_string(),
            custom_css: None,
            custom_js: None,
            custom_favicon: None,
            elements_top: None,
            elements_bottom: None,
            base_url: String::new(),
            author_name: String::new(),
            publisher_name: String::new(),
            publisher_logo: None,
            share_buttons: Vec::new(),
            sort: SortOrder::default(),
            extract_tags_from_paths: true,
            remove_date_from_paths: true,
            remove_date_from_titles: true,
            open_in_new_tab: false,
            ignore_errors: false,
            force_overwrite: false,
            port: 8666,
            max_workers: None,
            description_html: String::new(),
            highlight_theme: String::new(),
            head_snippet: String::new(),
            body_snippet: String::new(),
        }
    }
}

impl Settings {
    /// Validate values that would otherwise fail deep inside the build.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index_name.trim().is_empty() {
            return Err(ConfigError::Validation("index_name must not be empty".into()));
        }
        if self.index_name.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "index_name must be a file name, not a path".into(),
            ));
        }
        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Validation(format!(
                "date_format '{}' is not a valid strftime format",
                self.date_format
            )));
        }
        if self.max_workers == Some(0) {
            return Err(ConfigError::Validation("max_workers must be at least 1".into()));
        }
        if self.input_path == self.output_path {
            return Err(ConfigError::Validation(
                "input_path and output_path must differ".into(),
            ));
        }
        Ok(())
    }

    /// Fill in derived values. Called once, after validation.
    ///
    /// - `base_url` defaults to the preview server and loses its trailing `/`
    /// - author and publisher default to the site title
    /// - head/body snippets are read from disk
    /// - the Markdown description is rendered to HTML
    /// - the syntax-highlighting theme follows the site theme's color scheme
    pub fn finalize(&mut self, theme: &Theme) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            self.base_url = format!("http://localhost:{}", self.port);
        }
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();

        if self.author_name.trim().is_empty() {
            self.author_name = self.title.clone();
        }
        if self.publisher_name.trim().is_empty() {
            self.publisher_name = self.title.clone();
        }

        if let Some(path) = &self.elements_top {
            self.head_snippet = read_snippet(path)?;
        }
        if let Some(path) = &self.elements_bottom {
            self.body_snippet = read_snippet(path)?;
        }

        let mut rendered = String::new();
        html::push_html(&mut rendered, Parser::new(&self.description));
        self.description_html = rendered;

        self.highlight_theme = theme.highlight_theme().to_string();
        Ok(())
    }
}

fn read_snippet(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Snippet {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the effective worker count.
///
/// - `None` → all available cores
/// - `Some(n)` → `min(n, cores)` (users can constrain down, not up)
pub fn effective_threads(max_workers: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    max_workers.map(|n| n.min(cores)).unwrap_or(cores).max(1)
}

// =============================================================================
// Config loading and merging
// =============================================================================

/// Returns the stock settings as a `toml::Value::Table`, the base layer that
/// user files are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Settings::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_settings(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Settings, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let settings: Settings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from a config file layered over stock defaults.
///
/// A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_settings(base, overlay)
}

/// Returns a fully-commented stock `plainpress.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# plainpress configuration
# ========================
# All settings are optional. Values shown are the defaults.
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# Site title, also the default author and publisher name.
title = "My Blog"

# Site description in Markdown, shown at the top of the index page.
description = ""

# Where sources are read from and the site is written to.
input_path = "content"
output_path = "public"

# How dates are displayed (chrono strftime syntax).
date_format = "%Y %m %d"

# File name of every generated page.
index_name = "index.html"

# Built-in theme: default, dark or paper.
theme = "default"
# custom_css = "my-style.css"      # replaces the theme
# custom_js = "my-script.js"
# custom_favicon = "favicon.ico"

# HTML snippets injected into every page.
# elements_top = "head.html"       # end of <head>
# elements_bottom = "footer.html"  # end of <body>

# Absolute site URL used in the RSS feed and share links.
# Empty means http://localhost:<port>.
base_url = ""
port = 8666

# Structured-data names. Empty means the site title.
author_name = ""
publisher_name = ""
# publisher_logo = "logo.png"

# Index order: date-created, reverse-date-created, date-updated,
# reverse-date-updated, title, reverse-title, path, reverse-path.
sort = "date-created"

# Directory names become tags (blog/rust/post.md -> blog, rust).
extract_tags_from_paths = true
# Strip dates out of output paths and titles.
remove_date_from_paths = true
remove_date_from_titles = true
# Index links open in a new tab.
open_in_new_tab = false

# Skip failing articles and missing resources instead of aborting.
ignore_errors = false
# Clear a non-empty output directory without asking.
force_overwrite = false

# Maximum parallel workers. Omit for one per CPU core.
# max_workers = 4

# Share buttons under each article. Placeholders in url:
# {URL} {TITLE} {DESCRIPTION} {TEXT} {LINK} {IMAGE} {TAGS} {TAG}
share_buttons = []
# [[share_buttons]]
# name = "Mastodon"
# display = "mastodon.svg"
# url = "https://mastodon.social/share?text={TITLE}%20{URL}"
"##
}
