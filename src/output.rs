//! CLI output formatting for builds.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Every article is
//! shown by its position and title, with the page it became; the source file
//! and other context follow on indented lines. Read top to bottom, a build
//! summary is an inventory of the site.
//!
//! # Output Format
//!
//! ```text
//! Home → index.html
//!
//! Articles
//! 001 Hello World → blog/hello-world/index.html
//!     Source: blog/2023-04-05-hello-world.md
//!     Tags: rust, blog
//! 002 Notes → notes/index.html
//!     Source: notes.md
//!
//! Pages
//! 001 About → about/index/index.html
//!     Source: about/index.html
//!
//! Skipped
//!     drafts/broken.md
//!
//! Generated 2 articles, 1 page
//! ```
//!
//! # Architecture
//!
//! `format_build_output` returns the lines for testability and
//! `print_build_output` writes them to stdout. Formatting is pure: no I/O,
//! no side effects.

use std::path::Path;

use crate::config::Settings;
use crate::pipeline::BuildReport;
use crate::types::{Article, PAGE_TAG};

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

/// Source path shown relative to the input root when possible.
fn display_source(path: &Path, input_root: &Path) -> String {
    path.strip_prefix(input_root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Header line plus indented context lines for one article.
///
/// ```text
/// 001 Hello World → hello-world/index.html
///     Source: hello-world.md
/// ```
fn article_lines(index: usize, article: &Article, input_root: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} \u{2192} {}",
        format_index(index),
        article.title,
        article.link_to_self
    )];
    lines.push(format!(
        "{}Source: {}",
        indent(1),
        display_source(&article.source_path, input_root)
    ));

    let tags: Vec<&str> = article
        .tags
        .iter()
        .filter(|t| *t != PAGE_TAG)
        .map(String::as_str)
        .collect();
    if !tags.is_empty() {
        lines.push(format!("{}Tags: {}", indent(1), tags.join(", ")));
    }
    if !article.description.is_empty() {
        lines.push(format!(
            "{}Description: {}",
            indent(1),
            truncate_desc(&article.description, 60)
        ));
    }
    lines
}

// ============================================================================
// Build output
// ============================================================================

pub fn format_build_output(report: &BuildReport, settings: &Settings) -> Vec<String> {
    let mut lines = vec![format!("Home \u{2192} {}", settings.index_name)];
    let (pages, articles): (Vec<&Article>, Vec<&Article>) =
        report.articles.iter().partition(|a| a.is_page());

    if !articles.is_empty() {
        lines.push(String::new());
        lines.push("Articles".to_string());
        for (i, article) in articles.iter().enumerate() {
            lines.extend(article_lines(i + 1, article, &settings.input_path));
        }
    }

    if !pages.is_empty() {
        lines.push(String::new());
        lines.push("Pages".to_string());
        for (i, page) in pages.iter().enumerate() {
            lines.extend(article_lines(i + 1, page, &settings.input_path));
        }
    }

    if !report.skipped.is_empty() {
        lines.push(String::new());
        lines.push("Skipped".to_string());
        for path in &report.skipped {
            lines.push(format!(
                "{}{}",
                indent(1),
                display_source(path, &settings.input_path)
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Generated {}, {}",
        plural(articles.len(), "article"),
        plural(pages.len(), "page")
    ));
    lines
}

/// Print build output to stdout.
pub fn print_build_output(report: &BuildReport, settings: &Settings) {
    for line in format_build_output(report, settings) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
