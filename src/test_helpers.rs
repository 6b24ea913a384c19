//! Shared test utilities.
//!
//! Fixture setup, article construction and lookup helpers used by the unit
//! tests of every pipeline stage.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let settings = test_settings(tmp.path());
//! let report = build(&settings, &theme, &DefaultPresenter).unwrap();
//!
//! let post = find_article(&report.articles, "Hello World");
//! assert_eq!(post.link_to_self, "hello-world/index.html");
//! ```

use chrono::{TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::Settings;
use crate::types::{Article, SourceKind};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/content/` into `<tmp>/content` and return the temp dir.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/content");
    let content = tmp.path().join("content");
    fs::create_dir_all(&content).unwrap();
    copy_dir_recursive(&fixtures, &content).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Settings reading `<root>/content` and writing `<root>/public`, with the
/// output directory cleared without prompting.
pub fn test_settings(root: &Path) -> Settings {
    let input = root.join("content");
    fs::create_dir_all(&input).unwrap();
    Settings {
        title: "Test Site".into(),
        input_path: input,
        output_path: root.join("public"),
        base_url: "https://example.com".into(),
        force_overwrite: true,
        ..Settings::default()
    }
}

/// Write a file below `root`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

// =========================================================================
// Article construction and lookups
// =========================================================================

/// A resolved-looking article at `<slug of title>/index.html`, created on
/// 2023-01-01.
pub fn article(title: &str) -> Article {
    let created = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let dir = title.replace(' ', "-");
    Article {
        title: title.to_string(),
        description: String::new(),
        tags: Vec::new(),
        created,
        updated: created,
        text_content: String::new(),
        html_content: String::new(),
        body_html: String::new(),
        source_path: PathBuf::from(format!("content/{dir}.md")),
        kind: SourceKind::Markdown,
        link_to_self: format!("{dir}/index.html"),
        link_to_save: PathBuf::from(format!("public/{dir}/index.html")),
        cover_image: None,
        share_url: None,
        canonical_url: None,
    }
}

/// Find an article by title. Panics with the available titles if not found.
pub fn find_article<'a>(articles: &'a [Article], title: &str) -> &'a Article {
    articles.iter().find(|a| a.title == title).unwrap_or_else(|| {
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        panic!("article '{title}' not found. Available: {titles:?}")
    })
}

/// Titles in collection order.
pub fn titles(articles: &[Article]) -> Vec<&str> {
    articles.iter().map(|a| a.title.as_str()).collect()
}
