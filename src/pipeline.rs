//! Build orchestration.
//!
//! One call to [`build`] turns a content tree into a finished site:
//!
//! ```text
//! prepare output ─► stage site assets ─► discover sources
//!                                              │
//!              ┌───────────── worker pool ─────┴──────────────┐
//!              │ parse ─► resolve ─► render (Markdown) ─► write │  one per file
//!              └──────────────────────┬───────────────────────┘
//!                                     ▼
//!          sort ─► search_index.json ─► index ─► rss.xml ─► style and static files
//! ```
//!
//! Only the worker stage is parallel. Workers share the parsers, the
//! resolver's output registry and one mutex around the collected results;
//! articles and their search records are pushed together under that lock so
//! the two collections always describe the same set of articles.
//!
//! A failing file never stops the pool. Once the pool drains, failures are
//! fatal unless `ignore_errors` is set, in which case the failed files are
//! left out of the site and reported as skipped.

use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::{Settings, SortOrder, effective_threads};
use crate::content::{ParseError, Parsed, Parsers, SourceFile};
use crate::feed::{self, FeedError};
use crate::generate::Presenter;
use crate::resources::{OutputClaims, ResolveError, Resolver};
use crate::search::{self, SearchError, SearchRecord};
use crate::theme::Theme;
use crate::types::{Article, SourceKind};

const SCRIPT_JS: &str = include_str!("../static/script.js");
const SEARCH_JS: &str = include_str!("../static/search.js");
const RSS_SVG: &str = include_str!("../static/rss.svg");
const COPY_SVG: &str = include_str!("../static/copy.svg");
const FAVICON: &[u8] = include_bytes!("../static/favicon.ico");

/// Why a single source file could not be published.
#[derive(Error, Debug)]
pub enum ArticleError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("output directory {0} is not empty (use --force to overwrite it)")]
    OutputNotEmpty(PathBuf),
    #[error("cannot prepare output directory {path}: {source}")]
    Output { path: PathBuf, source: io::Error },
    #[error("input directory {0} does not exist")]
    MissingInput(PathBuf),
    #[error("{path}: {source}")]
    Article { path: PathBuf, source: ArticleError },
    #[error("cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What a finished build produced.
#[derive(Debug)]
pub struct BuildReport {
    /// Published articles in configured sort order.
    pub articles: Vec<Article>,
    /// One record per published article, in the same order.
    pub search_index: Vec<SearchRecord>,
    /// Sources left out because they failed (only with `ignore_errors`).
    pub skipped: Vec<PathBuf>,
    pub output_dir: PathBuf,
}

/// Results gathered by the workers.
#[derive(Default)]
struct Collected {
    articles: Vec<Article>,
    search_index: Vec<SearchRecord>,
    failures: Vec<(PathBuf, ArticleError)>,
}

/// Everything a worker needs, shared read-only.
struct Worker<'a> {
    settings: &'a Settings,
    parsers: &'a Parsers,
    resolver: Resolver<'a>,
    presenter: &'a dyn Presenter,
}

impl Worker<'_> {
    fn process(&self, source: &SourceFile) -> Result<Article, ArticleError> {
        let Parsed {
            mut article,
            references,
        } = self.parsers.parse_file(source)?;
        self.resolver.resolve(&mut article, &references)?;

        if article.kind == SourceKind::Markdown {
            article.html_content = self.presenter.article_page(&article, self.settings);
        }
        fs::write(&article.link_to_save, &article.html_content).map_err(|source| {
            ArticleError::Write {
                path: article.link_to_save.clone(),
                source,
            }
        })?;
        Ok(article)
    }
}

/// Run a full build of `settings.input_path` into `settings.output_path`.
pub fn build(
    settings: &Settings,
    theme: &Theme,
    presenter: &dyn Presenter,
) -> Result<BuildReport, BuildError> {
    let output = settings.output_path.clone();
    prepare_output(&output, settings.force_overwrite)?;
    let settings = stage_site_assets(settings);

    let sources = discover(&settings)?;
    let threads = effective_threads(settings.max_workers);
    info!(
        "Processing {} source files with {threads} workers",
        sources.len()
    );

    let parsers = Parsers::new()?;
    let claims = OutputClaims::new();
    claims
        .claim(&output.join(&settings.index_name), "the site index")
        .map_err(|e| BuildError::Article {
            path: output.join(&settings.index_name),
            source: e.into(),
        })?;
    let worker = Worker {
        settings: &settings,
        parsers: &parsers,
        resolver: Resolver::new(&settings, parsers.dates(), &claims),
        presenter,
    };

    let collected = Mutex::new(Collected::default());
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    pool.install(|| {
        sources.par_iter().for_each(|source| {
            let result = worker.process(source);
            let mut guard = collected.lock().unwrap_or_else(|e| e.into_inner());
            match result {
                Ok(article) => {
                    let record = SearchRecord::from_article(&article);
                    guard.articles.push(article);
                    guard.search_index.push(record);
                }
                Err(e) => guard.failures.push((source.path.clone(), e)),
            }
        });
    });
    let Collected {
        mut articles,
        search_index,
        mut failures,
    } = collected.into_inner().unwrap_or_else(|e| e.into_inner());

    failures.sort_by(|a, b| a.0.cmp(&b.0));
    if !settings.ignore_errors && !failures.is_empty() {
        let (path, source) = failures.remove(0);
        for (other, e) in &failures {
            error!("{}: {e}", other.display());
        }
        return Err(BuildError::Article { path, source });
    }
    let skipped: Vec<PathBuf> = failures
        .into_iter()
        .map(|(path, e)| {
            warn!("Skipping {}: {e}", path.display());
            path
        })
        .collect();

    sort_articles(&mut articles, settings.sort);
    let search_index = align_records(search_index, &articles);

    search::write_index(&search_index, &output)?;
    fs::write(
        output.join(&settings.index_name),
        presenter.index_page(&articles, &settings),
    )?;
    feed::write_feed(&articles, &settings, &output)?;
    write_static_files(&settings, theme, &output)?;

    info!("Website generated successfully in: {}", output.display());
    Ok(BuildReport {
        articles,
        search_index,
        skipped,
        output_dir: output,
    })
}

// ============================================================================
// Output directory
// ============================================================================

fn is_non_empty_dir(path: &Path) -> io::Result<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether building would clear existing files that the user has not
/// agreed to lose.
pub fn needs_confirmation(settings: &Settings) -> bool {
    !settings.force_overwrite && is_non_empty_dir(&settings.output_path).unwrap_or(false)
}

/// Make `output` an empty directory. Existing content is removed only when
/// `force` is set; the directory itself is kept.
pub fn prepare_output(output: &Path, force: bool) -> Result<(), BuildError> {
    let wrap = |source: io::Error| BuildError::Output {
        path: output.to_path_buf(),
        source,
    };
    if is_non_empty_dir(output).map_err(wrap)? {
        if !force {
            return Err(BuildError::OutputNotEmpty(output.to_path_buf()));
        }
        debug!("Clearing {}", output.display());
        for entry in fs::read_dir(output).map_err(wrap)? {
            let entry = entry.map_err(wrap)?;
            let path = entry.path();
            let removed = if entry.file_type().map_err(wrap)?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(wrap)?;
        }
    }
    fs::create_dir_all(output).map_err(wrap)
}

// ============================================================================
// Site assets
// ============================================================================

fn is_url(value: &str) -> bool {
    value.contains("://") || value.starts_with("//")
}

/// Copy a local file to the output root, returning the name it was
/// written under.
fn copy_to_root(path: &Path, output: &Path) -> io::Result<String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    fs::copy(path, output.join(&name))?;
    Ok(name)
}

/// Copy local share-button icons and the publisher logo to the output root
/// and point the returned settings at the copies.
fn stage_site_assets(settings: &Settings) -> Settings {
    let mut staged = settings.clone();
    let output = &settings.output_path;

    for button in staged.share_buttons.iter_mut().filter(|b| b.has_icon()) {
        match copy_to_root(Path::new(&button.display), output) {
            Ok(name) => button.display = name,
            Err(e) => {
                warn!("Cannot copy share icon {}: {e}", button.display);
                button.display.clear();
            }
        }
    }

    if let Some(logo) = staged.publisher_logo.clone() {
        if !is_url(&logo.to_string_lossy()) {
            match copy_to_root(&logo, output) {
                Ok(name) => staged.publisher_logo = Some(PathBuf::from(name)),
                Err(e) => {
                    warn!("Cannot copy publisher logo {}: {e}", logo.display());
                    staged.publisher_logo = None;
                }
            }
        }
    }
    staged
}

/// Write `style.css`, the scripts, the favicon and the feed/copy icons.
fn write_static_files(settings: &Settings, theme: &Theme, output: &Path) -> Result<(), BuildError> {
    fs::write(output.join("style.css"), theme.css())?;

    match &settings.custom_js {
        Some(path) => {
            fs::copy(path, output.join("script.js"))?;
        }
        None => fs::write(output.join("script.js"), SCRIPT_JS)?,
    }
    match &settings.custom_favicon {
        Some(path) => {
            fs::copy(path, output.join("favicon.ico"))?;
        }
        None => fs::write(output.join("favicon.ico"), FAVICON)?,
    }

    fs::write(output.join("search.js"), SEARCH_JS)?;
    fs::write(output.join("rss.svg"), RSS_SVG)?;
    fs::write(output.join("copy.svg"), COPY_SVG)?;
    Ok(())
}

// ============================================================================
// Discovery and ordering
// ============================================================================

/// Every `.md` and `.html` file below the input root, in path order. The
/// output root is skipped when it lies inside the input tree.
pub fn discover(settings: &Settings) -> Result<Vec<SourceFile>, BuildError> {
    let input = &settings.input_path;
    if !input.is_dir() {
        return Err(BuildError::MissingInput(input.clone()));
    }
    let output = &settings.output_path;

    let mut sources = Vec::new();
    let walker = WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.path().starts_with(output));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cannot read {}: {e}", input.display());
                continue;
            }
        };
        if entry.file_type().is_file() && SourceKind::from_path(entry.path()).is_some() {
            sources.push(SourceFile::new(input, entry.into_path()));
        }
    }
    Ok(sources)
}

fn compare(a: &Article, b: &Article, order: SortOrder) -> Ordering {
    let by_title = |a: &Article, b: &Article| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.title.cmp(&b.title))
    };
    match order {
        SortOrder::DateCreated => b.created.cmp(&a.created),
        SortOrder::ReverseDateCreated => a.created.cmp(&b.created),
        SortOrder::DateUpdated => b.updated.cmp(&a.updated),
        SortOrder::ReverseDateUpdated => a.updated.cmp(&b.updated),
        SortOrder::Title => by_title(a, b),
        SortOrder::ReverseTitle => by_title(b, a),
        SortOrder::Path => a.source_path.cmp(&b.source_path),
        SortOrder::ReversePath => b.source_path.cmp(&a.source_path),
    }
}

/// Sort in place. Ties keep source-path order, so the result does not
/// depend on which worker finished first.
pub fn sort_articles(articles: &mut [Article], order: SortOrder) {
    articles.sort_by(|a, b| a.source_path.cmp(&b.source_path));
    articles.sort_by(|a, b| compare(a, b, order));
}

/// Put search records in the same order as the sorted articles.
fn align_records(records: Vec<SearchRecord>, articles: &[Article]) -> Vec<SearchRecord> {
    let position: HashMap<&str, usize> = articles
        .iter()
        .enumerate()
        .map(|(i, a)| (a.link_to_self.as_str(), i))
        .collect();
    let mut records = records;
    records.sort_by_key(|r| position.get(r.url.as_str()).copied().unwrap_or(usize::MAX));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::DefaultPresenter;
    use crate::test_helpers::{
        article, find_article, setup_fixtures, test_settings, titles, write_file,
    };
    use crate::types::PAGE_TAG;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn run(settings: &Settings) -> Result<BuildReport, BuildError> {
        let theme = Theme::builtin("default").unwrap();
        build(settings, &theme, &DefaultPresenter)
    }

    fn post(title: &str) -> String {
        format!("---\ntitle: {title}\n---\n\nBody of {title}.\n")
    }

    // =========================================================================
    // Sorting
    // =========================================================================

    fn dated(title: &str, year: i32) -> Article {
        let mut a = article(title);
        a.created = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap();
        a.updated = Utc.with_ymd_and_hms(2030 - year, 1, 1, 0, 0, 0).unwrap();
        a
    }

    #[test]
    fn sort_by_created() {
        let mut articles = vec![dated("D2", 2021), dated("D1", 2020), dated("D3", 2022)];
        sort_articles(&mut articles, SortOrder::DateCreated);
        assert_eq!(titles(&articles), vec!["D3", "D2", "D1"]);
        sort_articles(&mut articles, SortOrder::ReverseDateCreated);
        assert_eq!(titles(&articles), vec!["D1", "D2", "D3"]);
    }

    #[test]
    fn sort_by_updated() {
        let mut articles = vec![dated("A", 2021), dated("B", 2020), dated("C", 2022)];
        sort_articles(&mut articles, SortOrder::DateUpdated);
        assert_eq!(titles(&articles), vec!["B", "A", "C"]);
        sort_articles(&mut articles, SortOrder::ReverseDateUpdated);
        assert_eq!(titles(&articles), vec!["C", "A", "B"]);
    }

    #[test]
    fn sort_by_title_ignores_case() {
        let mut articles = vec![article("beta"), article("Alpha"), article("gamma")];
        sort_articles(&mut articles, SortOrder::Title);
        assert_eq!(titles(&articles), vec!["Alpha", "beta", "gamma"]);
        sort_articles(&mut articles, SortOrder::ReverseTitle);
        assert_eq!(titles(&articles), vec!["gamma", "beta", "Alpha"]);
    }

    #[test]
    fn sort_by_path() {
        let mut articles = vec![article("b"), article("c"), article("a")];
        sort_articles(&mut articles, SortOrder::Path);
        assert_eq!(titles(&articles), vec!["a", "b", "c"]);
        sort_articles(&mut articles, SortOrder::ReversePath);
        assert_eq!(titles(&articles), vec!["c", "b", "a"]);
    }

    #[test]
    fn equal_keys_fall_back_to_path() {
        let mut articles = vec![article("z"), article("x"), article("y")];
        sort_articles(&mut articles, SortOrder::DateCreated);
        assert_eq!(titles(&articles), vec!["x", "y", "z"]);
    }

    // =========================================================================
    // Output directory
    // =========================================================================

    #[test]
    fn non_empty_output_requires_force() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "out/old.txt", "x");
        let err = prepare_output(&tmp.path().join("out"), false).unwrap_err();
        assert!(matches!(err, BuildError::OutputNotEmpty(_)));
        assert!(tmp.path().join("out/old.txt").exists());
    }

    #[test]
    fn force_clears_children_but_keeps_directory() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "out/old.txt", "x");
        write_file(tmp.path(), "out/sub/deep.txt", "x");
        let out = tmp.path().join("out");

        prepare_output(&out, true).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn missing_output_is_created() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("a/b/out");
        prepare_output(&out, false).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn needs_confirmation_only_for_unforced_non_empty_output() {
        let tmp = TempDir::new().unwrap();
        let mut settings = test_settings(tmp.path());
        settings.force_overwrite = false;
        assert!(!needs_confirmation(&settings));

        write_file(tmp.path(), "public/keep.txt", "x");
        assert!(needs_confirmation(&settings));
        settings.force_overwrite = true;
        assert!(!needs_confirmation(&settings));
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    #[test]
    fn discover_filters_extensions_and_skips_output() {
        let tmp = TempDir::new().unwrap();
        let mut settings = test_settings(tmp.path());
        settings.output_path = settings.input_path.join("public");
        write_file(&settings.input_path, "b.md", "");
        write_file(&settings.input_path, "a/page.HTML", "");
        write_file(&settings.input_path, "notes.txt", "");
        write_file(&settings.input_path, "public/old.md", "");

        let found: Vec<PathBuf> = discover(&settings)
            .unwrap()
            .into_iter()
            .map(|s| s.relative)
            .collect();
        assert_eq!(found, vec![PathBuf::from("a/page.HTML"), PathBuf::from("b.md")]);
    }

    #[test]
    fn discover_missing_input_is_error() {
        let tmp = TempDir::new().unwrap();
        let mut settings = test_settings(tmp.path());
        settings.input_path = tmp.path().join("nope");
        assert!(matches!(discover(&settings), Err(BuildError::MissingInput(_))));
    }

    // =========================================================================
    // Full builds
    // =========================================================================

    #[test]
    fn build_writes_site_files() {
        let tmp = TempDir::new().unwrap();
        let settings = test_settings(tmp.path());
        write_file(&settings.input_path, "hello.md", &post("Hello"));

        let report = run(&settings).unwrap();
        let out = &settings.output_path;
        for file in [
            "index.html",
            "rss.xml",
            "search_index.json",
            "style.css",
            "script.js",
            "favicon.ico",
            "search.js",
            "rss.svg",
            "copy.svg",
        ] {
            assert!(out.join(file).exists(), "{file} missing");
        }

        let hello = find_article(&report.articles, "Hello");
        assert_eq!(hello.link_to_self, "hello/index.html");
        let page = fs::read_to_string(out.join("hello/index.html")).unwrap();
        assert!(page.contains("Body of Hello."));
        assert!(page.contains("../style.css"));
    }

    #[test]
    fn fixture_site() {
        let tmp = setup_fixtures();
        let settings = test_settings(tmp.path());
        let report = run(&settings).unwrap();

        assert_eq!(
            titles(&report.articles),
            vec!["Hello World", "Notes", "About", "Legacy Post"]
        );

        let hello = find_article(&report.articles, "Hello World");
        assert_eq!(hello.link_to_self, "hello-world/index.html");
        assert_eq!(hello.tags, vec!["intro", "rust"]);
        assert_eq!(hello.cover_image.as_deref(), Some("hello-world/cover.png"));
        let out = &settings.output_path;
        assert!(out.join("hello-world/img/diagram.png").exists());
        assert!(out.join("hello-world/cover.png").exists());
        assert!(!out.join("hello-world/img/unused.png").exists());

        let notes = find_article(&report.articles, "Notes");
        assert_eq!(notes.link_to_self, "blog/notes/index.html");
        assert_eq!(notes.tags, vec!["notes", "blog"]);

        let about = find_article(&report.articles, "About");
        assert!(about.is_page());
        assert!(out.join(about.link_dir()).join("js/app.js").exists());

        let index = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(index.contains("pages-nav"));
        assert!(index.contains("hello-world/index.html"));
    }

    #[test]
    fn five_hundred_files_all_collected() {
        let tmp = TempDir::new().unwrap();
        let settings = test_settings(tmp.path());
        for i in 0..500 {
            write_file(&settings.input_path, &format!("post-{i}.md"), &post(&format!("Post {i}")));
        }

        let report = run(&settings).unwrap();
        assert_eq!(report.articles.len(), 500);
        assert_eq!(report.search_index.len(), 500);

        let mut urls: Vec<&str> = report.search_index.iter().map(|r| r.url.as_str()).collect();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), 500);
        for (article, record) in report.articles.iter().zip(&report.search_index) {
            assert_eq!(article.link_to_self, record.url);
        }
    }

    #[test]
    fn missing_resource_fails_build() {
        let tmp = TempDir::new().unwrap();
        let settings = test_settings(tmp.path());
        write_file(
            &settings.input_path,
            "broken.md",
            "---\ntitle: Broken\n---\n![x](./missing.png)\n",
        );

        let err = run(&settings).unwrap_err().to_string();
        assert!(err.contains("missing.png"), "{err}");
        assert!(err.contains("Broken"), "{err}");
    }

    #[test]
    fn missing_resource_ignored_when_asked() {
        let tmp = TempDir::new().unwrap();
        let mut settings = test_settings(tmp.path());
        settings.ignore_errors = true;
        write_file(
            &settings.input_path,
            "broken.md",
            "---\ntitle: Broken\n---\n![x](./missing.png)\n",
        );

        let report = run(&settings).unwrap();
        assert_eq!(titles(&report.articles), vec!["Broken"]);
        assert!(!settings.output_path.join("broken/missing.png").exists());
    }

    #[test]
    fn referenced_image_is_copied() {
        let tmp = TempDir::new().unwrap();
        let settings = test_settings(tmp.path());
        write_file(&settings.input_path, "blog/post.md", "![x](img/x.png)\n");
        write_file(&settings.input_path, "blog/img/x.png", "png");
        write_file(&settings.input_path, "blog/img/unused.png", "png");

        run(&settings).unwrap();
        let out = settings.output_path.join("blog/post");
        assert!(out.join("img/x.png").exists());
        assert!(!out.join("img/unused.png").exists());
    }

    #[test]
    fn page_directory_copied_whole() {
        let tmp = TempDir::new().unwrap();
        let settings = test_settings(tmp.path());
        write_file(
            &settings.input_path,
            "page1/index.html",
            &format!(
                "<html><head><title>Tool</title><meta name=\"keywords\" content=\"{PAGE_TAG}\"></head>\
                 <body><script src=\"app.js\"></script></body></html>"
            ),
        );
        write_file(&settings.input_path, "page1/app.js", "console.log(1);");
        write_file(&settings.input_path, "page1/lib/extra.js", "// extra");

        let report = run(&settings).unwrap();
        let tool = find_article(&report.articles, "Tool");
        let dir = settings.output_path.join(tool.link_dir());
        assert_eq!(fs::read_to_string(dir.join("app.js")).unwrap(), "console.log(1);");
        assert!(dir.join("lib/extra.js").exists());
    }

    #[test]
    fn html_sources_are_published_as_written() {
        let tmp = TempDir::new().unwrap();
        let settings = test_settings(tmp.path());
        let raw = "<html><head><title>Raw</title></head><body><p>As is</p></body></html>";
        write_file(&settings.input_path, "raw.html", raw);

        let report = run(&settings).unwrap();
        let written = fs::read_to_string(&find_article(&report.articles, "Raw").link_to_save).unwrap();
        assert_eq!(written, raw);
    }

    #[test]
    fn slug_collision_fails_unless_ignored() {
        let tmp = TempDir::new().unwrap();
        let mut settings = test_settings(tmp.path());
        write_file(&settings.input_path, "a b.md", &post("One"));
        write_file(&settings.input_path, "a-b.md", &post("Two"));

        let err = run(&settings).unwrap_err().to_string();
        assert!(err.contains("would be written by both"), "{err}");

        settings.ignore_errors = true;
        let report = run(&settings).unwrap();
        assert_eq!(report.articles.len(), 1);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn several_failures_report_first_by_path() {
        let tmp = TempDir::new().unwrap();
        let mut settings = test_settings(tmp.path());
        let broken = |title: &str| format!("---\ntitle: {title}\n---\n\n![x](missing-{title}.png)\n");
        write_file(&settings.input_path, "b.md", &broken("B"));
        write_file(&settings.input_path, "a.md", &broken("A"));
        write_file(&settings.input_path, "ok.md", &post("Ok"));

        let err = run(&settings).unwrap_err();
        let BuildError::Article { path, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(path, &settings.input_path.join("a.md"));
        assert!(!settings.output_path.join(&settings.index_name).exists());
        assert!(!settings.output_path.join(search::SEARCH_INDEX_FILE).exists());

        settings.ignore_errors = true;
        let report = run(&settings).unwrap();
        assert_eq!(titles(&report.articles), vec!["Ok"]);
        assert_eq!(
            report.skipped,
            vec![settings.input_path.join("a.md"), settings.input_path.join("b.md")]
        );
    }

    #[test]
    fn build_refuses_non_empty_output_without_force() {
        let tmp = TempDir::new().unwrap();
        let mut settings = test_settings(tmp.path());
        settings.force_overwrite = false;
        write_file(&settings.output_path, "keep.txt", "x");

        assert!(matches!(run(&settings), Err(BuildError::OutputNotEmpty(_))));
        assert!(settings.output_path.join("keep.txt").exists());
    }

    #[test]
    fn rebuild_removes_stale_output() {
        let tmp = TempDir::new().unwrap();
        let settings = test_settings(tmp.path());
        let first = write_file(&settings.input_path, "gone.md", &post("Gone"));
        run(&settings).unwrap();
        assert!(settings.output_path.join("gone/index.html").exists());

        fs::remove_file(first).unwrap();
        run(&settings).unwrap();
        assert!(!settings.output_path.join("gone").exists());
    }

    #[test]
    fn share_icon_and_logo_copied_to_root() {
        let tmp = TempDir::new().unwrap();
        let mut settings = test_settings(tmp.path());
        let icon = write_file(tmp.path(), "assets/masto.svg", "<svg/>");
        let logo = write_file(tmp.path(), "assets/logo.png", "png");
        settings.share_buttons = vec![
            format!("Mastodon|{}|https://m.social/share?text={{TITLE}}", icon.display())
                .parse()
                .unwrap(),
        ];
        settings.publisher_logo = Some(logo);
        write_file(&settings.input_path, "p.md", &post("P"));

        run(&settings).unwrap();
        assert!(settings.output_path.join("masto.svg").exists());
        assert!(settings.output_path.join("logo.png").exists());
        let page = fs::read_to_string(settings.output_path.join("p/index.html")).unwrap();
        assert!(page.contains("src=\"../masto.svg\""));
        assert!(page.contains("https://example.com/logo.png"));
    }

    #[test]
    fn custom_script_and_favicon_override_defaults() {
        let tmp = TempDir::new().unwrap();
        let mut settings = test_settings(tmp.path());
        settings.custom_js = Some(write_file(tmp.path(), "custom.js", "// mine"));
        settings.custom_favicon = Some(write_file(tmp.path(), "fav.ico", "ico"));

        run(&settings).unwrap();
        assert_eq!(fs::read_to_string(settings.output_path.join("script.js")).unwrap(), "// mine");
        assert_eq!(fs::read_to_string(settings.output_path.join("favicon.ico")).unwrap(), "ico");
    }
}
