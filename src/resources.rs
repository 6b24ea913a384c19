//! Output placement and resource copying.
//!
//! After parsing, every article is given its place in the output tree and the
//! files it references are copied next to it. Resolution runs in this order:
//!
//! 1. Path relative to the input root (`blog/2023-04-05-hello.md`)
//! 2. Dates stripped from the title, if enabled
//! 3. Directory names of the date-stripped path appended as tags
//!    (`blog/2023-04-05-trip/index.md` gives `blog`, `trip`), if enabled
//! 4. Output file: `<stem>/<index_name>`, dates stripped if the result is
//!    still a valid relative path, then slugified (`blog/hello/index.html`)
//! 5. The output directory is created
//! 6. Resources are copied: the whole source directory for HTML pages tagged
//!    `PAGE`, otherwise only the local assets the article references
//! 7. `link_to_self` / `link_to_save` are set
//! 8. A local cover image is copied and rewritten relative to the site root
//!
//! ## Reference Classification
//!
//! | Reference | Kind | Copied |
//! |-----------|------|--------|
//! | `https://…`, `//cdn…`, `ftp://…` | external | no |
//! | `#top`, `mailto:…`, `tel:…`, `www.…` | not a resource | no |
//! | `../`, `docs/` (no extension) | navigation | no |
//! | `other.md`, `page.html` | link to content | no |
//! | `img/a.png?v=2#x` | asset `img/a.png` | yes |
//!
//! A leading `/` is read relative to the article's own directory. An asset
//! whose source leaves the input root, or whose copy would leave the output
//! root, is rejected like a missing file.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Settings;
use crate::content::push_tags;
use crate::dates::DatePatterns;
use crate::slug::slugify;
use crate::types::{Article, SourceKind};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("{path} is not inside the input directory {root}")]
    OutsideInput { path: PathBuf, root: PathBuf },
    #[error("resource file '{path}' not found (referenced in '{title}')")]
    MissingResource { path: String, title: String },
    #[error("cannot copy {path} (referenced in '{title}'): {source}")]
    Copy {
        path: PathBuf,
        title: String,
        source: io::Error,
    },
    #[error("resource '{path}' (referenced in '{title}') lies outside the input or output directory")]
    OutsideSite { path: String, title: String },
    #[error("{output} would be written by both {first} and {second}")]
    SlugCollision {
        output: PathBuf,
        first: String,
        second: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What a raw reference string points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'a> {
    Empty,
    External,
    NonResource,
    Navigation,
    ContentLink,
    /// A local file, query and fragment removed, leading `/` trimmed.
    Asset(&'a str),
}

pub fn classify_reference(raw: &str) -> Reference<'_> {
    let reference = raw.trim();
    if reference.is_empty() {
        return Reference::Empty;
    }
    let lower = reference.to_ascii_lowercase();
    if ["http://", "https://", "ftp://", "//"]
        .iter()
        .any(|p| lower.starts_with(p))
    {
        return Reference::External;
    }
    if ["#", "mailto:", "tel:", "sms:", "www.", "javascript:", "data:"]
        .iter()
        .any(|p| lower.starts_with(p))
    {
        return Reference::NonResource;
    }

    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    let path = reference[..end].trim_start_matches('/');
    if path.is_empty() || path.ends_with('/') {
        return Reference::Navigation;
    }

    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        None => Reference::Navigation,
        Some("md" | "markdown" | "html" | "htm") => Reference::ContentLink,
        Some(_) => Reference::Asset(path),
    }
}

fn is_absolute_url(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    ["http://", "https://", "//", "data:"]
        .iter()
        .any(|p| lower.starts_with(p))
}

/// Registry of output files already taken, shared across workers.
#[derive(Debug, Default)]
pub struct OutputClaims {
    claimed: Mutex<HashMap<PathBuf, String>>,
}

impl OutputClaims {
    pub fn new() -> OutputClaims {
        OutputClaims::default()
    }

    /// Take `output` on behalf of `owner`. Claiming a file twice for the
    /// same owner is allowed.
    pub fn claim(&self, output: &Path, owner: &str) -> Result<(), ResolveError> {
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        match claimed.get(output) {
            Some(first) if first != owner => Err(ResolveError::SlugCollision {
                output: output.to_path_buf(),
                first: first.clone(),
                second: owner.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                claimed.insert(output.to_path_buf(), owner.to_string());
                Ok(())
            }
        }
    }
}

/// Places articles in the output tree. One per build, shared by all workers.
pub struct Resolver<'a> {
    settings: &'a Settings,
    dates: &'a DatePatterns,
    claims: &'a OutputClaims,
}

impl<'a> Resolver<'a> {
    pub fn new(settings: &'a Settings, dates: &'a DatePatterns, claims: &'a OutputClaims) -> Self {
        Self {
            settings,
            dates,
            claims,
        }
    }

    pub fn resolve(&self, article: &mut Article, references: &[String]) -> Result<(), ResolveError> {
        let settings = self.settings;
        let relative = article
            .source_path
            .strip_prefix(&settings.input_path)
            .map_err(|_| ResolveError::OutsideInput {
                path: article.source_path.clone(),
                root: settings.input_path.clone(),
            })?
            .to_path_buf();

        if settings.remove_date_from_titles {
            let stripped = self.dates.remove_dates(&article.title);
            if !stripped.is_empty() {
                article.title = stripped;
            }
        }

        if settings.extract_tags_from_paths {
            push_tags(&mut article.tags, self.path_tags(&relative));
        }

        let link = self.output_link(&relative);
        let output_file = settings.output_path.join(&link);
        self.claims
            .claim(&output_file, &article.source_path.display().to_string())?;

        let output_dir = output_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| settings.output_path.clone());
        fs::create_dir_all(&output_dir)?;

        let source_dir = article
            .source_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let whole_dir = article.kind == SourceKind::Html && article.is_page();

        if whole_dir {
            self.copy_directory(&source_dir, &output_dir, &article.title)?;
        } else {
            let mut seen = HashSet::new();
            for reference in references {
                if let Reference::Asset(path) = classify_reference(reference) {
                    if seen.insert(path) {
                        self.copy_asset(&source_dir, &output_dir, path, &article.title)?;
                    }
                }
            }
        }

        article.link_to_self = link;
        article.link_to_save = output_file;

        if let Some(cover) = article.cover_image.clone() {
            if !is_absolute_url(&cover) {
                let clean = cover
                    .split(['?', '#'])
                    .next()
                    .unwrap_or("")
                    .trim_start_matches('/')
                    .to_string();
                if !whole_dir {
                    self.copy_asset(&source_dir, &output_dir, &clean, &article.title)?;
                }
                article.cover_image = Some(join_url_path(article.link_dir(), &clean));
            }
        }

        debug!(
            "{} → {}",
            article.source_path.display(),
            article.link_to_self
        );
        Ok(())
    }

    /// Directory names of the relative path with dates removed, file name dropped.
    fn path_tags(&self, relative: &Path) -> Vec<String> {
        let undated = self.dates.remove_dates(&to_slash(relative));
        let mut pieces: Vec<String> = undated
            .split('/')
            .map(|piece| piece.trim_matches(|c| matches!(c, '-' | '_' | ' ')).to_string())
            .collect();
        pieces.pop();
        pieces
    }

    /// Output path relative to the output root, `/`-separated.
    fn output_link(&self, relative: &Path) -> String {
        let stem = to_slash(&relative.with_extension(""));
        let mut link = format!("{stem}/{}", self.settings.index_name);

        if self.settings.remove_date_from_paths {
            let stripped = self.dates.remove_dates(&link);
            let valid = !stripped.is_empty()
                && !stripped.starts_with('/')
                && !stripped.contains("//")
                && !stripped.contains('\\');
            if valid {
                link = stripped;
            }
        }

        slugify(&link).trim_start_matches('/').to_string()
    }

    fn copy_asset(
        &self,
        source_dir: &Path,
        output_dir: &Path,
        path: &str,
        title: &str,
    ) -> Result<(), ResolveError> {
        let src = lexical_normalize(&source_dir.join(path));
        let dst = lexical_normalize(&output_dir.join(path));
        let inside = src.starts_with(lexical_normalize(&self.settings.input_path))
            && dst.starts_with(lexical_normalize(&self.settings.output_path));
        if !inside {
            return self.tolerate(ResolveError::OutsideSite {
                path: path.to_string(),
                title: title.to_string(),
            });
        }

        match fs::metadata(&src) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let err = ResolveError::MissingResource {
                    path: path.to_string(),
                    title: title.to_string(),
                };
                self.tolerate(err)
            }
            Err(source) => self.tolerate(ResolveError::Copy {
                path: src,
                title: title.to_string(),
                source,
            }),
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => {
                if let Some(parent) = dst.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&src, &dst).map_err(|source| ResolveError::Copy {
                    path: src.clone(),
                    title: title.to_string(),
                    source,
                })?;
                Ok(())
            }
        }
    }

    /// Mirror `source_dir` into `output_dir`, skipping the output root if it
    /// sits inside the source tree.
    fn copy_directory(&self, source_dir: &Path, output_dir: &Path, title: &str) -> Result<(), ResolveError> {
        let output_root = &self.settings.output_path;
        let walker = WalkDir::new(source_dir)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !e.path().starts_with(output_root));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    self.tolerate(ResolveError::Copy {
                        path,
                        title: title.to_string(),
                        source: io::Error::other(e.to_string()),
                    })?;
                    continue;
                }
            };
            let Ok(rel) = entry.path().strip_prefix(source_dir) else {
                continue;
            };
            let dst = output_dir.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dst)?;
            } else if let Err(source) = fs::copy(entry.path(), &dst) {
                self.tolerate(ResolveError::Copy {
                    path: entry.path().to_path_buf(),
                    title: title.to_string(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Downgrade a resource problem to a warning when errors are ignored.
    fn tolerate(&self, err: ResolveError) -> Result<(), ResolveError> {
        if self.settings.ignore_errors {
            warn!("{err}");
            Ok(())
        } else {
            Err(err)
        }
    }
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn to_slash(path: &Path) -> String {
    normal_components(path).join("/")
}

/// Resolve `.` and `..` without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Join a relative URL path onto a directory, resolving `.` and `..`.
pub fn join_url_path(dir: &str, relative: &str) -> String {
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}
