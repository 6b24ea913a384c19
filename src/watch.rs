//! Watch mode: rebuild on change and serve the result.
//!
//! After an initial build the output directory is served over HTTP on
//! `127.0.0.1:<port>` while the content tree and the user's stylesheet,
//! script, favicon and snippet files are watched.
//!
//! Rebuilds run one at a time on the watching thread. A burst of events is
//! collapsed into a single rebuild once no new event has arrived for
//! [`DEBOUNCE`]; events that arrive while a rebuild is running are queued
//! and produce exactly one follow-up rebuild. Events inside the output
//! directory are ignored, so a build never triggers itself.

use axum::Router;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, Settings};
use crate::generate::Presenter;
use crate::pipeline::{self, BuildError, BuildReport};
use crate::theme::{Theme, ThemeError};

/// Quiet period after the last file event before a rebuild starts.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error("cannot start preview server on {addr}: {source}")]
    Bind { addr: String, source: io::Error },
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Theme(#[from] ThemeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Build once, then serve and rebuild until the process is stopped.
///
/// `settings` must already be finalized for `theme`. The output directory
/// is owned by this process from here on, so rebuilds clear it without
/// asking.
pub fn run(
    settings: &Settings,
    theme: &Theme,
    presenter: &dyn Presenter,
    open_browser: bool,
) -> Result<(), WatchError> {
    let report = pipeline::build(settings, theme, presenter)?;
    info!("Built {} articles", report.articles.len());

    let mut settings = settings.clone();
    settings.force_overwrite = true;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let addr = format!("127.0.0.1:{}", settings.port);
    let listener = runtime
        .block_on(TcpListener::bind(&addr))
        .map_err(|source| WatchError::Bind {
            addr: addr.clone(),
            source,
        })?;
    runtime.spawn(serve(listener, settings.output_path.clone()));

    let url = format!("http://{addr}/");
    info!("Serving {} at {url}", settings.output_path.display());
    if open_browser {
        if let Err(e) = open::that(&url) {
            warn!("Cannot open a browser: {e}");
        }
    }

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })?;
    for (path, mode) in watch_targets(&settings) {
        debug!("Watching {}", path.display());
        watcher.watch(&path, mode)?;
    }
    let ignored = ignored_roots(&settings.output_path);
    info!("Watching {} for changes (Ctrl+C to stop)", settings.input_path.display());

    while let Ok(first) = rx.recv() {
        let mut changed = is_relevant(&first, &ignored);
        loop {
            match rx.recv_timeout(DEBOUNCE) {
                Ok(event) => changed |= is_relevant(&event, &ignored),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
        if !changed {
            continue;
        }

        info!("Change detected, rebuilding");
        match rebuild(&settings, presenter) {
            Ok(report) => info!("Rebuilt {} articles", report.articles.len()),
            Err(e) => error!("Rebuild failed: {e}"),
        }
    }
    Ok(())
}

/// A fresh build that picks up edits to the stylesheet and snippets.
fn rebuild(settings: &Settings, presenter: &dyn Presenter) -> Result<BuildReport, WatchError> {
    let theme = Theme::resolve(settings)?;
    let mut settings = settings.clone();
    settings.finalize(&theme)?;
    Ok(pipeline::build(&settings, &theme, presenter)?)
}

async fn serve(listener: TcpListener, root: PathBuf) {
    let app = Router::new().fallback_service(ServeDir::new(root));
    if let Err(e) = axum::serve(listener, app).await {
        error!("Preview server stopped: {e}");
    }
}

/// The content tree plus any user-supplied files that feed into the build.
pub fn watch_targets(settings: &Settings) -> Vec<(PathBuf, RecursiveMode)> {
    let mut targets = vec![(settings.input_path.clone(), RecursiveMode::Recursive)];
    let extras = [
        &settings.custom_css,
        &settings.custom_js,
        &settings.custom_favicon,
        &settings.elements_top,
        &settings.elements_bottom,
    ];
    for path in extras.into_iter().flatten() {
        if path.exists() && !path.starts_with(&settings.input_path) {
            targets.push((path.clone(), RecursiveMode::NonRecursive));
        }
    }
    targets
}

/// The output directory as configured and, when it exists, its canonical
/// form, since watchers may report either.
fn ignored_roots(output: &Path) -> Vec<PathBuf> {
    let mut roots = vec![output.to_path_buf()];
    if let Ok(canonical) = fs::canonicalize(output) {
        if canonical != output {
            roots.push(canonical);
        }
    }
    roots
}

/// Whether an event should trigger a rebuild: a create, modify or remove
/// touching at least one path outside the ignored roots.
pub fn is_relevant(event: &notify::Result<Event>, ignored: &[PathBuf]) -> bool {
    let event = match event {
        Ok(event) => event,
        Err(e) => {
            warn!("Watcher error: {e}");
            return false;
        }
    };
    let kind_matters = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_matters
        && event
            .paths
            .iter()
            .any(|path| !ignored.iter().any(|root| path.starts_with(root)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_settings, write_file};
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &str) -> notify::Result<Event> {
        Ok(Event::new(kind).add_path(PathBuf::from(path)))
    }

    #[test]
    fn content_changes_are_relevant() {
        let ignored = vec![PathBuf::from("/site/public")];
        assert!(is_relevant(
            &event(EventKind::Create(CreateKind::File), "/site/content/new.md"),
            &ignored
        ));
        assert!(is_relevant(
            &event(EventKind::Modify(ModifyKind::Any), "/site/content/a.md"),
            &ignored
        ));
    }

    #[test]
    fn output_changes_are_ignored() {
        let ignored = vec![PathBuf::from("/site/content/public")];
        assert!(!is_relevant(
            &event(
                EventKind::Modify(ModifyKind::Any),
                "/site/content/public/post/index.html"
            ),
            &ignored
        ));
    }

    #[test]
    fn access_events_are_ignored() {
        assert!(!is_relevant(
            &event(EventKind::Access(AccessKind::Any), "/site/content/a.md"),
            &[]
        ));
    }

    #[test]
    fn watcher_errors_are_not_rebuilds() {
        let err: notify::Result<Event> = Err(notify::Error::generic("boom"));
        assert!(!is_relevant(&err, &[]));
    }

    #[test]
    fn targets_include_existing_custom_files() {
        let tmp = TempDir::new().unwrap();
        let mut settings = test_settings(tmp.path());
        settings.custom_css = Some(write_file(tmp.path(), "site.css", "body {}"));
        settings.custom_js = Some(tmp.path().join("missing.js"));

        let targets: Vec<PathBuf> = watch_targets(&settings).into_iter().map(|(p, _)| p).collect();
        assert_eq!(targets, vec![settings.input_path.clone(), tmp.path().join("site.css")]);
    }

    #[test]
    fn ignored_roots_include_canonical_form() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let roots = ignored_roots(&out);
        assert!(roots.contains(&out));
        assert!(roots.contains(&fs::canonicalize(&out).unwrap()));
    }
}
