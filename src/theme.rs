//! Site stylesheets.
//!
//! A theme is a single CSS file written to `style.css`. The built-in themes
//! are a palette (CSS custom properties plus a `color-scheme` declaration)
//! followed by a shared layout sheet, all embedded in the binary. A custom
//! stylesheet replaces the theme entirely.
//!
//! The theme's `color-scheme` also picks the code-highlighting palette, so a
//! dark site does not end up with light code blocks.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::config::Settings;

#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("unknown theme '{name}' (available: {available})")]
    Unknown { name: String, available: String },
    #[error("cannot read stylesheet {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

const DEFAULT_THEME: &str = "default";

const BUILTIN: &[(&str, &str)] = &[
    (
        "default",
        concat!(
            include_str!("../static/themes/default.css"),
            include_str!("../static/themes/base.css")
        ),
    ),
    (
        "dark",
        concat!(
            include_str!("../static/themes/dark.css"),
            include_str!("../static/themes/base.css")
        ),
    ),
    (
        "paper",
        concat!(
            include_str!("../static/themes/paper.css"),
            include_str!("../static/themes/base.css")
        ),
    ),
];

const LIGHT_HIGHLIGHT: &str = "stackoverflow-light";
const DARK_HIGHLIGHT: &str = "github-dark-dimmed";

/// Names of the embedded themes.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN.iter().map(|(name, _)| *name)
}

#[derive(Debug, Clone)]
pub struct Theme {
    name: String,
    css: String,
}

impl Theme {
    pub fn builtin(name: &str) -> Result<Theme, ThemeError> {
        let wanted = name.trim().to_ascii_lowercase();
        BUILTIN
            .iter()
            .find(|(n, _)| *n == wanted)
            .map(|(n, css)| Theme {
                name: n.to_string(),
                css: css.to_string(),
            })
            .ok_or_else(|| ThemeError::Unknown {
                name: name.to_string(),
                available: builtin_names().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn from_file(path: &Path) -> Result<Theme, ThemeError> {
        let css = fs::read_to_string(path).map_err(|source| ThemeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Theme {
            name: path.display().to_string(),
            css,
        })
    }

    /// Pick the stylesheet for a site: the custom CSS file when configured,
    /// otherwise the named built-in theme.
    ///
    /// With `ignore_errors`, an unreadable custom file or unknown theme name
    /// falls back to the default theme with a warning.
    pub fn resolve(settings: &Settings) -> Result<Theme, ThemeError> {
        let chosen = match &settings.custom_css {
            Some(path) => Theme::from_file(path),
            None => Theme::builtin(&settings.theme),
        };
        match chosen {
            Ok(theme) => Ok(theme),
            Err(e) if settings.ignore_errors => {
                warn!("{e}; using the {DEFAULT_THEME} theme");
                Theme::builtin(DEFAULT_THEME)
            }
            Err(e) => Err(e),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    /// Whether the stylesheet declares a light `color-scheme`.
    ///
    /// Only the first value of the first declaration counts; a stylesheet
    /// without one is treated as light.
    pub fn is_light(&self) -> bool {
        color_scheme(&self.css).is_none_or(|scheme| scheme == "light")
    }

    /// highlight.js stylesheet name matching the theme.
    pub fn highlight_theme(&self) -> &'static str {
        if self.is_light() {
            LIGHT_HIGHLIGHT
        } else {
            DARK_HIGHLIGHT
        }
    }
}

fn color_scheme(css: &str) -> Option<String> {
    let lower = css.to_ascii_lowercase();
    let start = lower.find("color-scheme")? + "color-scheme".len();
    let rest = lower[start..].trim_start().strip_prefix(':')?;
    let value = rest.split([';', '}']).next()?;
    value.split_whitespace().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builtin_themes_load() {
        for name in builtin_names() {
            let theme = Theme::builtin(name).unwrap();
            assert!(theme.css().contains("--bg"));
            assert!(theme.css().contains(".article-card"));
        }
    }

    #[test]
    fn builtin_lookup_ignores_case() {
        assert_eq!(Theme::builtin(" Dark ").unwrap().name(), "dark");
    }

    #[test]
    fn unknown_theme_lists_available() {
        let err = Theme::builtin("neon").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("neon"));
        assert!(message.contains("paper"));
    }

    #[test]
    fn highlight_follows_color_scheme() {
        assert_eq!(
            Theme::builtin("default").unwrap().highlight_theme(),
            "stackoverflow-light"
        );
        assert_eq!(
            Theme::builtin("dark").unwrap().highlight_theme(),
            "github-dark-dimmed"
        );
    }

    #[test]
    fn color_scheme_parsing() {
        assert_eq!(color_scheme(":root { color-scheme: dark; }").as_deref(), Some("dark"));
        assert_eq!(color_scheme(":root{Color-Scheme:Light Dark}").as_deref(), Some("light"));
        assert_eq!(color_scheme("body { margin: 0 }"), None);
    }

    #[test]
    fn custom_css_replaces_theme() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mine.css");
        fs::write(&path, ":root { color-scheme: dark; } body { color: red; }").unwrap();
        let settings = Settings {
            custom_css: Some(path),
            ..Settings::default()
        };
        let theme = Theme::resolve(&settings).unwrap();
        assert!(theme.css().contains("color: red"));
        assert!(!theme.is_light());
    }

    #[test]
    fn unknown_theme_is_fatal_without_ignore_errors() {
        let settings = Settings {
            theme: "neon".into(),
            ..Settings::default()
        };
        assert!(matches!(
            Theme::resolve(&settings),
            Err(ThemeError::Unknown { .. })
        ));
    }

    #[test]
    fn unknown_theme_falls_back_with_ignore_errors() {
        let settings = Settings {
            theme: "neon".into(),
            ignore_errors: true,
            ..Settings::default()
        };
        assert_eq!(Theme::resolve(&settings).unwrap().name(), "default");
    }
}
