//! # plainpress
//!
//! A static blog generator. Point it at a directory of Markdown and HTML
//! files and it writes a deployable site: one page per file, an index, an
//! RSS feed, a client-side search index and the assets the pages use.
//!
//! # Architecture: One Pipeline, One Parallel Stage
//!
//! ```text
//! content/ ─► discover ─► [ parse ─► resolve ─► render ─► write ] ─► sort ─► index, rss.xml,
//!                          └──────── worker pool, per file ───────┘          search_index.json,
//!                                                                             style.css, assets
//! ```
//!
//! Each source file becomes an [`types::Article`] that moves through the
//! stages in order. Everything before and after the worker pool runs on one
//! thread; the pool shares only read-only configuration, the compiled
//! parsers and one locked result collection.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Drives a build: output preparation, discovery, the worker pool, site-wide files |
//! | [`content`] | Markdown and HTML parsers plus the title/date fallback rules |
//! | [`resources`] | Output placement, slug collision checks, asset copying |
//! | [`generate`] | Page rendering with Maud, share links, structured data |
//! | [`feed`] | RSS 2.0 feed |
//! | [`search`] | `search_index.json` records |
//! | [`config`] | `plainpress.toml` loading, layering, validation, finalization |
//! | [`theme`] | Built-in and custom stylesheets |
//! | [`dates`] | Date extraction from free text and date stripping |
//! | [`slug`] | URL-safe path normalization |
//! | [`types`] | The shared `Article` record |
//! | [`watch`] | Rebuild on change and serve the output |
//! | [`output`] | CLI build summaries |
//!
//! # Design Decisions
//!
//! ## Markdown Gets a Shell, HTML Stays Untouched
//!
//! Markdown articles are rendered into the site's own page template. HTML
//! files are published byte for byte: an author who writes HTML by hand
//! has already decided what the page looks like. Their body text still
//! feeds search and RSS.
//!
//! ## Copy What Is Referenced
//!
//! Content directories collect drafts, originals and scratch files. Only the
//! assets an article actually links to are copied next to its page. The one
//! exception is an HTML page tagged `PAGE`: its whole directory is mirrored,
//! because a self-contained page can load files no attribute scan would find.
//!
//! ## Compiled Patterns Are Values
//!
//! Date patterns, frontmatter and table regexes are compiled once per build
//! into plain structs ([`dates::DatePatterns`], [`content::Parsers`]) and
//! passed by reference. There is no global state, so concurrent builds in
//! tests do not interfere.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/): templates are
//! checked at compile time, interpolation is escaped by default, and there is
//! no template directory to ship. The [`generate::Presenter`] trait is the
//! seam for a different look.

pub mod config;
pub mod content;
pub mod dates;
pub mod feed;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod resources;
pub mod search;
pub mod slug;
pub mod theme;
pub mod types;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
