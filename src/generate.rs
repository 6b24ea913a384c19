//! HTML page generation.
//!
//! The pipeline hands finished [`Article`]s to a [`Presenter`], which turns
//! them into complete pages. [`DefaultPresenter`] is the built-in look:
//!
//! - **Article pages** (`<slug>/index.html`, Markdown sources only): site
//!   header, title, dates, tags, cover image, content, share buttons
//! - **Index page** (`index.html`): site description, search box, tag
//!   filter, standalone pages (tagged `PAGE`) and the article list
//!
//! HTML sources are published as written and never pass through here.
//!
//! ## Links
//!
//! Article pages link back to shared assets with a relative prefix
//! (`../../style.css` from `blog/post/index.html`), so the site works from
//! any base path and straight from disk. Absolute URLs built from
//! `base_url` are only used where they must be absolute: canonical links,
//! Open Graph tags, structured data and share buttons.
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! Templates are type-safe Rust code with automatic XSS escaping; only
//! rendered content and the user's own snippets are inserted unescaped.

use maud::{DOCTYPE, Markup, PreEscaped, html};
use scraper::{ElementRef, Html};
use serde_json::json;
use std::collections::BTreeSet;
use url::form_urlencoded;

use crate::config::{Settings, ShareButton};
use crate::types::{Article, PAGE_TAG};

const HIGHLIGHT_BASE: &str = "https://cdnjs.cloudflare.com/ajax/libs/highlight.js/11.9.0";

/// Renders pages. Shared by all workers, so it must be `Sync`.
pub trait Presenter: Sync {
    /// Complete page for a Markdown article.
    fn article_page(&self, article: &Article, settings: &Settings) -> String;
    /// The site index for the sorted article collection.
    fn index_page(&self, articles: &[Article], settings: &Settings) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPresenter;

impl Presenter for DefaultPresenter {
    fn article_page(&self, article: &Article, settings: &Settings) -> String {
        render_article(article, settings).into_string()
    }

    fn index_page(&self, articles: &[Article], settings: &Settings) -> String {
        render_index(articles, settings).into_string()
    }
}

// ============================================================================
// URL helpers
// ============================================================================

/// Resolve a site-root-relative path against `base_url`. Absolute URLs are
/// returned unchanged.
pub fn absolute_url(path: &str, base_url: &str) -> String {
    let lower = path.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches("./").trim_start_matches('/')
    )
}

/// Link from an article page to a site-root-relative path.
pub fn relative_link(article: &Article, path: &str) -> String {
    let lower = path.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//") {
        return path.to_string();
    }
    format!("{}{}", article.root_prefix(), path.trim_start_matches('/'))
}

/// Percent-encode a value for use inside a query string (spaces as `%20`).
pub fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// First absolute hyperlink in an HTML fragment.
fn first_link(fragment: &str) -> Option<String> {
    let parsed = Html::parse_fragment(fragment);
    parsed
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
        .filter_map(|el| el.value().attr("href"))
        .find(|href| {
            let lower = href.to_ascii_lowercase();
            lower.starts_with("http://") || lower.starts_with("https://")
        })
        .map(str::to_string)
}

/// Tag reduced to letters, digits and underscores, for use as a hashtag.
fn hashtag(tag: &str) -> String {
    tag.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

fn visible_tags(article: &Article) -> impl Iterator<Item = &String> {
    article.tags.iter().filter(|t| *t != PAGE_TAG)
}

/// Fill a share-button URL template.
///
/// | Placeholder | Value |
/// |-------------|-------|
/// | `{URL}` | `share_url`, else the article's absolute URL |
/// | `{TITLE}` | title |
/// | `{DESCRIPTION}` | description |
/// | `{TEXT}` | `title - description`, or the title alone |
/// | `{LINK}` | `share_url`, else the first external link in the content, else `{URL}` |
/// | `{IMAGE}` | absolute cover image URL |
/// | `{TAGS}` | `#tag1 #tag2`, punctuation removed |
/// | `{TAG}` | the first cleaned tag |
///
/// Every value is query-component encoded.
pub fn share_url(template: &str, article: &Article, settings: &Settings) -> String {
    let url = article
        .share_url
        .clone()
        .unwrap_or_else(|| absolute_url(&article.link_to_self, &settings.base_url));
    let link = article
        .share_url
        .clone()
        .or_else(|| first_link(&article.body_html))
        .unwrap_or_else(|| url.clone());
    let image = article
        .cover_image
        .as_deref()
        .map(|c| absolute_url(c, &settings.base_url))
        .unwrap_or_default();
    let text = if article.description.is_empty() {
        article.title.clone()
    } else {
        format!("{} - {}", article.title, article.description)
    };
    let hashtags: Vec<String> = visible_tags(article)
        .map(|t| hashtag(t))
        .filter(|t| !t.is_empty())
        .collect();
    let tags = hashtags
        .iter()
        .map(|t| format!("#{t}"))
        .collect::<Vec<_>>()
        .join(" ");
    let tag = hashtags.first().cloned().unwrap_or_default();

    let replacements = [
        ("{URL}", url),
        ("{TITLE}", article.title.clone()),
        ("{DESCRIPTION}", article.description.clone()),
        ("{TEXT}", text),
        ("{LINK}", link),
        ("{IMAGE}", image),
        ("{TAGS}", tags),
        ("{TAG}", tag),
    ];
    replacements
        .iter()
        .fold(template.to_string(), |acc, (placeholder, value)| {
            acc.replace(placeholder, &encode_component(value))
        })
}

/// Structured-data type: news for articles tagged `news` or `article`.
pub fn schema_type(article: &Article) -> &'static str {
    let is_news = article
        .tags
        .iter()
        .any(|t| t.eq_ignore_ascii_case("news") || t.eq_ignore_ascii_case("article"));
    if is_news { "NewsArticle" } else { "BlogPosting" }
}

fn structured_data(article: &Article, settings: &Settings) -> String {
    let page_url = absolute_url(&article.link_to_self, &settings.base_url);
    let mut data = json!({
        "@context": "https://schema.org",
        "@type": schema_type(article),
        "headline": article.title,
        "description": article.description,
        "datePublished": article.created.to_rfc3339(),
        "dateModified": article.updated.to_rfc3339(),
        "mainEntityOfPage": page_url,
        "keywords": visible_tags(article).cloned().collect::<Vec<_>>().join(", "),
        "author": { "@type": "Person", "name": settings.author_name },
        "publisher": { "@type": "Organization", "name": settings.publisher_name },
    });
    if let Some(logo) = &settings.publisher_logo {
        data["publisher"]["logo"] = json!({
            "@type": "ImageObject",
            "url": absolute_url(&logo.to_string_lossy(), &settings.base_url),
        });
    }
    if let Some(cover) = &article.cover_image {
        data["image"] = json!(absolute_url(cover, &settings.base_url));
    }
    // Keep the JSON from closing its own <script> element.
    data.to_string().replace("</", "<\\/")
}

// ============================================================================
// HTML Components
// ============================================================================

/// Head contents that differ per page.
struct PageHead<'a> {
    title: &'a str,
    description: &'a str,
    canonical: String,
    extra: Markup,
}

/// Renders the base HTML document structure.
fn base_document(settings: &Settings, root: &str, head: PageHead, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (head.title) }
                @if !head.description.is_empty() {
                    meta name="description" content=(head.description);
                }
                meta name="author" content=(settings.author_name);
                link rel="canonical" href=(head.canonical);
                (head.extra)
                link rel="stylesheet" href={ (root) "style.css" };
                @if !settings.highlight_theme.is_empty() {
                    link rel="stylesheet" href={ (HIGHLIGHT_BASE) "/styles/" (settings.highlight_theme) ".min.css" };
                    script src={ (HIGHLIGHT_BASE) "/highlight.min.js" } defer {}
                }
                link rel="icon" href={ (root) "favicon.ico" };
                link rel="alternate" type="application/rss+xml" title=(settings.title) href={ (root) "rss.xml" };
                (PreEscaped(&settings.head_snippet))
            }
            body data-copy-icon={ (root) "copy.svg" } {
                (content)
                script src={ (root) "script.js" } {}
                (PreEscaped(&settings.body_snippet))
            }
        }
    }
}

fn site_footer(settings: &Settings, root: &str) -> Markup {
    html! {
        footer.site-footer {
            a href={ (root) "rss.xml" } {
                img src={ (root) "rss.svg" } alt="RSS";
                " RSS"
            }
            " · " (settings.publisher_name)
        }
    }
}

fn share_buttons(article: &Article, settings: &Settings, buttons: &[ShareButton]) -> Markup {
    html! {
        div.share-buttons {
            @for button in buttons {
                a href=(share_url(&button.url, article, settings)) target="_blank" rel="noopener" title=(button.name) {
                    @if button.has_icon() {
                        img src=(relative_link(article, &button.display)) alt=(button.name);
                    } @else {
                        (button.label())
                    }
                }
            }
        }
    }
}

fn display_date(article_date: &chrono::DateTime<chrono::Utc>, settings: &Settings) -> String {
    article_date.format(&settings.date_format).to_string()
}

// ============================================================================
// Page Renderers
// ============================================================================

/// Renders a Markdown article inside the site shell.
pub fn render_article(article: &Article, settings: &Settings) -> Markup {
    let root = article.root_prefix();
    let page_url = absolute_url(&article.link_to_self, &settings.base_url);
    let canonical = article.canonical_url.clone().unwrap_or(page_url.clone());
    let cover = article.cover_image.as_deref().map(|c| relative_link(article, c));
    let show_updated = article.updated.date_naive() != article.created.date_naive();
    let tags: Vec<&String> = visible_tags(article).collect();

    let extra = html! {
        meta name="keywords" content=(tags.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", "));
        meta property="og:type" content="article";
        meta property="og:title" content=(article.title);
        meta property="og:description" content=(article.description);
        meta property="og:url" content=(page_url);
        @if let Some(cover) = &article.cover_image {
            meta property="og:image" content=(absolute_url(cover, &settings.base_url));
        }
        script type="application/ld+json" { (PreEscaped(structured_data(article, settings))) }
    };

    let content = html! {
        header.site-header {
            a.site-title href={ (root) (settings.index_name) } { (settings.title) }
        }
        main {
            article.post {
                h1.post-title { (article.title) }
                div.post-meta {
                    time datetime=(article.created.to_rfc3339()) { (display_date(&article.created, settings)) }
                    @if show_updated {
                        " · updated "
                        time datetime=(article.updated.to_rfc3339()) { (display_date(&article.updated, settings)) }
                    }
                }
                @if !tags.is_empty() {
                    ul.post-tags {
                        @for tag in &tags {
                            li { a href={ (root) (settings.index_name) "?tag=" (encode_component(tag)) } { (tag) } }
                        }
                    }
                }
                @if let Some(cover) = &cover {
                    img.post-cover src=(cover) alt=(article.title);
                }
                div.post-content {
                    (PreEscaped(&article.body_html))
                }
                @if !settings.share_buttons.is_empty() {
                    (share_buttons(article, settings, &settings.share_buttons))
                }
            }
        }
        (site_footer(settings, &root))
    };

    let title = format!("{} | {}", article.title, settings.title);
    let head = PageHead {
        title: &title,
        description: &article.description,
        canonical,
        extra,
    };
    base_document(settings, &root, head, content)
}

/// Renders the index page.
pub fn render_index(articles: &[Article], settings: &Settings) -> Markup {
    let (pages, posts): (Vec<&Article>, Vec<&Article>) = articles.iter().partition(|a| a.is_page());
    let all_tags: BTreeSet<&String> = posts.iter().flat_map(|a| visible_tags(a)).collect();
    let target = settings.open_in_new_tab.then_some("_blank");
    let rel = settings.open_in_new_tab.then_some("noopener");

    let content = html! {
        header.site-header {
            h1 { (settings.title) }
            @if !settings.description_html.is_empty() {
                div.site-description { (PreEscaped(&settings.description_html)) }
            }
            @if !pages.is_empty() {
                nav.pages-nav {
                    ul {
                        @for page in &pages {
                            li { a href=(page.link_to_self) target=[target] rel=[rel] { (page.title) } }
                        }
                    }
                }
            }
        }
        main {
            input #search-input type="search" placeholder="Search…" aria-label="Search";
            @if !all_tags.is_empty() {
                div.tag-filter {
                    @for tag in &all_tags {
                        button type="button" data-tag=(tag) { (tag) }
                    }
                }
            }
            ul.article-list {
                @for post in &posts {
                    li.article-card data-url=(post.link_to_self) data-tags=(post.tags.join(",")) {
                        h2 { a href=(post.link_to_self) target=[target] rel=[rel] { (post.title) } }
                        time datetime=(post.created.to_rfc3339()) { (display_date(&post.created, settings)) }
                        @if !post.description.is_empty() {
                            p { (post.description) }
                        }
                        @if let Some(cover) = &post.cover_image {
                            img.cover src=(cover) alt=(post.title) loading="lazy";
                        }
                    }
                }
            }
        }
        (site_footer(settings, ""))
        script src="search.js" {}
    };

    let head = PageHead {
        title: &settings.title,
        description: settings.description.trim(),
        canonical: format!("{}/", settings.base_url.trim_end_matches('/')),
        extra: html! {
            meta property="og:type" content="website";
            meta property="og:title" content=(settings.title);
        },
    };
    base_document(settings, "", head, content)
}
