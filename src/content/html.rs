//! Hand-written HTML sources.
//!
//! An HTML article is published as written: the original document is the
//! output page. Parsing only gathers what the rest of the site needs:
//!
//! - `<title>` and `<meta name=… content=…>` for metadata (`keywords` become tags)
//! - `<link rel="canonical">` when no meta tag names a canonical URL
//! - visible body text for the search index
//! - the `<body>` children for the RSS feed
//! - every resource the page references, so the resolver can copy it

use scraper::{ElementRef, Html, Node};

use super::markdown::{FieldValue, apply_field};
use super::{ContentParser, Extracted, Metadata, ParseError};
use crate::dates::DatePatterns;

/// Tag/attribute pairs that point at files a page needs.
const RESOURCE_ATTRS: &[(&str, &[&str])] = &[
    ("img", &["src"]),
    ("script", &["src"]),
    ("link", &["href"]),
    ("video", &["src", "poster"]),
    ("audio", &["src"]),
    ("source", &["src"]),
    ("track", &["src"]),
    ("object", &["data"]),
    ("iframe", &["src"]),
    ("embed", &["src"]),
    ("a", &["href"]),
];

const INVISIBLE: &[&str] = &["script", "style", "noscript", "template", "head"];

#[derive(Debug, Default)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> HtmlParser {
        HtmlParser
    }
}

impl ContentParser for HtmlParser {
    fn extract(&self, raw: &str, dates: &DatePatterns) -> Result<Extracted, ParseError> {
        let document = Html::parse_document(raw);
        let root = document.root_element();

        let metadata = read_metadata(root, dates);
        let body = find_element(root, "body");

        let text_content = match body {
            Some(body) => visible_text(body),
            None => visible_text(root),
        };
        let body_html = match body {
            Some(body) if has_body_tag(raw) => body.inner_html(),
            _ => raw.to_string(),
        };

        Ok(Extracted {
            metadata,
            text_content,
            body_html,
            html_content: raw.to_string(),
            references: references(root),
        })
    }
}

/// Resource references inside an HTML fragment (raw HTML embedded in
/// Markdown).
pub(crate) fn fragment_references(fragment: &str) -> Vec<String> {
    let parsed = Html::parse_fragment(fragment);
    references(parsed.root_element())
}

fn references(root: ElementRef) -> Vec<String> {
    let mut found = Vec::new();
    for element in root.descendants().filter_map(ElementRef::wrap) {
        let el = element.value();
        let Some((_, attrs)) = RESOURCE_ATTRS.iter().find(|(tag, _)| *tag == el.name()) else {
            continue;
        };
        for attr in attrs.iter() {
            if let Some(value) = el.attr(attr) {
                found.push(value.to_string());
            }
        }
    }
    found
}

fn read_metadata(root: ElementRef, dates: &DatePatterns) -> Metadata {
    let mut meta = Metadata::default();
    let mut canonical_link = None;

    for element in root.descendants().filter_map(ElementRef::wrap) {
        let el = element.value();
        match el.name() {
            "meta" => {
                let (Some(name), Some(content)) = (el.attr("name"), el.attr("content")) else {
                    continue;
                };
                let key = match name.trim().to_lowercase().as_str() {
                    "keywords" => "tags".to_string(),
                    other => other.to_string(),
                };
                apply_field(&mut meta, &key, FieldValue::Text(content.to_string()), dates);
            }
            "link" if canonical_link.is_none() => {
                let is_canonical = el
                    .attr("rel")
                    .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("canonical")));
                if is_canonical {
                    canonical_link = el.attr("href").map(str::to_string);
                }
            }
            _ => {}
        }
    }

    if let Some(title) = find_element(root, "title") {
        let text = collapse_whitespace(&title.text().collect::<String>());
        if !text.is_empty() {
            meta.title = Some(text);
        }
    }
    if meta.canonical_url.is_none() {
        meta.canonical_url = canonical_link;
    }
    meta
}

fn find_element<'a>(root: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    root.descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == name)
}

/// Text a reader would see, whitespace collapsed.
fn visible_text(root: ElementRef) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| INVISIBLE.contains(&el.name()))
        });
        if !hidden {
            parts.push(&**text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_body_tag(raw: &str) -> bool {
    raw.to_ascii_lowercase().contains("<body")
}
