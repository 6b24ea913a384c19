//! Markdown sources.
//!
//! A Markdown article is an optional frontmatter block followed by the body:
//!
//! ```text
//! ---
//! title: Hello
//! created: 2023-04-05
//! tags: rust, web
//! cover_image: ./cover.png
//! ---
//! # Hello
//! ![diagram](img/diagram.svg)
//! ```
//!
//! YAML (`---`) and TOML (`+++`) blocks are both accepted. Keys are matched
//! case-insensitively. Each value is first classified into a [`FieldValue`]
//! and then assigned; a value with an unexpected shape (a list for `title`,
//! a table anywhere) is skipped with a warning rather than guessed at.

use chrono::{DateTime, Utc};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::{ContentParser, Extracted, Metadata, ParseError, metadata_date, push_tags, split_tags};
use crate::dates::DatePatterns;

const YAML_BLOCK: &str = r"(?s)\A\x{feff}?---[ \t]*\r?\n(?:(.*?)\r?\n)??---[ \t]*(?:\r?\n|\z)";
const TOML_BLOCK: &str = r"(?s)\A\x{feff}?\+\+\+[ \t]*\r?\n(?:(.*?)\r?\n)??\+\+\+[ \t]*(?:\r?\n|\z)";

/// A frontmatter value after shape classification.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Timestamp(DateTime<Utc>),
    List(Vec<String>),
    /// Anything else; carries a short description for the warning.
    Unsupported(&'static str),
}

impl FieldValue {
    fn from_yaml(value: serde_yaml::Value) -> Option<FieldValue> {
        use serde_yaml::Value;
        match value {
            Value::Null => None,
            Value::String(s) => Some(FieldValue::Text(s)),
            Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
            Value::Number(n) => Some(FieldValue::Text(n.to_string())),
            Value::Sequence(items) => Some(FieldValue::List(
                items.into_iter().filter_map(yaml_scalar).collect(),
            )),
            Value::Mapping(_) => Some(FieldValue::Unsupported("mapping")),
            Value::Tagged(tagged) => {
                let serde_yaml::value::TaggedValue { tag, value } = *tagged;
                let is_timestamp = tag.to_string().ends_with("timestamp");
                match (is_timestamp, value) {
                    (true, Value::String(s)) => Some(
                        parse_rfc3339(&s)
                            .map(FieldValue::Timestamp)
                            .unwrap_or(FieldValue::Text(s)),
                    ),
                    (true, Value::Number(n)) => Some(epoch(n.as_i64())),
                    _ => Some(FieldValue::Unsupported("tagged value")),
                }
            }
        }
    }

    fn from_toml(value: toml::Value) -> FieldValue {
        use toml::Value;
        match value {
            Value::String(s) => FieldValue::Text(s),
            Value::Integer(i) => FieldValue::Text(i.to_string()),
            Value::Float(f) => FieldValue::Text(f.to_string()),
            Value::Boolean(b) => FieldValue::Text(b.to_string()),
            Value::Datetime(dt) => {
                let text = dt.to_string();
                parse_rfc3339(&text)
                    .map(FieldValue::Timestamp)
                    .unwrap_or(FieldValue::Text(text))
            }
            Value::Array(items) => FieldValue::List(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s),
                        Value::Integer(i) => Some(i.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::Table(_) => FieldValue::Unsupported("table"),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::List(_) => "list",
            FieldValue::Unsupported(kind) => kind,
        }
    }
}

fn yaml_scalar(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn epoch(seconds: Option<i64>) -> FieldValue {
    seconds
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .map(FieldValue::Timestamp)
        .unwrap_or(FieldValue::Unsupported("out-of-range epoch"))
}

/// Assign one frontmatter entry to the article metadata.
pub(crate) fn apply_field(meta: &mut Metadata, key: &str, value: FieldValue, dates: &DatePatterns) {
    let key = key.trim().to_lowercase();
    let text_slot = match key.as_str() {
        "title" => Some(&mut meta.title),
        "description" => Some(&mut meta.description),
        "cover_image" | "coverimagepath" | "coverimage" => Some(&mut meta.cover_image),
        "share_url" | "url" | "external_link" => Some(&mut meta.share_url),
        "canonical_url" | "canonical" => Some(&mut meta.canonical_url),
        _ => None,
    };
    if let Some(slot) = text_slot {
        match value {
            FieldValue::Text(s) => *slot = Some(s.trim().to_string()),
            other => warn!("ignoring '{key}': expected text, found {}", other.kind()),
        }
        return;
    }

    match key.as_str() {
        "created" | "date" | "updated" => {
            let parsed = match value {
                FieldValue::Timestamp(dt) => Some(dt),
                FieldValue::Text(s) => metadata_date(dates, &key, &s),
                other => {
                    warn!("ignoring '{key}': expected a date, found {}", other.kind());
                    None
                }
            };
            if parsed.is_some() {
                if key == "updated" {
                    meta.updated = parsed;
                } else {
                    meta.created = parsed;
                }
            }
        }
        "tags" => match value {
            FieldValue::Text(s) => push_tags(&mut meta.tags, split_tags(&s)),
            FieldValue::List(items) => push_tags(&mut meta.tags, items),
            other => warn!("ignoring 'tags': expected text or list, found {}", other.kind()),
        },
        _ => debug!("unknown frontmatter key '{key}'"),
    }
}

/// Markdown parser with its compiled patterns.
pub struct MarkdownParser {
    yaml_block: Regex,
    toml_block: Regex,
    table_open: Regex,
    table_close: Regex,
}

impl MarkdownParser {
    pub fn new() -> Result<MarkdownParser, regex::Error> {
        Ok(MarkdownParser {
            yaml_block: Regex::new(YAML_BLOCK)?,
            toml_block: Regex::new(TOML_BLOCK)?,
            table_open: Regex::new(r"(?i)<table\b")?,
            table_close: Regex::new(r"(?i)</table\s*>")?,
        })
    }

    /// Split off the frontmatter block. Returns the decoded metadata and the
    /// remaining body.
    fn split_frontmatter<'a>(
        &self,
        raw: &'a str,
        dates: &DatePatterns,
    ) -> Result<(Metadata, &'a str), ParseError> {
        let mut meta = Metadata::default();

        if let Some(caps) = self.yaml_block.captures(raw) {
            let block = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let body = &raw[caps.get(0).map(|m| m.end()).unwrap_or(0)..];
            let value: serde_yaml::Value = serde_yaml::from_str(block)
                .map_err(|e| ParseError::Frontmatter(e.to_string()))?;
            match value {
                serde_yaml::Value::Null => {}
                serde_yaml::Value::Mapping(map) => {
                    for (key, value) in map {
                        let Some(key) = yaml_scalar(key) else {
                            warn!("ignoring non-text frontmatter key");
                            continue;
                        };
                        if let Some(field) = FieldValue::from_yaml(value) {
                            apply_field(&mut meta, &key, field, dates);
                        }
                    }
                }
                _ => {
                    return Err(ParseError::Frontmatter(
                        "expected key-value pairs".into(),
                    ));
                }
            }
            return Ok((meta, body));
        }

        if let Some(caps) = self.toml_block.captures(raw) {
            let block = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let body = &raw[caps.get(0).map(|m| m.end()).unwrap_or(0)..];
            let table: toml::Table =
                toml::from_str(block).map_err(|e| ParseError::Frontmatter(e.to_string()))?;
            for (key, value) in table {
                apply_field(&mut meta, &key, FieldValue::from_toml(value), dates);
            }
            return Ok((meta, body));
        }

        Ok((meta, raw.strip_prefix('\u{feff}').unwrap_or(raw)))
    }

    /// Wrap every table in a scrollable container.
    pub fn wrap_tables(&self, html: &str) -> String {
        let opened = self
            .table_open
            .replace_all(html, "<div class=\"table-wrapper\">$0");
        self.table_close
            .replace_all(&opened, "$0</div>")
            .into_owned()
    }
}

impl ContentParser for MarkdownParser {
    fn extract(&self, raw: &str, dates: &DatePatterns) -> Result<Extracted, ParseError> {
        let (metadata, body) = self.split_frontmatter(raw, dates)?;
        let (rendered, mut references, raw_html) = render(body);

        if !raw_html.is_empty() {
            references.extend(super::html::fragment_references(&raw_html));
        }

        Ok(Extracted {
            metadata,
            text_content: body.to_string(),
            body_html: self.wrap_tables(&rendered),
            html_content: String::new(),
            references,
        })
    }
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_MATH
}

/// Render Markdown to HTML.
///
/// Returns the HTML, image and link destinations in document order, and the
/// raw HTML embedded in the source (scanned separately for references).
fn render(body: &str) -> (String, Vec<String>, String) {
    let mut events: Vec<Event> = Parser::new_ext(body, markdown_options())
        .map(|event| match event {
            Event::SoftBreak => Event::HardBreak,
            other => other,
        })
        .collect();

    assign_heading_ids(&mut events);

    let mut references = Vec::new();
    let mut raw_html = String::new();
    for event in &events {
        match event {
            Event::Start(Tag::Image { dest_url, .. }) | Event::Start(Tag::Link { dest_url, .. }) => {
                references.push(dest_url.to_string());
            }
            Event::Html(fragment) | Event::InlineHtml(fragment) => {
                raw_html.push_str(fragment);
                raw_html.push('\n');
            }
            _ => {}
        }
    }

    let mut out = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    (out, references, raw_html)
}

/// Give every heading without an explicit `{#id}` a unique anchor derived
/// from its text.
fn assign_heading_ids(events: &mut [Event]) {
    let mut seen: HashSet<String> = HashSet::new();

    for i in 0..events.len() {
        let needs_id = match &events[i] {
            Event::Start(Tag::Heading { id: Some(id), .. }) => {
                seen.insert(id.to_string());
                false
            }
            Event::Start(Tag::Heading { id: None, .. }) => true,
            _ => false,
        };
        if !needs_id {
            continue;
        }

        let mut text = String::new();
        for event in &events[i + 1..] {
            match event {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(t) | Event::Code(t) => text.push_str(t),
                _ => {}
            }
        }

        let anchor = unique_anchor(&mut seen, heading_anchor(&text));
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(anchor));
        }
    }
}

fn heading_anchor(text: &str) -> String {
    let mut anchor = String::new();
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            anchor.push(c);
        } else if (c.is_whitespace() || c == '-' || c == '_') && !anchor.ends_with('-') {
            anchor.push('-');
        }
    }
    let anchor = anchor.trim_matches('-');
    if anchor.is_empty() {
        "heading".to_string()
    } else {
        anchor.to_string()
    }
}

fn unique_anchor(seen: &mut HashSet<String>, base: String) -> String {
    if seen.insert(base.clone()) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}-{n}");
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn extract(raw: &str) -> Extracted {
        let dates = DatePatterns::new().unwrap();
        MarkdownParser::new().unwrap().extract(raw, &dates).unwrap()
    }

    // =========================================================================
    // Frontmatter
    // =========================================================================

    #[test]
    fn yaml_frontmatter_fields() {
        let ex = extract(
            "---\nTitle: Hello\nDescription: A greeting\ncreated: 2023-04-05\nupdated: 2023-05-06 10:11:12\ncoverImagePath: cover.png\nshare_url: https://example.com/x\ncanonical_url: https://example.com/c\n---\nBody text",
        );
        let meta = ex.metadata;
        assert_eq!(meta.title.as_deref(), Some("Hello"));
        assert_eq!(meta.description.as_deref(), Some("A greeting"));
        assert_eq!(
            meta.created,
            Some(Utc.with_ymd_and_hms(2023, 4, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(
            meta.updated,
            Some(Utc.with_ymd_and_hms(2023, 5, 6, 10, 11, 12).unwrap())
        );
        assert_eq!(meta.cover_image.as_deref(), Some("cover.png"));
        assert_eq!(meta.share_url.as_deref(), Some("https://example.com/x"));
        assert_eq!(meta.canonical_url.as_deref(), Some("https://example.com/c"));
        assert_eq!(ex.text_content, "Body text");
    }

    #[test]
    fn tags_from_delimited_string() {
        let ex = extract("---\ntags: \"a, b ,c\"\n---\n");
        assert_eq!(ex.metadata.tags, vec!["a", "b", "c"]);
    }

    #[test]
    fn tags_from_list_deduplicated() {
        let ex = extract("---\ntags:\n  - rust\n  - web\n  - rust\n---\nx");
        assert_eq!(ex.metadata.tags, vec!["rust", "web"]);
    }

    #[test]
    fn toml_frontmatter_with_typed_datetime() {
        let ex = extract(
            "+++\ntitle = \"Typed\"\ncreated = 2022-03-04T05:06:07Z\ntags = [\"x\", \"y\"]\n+++\nbody",
        );
        assert_eq!(ex.metadata.title.as_deref(), Some("Typed"));
        assert_eq!(
            ex.metadata.created,
            Some(Utc.with_ymd_and_hms(2022, 3, 4, 5, 6, 7).unwrap())
        );
        assert_eq!(ex.metadata.tags, vec!["x", "y"]);
    }

    #[test]
    fn toml_local_date_goes_through_patterns() {
        let ex = extract("+++\ncreated = 2022-03-04\n+++\n");
        assert_eq!(
            ex.metadata.created,
            Some(Utc.with_ymd_and_hms(2022, 3, 4, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn yaml_epoch_timestamp_tag() {
        let ex = extract("---\ncreated: !timestamp 86400\n---\n");
        assert_eq!(
            ex.metadata.created,
            Some(Utc.with_ymd_and_hms(1970, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn unexpected_shapes_are_skipped() {
        let ex = extract("---\ntitle:\n  - a\n  - b\ndescription:\n  nested: true\n---\nx");
        assert_eq!(ex.metadata.title, None);
        assert_eq!(ex.metadata.description, None);
    }

    #[test]
    fn malformed_date_is_skipped() {
        let ex = extract("---\ncreated: not a date\n---\nx");
        assert_eq!(ex.metadata.created, None);
    }

    #[test]
    fn empty_frontmatter_block() {
        let ex = extract("---\n---\nJust body");
        assert_eq!(ex.metadata, Metadata::default());
        assert_eq!(ex.text_content, "Just body");
    }

    #[test]
    fn no_frontmatter_keeps_whole_body() {
        let ex = extract("# Heading\n\ntext");
        assert_eq!(ex.text_content, "# Heading\n\ntext");
    }

    #[test]
    fn invalid_yaml_is_error() {
        let dates = DatePatterns::new().unwrap();
        let result = MarkdownParser::new()
            .unwrap()
            .extract("---\ntitle: [unclosed\n---\nx", &dates);
        assert!(matches!(result, Err(ParseError::Frontmatter(_))));
    }

    #[test]
    fn scalar_frontmatter_is_error() {
        let dates = DatePatterns::new().unwrap();
        let result = MarkdownParser::new()
            .unwrap()
            .extract("---\njust a string\n---\nx", &dates);
        assert!(matches!(result, Err(ParseError::Frontmatter(_))));
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    #[test]
    fn tables_are_wrapped() {
        let ex = extract("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(ex.body_html.contains("<div class=\"table-wrapper\"><table>"));
        assert!(ex.body_html.contains("</table></div>"));
    }

    #[test]
    fn wrap_tables_preserves_attributes() {
        let parser = MarkdownParser::new().unwrap();
        let out = parser.wrap_tables("<TABLE class=\"x\"><tr><td>1</td></tr></TABLE>");
        assert_eq!(
            out,
            "<div class=\"table-wrapper\"><TABLE class=\"x\"><tr><td>1</td></tr></TABLE></div>"
        );
    }

    #[test]
    fn soft_breaks_become_hard_breaks() {
        let ex = extract("line one\nline two");
        assert!(ex.body_html.contains("<br />"));
    }

    #[test]
    fn headings_get_unique_ids() {
        let ex = extract("# Intro\n\n## Intro\n\n## Custom {#mine}\n");
        assert!(ex.body_html.contains("<h1 id=\"intro\">"));
        assert!(ex.body_html.contains("<h2 id=\"intro-1\">"));
        assert!(ex.body_html.contains("<h2 id=\"mine\">"));
    }

    #[test]
    fn raw_html_passes_through() {
        let ex = extract("<div class=\"note\">hi</div>\n");
        assert!(ex.body_html.contains("<div class=\"note\">hi</div>"));
    }

    #[test]
    fn strikethrough_and_tasklists() {
        let ex = extract("~~old~~\n\n- [x] done\n");
        assert!(ex.body_html.contains("<del>old</del>"));
        assert!(ex.body_html.contains("checkbox"));
    }

    // =========================================================================
    // References
    // =========================================================================

    #[test]
    fn collects_images_and_links_in_order() {
        let ex = extract(
            "![a](img/a.png)\n\n[site](https://example.com) and [b](files/b.pdf)\n\n[anchor](#top)",
        );
        assert_eq!(
            ex.references,
            vec!["img/a.png", "https://example.com", "files/b.pdf", "#top"]
        );
    }

    #[test]
    fn collects_references_from_raw_html() {
        let ex = extract("Intro\n\n<video src=\"clip.mp4\" poster=\"poster.jpg\"></video>\n");
        assert!(ex.references.contains(&"clip.mp4".to_string()));
        assert!(ex.references.contains(&"poster.jpg".to_string()));
    }

    #[test]
    fn heading_anchor_slugging() {
        assert_eq!(heading_anchor("Hello, World!"), "hello-world");
        assert_eq!(heading_anchor("  C++ & Rust  "), "c-rust");
        assert_eq!(heading_anchor("???"), "heading");
    }
}
