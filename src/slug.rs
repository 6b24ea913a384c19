//! Output-path sanitizing.
//!
//! Every article lands at `<slug>/index.html` where the slug is derived from
//! its source path. Paths are kept readable but restricted to characters that
//! survive any web server and any filesystem:
//!
//! ```text
//! "My Post/index.html"      → "My-Post/index.html"
//! "Notes on C#/index.html"  → "Notes-on-Csharp/index.html"
//! "C++ tips/index.html"     → "Cplusplus-tips/index.html"
//! "drafts\\wip/index.html"  → "drafts/wip/index.html"
//! ```

/// Sanitize a relative output path into a slug.
///
/// Case is preserved. `#` and `+` are spelled out so `C`, `C#` and `C++` stay
/// distinct. Anything outside `[A-Za-z0-9/.-]` and whitespace is dropped,
/// backslashes become `/`, each segment is trimmed of `-`, `_` and spaces, and
/// inner whitespace runs become a single `-`.
///
/// Applying `slugify` to its own output returns the same string.
pub fn slugify(input: &str) -> String {
    let spelled = input.replace('#', "sharp").replace('+', "plus");

    let filtered: String = spelled
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '\\' | '.' | '-' | ' '))
        .map(|c| if c == '\\' { '/' } else { c })
        .collect();

    let segments: Vec<&str> = filtered.split('/').map(trim_separators).collect();
    let joined = segments.join("/");

    let words: Vec<&str> = joined
        .split_whitespace()
        .map(trim_separators)
        .filter(|w| !w.is_empty())
        .collect();
    let dashed = collapse_dashes(&words.join("-"));

    dashed.trim_matches('-').to_string()
}

fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c| matches!(c, '-' | '_' | ' '))
}

fn collapse_dashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_dash = false;
    for c in s.chars() {
        if c == '-' {
            if !prev_dash {
                out.push(c);
            }
            prev_dash = true;
        } else {
            out.push(c);
            prev_dash = false;
        }
    }
    out
}
