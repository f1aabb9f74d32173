//! Stable template identifiers
//!
//! The front end and the backend agree on template ids without any shared
//! storage: the id is a pure function of the template's source path.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

const ALLOWED_PUNCTUATION: &str = "._-() ";

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Slug used as a template id
pub fn slug_id(value: &str) -> String {
    let normalized: String = value.nfkc().collect();
    let collapsed = whitespace_re().replace_all(&normalized, " ");
    let cleaned: String = collapsed
        .trim()
        .replace('\\', "/")
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ALLOWED_PUNCTUATION.contains(ch) {
                ch
            } else {
                '_'
            }
        })
        .collect();
    whitespace_re().replace_all(&cleaned, "_").to_lowercase()
}

/// Id for the template at `path` (its extension is not part of the id).
/// `index` is used only when the path slugs to nothing.
pub fn template_id(path: &str, index: usize) -> String {
    let rel = path.replace('\\', "/");
    let without_ext = strip_extension(&rel);
    let id = slug_id(without_ext);
    if id.is_empty() {
        format!("tpl_{:03}", index)
    } else {
        id
    }
}

/// `"input/first/diary.docx"` -> `"input/first/diary"`; dots in directory
/// names are left alone.
fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) if file_start + dot + 1 < path.len() => &path[..file_start + dot],
        _ => path,
    }
}

/// Header comparison key: no whitespace, BOM or NBSP, `ё` folded to `е`,
/// lowercase
pub fn normalize_header(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '\u{feff}' && *ch != '\u{a0}')
        .map(|ch| if ch == 'ё' { 'е' } else { ch })
        .collect::<String>()
        .to_lowercase()
}
