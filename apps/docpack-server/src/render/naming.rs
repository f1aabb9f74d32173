//! Archive entry naming
//!
//! Output names come from catalog patterns such as `Дневник_{ФИО}.docx`
//! filled in from the record, then made safe for every common filesystem.

use crate::catalog::{OutputFormat, PRIMARY_FIELD};
use crate::record::Record;

/// Characters no archive entry name may contain
const INVALID_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Name used when a pattern fills in to nothing
const FALLBACK_NAME: &str = "doc_001.docx";

/// Fill `{column}` placeholders from the record. Unknown columns become
/// empty strings; `{{` and `}}` stand for literal braces.
pub fn fill_pattern(pattern: &str, record: &Record) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut column = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    column.push(inner);
                }
                if closed {
                    out.push_str(record.value(&column));
                } else {
                    out.push('{');
                    out.push_str(&column);
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Replace forbidden characters with `_` and strip trailing spaces and dots
pub fn slugify(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|ch| if INVALID_CHARS.contains(&ch) { '_' } else { ch })
        .collect();
    let trimmed = replaced.trim_end_matches([' ', '.']);
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Slugify each segment of a `/`- or `\`-separated path, dropping blank ones
pub fn slugify_path(path: &str) -> String {
    path.trim()
        .split(['/', '\\'])
        .filter(|segment| !segment.trim().is_empty())
        .map(slugify)
        .collect::<Vec<_>>()
        .join("/")
}

/// Top-level folder for one record's documents
pub fn record_folder(record: &Record) -> String {
    let name = record.value(PRIMARY_FIELD).trim();
    let name = if name.is_empty() { "record" } else { name };
    slugify(&format!("001_{}", name))
}

/// File name for a rendered template, with the extension matching `format`
pub fn output_file_name(pattern: &str, record: &Record, format: OutputFormat) -> String {
    let filled = fill_pattern(pattern, record);
    let name = slugify(if filled.is_empty() { FALLBACK_NAME } else { &filled });
    let lower = name.to_lowercase();

    match format {
        OutputFormat::Pdf if lower.ends_with(".docx") => {
            format!("{}.pdf", &name[..name.len() - ".docx".len()])
        }
        OutputFormat::Pdf if !lower.ends_with(".pdf") => format!("{}.pdf", name),
        OutputFormat::Docx if !lower.ends_with(".docx") => format!("{}.docx", name),
        _ => name,
    }
}

/// Name of the stub written when a template fails; uses the raw pattern
pub fn error_file_name(pattern: &str) -> String {
    format!("{}.ERROR.txt", slugify(pattern))
}

/// `<folder>/[<subdir>/]<name>`; `dir` is filled from the record first
pub fn entry_path(folder: &str, dir: Option<&str>, name: &str, record: &Record) -> String {
    let subdir = dir
        .map(|pattern| slugify_path(&fill_pattern(pattern.trim(), record)))
        .unwrap_or_default();
    if subdir.is_empty() {
        format!("{}/{}", folder, name)
    } else {
        format!("{}/{}/{}", folder, subdir, name)
    }
}
