//! Template filters
//!
//! Available inside DOCX templates:
//!
//! - `{{ ФИО|letter(0) }}` n-th letter of the value with whitespace removed, uppercased
//! - `{{ Поле|uc }}` / `{{ Поле|lc }}` upper / lower case
//!
//! Null or undefined values always come out as an empty string.

use minijinja::{Environment, Value};

/// n-th character (0-based) of `value` after removing all whitespace,
/// uppercased. Out-of-range indexes give an empty string.
pub fn letter(value: &str, index: i64) -> String {
    let Ok(index) = usize::try_from(index) else {
        return String::new();
    };
    value
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .nth(index)
        .map(|ch| ch.to_uppercase().collect())
        .unwrap_or_default()
}

pub fn upper(value: &str) -> String {
    value.trim().to_uppercase()
}

pub fn lower(value: &str) -> String {
    value.trim().to_lowercase()
}

fn text_of(value: &Value) -> String {
    if value.is_undefined() || value.is_none() {
        String::new()
    } else {
        value.to_string()
    }
}

fn letter_filter(value: &Value, index: i64) -> String {
    letter(&text_of(value), index)
}

fn uc_filter(value: &Value) -> String {
    upper(&text_of(value))
}

fn lc_filter(value: &Value) -> String {
    lower(&text_of(value))
}

pub fn register(env: &mut Environment<'_>) {
    env.add_filter("letter", letter_filter);
    env.add_filter("uc", uc_filter);
    env.add_filter("lc", lc_filter);
}
