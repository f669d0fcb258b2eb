use std::borrow::Cow;

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use regex::Regex;

use crate::data::parse_naive_date;
use crate::error::TransformFailure;

/// Returns a lowercase representation, reusing the original string if already lowercase.
pub fn lowercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_uppercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_lowercase())
    }
}

pub fn uppercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| !ch.is_lowercase()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_uppercase())
    }
}

pub fn trim(input: &str) -> Cow<'_, str> {
    Cow::Borrowed(input.trim())
}

/// Trims and folds every inner whitespace run into a single space.
pub fn collapse_whitespace(input: &str) -> Cow<'_, str> {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(collapsed)
    }
}

fn keep_if_unchanged(input: &str, converted: String) -> Cow<'_, str> {
    if converted == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(converted)
    }
}

pub fn snake_case(input: &str) -> Cow<'_, str> {
    keep_if_unchanged(input, input.to_snake_case())
}

pub fn camel_case(input: &str) -> Cow<'_, str> {
    keep_if_unchanged(input, input.to_lower_camel_case())
}

pub fn pascal_case(input: &str) -> Cow<'_, str> {
    keep_if_unchanged(input, input.to_upper_camel_case())
}

/// Drops everything but ASCII digits, e.g. for phone numbers or postal codes.
pub fn digits_only(input: &str) -> Cow<'_, str> {
    if input.bytes().all(|b| b.is_ascii_digit()) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.chars().filter(char::is_ascii_digit).collect())
    }
}

/// Removes `,` and `_` grouping separators from numbers such as `1,234.50`.
pub fn strip_thousands(input: &str) -> Cow<'_, str> {
    if input.contains([',', '_']) {
        Cow::Owned(input.replace([',', '_'], ""))
    } else {
        Cow::Borrowed(input)
    }
}

/// Rewrites a date in any supported layout to `YYYY-MM-DD`.
pub fn iso_date(input: &str) -> Result<String, TransformFailure> {
    parse_naive_date(input)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|err| TransformFailure::new(err.to_string()))
}

/// Normalizes boolean spellings to `1`/`0`.
pub fn boolean_01(input: &str) -> Result<String, TransformFailure> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok("1".to_string()),
        "false" | "f" | "no" | "n" | "0" => Ok("0".to_string()),
        _ => Err(TransformFailure::new(format!(
            "'{input}' is not a boolean value"
        ))),
    }
}

/// Returns a substring using character indices to stay UTF-8 safe.
pub fn substring(value: &str, start: usize, length: usize) -> Cow<'_, str> {
    let begin = value
        .char_indices()
        .nth(start)
        .map(|(idx, _)| idx)
        .unwrap_or(value.len());
    let end = value[begin..]
        .char_indices()
        .nth(length)
        .map(|(idx, _)| begin + idx)
        .unwrap_or(value.len());
    Cow::Borrowed(&value[begin..end])
}

pub fn regex_replace<'a>(value: &'a str, regex: &Regex, replacement: &str) -> Cow<'a, str> {
    regex.replace_all(value, replacement)
}
