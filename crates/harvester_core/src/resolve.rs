//! Strategy resolvers: pure functions from raw driver output to typed values.
use thiserror::Error;

use crate::spec::{ExtractionPattern, PLACEHOLDER};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("validation error: {0}")]
    Validation(String),
}

/// Apply `pattern` to `text` and return capture group 1 (or the whole match
/// when the pattern has no groups).
pub fn capture(pattern: &ExtractionPattern, text: &str) -> Result<String, ResolveError> {
    let caps = pattern.regex().captures(text).ok_or_else(|| {
        ResolveError::Parse(format!(
            "pattern {:?} does not match {text:?}",
            pattern.as_str()
        ))
    })?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            ResolveError::Parse(format!("pattern {:?} captured nothing", pattern.as_str()))
        })
}

/// Leading-integer parse: surrounding whitespace is ignored and anything after
/// the first run of digits is dropped, so `" 12 pages"` yields 12.
pub fn parse_page_number(text: &str) -> Result<u32, ResolveError> {
    let trimmed = text.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits: String = unsigned.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(ResolveError::Parse(format!(
            "{text:?} does not start with a page number"
        )));
    }
    digits
        .parse()
        .map_err(|err| ResolveError::Parse(format!("{text:?}: {err}")))
}

/// Page number from raw text with an optional extraction pattern.
pub fn page_number_from(
    text: &str,
    pattern: Option<&ExtractionPattern>,
) -> Result<u32, ResolveError> {
    match pattern {
        Some(pattern) => parse_page_number(&capture(pattern, text)?),
        None => parse_page_number(text),
    }
}

/// Current page numbers start at 1.
pub fn ensure_positive(page: u32) -> Result<u32, ResolveError> {
    if page == 0 {
        return Err(ResolveError::Validation(
            "current page must be a positive integer, got 0".into(),
        ));
    }
    Ok(page)
}

/// Turn a raw id into a storage-safe key.
///
/// Whitespace and `/` are replaced character by character, so runs of spaces
/// become runs of underscores.
pub fn normalize_id(
    raw: &str,
    pattern: Option<&ExtractionPattern>,
    index_prefix: Option<usize>,
) -> Result<String, ResolveError> {
    let selected = match pattern {
        Some(pattern) => capture(pattern, raw)?,
        None => raw.to_string(),
    };
    let cleaned: String = selected
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' { '_' } else { c })
        .collect();
    Ok(match index_prefix {
        Some(index) => format!("{index}_{cleaned}"),
        None => cleaned,
    })
}

/// Id for a merged item: the constituents' texts joined with `_`.
pub fn group_id<S: AsRef<str>>(texts: &[S]) -> String {
    texts
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join("_")
}

/// Field text as stored: trimmed, newlines escaped to a literal `\n`.
pub fn escape_field(text: &str) -> String {
    text.trim().replace('\n', "\\n")
}

pub fn skip_rows<T>(mut rows: Vec<T>, skip: usize) -> Vec<T> {
    if skip >= rows.len() {
        return Vec::new();
    }
    rows.drain(..skip);
    rows
}

/// Right-aligned fixed grouping: element `i` closes a group when
/// `(i + 1) % size == 0`. Yields `len / size` groups; the incomplete tail is
/// dropped.
pub fn merge_groups<T: Clone>(rows: &[T], size: usize) -> Vec<Vec<T>> {
    if size == 0 {
        return Vec::new();
    }
    rows.iter()
        .enumerate()
        .filter(|(i, _)| (i + 1) % size == 0)
        .map(|(i, _)| rows[i + 1 - size..=i].to_vec())
        .collect()
}

/// Substitute each `#p` in turn with the next value.
///
/// Extra values are ignored; placeholders without a value are left in place.
pub fn fill_placeholders<S: AsRef<str>>(template: &str, values: &[S]) -> String {
    let mut out = template.to_string();
    for value in values {
        match out.find(PLACEHOLDER) {
            Some(pos) => out.replace_range(pos..pos + PLACEHOLDER.len(), value.as_ref()),
            None => break,
        }
    }
    out
}

/// A payload that would serialize to `[]` carries no content.
pub fn is_empty_payload<S: AsRef<str>>(fields: &[S]) -> bool {
    fields.is_empty()
}

/// Seconds to wait after `consecutive` all-failed pages: `10^k`, saturating.
pub fn backoff_seconds(consecutive: u32) -> u64 {
    10u64.saturating_pow(consecutive)
}
