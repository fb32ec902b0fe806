//! Filename recovery from `Content-Disposition` and sanitization for disk.
//!
//! Everything here is pure: header map in, filename out. Malformed headers
//! never error, they degrade to the synthesized `Book_<id>.epub` name.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};

use super::constants::{MAX_FILENAME_BYTES, MAX_STEM_CHARS};

/// `filename*=UTF-8''<percent-encoded>` (RFC 5987), language tag optional.
#[allow(clippy::expect_used)]
static EXTENDED_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)filename\*\s*=\s*utf-8'[^']*'([^;]*)")
        .expect("extended filename regex is valid") // Static pattern, safe to panic
});

/// `filename="<value>"` or `filename='<value>'`, up to the closing quote or end.
///
/// A single-quoted value only closes at a `'` followed by `;` or the end, so
/// apostrophes inside titles survive.
#[allow(clippy::expect_used)]
static QUOTED_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\s*=\s*(?:"([^"]*)|'(.*?)(?:'\s*(?:;|$)|$))"#)
        .expect("quoted filename regex is valid") // Static pattern, safe to panic
});

/// `filename=<value>` up to the next `;` or end.
#[allow(clippy::expect_used)]
static BARE_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)filename\s*=\s*([^;]+)").expect("bare filename regex is valid") // Static pattern, safe to panic
});

/// Characters that are invalid in filenames on common filesystems.
const RESERVED_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// HTML entities that show up in titles served by the content server.
const ENTITY_REPLACEMENTS: &[(&str, &str)] = &[("&#x27;", "'"), ("&#39;", "'"), ("&amp;", "&")];

/// Author shown when the filename carries no `Title - Author` split.
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Synthesized name used when no filename can be recovered from headers.
///
/// Also the deterministic placeholder checked before any request is made.
#[must_use]
pub fn fallback_filename(id: u64) -> String {
    format!("Book_{id}.epub")
}

/// Resolves the on-disk filename for a response.
///
/// Precedence: extended `filename*=`, then quoted `filename=`, then bare
/// `filename=`, then [`fallback_filename`]. Any header-derived name goes
/// through [`sanitize_filename`]; a name that sanitizes to nothing usable
/// (empty, or a dot-file) also falls back.
#[must_use]
pub fn resolve_filename(headers: &HeaderMap, fallback_id: u64) -> String {
    let disposition = headers
        .get(CONTENT_DISPOSITION)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default();

    if disposition.trim().is_empty() {
        return fallback_filename(fallback_id);
    }

    parse_content_disposition(&disposition)
        .map(|name| sanitize_filename(&name))
        .filter(|name| !name.is_empty() && !name.starts_with('.'))
        .unwrap_or_else(|| fallback_filename(fallback_id))
}

/// Extracts the raw filename from a `Content-Disposition` value.
///
/// Handles:
/// - `attachment; filename*=UTF-8''My%20Book.epub` (RFC 5987, percent-decoded)
/// - `attachment; filename="My Book.epub"` / `filename='My Book.epub'`
/// - `attachment; filename=My_Book.epub`
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(encoded) = EXTENDED_FILENAME
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
    {
        let decoded = percent_decode_lossy(encoded);
        if !decoded.trim().is_empty() {
            return Some(decoded);
        }
    }

    if let Some(quoted) = QUOTED_FILENAME
        .captures(header)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str())
        .filter(|s| !s.trim().is_empty())
    {
        return Some(quoted.to_string());
    }

    BARE_FILENAME
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn percent_decode_lossy(encoded: &str) -> String {
    match urlencoding::decode(encoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(encoded.as_bytes()))
            .into_owned(),
    }
}

/// Sanitizes a header-derived filename for filesystem use.
///
/// Decodes a few HTML entities, then cleans the stem only (the extension is
/// reattached as-is): trim, drop `;` and `\ / * ? : " < > |`, collapse `..`,
/// drop trailing dots, cap at 240 characters. The stem is cut further when
/// needed so the whole name fits in 255 bytes.
///
/// The output never contains a path separator or `..`. The pass is repeated
/// until nothing changes, so `sanitize_filename(sanitize_filename(x)) ==
/// sanitize_filename(x)`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let mut current = sanitize_pass(name);
    loop {
        // Every pass that changes its input strictly shortens it.
        let next = sanitize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_pass(name: &str) -> String {
    let mut decoded = name.to_string();
    for (entity, replacement) in ENTITY_REPLACEMENTS {
        decoded = decoded.replace(entity, replacement);
    }

    let (stem, extension) = split_extension(&decoded);

    let mut stem: String = stem
        .trim()
        .chars()
        .filter(|c| *c != ';' && !RESERVED_CHARS.contains(c))
        .collect();
    while stem.contains("..") {
        stem = stem.replace("..", ".");
    }
    let stem = stem.trim_end_matches(|c: char| c == '.' || c.is_whitespace());
    let byte_budget = MAX_FILENAME_BYTES.saturating_sub(extension.len());
    let mut truncated = String::new();
    for c in stem.chars().take(MAX_STEM_CHARS) {
        if truncated.len() + c.len_utf8() > byte_budget {
            break;
        }
        truncated.push(c);
    }
    let stem = truncated.trim_end_matches(|c: char| c == '.' || c.is_whitespace());

    format!("{stem}{extension}")
}

/// Splits at the last `.` into `(stem, ".ext")`.
///
/// Only an alphanumeric suffix after a stem with at least one non-dot
/// character counts as an extension; otherwise the whole name is the stem.
pub(crate) fn split_extension(name: &str) -> (&str, &str) {
    let Some(dot) = name.rfind('.') else {
        return (name, "");
    };
    let (stem, extension) = name.split_at(dot);
    let suffix = &extension[1..];
    let has_stem = stem.chars().any(|c| c != '.');
    if has_stem && !suffix.is_empty() && suffix.chars().all(char::is_alphanumeric) {
        (stem, extension)
    } else {
        (name, "")
    }
}

/// Title and author shown on the per-ID status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookLabel {
    /// Text before the first `" - "` of the stem.
    pub title: String,
    /// Text after the first `" - "`, up to the first `_`.
    pub author: String,
}

impl BookLabel {
    /// Derives display fields from a resolved `Title - Author_<id>.ext` name.
    #[must_use]
    pub fn from_filename(filename: &str) -> Self {
        let (stem, _) = split_extension(filename);
        let mut parts = stem.split(" - ");
        let title = parts.next().unwrap_or_default().to_string();
        let author = parts
            .next()
            .and_then(|rest| rest.split('_').next())
            .unwrap_or(UNKNOWN_AUTHOR)
            .to_string();
        Self { title, author }
    }
}
