use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9_]+").expect("static regex"));

const FALLBACK_NAME: &str = "untitled";

/// Lowercase, spaces to underscores, then drop everything outside `[a-z0-9_]`.
pub fn sanitize_filename(input: &str) -> String {
    let lowered = input.to_lowercase().replace(' ', "_");
    DISALLOWED.replace_all(&lowered, "").into_owned()
}

/// `{name}.md` where `name` comes from the title, else the last non-empty URL
/// path segment, else `untitled`. Deterministic for a given title and URL.
pub fn document_filename(title: Option<&str>, url: &str) -> String {
    let name = title
        .map(|title| sanitize_filename(title.trim()))
        .filter(|name| !name.is_empty())
        .or_else(|| last_path_segment(url).map(|segment| sanitize_filename(&segment)))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());
    format!("{name}.md")
}

fn last_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()?;
    Some(segment.to_string())
}
