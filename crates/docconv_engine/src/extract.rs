use scraper::{Html, Selector};

use crate::{FailureKind, PipelineError};

/// Parse a caller-supplied selector, reporting syntax errors as a selector miss
/// for the URL being processed.
pub fn parse_selector(url: &str, selector: &str) -> Result<Selector, PipelineError> {
    Selector::parse(selector).map_err(|err| {
        PipelineError::new(
            FailureKind::SelectorMiss,
            format!("could not find content in {url} using selector '{selector}': {err}"),
        )
    })
}

/// Inner HTML of the first element matching `selector`.
pub fn extract_content(
    doc: &Html,
    url: &str,
    selector_text: &str,
    selector: &Selector,
) -> Result<String, PipelineError> {
    doc.select(selector)
        .next()
        .map(|node| node.inner_html())
        .ok_or_else(|| {
            PipelineError::new(
                FailureKind::SelectorMiss,
                format!("could not find content in {url} using selector '{selector_text}'"),
            )
        })
}
