use std::collections::BTreeMap;

use scraper::{Html, Selector};

pub const SOURCE: &str = "source";
pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const KEYWORDS: &str = "keywords";
pub const RETRIEVED_AT: &str = "retrieved_at";

/// String-keyed page metadata, ordered by key so frontmatter output is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    fields: BTreeMap<String, String>,
}

impl PageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Collect `source`, plus `title`, `description` and `keywords` when present.
/// Never fails; missing fields are simply left out.
pub fn extract_metadata(doc: &Html, source_url: &str) -> PageMetadata {
    let mut metadata = PageMetadata::new();
    metadata.insert(SOURCE, source_url);

    if let Some(title) = page_title(doc) {
        metadata.insert(TITLE, title);
    }
    if let Some(description) = meta_content(doc, "description") {
        metadata.insert(DESCRIPTION, description);
    }
    if let Some(keywords) = meta_content(doc, "keywords") {
        metadata.insert(KEYWORDS, keywords);
    }
    metadata
}

/// Trimmed text of the document's `<title>`, or `None` when empty.
pub fn page_title(doc: &Html) -> Option<String> {
    let sel = Selector::parse("title").ok()?;
    let title: String = doc.select(&sel).flat_map(|t| t.text()).collect();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

// Later tags override earlier ones.
fn meta_content(doc: &Html, name: &str) -> Option<String> {
    let sel = Selector::parse(&format!(r#"meta[name="{name}"]"#)).ok()?;
    doc.select(&sel)
        .filter_map(|meta| meta.value().attr("content"))
        .last()
        .map(str::to_string)
}
