use crate::metadata::PageMetadata;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrontmatterError {
    #[error("metadata key {0:?} is not a plain YAML key")]
    InvalidKey(String),
}

/// `---\n<yaml>---\n\n<body>`
pub fn build_markdown_document(
    metadata: &PageMetadata,
    body_markdown: &str,
) -> Result<String, FrontmatterError> {
    let yaml = metadata_to_yaml(metadata)?;
    Ok(format!("---\n{yaml}---\n\n{body_markdown}"))
}

/// One `key: value` line per entry, in key order, each line newline-terminated.
pub fn metadata_to_yaml(metadata: &PageMetadata) -> Result<String, FrontmatterError> {
    let mut out = String::new();
    for (key, value) in metadata.iter() {
        if !is_plain_key(key) {
            return Err(FrontmatterError::InvalidKey(key.to_string()));
        }
        out.push_str(key);
        out.push_str(": ");
        write_yaml_scalar(&mut out, value);
        out.push('\n');
    }
    Ok(out)
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn write_yaml_scalar(out: &mut String, value: &str) {
    if needs_quotes(value) {
        out.push('"');
        for ch in value.chars() {
            match ch {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        }
        out.push('"');
    } else {
        out.push_str(value);
    }
}

/// Whether a value would not round-trip as a plain YAML string.
fn needs_quotes(value: &str) -> bool {
    const INDICATORS: &[char] = &[
        '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%',
        '@', '`',
    ];
    const RESERVED: &[&str] = &["true", "false", "yes", "no", "on", "off", "null", "~"];

    let Some(first) = value.chars().next() else {
        return true;
    };
    value.trim() != value
        || INDICATORS.contains(&first)
        || first.is_ascii_digit()
        || value.ends_with(':')
        || value.contains(": ")
        || value.contains(" #")
        || value.chars().any(char::is_control)
        || RESERVED.iter().any(|r| r.eq_ignore_ascii_case(value))
}
