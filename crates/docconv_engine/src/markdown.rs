//! Simplified HTML to Markdown rendering.
//!
//! Only headings, paragraphs and links produce output; everything else is
//! walked for nested content but contributes no text of its own.

use std::sync::LazyLock;

use ego_tree::NodeRef;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

static BLANK_LINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("static regex"));

pub trait MarkdownRenderer: Send + Sync {
    fn to_markdown(&self, html: &str) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleMarkdownRenderer;

impl MarkdownRenderer for SimpleMarkdownRenderer {
    fn to_markdown(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let scope = Selector::parse("body")
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .unwrap_or_else(|| document.root_element());

        let mut out = String::new();
        for child in scope.children() {
            visit_block(child, &mut out);
        }

        if out.trim().is_empty() {
            out = scope.text().collect::<String>().trim().to_string();
        }

        collapse_blank_lines(&out)
    }
}

/// Collapse runs of blank lines into a single blank line and trim the ends.
pub fn collapse_blank_lines(markdown: &str) -> String {
    BLANK_LINE_RUNS
        .replace_all(markdown, "\n\n")
        .trim()
        .to_string()
}

fn visit_block(node: NodeRef<'_, Node>, out: &mut String) {
    let Some(element) = ElementRef::wrap(node) else {
        // Bare text outside the rendered tag set is dropped.
        return;
    };
    let tag = element.value().name();
    match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let text = inline_text(element);
            if !text.is_empty() {
                let level = usize::from(tag.as_bytes()[1] - b'0');
                start_block(out);
                out.push_str(&"#".repeat(level));
                out.push(' ');
                out.push_str(&text);
                out.push_str("\n\n");
            }
        }
        "p" => {
            let text = inline_text(element);
            if !text.is_empty() {
                start_block(out);
                out.push_str(&text);
                out.push_str("\n\n");
            }
        }
        "a" => {
            let mut buf = InlineBuffer::default();
            buf.push_anchor(element);
            let text = buf.finish();
            if !text.is_empty() {
                if out.chars().last().is_some_and(|c| !c.is_whitespace()) {
                    out.push(' ');
                }
                out.push_str(&text);
            }
        }
        "head" | "script" | "style" | "noscript" | "template" => {}
        _ => {
            for child in element.children() {
                visit_block(child, out);
            }
        }
    }
}

/// Separate a block from preceding inline output (a run of bare links).
fn start_block(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push_str("\n\n");
    }
}

fn inline_text(element: ElementRef<'_>) -> String {
    let mut buf = InlineBuffer::default();
    buf.push_children(element);
    buf.finish()
}

/// Accumulates inline text with whitespace runs collapsed to one space.
#[derive(Default)]
struct InlineBuffer {
    text: String,
}

impl InlineBuffer {
    fn push_children(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.push_text(text),
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.push_element(el);
                    }
                }
                _ => {}
            }
        }
    }

    fn push_element(&mut self, element: ElementRef<'_>) {
        match element.value().name() {
            "a" => self.push_anchor(element),
            "br" => self.push_text(" "),
            "script" | "style" | "noscript" | "template" => {}
            _ => self.push_children(element),
        }
    }

    fn push_anchor(&mut self, element: ElementRef<'_>) {
        let mut label = InlineBuffer::default();
        label.push_children(element);
        let label = label.finish();
        if label.is_empty() {
            return;
        }
        match element.value().attr("href") {
            Some(href) => self.push_text(&format!("[{label}]({})", href.trim())),
            None => self.push_text(&label),
        }
    }

    fn push_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !self.text.ends_with(' ') {
                    self.text.push(' ');
                }
            } else {
                self.text.push(ch);
            }
        }
    }

    fn finish(self) -> String {
        self.text.trim().to_string()
    }
}
