use docconv_engine::{
    decode_html, extract_content, extract_metadata, page_title, parse_selector, FailureKind,
    MarkdownRenderer, SimpleMarkdownRenderer,
};
use pretty_assertions::assert_eq;
use scraper::Html;

fn render(html: &str) -> String {
    SimpleMarkdownRenderer.to_markdown(html)
}

#[test]
fn headings_paragraphs_and_inline_links() {
    let md = render(r#"<h1>Title</h1><p>Body <a href="https://x">link</a></p>"#);
    assert_eq!(md, "# Title\n\nBody [link](https://x)");
}

#[test]
fn anchors_without_href_render_as_text() {
    let md = render(r#"<p>See <a name="here">this part</a> now</p>"#);
    assert_eq!(md, "See this part now");
}

#[test]
fn text_outside_rendered_tags_is_dropped() {
    let md = render(
        r#"<div>loose text<ul><li>item</li></ul><h2>Kept</h2><span>ignored</span><p>Also kept</p></div>"#,
    );
    assert_eq!(md, "## Kept\n\nAlso kept");
}

#[test]
fn standalone_links_are_emitted_in_document_order() {
    let md = render(
        r#"<nav><a href="/a">First</a><a href="/b">Second</a></nav><p>After</p>"#,
    );
    assert_eq!(md, "[First](/a) [Second](/b)\n\nAfter");
}

#[test]
fn falls_back_to_flattened_text_when_no_tags_match() {
    let md = render("<div>  just <span>some</span> text  </div>");
    assert_eq!(md, "just some text");
}

#[test]
fn empty_and_whitespace_elements_produce_nothing() {
    let md = render("<p>   </p><h1></h1><div>\n\n</div>");
    assert_eq!(md, "");
}

#[test]
fn output_never_contains_three_newlines() {
    let html = "<p>a</p>\n\n\n<p></p><p>b</p><div><pre>x\n\n\n\ny</pre></div>";
    let md = render(html);
    assert!(!md.contains("\n\n\n"), "{md:?}");
    assert_eq!(md, "a\n\nb");

    let fallback = render("<pre>x\n\n\n\ny</pre>");
    assert_eq!(fallback, "x\n\ny");
}

#[test]
fn whitespace_inside_paragraphs_is_collapsed() {
    let md = render("<p>one\n   two<br>three</p>");
    assert_eq!(md, "one two three");
}

#[test]
fn selector_extracts_first_match_and_misses_fail() {
    let doc = Html::parse_document(
        r#"<html><body><nav>menu</nav><main id="content"><h1>Doc</h1></main></body></html>"#,
    );
    let url = "https://example.com/doc";

    let sel = parse_selector(url, "#content").unwrap();
    let html = extract_content(&doc, url, "#content", &sel).unwrap();
    assert_eq!(html, "<h1>Doc</h1>");

    let missing = parse_selector(url, "#nonexistent").unwrap();
    let err = extract_content(&doc, url, "#nonexistent", &missing).unwrap_err();
    assert_eq!(err.kind, FailureKind::SelectorMiss);
    assert!(err.message.contains(url));
    assert!(err.message.contains("#nonexistent"));
}

#[test]
fn metadata_collects_known_fields_only() {
    let doc = Html::parse_document(
        r#"<html><head>
            <title>  Guide  </title>
            <meta name="description" content="How to do it">
            <meta name="keywords" content="rust, docs">
            <meta name="author" content="someone">
        </head><body></body></html>"#,
    );
    let meta = extract_metadata(&doc, "https://example.com/guide");

    assert_eq!(meta.get("source"), Some("https://example.com/guide"));
    assert_eq!(meta.get("title"), Some("Guide"));
    assert_eq!(meta.get("description"), Some("How to do it"));
    assert_eq!(meta.get("keywords"), Some("rust, docs"));
    assert_eq!(meta.get("author"), None);
    assert_eq!(meta.len(), 4);
}

#[test]
fn metadata_omits_absent_fields() {
    let doc = Html::parse_document(
        r#"<html><head><title>   </title><meta name="description"></head></html>"#,
    );
    let meta = extract_metadata(&doc, "https://example.com/");
    assert_eq!(page_title(&doc), None);
    assert_eq!(meta.len(), 1);
    assert_eq!(meta.get("source"), Some("https://example.com/"));
}

#[test]
fn decode_respects_charset_header() {
    let bytes = b"caf\xe9";
    let decoded = decode_html(bytes, Some("text/html; charset=ISO-8859-1"));
    assert_eq!(decoded.html, "café");
}

#[test]
fn decode_strips_utf8_bom() {
    let decoded = decode_html(b"\xEF\xBB\xBFhello", Some("text/html"));
    assert_eq!(decoded.html, "hello");
    assert_eq!(decoded.encoding_label, "UTF-8");
}

#[test]
fn decode_uses_meta_charset_without_header() {
    let bytes = b"<html><head><meta charset=\"windows-1252\"></head><body>na\xefve</body></html>";
    let decoded = decode_html(bytes, None);
    assert!(decoded.html.contains("naïve"));
    assert_eq!(decoded.encoding_label, "windows-1252");
}
