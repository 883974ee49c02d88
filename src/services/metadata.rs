//! Title and description extraction.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

/// Title used when a page declares none.
pub const NO_TITLE: &str = "No Title";

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").expect("static selector"));
static META_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).expect("static selector"));
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("static selector"));

/// Elements whose text is never shown to a reader.
const HIDDEN: [&str; 4] = ["script", "style", "noscript", "template"];

/// The page's declared title, trimmed, or [`NO_TITLE`].
pub fn title(document: &Html) -> String {
    document
        .select(&TITLE)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string())
}

/// The meta description, or else the first sentence of the visible text.
pub fn description(document: &Html) -> String {
    document
        .select(&META_DESCRIPTION)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| first_sentence(&visible_text(document)))
}

/// Visible text of the body, one space between text runs.
pub fn visible_text(document: &Html) -> String {
    let scope = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut parts = Vec::new();
    collect_text(scope, &mut parts);
    parts.join(" ")
}

fn collect_text<'a>(element: ElementRef<'a>, parts: &mut Vec<&'a str>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed);
                }
            }
            Node::Element(el) if HIDDEN.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, parts);
                }
            }
            _ => {}
        }
    }
}

/// Text up to the first `". "`, newlines flattened, ending in a period.
pub fn first_sentence(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    let segment = text.split(". ").next().unwrap_or(text);
    let mut sentence = segment.trim().replace(['\r', '\n'], " ");
    if !segment.contains('.') {
        sentence.push('.');
    }
    sentence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_trimmed() {
        let doc = Html::parse_document("<html><head><title>  Hello World \n</title></head></html>");
        assert_eq!(title(&doc), "Hello World");
    }

    #[test]
    fn test_title_missing() {
        let doc = Html::parse_document("<html><body><p>No head here</p></body></html>");
        assert_eq!(title(&doc), NO_TITLE);
    }

    #[test]
    fn test_description_prefers_meta() {
        let doc = Html::parse_document(
            r#"<html><head><meta name="description" content="  A site about birds. "></head>
            <body><p>Ignored text. More.</p></body></html>"#,
        );
        assert_eq!(description(&doc), "A site about birds.");
    }

    #[test]
    fn test_description_skips_empty_meta() {
        let doc = Html::parse_document(
            r#"<html><head><meta name="description" content="   "></head>
            <body><p>First sentence here. Second one.</p></body></html>"#,
        );
        assert_eq!(description(&doc), "First sentence here.");
    }

    #[test]
    fn test_visible_text_skips_scripts() {
        let doc = Html::parse_document(
            "<html><body><script>var x = 1;</script><h1>Title</h1><p>Body text</p><style>p{}</style></body></html>",
        );
        assert_eq!(visible_text(&doc), "Title Body text");
    }

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("One. Two. Three."), "One.");
        assert_eq!(first_sentence("No period here"), "No period here.");
        assert_eq!(first_sentence("Line one\nline two. Next"), "Line one line two.");
        assert_eq!(first_sentence("Version 1.2 released"), "Version 1.2 released");
        assert_eq!(first_sentence("   "), "");
    }
}
