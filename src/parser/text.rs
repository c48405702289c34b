use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node};

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "thead", "tfoot", "tr",
    "ul",
];
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// A direct child of an element, reduced to what the segmenter cares about.
#[derive(Clone, Copy)]
pub enum Child<'a> {
    Element(ElementRef<'a>),
    Text(&'a str),
}

/// Element and text children in document order. Comments and other node
/// kinds are dropped.
pub fn children(el: ElementRef<'_>) -> Vec<Child<'_>> {
    el.children()
        .filter_map(|node| match node.value() {
            Node::Text(t) => Some(Child::Text(&**t)),
            Node::Element(_) => ElementRef::wrap(node).map(Child::Element),
            _ => None,
        })
        .collect()
}

/// Concatenated text of every descendant text node, trimmed.
pub fn text_content(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Uppercase tag name, the form used for block diagnostics.
pub fn tag_name(el: ElementRef<'_>) -> String {
    el.value().name().to_ascii_uppercase()
}

/// Text as a browser would lay it out: whitespace runs collapsed, block
/// elements and `<br>` on their own lines, hidden elements dropped.
pub fn rendered_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    render_into(el, &mut out);
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_into(el: ElementRef<'_>, out: &mut String) {
    let name = el.value().name();
    if HIDDEN_TAGS.contains(&name) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }
    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in children(el) {
        match child {
            Child::Text(t) => out.push_str(&WS_RE.replace_all(t, " ")),
            Child::Element(e) => render_into(e, out),
        }
    }
    if block {
        out.push('\n');
    }
}

/// Collapse internal whitespace to single spaces and trim.
pub fn norm(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}

/// Remove one leading `-` and the whitespace after it.
pub fn strip_dash(s: &str) -> &str {
    match s.strip_prefix('-') {
        Some(rest) => rest.trim_start(),
        None => s,
    }
}

/// Cut `s` to at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(css).unwrap()).next().unwrap()
    }

    #[test]
    fn rendered_text_breaks_blocks() {
        let doc = Html::parse_fragment(
            "<div id=r><h1>Drill</h1><p>Includes:<br>Battery</p><ul><li>Case</li><li>Bit</li></ul><script>x()</script></div>",
        );
        let text = rendered_text(first(&doc, "#r"));
        assert_eq!(text, "Drill\nIncludes:\nBattery\nCase\nBit");
    }

    #[test]
    fn rendered_text_collapses_inline_whitespace() {
        let doc = Html::parse_fragment("<div id=r><span>Item:</span>\n   <b>574</b></div>");
        assert_eq!(rendered_text(first(&doc, "#r")), "Item: 574");
    }

    #[test]
    fn children_skips_comments() {
        let doc = Html::parse_fragment("<div id=r>a<!-- c --><p>b</p></div>");
        let kids = children(first(&doc, "#r"));
        assert_eq!(kids.len(), 2);
        assert!(matches!(kids[0], Child::Text("a")));
        assert!(matches!(kids[1], Child::Element(e) if e.value().name() == "p"));
    }

    #[test]
    fn strip_dash_once() {
        assert_eq!(strip_dash("- Motor"), "Motor");
        assert_eq!(strip_dash("--Motor"), "-Motor");
        assert_eq!(strip_dash("Motor"), "Motor");
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn norm_collapses() {
        assert_eq!(norm("  a \n\t b  "), "a b");
    }
}
