use scraper::ElementRef;
use serde::Serialize;

use super::text::{self, Child};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    List,
    Paragraph,
    Text,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentBlock {
    pub kind: BlockKind,
    /// Originating tag (`UL`, `OL`, `P`, `#text`). Diagnostics only.
    pub tag: String,
    pub text: String,
    pub items: Vec<String>,
    pub position: usize,
}

/// Walk the description container's children in order and emit one block
/// per recognized node. Unrecognized elements are opened exactly one level.
pub fn segment(container: Option<ElementRef<'_>>) -> Vec<ContentBlock> {
    let Some(container) = container else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    for child in text::children(container) {
        if let Some(block) = extract_block(child, blocks.len()) {
            blocks.push(block);
            continue;
        }

        // Wrapper (div, span, ...) around the real content
        if let Child::Element(el) = child {
            for grandchild in text::children(el) {
                if let Some(inner) = extract_block(grandchild, blocks.len()) {
                    blocks.push(inner);
                }
            }
        }
    }
    blocks
}

fn extract_block(child: Child<'_>, position: usize) -> Option<ContentBlock> {
    match child {
        Child::Text(raw) => {
            let text = raw.trim();
            if text.is_empty() {
                return None;
            }
            Some(ContentBlock {
                kind: BlockKind::Text,
                tag: "#text".to_string(),
                text: text.to_string(),
                items: vec![text.to_string()],
                position,
            })
        }
        Child::Element(el) => {
            let text = text::text_content(el);
            if text.is_empty() {
                return None;
            }
            let (kind, items) = match el.value().name() {
                "ul" | "ol" => (BlockKind::List, list_items(el)),
                "p" => (BlockKind::Paragraph, paragraph_lines(el)),
                _ => return None,
            };
            Some(ContentBlock {
                kind,
                tag: text::tag_name(el),
                text,
                items,
                position,
            })
        }
    }
}

/// Every descendant `<li>`, nested lists included.
fn list_items(el: ElementRef<'_>) -> Vec<String> {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "li")
        .map(text::text_content)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Paragraph text split at every `<br>`, at any depth.
fn paragraph_lines(el: ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for node in el.descendants().skip(1) {
        match node.value() {
            scraper::Node::Text(t) => current.push_str(t),
            scraper::Node::Element(e) if e.name() == "br" => {
                lines.push(std::mem::take(&mut current));
            }
            _ => {}
        }
    }
    lines.push(current);

    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn blocks_of(html: &str) -> Vec<ContentBlock> {
        let doc = Html::parse_fragment(&format!("<div class=desc>{}</div>", html));
        let sel = Selector::parse(".desc").unwrap();
        segment(doc.select(&sel).next())
    }

    #[test]
    fn absent_container() {
        assert!(segment(None).is_empty());
    }

    #[test]
    fn list_paragraph_text() {
        let blocks = blocks_of("<ul><li>A</li><li> B </li></ul><p>one<br>two<br/></p>tail");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].kind, BlockKind::List);
        assert_eq!(blocks[0].tag, "UL");
        assert_eq!(blocks[0].items, vec!["A", "B"]);
        assert_eq!(blocks[1].kind, BlockKind::Paragraph);
        assert_eq!(blocks[1].items, vec!["one", "two"]);
        assert_eq!(blocks[1].text, "onetwo");
        assert_eq!(blocks[2].kind, BlockKind::Text);
        assert_eq!(blocks[2].tag, "#text");
        assert_eq!(blocks[2].items, vec!["tail"]);
        let positions: Vec<_> = blocks.iter().map(|b| b.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn nested_list_items_included() {
        let blocks = blocks_of("<ol><li>Outer<ul><li>Inner</li></ul></li><li></li></ol>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].items, vec!["OuterInner", "Inner"]);
    }

    #[test]
    fn paragraph_strips_inline_markup() {
        let blocks = blocks_of("<p><strong>Bold</strong> start<br><span>x<br>y</span></p>");
        assert_eq!(blocks[0].items, vec!["Bold start", "x", "y"]);
    }

    #[test]
    fn wrapper_opened_one_level() {
        let blocks = blocks_of(
            "<p>first</p><div><ul><li>Feat</li></ul><p>para</p><div><p>too deep</p></div></div>",
        );
        let tags: Vec<_> = blocks.iter().map(|b| b.tag.as_str()).collect();
        assert_eq!(tags, vec!["P", "UL", "P"]);
        let positions: Vec<_> = blocks.iter().map(|b| b.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn empty_nodes_skipped() {
        let blocks = blocks_of("   <p> </p><ul><li></li></ul><span></span>\n");
        assert!(blocks.is_empty());
    }

    #[test]
    fn list_with_blank_items_only_text() {
        // text comes from a non-li child, so the block exists with no items
        let blocks = blocks_of("<ul>stray<li> </li></ul>");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].items.is_empty());
    }
}
