use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::blocks::{BlockKind, ContentBlock};

static SKU_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Item\s*(No|Number|#)?:?\s*\d+").unwrap());
static HEADER_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z]+:$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Features,
    Includes,
    Description,
    Skip,
}

/// Which rule of the cascade decided a block's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    ListOrdinal,
    LeadingDash,
    MajorityDash,
    SkuLine,
    HeaderLine,
    Default,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedBlock {
    #[serde(flatten)]
    pub block: ContentBlock,
    pub role: Role,
    pub rule: Rule,
}

/// Classify every block in order, threading the count of list blocks seen
/// so far through the pass.
pub fn classify_blocks(blocks: Vec<ContentBlock>) -> Vec<ClassifiedBlock> {
    let mut out = Vec::with_capacity(blocks.len());
    blocks.into_iter().fold(0usize, |lists_seen, block| {
        let (role, rule) = classify_block(&block, lists_seen);
        let next = lists_seen + usize::from(block.kind == BlockKind::List);
        out.push(ClassifiedBlock { block, role, rule });
        next
    });
    out
}

/// First matching rule wins; order matters.
pub fn classify_block(block: &ContentBlock, prior_lists: usize) -> (Role, Rule) {
    if block.kind == BlockKind::List {
        let role = match prior_lists {
            0 => Role::Features,
            1 => Role::Includes,
            _ => Role::Description,
        };
        return (role, Rule::ListOrdinal);
    }

    if block.text.starts_with('-') {
        return (Role::Features, Rule::LeadingDash);
    }

    if is_mostly_dashed(&block.items) {
        return (Role::Features, Rule::MajorityDash);
    }

    if SKU_LINE_RE.is_match(&block.text) {
        return (Role::Skip, Rule::SkuLine);
    }

    if HEADER_LINE_RE.is_match(&block.text) {
        return (Role::Skip, Rule::HeaderLine);
    }

    (Role::Description, Rule::Default)
}

fn is_mostly_dashed(items: &[String]) -> bool {
    let non_empty: Vec<&String> = items.iter().filter(|i| !i.is_empty()).collect();
    if non_empty.is_empty() {
        return false;
    }
    let dashed = non_empty.iter().filter(|i| i.trim().starts_with('-')).count();
    dashed as f64 / non_empty.len() as f64 > 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(kind: BlockKind, text: &str, items: &[&str]) -> ContentBlock {
        ContentBlock {
            kind,
            tag: match kind {
                BlockKind::List => "UL",
                BlockKind::Paragraph => "P",
                BlockKind::Text => "#text",
            }
            .to_string(),
            text: text.to_string(),
            items: items.iter().map(|s| s.to_string()).collect(),
            position: 0,
        }
    }

    fn text(t: &str) -> ContentBlock {
        block(BlockKind::Text, t, &[t])
    }

    fn list(items: &[&str]) -> ContentBlock {
        block(BlockKind::List, &items.join("\n"), items)
    }

    #[test]
    fn list_ordinals() {
        let blocks = vec![
            list(&["a"]),
            text("prose"),
            list(&["b"]),
            list(&["c"]),
            list(&["-d"]),
        ];
        let roles: Vec<Role> = classify_blocks(blocks).iter().map(|b| b.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::Features,
                Role::Description,
                Role::Includes,
                Role::Description,
                Role::Description
            ]
        );
    }

    #[test]
    fn list_rule_ignores_content() {
        let sku_list = list(&["Item: 123"]);
        assert_eq!(classify_block(&sku_list, 0), (Role::Features, Rule::ListOrdinal));
        assert_eq!(classify_block(&sku_list, 1), (Role::Includes, Rule::ListOrdinal));
        assert_eq!(classify_block(&sku_list, 7), (Role::Description, Rule::ListOrdinal));
    }

    #[test]
    fn includes_header_is_skipped() {
        assert_eq!(classify_block(&text("Includes:"), 0), (Role::Skip, Rule::HeaderLine));
        assert_eq!(classify_block(&text("Features:"), 2), (Role::Skip, Rule::HeaderLine));
        assert_eq!(
            classify_block(&text("Includes: battery"), 0),
            (Role::Description, Rule::Default)
        );
    }

    #[test]
    fn sku_lines() {
        for t in ["Item: 12345", "item no: 576", "ITEM NUMBER 1", "Item #: 42", "Item 9"] {
            assert_eq!(classify_block(&text(t), 0), (Role::Skip, Rule::SkuLine), "{t}");
        }
        assert_eq!(classify_block(&text("Items ship free"), 0).0, Role::Description);
    }

    #[test]
    fn both_dash_rules_fire_leading_wins() {
        let b = block(BlockKind::Paragraph, "- Feature one- Feature two", &["- Feature one- Feature two"]);
        assert!(is_mostly_dashed(&b.items));
        assert_eq!(classify_block(&b, 0), (Role::Features, Rule::LeadingDash));
    }

    #[test]
    fn leading_dash_without_majority() {
        // "-a<br>b<br>c": text starts with a dash, only 1 of 3 items does
        let b = block(BlockKind::Paragraph, "-abc", &["-a", "b", "c"]);
        assert!(!is_mostly_dashed(&b.items));
        assert_eq!(classify_block(&b, 0), (Role::Features, Rule::LeadingDash));
    }

    #[test]
    fn majority_without_leading_dash() {
        // "Intro<br>-a<br>-b": joined text starts with a letter
        let b = block(BlockKind::Paragraph, "Intro-a-b", &["Intro", "-a", "-b"]);
        assert_eq!(classify_block(&b, 0), (Role::Features, Rule::MajorityDash));
    }

    #[test]
    fn half_dashed_is_not_majority() {
        let b = block(BlockKind::Paragraph, "Intro-a", &["Intro", "-a"]);
        assert_eq!(classify_block(&b, 0), (Role::Description, Rule::Default));
    }

    #[test]
    fn single_item_dash_text_fires_leading_rule() {
        let b = text("-Intro text without list items");
        assert_eq!(classify_block(&b, 0), (Role::Features, Rule::LeadingDash));
    }
}
