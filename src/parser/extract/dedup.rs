use crate::parser::roles::{ClassifiedBlock, Role};
use crate::parser::text::{norm, strip_dash};

/// Reference texts shorter than this never enter the set.
const MIN_REFERENCE_CHARS: usize = 10;

/// Normalized feature texts that description lines are checked against.
#[derive(Debug, Default)]
pub struct FeatureIndex {
    refs: Vec<String>,
}

impl FeatureIndex {
    pub fn from_blocks(blocks: &[ClassifiedBlock]) -> Self {
        let refs = blocks
            .iter()
            .filter(|b| b.role == Role::Features)
            .flat_map(|b| &b.block.items)
            .map(|item| norm(strip_dash(item)))
            .filter(|t| t.chars().count() > MIN_REFERENCE_CHARS)
            .collect();
        Self { refs }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Containment in either direction against any reference text.
    pub fn is_duplicate(&self, line: &str) -> bool {
        let n = norm(line);
        if n.chars().count() < MIN_REFERENCE_CHARS {
            return false;
        }
        self.refs
            .iter()
            .any(|r| n.contains(r.as_str()) || r.contains(n.as_str()))
    }

    /// Items that survive dedup, in order.
    pub fn retain<'a>(&self, items: &'a [String]) -> Vec<&'a str> {
        items
            .iter()
            .map(String::as_str)
            .filter(|i| !self.is_duplicate(i))
            .collect()
    }
}

/// Per-block description text after dedup. Blocks left with nothing are
/// dropped.
pub fn description_parts(blocks: &[ClassifiedBlock], index: &FeatureIndex) -> Vec<String> {
    blocks
        .iter()
        .filter(|b| b.role == Role::Description)
        .map(|b| index.retain(&b.block.items))
        .filter(|kept| !kept.is_empty())
        .map(|kept| kept.join(" "))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::blocks::{BlockKind, ContentBlock};
    use crate::parser::roles::Rule;

    fn classified(role: Role, items: &[&str]) -> ClassifiedBlock {
        ClassifiedBlock {
            block: ContentBlock {
                kind: BlockKind::Paragraph,
                tag: "P".to_string(),
                text: items.concat(),
                items: items.iter().map(|s| s.to_string()).collect(),
                position: 0,
            },
            role,
            rule: Rule::Default,
        }
    }

    #[test]
    fn short_features_not_referenced() {
        let blocks = vec![classified(Role::Features, &["- Light", "-  Brushless   EC-TEC motor"])];
        let index = FeatureIndex::from_blocks(&blocks);
        assert_eq!(index.len(), 1);
        assert!(index.is_duplicate("Brushless EC-TEC motor"));
        assert!(!index.is_duplicate("Light"));
    }

    #[test]
    fn containment_both_ways() {
        let blocks = vec![classified(Role::Features, &["Brushless EC-TEC motor"])];
        let index = FeatureIndex::from_blocks(&blocks);
        // description line extends the feature
        assert!(index.is_duplicate("The Brushless EC-TEC motor lasts for years"));
        // description line is a truncated copy
        assert!(index.is_duplicate("Brushless EC-TEC mot"));
        assert!(!index.is_duplicate("A compact drill for tight corners"));
    }

    #[test]
    fn description_items_filtered_and_joined() {
        let blocks = vec![
            classified(Role::Features, &["-Brushless EC-TEC motor"]),
            classified(
                Role::Description,
                &["Compact drill.", "Brushless EC-TEC motor", "Ships fast."],
            ),
            classified(Role::Description, &["Brushless  EC-TEC  motor"]),
            classified(Role::Skip, &["Item: 1"]),
        ];
        let index = FeatureIndex::from_blocks(&blocks);
        let parts = description_parts(&blocks, &index);
        assert_eq!(parts, vec!["Compact drill. Ships fast."]);
    }

    #[test]
    fn dedup_is_idempotent() {
        let blocks = vec![
            classified(Role::Features, &["Brushless EC-TEC motor", "Two 5.2Ah batteries"]),
            classified(
                Role::Description,
                &["Two 5.2Ah batteries included", "Great torque for decking", "short"],
            ),
        ];
        let index = FeatureIndex::from_blocks(&blocks);
        let once = index.retain(&blocks[1].block.items);
        let once_owned: Vec<String> = once.iter().map(|s| s.to_string()).collect();
        let twice = index.retain(&once_owned);
        assert_eq!(once, twice);
        assert_eq!(once, vec!["Great torque for decking", "short"]);
    }
}
