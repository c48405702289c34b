use std::sync::LazyLock;

use regex::Regex;

use crate::parser::blocks::BlockKind;
use crate::parser::roles::{ClassifiedBlock, Role};
use crate::parser::text::{strip_dash, truncate_chars};

use super::dedup::{self, FeatureIndex};

pub const MAX_DESCRIPTION_CHARS: usize = 1000;
pub const CART_NOISE: &str = "ADD TO CART";

// Two feature sentences glued as "first.-Second"
static JOINED_FEATURE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.-[A-Z]").unwrap());

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub features: Vec<String>,
    pub includes: Vec<String>,
    pub description: String,
}

pub fn assemble(blocks: &[ClassifiedBlock]) -> Assembled {
    let mut features = Vec::new();
    let mut includes = Vec::new();

    for b in blocks {
        match b.role {
            Role::Features => push_features(b, &mut features),
            Role::Includes => includes.extend(b.block.items.iter().cloned()),
            Role::Description | Role::Skip => {}
        }
    }

    let index = FeatureIndex::from_blocks(blocks);
    tracing::debug!("Feature reference set: {} entries", index.len());
    let description = dedup::description_parts(blocks, &index).join("\n\n");

    Assembled {
        features: clean_features(features),
        includes: includes
            .into_iter()
            .filter(|i| !i.trim().is_empty())
            .collect(),
        description,
    }
}

fn push_features(b: &ClassifiedBlock, out: &mut Vec<String>) {
    match b.block.kind {
        BlockKind::List => out.extend(b.block.items.iter().cloned()),
        BlockKind::Paragraph => {
            for item in &b.block.items {
                let pieces = if item.starts_with('-') {
                    split_joined(item)
                } else {
                    vec![item.as_str()]
                };
                out.extend(
                    pieces
                        .into_iter()
                        .map(|p| strip_dash(p.trim()).to_string())
                        .filter(|p| !p.is_empty()),
                );
            }
        }
        BlockKind::Text => {
            let cleaned = strip_dash(&b.block.text);
            if !cleaned.is_empty() {
                out.push(cleaned.to_string());
            }
        }
    }
}

/// Split `"-One.-Two"` after each period that is followed by `-` and a
/// capital, keeping the period on the left piece.
pub fn split_joined(item: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for m in JOINED_FEATURE_RE.find_iter(item) {
        let end = m.start() + 1;
        pieces.push(&item[start..end]);
        start = end;
    }
    pieces.push(&item[start..]);
    pieces
}

/// Drop blank lines and cart-button noise.
pub fn clean_features(features: Vec<String>) -> Vec<String> {
    features
        .into_iter()
        .filter(|f| !f.trim().is_empty() && !f.contains(CART_NOISE))
        .collect()
}

/// Cut the description just before the first place any feature text shows
/// up verbatim, then cap its length.
pub fn finish_description(description: &str, features: &[String]) -> String {
    let mut description = description;
    if !features.is_empty() && !description.is_empty() {
        let cut = features
            .iter()
            .filter(|f| !f.is_empty())
            .filter_map(|f| description.find(f.as_str()))
            .min();
        if let Some(cut) = cut {
            description = description[..cut].trim();
        }
    }
    truncate_chars(description, MAX_DESCRIPTION_CHARS).to_string()
}
