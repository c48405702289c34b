use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::parser::text;

use super::assemble::CART_NOISE;

static LIST_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("ul, ol").unwrap());
static LI_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());
static INCLUDES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Includes[:\s]+([\s\S]*?)(?:Part number|$)").unwrap());
static NOISE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s\x{2022}\-*]*$|^\d+$").unwrap());

/// `<li>` texts of the first list anywhere under the product root.
pub fn first_list_features(root: ElementRef<'_>) -> Vec<String> {
    let Some(list) = root.select(&LIST_SEL).next() else {
        return Vec::new();
    };
    list.select(&LI_SEL)
        .map(text::text_content)
        .filter(|t| !t.is_empty() && !t.contains(CART_NOISE))
        .collect()
}

/// Lines following an "Includes" label in the root's rendered text, up to
/// "Part number" or the end.
pub fn includes_from_text(rendered: &str) -> Vec<String> {
    let Some(caps) = INCLUDES_RE.captures(rendered) else {
        return Vec::new();
    };
    caps[1]
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty() && !NOISE_LINE_RE.is_match(l))
        .map(str::to_string)
        .collect()
}
