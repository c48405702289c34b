use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::parser::text;

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$[\d,]+\.\d{2}").unwrap());
static SKU_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Item\s*(?:No|Number|#)?:?\s*(\d+)").unwrap());

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PricePair {
    pub msrp: Option<String>,
    pub discounted: Option<String>,
}

/// First heading match, trimmed. Empty when missing.
pub fn product_name(doc: &Html, name: &Selector) -> String {
    doc.select(name)
        .next()
        .map(text::text_content)
        .unwrap_or_default()
}

pub fn prices(doc: &Html, price: &Selector) -> PricePair {
    doc.select(price)
        .next()
        .map(|el| parse_prices(&el.text().collect::<String>()))
        .unwrap_or_default()
}

/// Two or more amounts: list price then sale price. A single amount is the
/// sale price.
pub fn parse_prices(text: &str) -> PricePair {
    let found: Vec<&str> = PRICE_RE.find_iter(text).map(|m| m.as_str()).collect();
    match found.as_slice() {
        [] => PricePair::default(),
        [only] => PricePair {
            msrp: None,
            discounted: Some(only.to_string()),
        },
        [first, second, ..] => PricePair {
            msrp: Some(first.to_string()),
            discounted: Some(second.to_string()),
        },
    }
}

pub fn sku(root: Option<ElementRef<'_>>) -> Option<String> {
    root.and_then(|r| find_sku(&text::rendered_text(r)))
}

pub fn find_sku(text: &str) -> Option<String> {
    SKU_RE.captures(text).map(|c| c[1].to_string())
}
