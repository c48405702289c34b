pub mod assemble;
pub mod dedup;
pub mod fallback;
pub mod fields;

use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::blocks;
use super::roles::{self, ClassifiedBlock};
use super::text;
use crate::config::CompiledSelectors;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub product_name: String,
    pub msrp: Option<String>,
    pub discounted_price: Option<String>,
    pub description: String,
    pub features: Vec<String>,
    pub whats_included: Vec<String>,
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedProduct {
    #[serde(flatten)]
    pub record: ProductRecord,
    pub scraped_at: String,
}

/// The JSON blob stored per successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOutput {
    pub total_products: usize,
    pub products: Vec<ScrapedProduct>,
    pub scraped_at: String,
    pub source: String,
}

impl ScrapeOutput {
    pub fn single(record: ProductRecord, source: &str, scraped_at: String) -> Self {
        Self {
            total_products: 1,
            products: vec![ScrapedProduct {
                record,
                scraped_at: scraped_at.clone(),
            }],
            scraped_at,
            source: source.to_string(),
        }
    }
}

/// Blocks of the description container, classified. Exposed for `extract
/// --blocks` diagnostics.
pub fn classified_blocks(doc: &Html, sel: &CompiledSelectors) -> Vec<ClassifiedBlock> {
    let root = doc.select(&sel.product).next();
    let container = root.and_then(|r| r.select(&sel.description).next());
    roles::classify_blocks(blocks::segment(container))
}

pub fn extract_product(doc: &Html, sel: &CompiledSelectors) -> ProductRecord {
    let root = doc.select(&sel.product).next();
    if root.is_none() {
        debug!("Product root not found; only name and price can be extracted");
    }

    let product_name = fields::product_name(doc, &sel.name);
    let prices = fields::prices(doc, &sel.price);
    let sku = fields::sku(root);

    let classified = classified_blocks(doc, sel);
    debug!("Classified {} description blocks", classified.len());
    for b in &classified {
        debug!(
            "  #{} {} {:?} -> {:?} ({:?})",
            b.block.position, b.block.tag, b.block.kind, b.role, b.rule
        );
    }
    let assembled = assemble::assemble(&classified);

    let mut features = assembled.features;
    let mut whats_included = assembled.includes;

    if let Some(root) = root {
        if features.is_empty() {
            features = fallback::first_list_features(root);
            debug!("Features fallback produced {} lines", features.len());
        }
        if whats_included.is_empty() {
            whats_included = fallback::includes_from_text(&text::rendered_text(root));
            debug!("Includes fallback produced {} lines", whats_included.len());
        }
    }

    let description = assemble::finish_description(&assembled.description, &features);

    ProductRecord {
        product_name,
        msrp: prices.msrp,
        discounted_price: prices.discounted,
        description,
        features,
        whats_included,
        sku,
    }
}
