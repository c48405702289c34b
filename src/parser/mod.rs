pub mod blocks;
pub mod extract;
pub mod roles;
pub mod text;

use scraper::Html;

use crate::config::CompiledSelectors;
use extract::ProductRecord;

/// Pipeline: html → blocks → roles → product record.
pub fn process_html(html: &str, selectors: &CompiledSelectors) -> ProductRecord {
    let doc = Html::parse_document(html);
    extract::extract_product(&doc, selectors)
}
