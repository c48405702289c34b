use anyhow::{anyhow, Result};
use scraper::Selector;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DB_PATH: &str = "data/recon.sqlite";

/// How the page HTML is obtained before extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Plain HTTP GET; enough for server-rendered storefronts.
    Direct,
    /// spider.cloud raw HTML, for pages that need a rendering pass.
    Spider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selectors {
    pub product: String,
    pub name: String,
    pub price: String,
    pub description: String,
}

/// A scrape job definition. Stored as JSON in `jobs.config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub slug: String,
    pub url: String,
    pub frequency_hours: f64,
    pub enabled: bool,
    pub selectors: Selectors,
    pub fetch: FetchMode,
}

impl ScraperConfig {
    pub fn festoolrecon() -> Self {
        Self {
            slug: "festoolrecon".to_string(),
            url: "https://festoolrecon.com".to_string(),
            frequency_hours: 4.0,
            enabled: true,
            selectors: Selectors {
                product: r#"[data-section-type="product"]"#.to_string(),
                name: r#"[data-section-type="product"] h1"#.to_string(),
                price: ".product-single__price-product-template".to_string(),
                description: ".product-single__description.rte".to_string(),
            },
            fetch: FetchMode::Direct,
        }
    }
}

/// Parsed form of [`Selectors`]; built once per run.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub product: Selector,
    pub name: Selector,
    pub price: Selector,
    pub description: Selector,
}

impl CompiledSelectors {
    pub fn new(s: &Selectors) -> Result<Self> {
        Ok(Self {
            product: parse_selector("product", &s.product)?,
            name: parse_selector("name", &s.name)?,
            price: parse_selector("price", &s.price)?,
            description: parse_selector("description", &s.description)?,
        })
    }
}

fn parse_selector(field: &str, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid {} selector {:?}: {}", field, css, e))
}
