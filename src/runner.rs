use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::{CompiledSelectors, ScraperConfig};
use crate::db;
use crate::fetch;
use crate::parser;
use crate::parser::extract::ScrapeOutput;

/// Why a run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Scheduled => "scheduled",
            Trigger::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    Run,
    Skip(String),
}

/// Scheduled runs wait out `frequency_hours` since the last success.
/// Manual runs always go.
pub fn check_gate(
    trigger: Trigger,
    enabled: bool,
    frequency_hours: f64,
    last_success: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Gate {
    if trigger == Trigger::Manual {
        return Gate::Run;
    }
    if !enabled {
        return Gate::Skip("job is disabled".to_string());
    }
    let Some(last) = last_success else {
        return Gate::Run;
    };
    let hours = (now - last).num_milliseconds() as f64 / 3_600_000.0;
    if hours < frequency_hours {
        Gate::Skip(format!(
            "only {:.1}h since last run (frequency: {}h)",
            hours, frequency_hours
        ))
    } else {
        Gate::Run
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Skipped(String),
    Succeeded { run_id: i64, products: usize },
    Failed { run_id: i64, error: String },
}

pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// gate → job → run → fetch → extract → persist.
pub async fn execute(
    conn: &Connection,
    config: &ScraperConfig,
    trigger: Trigger,
) -> Result<RunOutcome> {
    let selectors = CompiledSelectors::new(&config.selectors)?;
    let job = db::ensure_job(conn, config)?;
    info!("[{}] Job ensured: id={}", config.slug, job.id);

    let last = db::last_success_at(conn, job.id)?;
    if let Gate::Skip(reason) = check_gate(trigger, job.enabled, job.frequency_hours, last, Utc::now()) {
        info!("[{}] Skipping: {}", config.slug, reason);
        return Ok(RunOutcome::Skipped(reason));
    }

    let run_id = db::record_run_start(conn, job.id, trigger.as_str())?;
    info!("[{}] Run created: id={} ({})", config.slug, run_id, trigger.as_str());

    let scraped = scrape(conn, config, &selectors).await;
    complete_run(conn, &config.slug, run_id, scraped)
}

/// Settle a started run. Any error, including one while persisting the
/// result, leaves the run `failed` rather than `running`.
fn complete_run(
    conn: &Connection,
    slug: &str,
    run_id: i64,
    scraped: Result<(String, ScrapeOutput)>,
) -> Result<RunOutcome> {
    let persisted = scraped.and_then(|(hash, output)| {
        let data = serde_json::to_string(&output)?;
        db::record_run_success(conn, run_id, Some(&hash), output.total_products, &data)?;
        Ok(output.total_products)
    });

    match persisted {
        Ok(products) => {
            info!("[{}] Success: {} product(s) found", slug, products);
            Ok(RunOutcome::Succeeded { run_id, products })
        }
        Err(e) => {
            let error = format!("{:#}", e);
            db::record_run_failure(conn, run_id, &error)?;
            warn!("[{}] Failed: {}", slug, error);
            Ok(RunOutcome::Failed { run_id, error })
        }
    }
}

async fn scrape(
    conn: &Connection,
    config: &ScraperConfig,
    selectors: &CompiledSelectors,
) -> Result<(String, ScrapeOutput)> {
    info!("[{}] Scraping {}...", config.slug, config.url);
    let page = fetch::fetch_page(&config.url, config.fetch).await?;
    info!(
        "[{}] Page fetched: {} chars HTML, status {:?}, {} ms",
        config.slug,
        page.html.len(),
        page.status,
        page.latency_ms
    );

    let name = format!("{}.html", config.slug);
    let hash = db::put_file(conn, &name, "text/html", page.html.as_bytes())?;
    info!("[{}] Snapshot stored: {}...", config.slug, &hash[..12]);

    let record = parser::process_html(&page.html, selectors);
    Ok((hash, ScrapeOutput::single(record, &config.url, timestamp(Utc::now()))))
}
