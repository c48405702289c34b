mod config;
mod db;
mod fetch;
mod parser;
mod runner;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use config::{CompiledSelectors, ScraperConfig};
use parser::extract::{ProductRecord, ScrapeOutput};
use runner::{RunOutcome, Trigger};

#[derive(Parser)]
#[command(name = "recon_scraper", about = "Festool Recon deal scraper")]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, env = "RECON_DB", default_value = config::DEFAULT_DB_PATH)]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the product page, extract it, and record the run
    Run {
        /// Scheduled runs are skipped until the job frequency has elapsed
        #[arg(short, long, value_enum, default_value = "manual")]
        trigger: Trigger,
    },
    /// Extract a product record from a local HTML file (no database)
    Extract {
        file: PathBuf,
        /// Print the classified description blocks instead of the record
        #[arg(long)]
        blocks: bool,
    },
    /// Re-run extraction over stored page snapshots and replace their results
    Reprocess {
        /// Max snapshots to reprocess, newest first (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// List registered jobs
    Jobs,
    /// List recent runs
    Runs {
        /// Only runs of this job
        #[arg(short, long)]
        job: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Print the stored result JSON of a run
    Result { run_id: i64 },
    /// Show run and storage statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let scraper_config = ScraperConfig::festoolrecon();

    let result = match cli.command {
        Commands::Run { trigger } => {
            let conn = open(&cli.db)?;
            match runner::execute(&conn, &scraper_config, trigger).await? {
                RunOutcome::Skipped(reason) => {
                    println!("Skipped: {}", reason);
                    Ok(())
                }
                RunOutcome::Succeeded { run_id, products } => {
                    println!("Run {} succeeded: {} product(s) found", run_id, products);
                    Ok(())
                }
                RunOutcome::Failed { run_id, error } => {
                    bail!("Run {} failed: {}", run_id, error)
                }
            }
        }
        Commands::Extract { file, blocks } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let selectors = CompiledSelectors::new(&scraper_config.selectors)?;
            let json = if blocks {
                let doc = scraper::Html::parse_document(&html);
                let classified = parser::extract::classified_blocks(&doc, &selectors);
                serde_json::to_string_pretty(&classified)?
            } else {
                let record = parser::process_html(&html, &selectors);
                let output = ScrapeOutput::single(
                    record,
                    &scraper_config.url,
                    runner::timestamp(chrono::Utc::now()),
                );
                serde_json::to_string_pretty(&output)?
            };
            println!("{}", json);
            Ok(())
        }
        Commands::Reprocess { limit } => {
            let conn = open(&cli.db)?;
            let snapshots = db::fetch_snapshots(&conn, limit)?;
            if snapshots.is_empty() {
                println!("No stored snapshots. Run 'run' first.");
                return Ok(());
            }
            println!("Reprocessing {} snapshots...", snapshots.len());
            let selectors = CompiledSelectors::new(&scraper_config.selectors)?;
            let written = reprocess(&conn, &snapshots, &selectors)?;
            println!("Replaced {} results.", written);
            Ok(())
        }
        Commands::Jobs => {
            let conn = open(&cli.db)?;
            let jobs = db::fetch_jobs(&conn)?;
            if jobs.is_empty() {
                println!("No jobs registered. Run 'run' first.");
                return Ok(());
            }
            println!(
                "{:>3} | {:<16} | {:<32} | {:>6} | {:<7} | {:<19}",
                "ID", "Name", "URL", "Every", "Enabled", "Updated"
            );
            println!("{}", "-".repeat(98));
            for j in &jobs {
                println!(
                    "{:>3} | {:<16} | {:<32} | {:>5}h | {:<7} | {:<19}",
                    j.id,
                    truncate(&j.name, 16),
                    truncate(&j.url, 32),
                    j.frequency_hours,
                    if j.enabled { "yes" } else { "no" },
                    j.updated_at
                );
            }
            for j in &jobs {
                tracing::debug!("{} config: {}", j.name, j.config);
            }
            Ok(())
        }
        Commands::Runs { job, limit } => {
            let conn = open(&cli.db)?;
            let runs = db::fetch_runs(&conn, job.as_deref(), limit)?;
            if runs.is_empty() {
                println!("No runs found.");
                return Ok(());
            }
            println!(
                "{:>5} | {:<14} | {:<19} | {:<19} | {:<8} | {:<9} | {:>8} | {:<12}",
                "Run", "Job", "Started", "Completed", "Status", "Trigger", "Products", "Snapshot"
            );
            println!("{}", "-".repeat(115));
            for r in &runs {
                println!(
                    "{:>5} | {:<14} | {:<19} | {:<19} | {:<8} | {:<9} | {:>8} | {:<12}",
                    r.id,
                    truncate(&r.job_name, 14),
                    r.started_at,
                    r.completed_at.as_deref().unwrap_or("-"),
                    r.status,
                    r.trigger,
                    r.products_found,
                    r.snapshot_hash.as_deref().map(|h| &h[..12.min(h.len())]).unwrap_or("-"),
                );
            }

            let failed: Vec<_> = runs.iter().filter(|r| r.error_message.is_some()).collect();
            if !failed.is_empty() {
                println!("\n--- Errors ---");
                for r in &failed {
                    let msg = r.error_message.as_deref().unwrap_or_default();
                    println!("  {}: {}", r.id, truncate(msg, 100));
                }
            }
            Ok(())
        }
        Commands::Result { run_id } => {
            let conn = open(&cli.db)?;
            let Some(data) = db::fetch_result(&conn, run_id)? else {
                bail!("No result stored for run {}", run_id);
            };
            let value: serde_json::Value = serde_json::from_str(&data)
                .with_context(|| format!("Stored result for run {} is not JSON", run_id))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Commands::Stats => {
            let conn = open(&cli.db)?;
            let s = db::get_stats(&conn)?;
            println!("Jobs:      {}", s.jobs);
            println!("Runs:      {}", s.runs);
            println!("Succeeded: {}", s.succeeded);
            println!("Failed:    {}", s.failed);
            println!("Running:   {}", s.running);
            println!("Snapshots: {} ({} bytes)", s.snapshots, s.snapshot_bytes);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn open(path: &str) -> anyhow::Result<Connection> {
    let conn = db::connect(path)?;
    db::init_schema(&conn)?;
    Ok(conn)
}

fn reprocess(
    conn: &Connection,
    snapshots: &[db::SnapshotRow],
    selectors: &CompiledSelectors,
) -> anyhow::Result<usize> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(snapshots.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut written = 0;
    for chunk in snapshots.chunks(100) {
        let records: Vec<(i64, ProductRecord)> = chunk
            .par_iter()
            .map(|s| (s.run_id, parser::process_html(&s.html, selectors)))
            .collect();

        let rows = records
            .into_iter()
            .zip(chunk)
            .map(|((run_id, record), snap)| {
                // keep the original scrape time; only the extraction changed
                let output = ScrapeOutput::single(record, &snap.source, sqlite_to_iso(&snap.completed_at));
                Ok((run_id, serde_json::to_string(&output)?))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        written += db::replace_results(conn, &rows)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(written)
}

/// `2026-03-01 12:00:00` → `2026-03-01T12:00:00.000Z`
fn sqlite_to_iso(s: &str) -> String {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|n| runner::timestamp(n.and_utc()))
        .unwrap_or_else(|_| s.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_timestamp_to_iso() {
        assert_eq!(sqlite_to_iso("2026-03-01 12:00:00"), "2026-03-01T12:00:00.000Z");
        assert_eq!(sqlite_to_iso("garbage"), "garbage");
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("festoolrecon", 7), "festool...");
        assert_eq!(truncate("short", 7), "short");
    }

    #[test]
    fn reprocess_replaces_results() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let config = ScraperConfig::festoolrecon();
        let job = db::ensure_job(&conn, &config).unwrap();
        let html = std::fs::read_to_string("tests/fixtures/festoolrecon.html").unwrap();
        let hash = db::put_file(&conn, "festoolrecon.html", "text/html", html.as_bytes()).unwrap();
        let run = db::record_run_start(&conn, job.id, "manual").unwrap();
        db::record_run_success(&conn, run, Some(&hash), 1, "{}").unwrap();

        let snapshots = db::fetch_snapshots(&conn, None).unwrap();
        let selectors = CompiledSelectors::new(&config.selectors).unwrap();
        assert_eq!(reprocess(&conn, &snapshots, &selectors).unwrap(), 1);

        let data = db::fetch_result(&conn, run).unwrap().unwrap();
        let output: ScrapeOutput = serde_json::from_str(&data).unwrap();
        assert_eq!(output.total_products, 1);
        assert_eq!(output.products[0].record.sku.as_deref(), Some("577010"));
        assert_eq!(output.source, "https://festoolrecon.com");
    }
}
