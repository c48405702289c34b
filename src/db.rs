use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::config::ScraperConfig;

const MAX_ERROR_CHARS: usize = 2000;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL UNIQUE,
            type            TEXT NOT NULL DEFAULT 'scrape',
            url             TEXT NOT NULL,
            frequency_hours REAL NOT NULL DEFAULT 4,
            enabled         INTEGER NOT NULL DEFAULT 1,
            config          TEXT NOT NULL DEFAULT '{}',
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Content-addressed snapshot store: key is the SHA-256 of the content
        CREATE TABLE IF NOT EXISTS files (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            hash          TEXT NOT NULL UNIQUE,
            original_name TEXT NOT NULL,
            mime_type     TEXT NOT NULL,
            size_bytes    INTEGER NOT NULL,
            content       BLOB NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS runs (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id          INTEGER NOT NULL REFERENCES jobs(id),
            started_at      TEXT NOT NULL DEFAULT (datetime('now')),
            completed_at    TEXT,
            status          TEXT NOT NULL DEFAULT 'pending'
                              CHECK (status IN ('pending', 'running', 'success', 'failed')),
            trigger_type    TEXT NOT NULL DEFAULT 'manual'
                              CHECK (trigger_type IN ('scheduled', 'manual')),
            snapshot_hash   TEXT REFERENCES files(hash),
            error_message   TEXT,
            products_found  INTEGER DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_runs_job_id ON runs(job_id);
        CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status);
        CREATE INDEX IF NOT EXISTS idx_runs_job_started ON runs(job_id, started_at DESC);

        CREATE TABLE IF NOT EXISTS results (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id     INTEGER NOT NULL UNIQUE REFERENCES runs(id),
            data       TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Jobs ──

#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub frequency_hours: f64,
    pub enabled: bool,
    pub config: String,
    pub updated_at: String,
}

/// Insert or refresh the job row for this definition.
pub fn ensure_job(conn: &Connection, config: &ScraperConfig) -> Result<JobRow> {
    let config_json = serde_json::to_string(config)?;
    conn.execute(
        "INSERT INTO jobs (name, type, url, frequency_hours, enabled, config)
         VALUES (?1, 'scrape', ?2, ?3, ?4, ?5)
         ON CONFLICT(name) DO UPDATE SET
           url = excluded.url,
           frequency_hours = excluded.frequency_hours,
           enabled = excluded.enabled,
           config = excluded.config,
           updated_at = datetime('now')",
        rusqlite::params![config.slug, config.url, config.frequency_hours, config.enabled, config_json],
    )?;
    fetch_job(conn, &config.slug)?
        .with_context(|| format!("Failed to create/retrieve job: {}", config.slug))
}

pub fn fetch_job(conn: &Connection, name: &str) -> Result<Option<JobRow>> {
    let row = conn
        .query_row(
            "SELECT id, name, url, frequency_hours, enabled, config, updated_at
             FROM jobs WHERE name = ?1",
            [name],
            map_job,
        )
        .optional()?;
    Ok(row)
}

pub fn fetch_jobs(conn: &Connection) -> Result<Vec<JobRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, url, frequency_hours, enabled, config, updated_at
         FROM jobs ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map([], map_job)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_job(row: &rusqlite::Row) -> rusqlite::Result<JobRow> {
    Ok(JobRow {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        frequency_hours: row.get(3)?,
        enabled: row.get(4)?,
        config: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

// ── Runs ──

pub fn record_run_start(conn: &Connection, job_id: i64, trigger: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO runs (job_id, status, trigger_type, started_at)
         VALUES (?1, 'running', ?2, datetime('now'))",
        rusqlite::params![job_id, trigger],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn record_run_success(
    conn: &Connection,
    run_id: i64,
    snapshot_hash: Option<&str>,
    products_found: usize,
    data: &str,
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE runs SET
           status = 'success',
           completed_at = datetime('now'),
           snapshot_hash = ?1,
           products_found = ?2
         WHERE id = ?3",
        rusqlite::params![snapshot_hash, products_found as i64, run_id],
    )?;
    tx.execute(
        "INSERT INTO results (run_id, data) VALUES (?1, ?2)",
        rusqlite::params![run_id, data],
    )?;
    tx.commit()?;
    Ok(())
}

pub fn record_run_failure(conn: &Connection, run_id: i64, error: &str) -> Result<()> {
    let message: String = error.chars().take(MAX_ERROR_CHARS).collect();
    conn.execute(
        "UPDATE runs SET
           status = 'failed',
           completed_at = datetime('now'),
           error_message = ?1
         WHERE id = ?2",
        rusqlite::params![message, run_id],
    )?;
    Ok(())
}

/// Completion time of the job's most recent successful run.
pub fn last_success_at(conn: &Connection, job_id: i64) -> Result<Option<DateTime<Utc>>> {
    let completed: Option<String> = conn
        .query_row(
            "SELECT completed_at FROM runs
             WHERE job_id = ?1 AND status = 'success' AND completed_at IS NOT NULL
             ORDER BY completed_at DESC LIMIT 1",
            [job_id],
            |r| r.get(0),
        )
        .optional()?;

    // SQLite datetime('now') is UTC without a zone suffix
    completed
        .map(|s| {
            NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|n| n.and_utc())
                .with_context(|| format!("Bad completed_at timestamp: {}", s))
        })
        .transpose()
}

pub struct RunRow {
    pub id: i64,
    pub job_name: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub trigger: String,
    pub snapshot_hash: Option<String>,
    pub error_message: Option<String>,
    pub products_found: i64,
}

pub fn fetch_runs(conn: &Connection, job: Option<&str>, limit: usize) -> Result<Vec<RunRow>> {
    let sql = format!(
        "SELECT r.id, j.name, r.started_at, r.completed_at, r.status, r.trigger_type,
                r.snapshot_hash, r.error_message, COALESCE(r.products_found, 0)
         FROM runs r
         JOIN jobs j ON j.id = r.job_id
         WHERE ?1 IS NULL OR j.name = ?1
         ORDER BY r.started_at DESC, r.id DESC
         LIMIT {}",
        limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([job], |row| {
            Ok(RunRow {
                id: row.get(0)?,
                job_name: row.get(1)?,
                started_at: row.get(2)?,
                completed_at: row.get(3)?,
                status: row.get(4)?,
                trigger: row.get(5)?,
                snapshot_hash: row.get(6)?,
                error_message: row.get(7)?,
                products_found: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Results ──

pub fn fetch_result(conn: &Connection, run_id: i64) -> Result<Option<String>> {
    let data = conn
        .query_row(
            "SELECT data FROM results WHERE run_id = ?1",
            [run_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(data)
}

pub fn replace_results(conn: &Connection, rows: &[(i64, String)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO results (run_id, data) VALUES (?1, ?2)
             ON CONFLICT(run_id) DO UPDATE SET data = excluded.data, created_at = datetime('now')",
        )?;
        for (run_id, data) in rows {
            count += stmt.execute(rusqlite::params![run_id, data])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Snapshots ──

pub fn content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Store content under its hash. Storing the same bytes twice is a no-op.
pub fn put_file(conn: &Connection, name: &str, mime: &str, content: &[u8]) -> Result<String> {
    let hash = content_hash(content);
    conn.execute(
        "INSERT OR IGNORE INTO files (hash, original_name, mime_type, size_bytes, content)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![hash, name, mime, content.len() as i64, content],
    )?;
    Ok(hash)
}

pub struct SnapshotRow {
    pub run_id: i64,
    pub source: String,
    pub completed_at: String,
    pub html: String,
}

/// Snapshots behind successful runs, newest first.
pub fn fetch_snapshots(conn: &Connection, limit: Option<usize>) -> Result<Vec<SnapshotRow>> {
    let sql = format!(
        "SELECT r.id, j.url, r.completed_at, f.content
         FROM runs r
         JOIN jobs j ON j.id = r.job_id
         JOIN files f ON f.hash = r.snapshot_hash
         WHERE r.status = 'success'
         ORDER BY r.id DESC{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let content: Vec<u8> = row.get(3)?;
            Ok(SnapshotRow {
                run_id: row.get(0)?,
                source: row.get(1)?,
                completed_at: row.get(2)?,
                html: String::from_utf8_lossy(&content).into_owned(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub jobs: usize,
    pub runs: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub running: usize,
    pub snapshots: usize,
    pub snapshot_bytes: i64,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let jobs: usize = conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))?;
    let runs: usize = conn.query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))?;
    let succeeded: usize = conn.query_row(
        "SELECT COUNT(*) FROM runs WHERE status = 'success'",
        [],
        |r| r.get(0),
    )?;
    let failed: usize = conn.query_row(
        "SELECT COUNT(*) FROM runs WHERE status = 'failed'",
        [],
        |r| r.get(0),
    )?;
    let running: usize = conn.query_row(
        "SELECT COUNT(*) FROM runs WHERE status = 'running'",
        [],
        |r| r.get(0),
    )?;
    let snapshots: usize = conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
    let snapshot_bytes: i64 =
        conn.query_row("SELECT COALESCE(SUM(size_bytes), 0) FROM files", [], |r| r.get(0))?;
    Ok(Stats {
        jobs,
        runs,
        succeeded,
        failed,
        running,
        snapshots,
        snapshot_bytes,
    })
}
