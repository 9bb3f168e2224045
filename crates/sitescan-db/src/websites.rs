//! Website registry.

use crate::error::{DatabaseError, Result};
use chrono::SecondsFormat;
use sitescan_core::{Timestamp, WebsiteId};
use sitescan_scheduler::Website;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Fixed-width UTC rendering so stored timestamps sort lexically.
pub(crate) fn sql_time(ts: Timestamp) -> String {
    ts.as_datetime().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_row(row: &SqliteRow) -> Result<Website> {
    let updated_at: Option<String> = row.try_get("updated_at")?;
    let updated_at = updated_at
        .as_deref()
        .map(Timestamp::from_rfc3339)
        .transpose()
        .map_err(|e| DatabaseError::Decode(e.to_string()))?;

    Ok(Website {
        id: WebsiteId::new(row.try_get("id")?),
        url: row.try_get("url")?,
        updated_at,
    })
}

/// Register `url`, returning the existing row if it is already known.
pub async fn upsert_website(pool: &SqlitePool, url: &str) -> Result<Website> {
    sqlx::query("INSERT INTO websites (url, created_at) VALUES (?, ?) ON CONFLICT(url) DO NOTHING")
        .bind(url)
        .bind(sql_time(Timestamp::now()))
        .execute(pool)
        .await?;

    find_by_url(pool, url)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("website not found after insert: {url}")))
}

/// Website by id.
pub async fn find(pool: &SqlitePool, id: WebsiteId) -> Result<Option<Website>> {
    let row = sqlx::query("SELECT id, url, updated_at FROM websites WHERE id = ?")
        .bind(id.get())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(from_row).transpose()
}

/// Website by URL.
pub async fn find_by_url(pool: &SqlitePool, url: &str) -> Result<Option<Website>> {
    let row = sqlx::query("SELECT id, url, updated_at FROM websites WHERE url = ?")
        .bind(url)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(from_row).transpose()
}

/// Every website, oldest registration first.
pub async fn all(pool: &SqlitePool) -> Result<Vec<Website>> {
    let rows = sqlx::query("SELECT id, url, updated_at FROM websites ORDER BY id")
        .fetch_all(pool)
        .await?;
    rows.iter().map(from_row).collect()
}

/// Websites never scanned or last scanned strictly before `cutoff`.
pub async fn find_stale(pool: &SqlitePool, cutoff: Timestamp) -> Result<Vec<Website>> {
    let rows = sqlx::query(
        "SELECT id, url, updated_at FROM websites
         WHERE updated_at IS NULL OR updated_at < ?
         ORDER BY id",
    )
    .bind(sql_time(cutoff))
    .fetch_all(pool)
    .await?;
    rows.iter().map(from_row).collect()
}
