//! Latest scan report per website.

use crate::error::{DatabaseError, Result};
use crate::websites::sql_time;
use serde_json::{Map, Value};
use sitescan_core::{Timestamp, WebsiteId};
use sitescan_scanner::ScanReport;
use sqlx::{Row, SqlitePool};

/// A persisted report in its flattened form.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReport {
    /// Owning website
    pub website_id: WebsiteId,
    /// Dotted-key report fields
    pub data: Map<String, Value>,
    /// Aspects that failed in this scan
    pub failed_aspects: u32,
    /// When the report was saved
    pub updated_at: Timestamp,
}

/// Replace the website's report and bump `websites.updated_at` atomically.
///
/// # Errors
/// Returns `DatabaseError::NotFound` if the website does not exist.
pub async fn save_report(
    pool: &SqlitePool,
    website_id: WebsiteId,
    report: &ScanReport,
) -> Result<Timestamp> {
    let data = serde_json::to_string(&report.flatten()?)?;
    let failed = i64::try_from(report.failure_count()).unwrap_or(i64::MAX);
    let now = Timestamp::now();
    let stamp = sql_time(now);

    let mut tx = pool.begin().await?;

    let updated = sqlx::query("UPDATE websites SET updated_at = ? WHERE id = ?")
        .bind(&stamp)
        .bind(website_id.get())
        .execute(&mut *tx)
        .await?;
    if updated.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(DatabaseError::NotFound(format!(
            "website not found: {website_id}"
        )));
    }

    sqlx::query(
        "INSERT INTO scan_results (website_id, scan_data, failed_aspects, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(website_id) DO UPDATE SET
            scan_data = excluded.scan_data,
            failed_aspects = excluded.failed_aspects,
            updated_at = excluded.updated_at",
    )
    .bind(website_id.get())
    .bind(&data)
    .bind(failed)
    .bind(&stamp)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        "Saved report for website {} ({} failed aspect(s))",
        website_id,
        failed
    );
    Ok(now)
}

/// The website's latest report, if it has been scanned.
pub async fn latest_report(
    pool: &SqlitePool,
    website_id: WebsiteId,
) -> Result<Option<StoredReport>> {
    let Some(row) = sqlx::query(
        "SELECT scan_data, failed_aspects, updated_at FROM scan_results WHERE website_id = ?",
    )
    .bind(website_id.get())
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let data: String = row.try_get("scan_data")?;
    let failed: i64 = row.try_get("failed_aspects")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Some(StoredReport {
        website_id,
        data: serde_json::from_str(&data)?,
        failed_aspects: u32::try_from(failed)
            .map_err(|_| DatabaseError::Decode(format!("invalid failure count: {failed}")))?,
        updated_at: Timestamp::from_rfc3339(&updated_at)
            .map_err(|e| DatabaseError::Decode(e.to_string()))?,
    }))
}
