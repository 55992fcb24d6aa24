//! Ground-truth enrichment: scan past confirmed-departure predictions,
//! fetch HSP service details per service id, match the segment's second
//! station by CRS, and upsert the computed arrival delays.

use std::path::PathBuf;

use chrono::Utc;
use chrono_tz::Europe::London;
use chrono_tz::Tz;
use indexmap::IndexMap;
use sqlx::{Connection, SqliteConnection};
use thiserror::Error;
use tracing::{debug, info};

use crate::hsp::{extract_service_locations, HspClient, HspLocation};
use crate::route::Route;
use crate::store::arrivals::{
    index_by_tiploc2, make_actual_arrival_record, upsert_actual_arrival, CandidateRow,
};
use crate::store::schema::ensure_schema;
use crate::store::{connect, StoreError};

/// Commit after this many service ids.
const COMMIT_EVERY: usize = 50;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub db_path: PathBuf,
    /// Only process rows with `ssd` strictly before this `YYYY-MM-DD`
    /// date; defaults to today in Europe/London.
    pub before_date: Option<String>,
    pub limit_rows: i64,
    pub max_rids: usize,
    /// Seconds to sleep between HSP requests.
    pub sleep_secs: f64,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub written: u64,
    pub skipped_no_hsp: u64,
    pub skipped_no_match: u64,
    pub skipped_no_times: u64,
}

/// Rows from `predictions_actual` that are old enough and have no
/// ground-truth row yet (null-safe match on `planned_dep`).
pub async fn fetch_candidates(
    conn: &mut SqliteConnection,
    before_date: &str,
    limit_rows: i64,
) -> Result<Vec<CandidateRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, Option<String>, String, String, Option<String>, Option<f64>)>(
        r#"
        SELECT
            p.rid, p.ssd, p.first, p.second, p.planned_dep, p.predicted_delay
        FROM predictions_actual p
        WHERE
            p.ssd IS NOT NULL
            AND p.ssd < ?
            AND NOT EXISTS (
                SELECT 1
                FROM actual_arrivals_hsp a
                WHERE a.rid = p.rid
                  AND a.first = p.first
                  AND a.second = p.second
                  AND (
                        (a.planned_dep IS NULL AND p.planned_dep IS NULL)
                     OR (a.planned_dep = p.planned_dep)
                  )
            )
        ORDER BY p.ssd ASC
        LIMIT ?
        "#,
    )
    .bind(before_date)
    .bind(limit_rows)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(rid, ssd, first, second, planned_dep, predicted_delay)| CandidateRow {
                rid,
                ssd,
                first,
                second,
                planned_dep,
                predicted_delay,
            },
        )
        .collect())
}

/// Apply one service's parsed HSP rows to its candidate predictions,
/// updating the summary counters. Split out of [`run`] so the matching
/// logic is testable without HTTP.
pub async fn apply_service_rows(
    conn: &mut SqliteConnection,
    group: &[CandidateRow],
    hsp_rows: &[HspLocation],
    dry_run: bool,
    tz: Tz,
    summary: &mut EnrichSummary,
) -> Result<(), sqlx::Error> {
    let hsp_by_tiploc2 = index_by_tiploc2(hsp_rows);

    for pred in group {
        let Some(rec) = make_actual_arrival_record(pred, &hsp_by_tiploc2, tz) else {
            if hsp_by_tiploc2.contains_key(pred.second.as_str()) {
                summary.skipped_no_times += 1;
            } else {
                summary.skipped_no_match += 1;
            }
            continue;
        };

        if !dry_run {
            upsert_actual_arrival(conn, &rec).await?;
        }
        summary.written += 1;
    }

    Ok(())
}

fn today_london() -> String {
    Utc::now().with_timezone(&London).date_naive().to_string()
}

pub async fn run(
    options: &EnrichOptions,
    route: &Route,
    hsp: &HspClient,
) -> Result<EnrichSummary, EnrichError> {
    let before_date = options
        .before_date
        .clone()
        .unwrap_or_else(today_london);

    info!(
        db = %options.db_path.display(),
        before_date = %before_date,
        dry_run = options.dry_run,
        "Starting HSP enrichment"
    );

    let mut conn = connect(&options.db_path, std::time::Duration::from_secs(10)).await?;
    ensure_schema(&mut conn).await?;

    let candidates = fetch_candidates(&mut conn, &before_date, options.limit_rows).await?;
    if candidates.is_empty() {
        info!(before_date = %before_date, "No unprocessed predictions found");
        return Ok(EnrichSummary::default());
    }
    info!(candidates = candidates.len(), "Found candidate rows");

    // One HSP call per service id; insertion order follows ssd order.
    let mut by_rid: IndexMap<String, Vec<CandidateRow>> = IndexMap::new();
    for row in candidates {
        by_rid.entry(row.rid.clone()).or_default().push(row);
    }
    let total_rids = by_rid.len();
    let rids: Vec<String> = by_rid.keys().take(options.max_rids).cloned().collect();
    info!(
        distinct = total_rids,
        processing = rids.len(),
        "Grouped candidates by service id"
    );

    let mut summary = EnrichSummary::default();
    let mut tx = conn.begin().await?;

    for (i, rid) in rids.iter().enumerate() {
        if options.sleep_secs > 0.0 {
            tokio::time::sleep(std::time::Duration::from_secs_f64(options.sleep_secs)).await;
        }

        let group = &by_rid[rid];

        let Some(raw) = hsp.get_service_details_raw(rid).await else {
            summary.skipped_no_hsp += group.len() as u64;
            continue;
        };

        let hsp_rows = extract_service_locations(&raw, route);
        if hsp_rows.is_empty() {
            summary.skipped_no_hsp += group.len() as u64;
            continue;
        }
        debug!(rid = %rid, locations = hsp_rows.len(), "Parsed HSP service details");

        apply_service_rows(
            &mut *tx,
            group,
            &hsp_rows,
            options.dry_run,
            London,
            &mut summary,
        )
        .await?;

        if (i + 1) % COMMIT_EVERY == 0 {
            tx.commit().await?;
            info!(
                processed = i + 1,
                total = rids.len(),
                written = summary.written,
                "Enrichment progress"
            );
            tx = conn.begin().await?;
        }
    }

    tx.commit().await?;

    info!(
        written = summary.written,
        skipped_no_hsp = summary.skipped_no_hsp,
        skipped_no_match = summary.skipped_no_match,
        skipped_no_times = summary.skipped_no_times,
        "Enrichment done"
    );

    Ok(summary)
}
