//! Ground-truth arrival records: match HSP locations to stored segments
//! and upsert the computed arrival delays.

use std::collections::HashMap;

use chrono_tz::Tz;
use sqlx::SqliteConnection;

use crate::darwin::time::{combine, diff_minutes_wrap};
use crate::hsp::HspLocation;

/// A `predictions_actual` row awaiting ground truth.
#[derive(Debug, Clone)]
pub struct CandidateRow {
    pub rid: String,
    pub ssd: Option<String>,
    pub first: String,
    pub second: String,
    pub planned_dep: Option<String>,
    pub predicted_delay: Option<f64>,
}

/// One row destined for `actual_arrivals_hsp`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActualArrivalRecord {
    pub rid: String,
    pub ssd: Option<String>,
    pub first: String,
    pub second: String,
    pub planned_dep: Option<String>,

    pub is_main_journey: i64,
    pub predicted_delay: Option<f64>,

    pub planned_arr: String,
    pub actual_arr: String,
    pub actual_arr_delay: Option<f64>,

    pub toc_code: Option<String>,
    pub hsp_location_crs: Option<String>,
    pub hsp_tpls: Option<String>,
}

/// Normalize HSP `HHMM` to the Darwin `HH:MM` form. Strings already
/// carrying a colon pass through; anything else is rejected.
pub fn normalize_hhmm(value: &str) -> Option<String> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }
    if s.contains(':') {
        return Some(s.to_string());
    }
    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        return Some(format!("{}:{}", &s[..2], &s[2..]));
    }
    None
}

/// Index parsed HSP rows by route TIPLOC2 (last occurrence wins).
/// Locations whose CRS is not on the route are dropped here.
pub fn index_by_tiploc2<'a>(rows: &'a [HspLocation]) -> HashMap<&'static str, &'a HspLocation> {
    let mut out = HashMap::new();
    for row in rows {
        if let Some(t2) = row.tiploc2 {
            out.insert(t2, row);
        }
    }
    out
}

/// `(actual_arr - planned_arr)` in minutes with wrap safety, anchored on
/// the planned departure so that after-midnight arrivals land on the
/// right day.
pub fn compute_actual_arrival_delay(
    ssd: Option<&str>,
    planned_arr: &str,
    actual_arr: &str,
    base: Option<&str>,
    tz: Tz,
) -> Option<f64> {
    let ssd = ssd?;

    let base_dt = base
        .and_then(normalize_hhmm)
        .and_then(|b| combine(ssd, &b, None, tz));
    let planned_dt = combine(ssd, planned_arr, base_dt, tz)?;
    let actual_dt = combine(ssd, actual_arr, Some(planned_dt), tz)?;

    Some(diff_minutes_wrap(planned_dt, actual_dt))
}

/// Build one ground-truth record for a candidate prediction row.
///
/// `None` means no usable match: either the second station has no HSP row
/// or the HSP row lacks a planned or actual arrival time.
pub fn make_actual_arrival_record(
    pred: &CandidateRow,
    hsp_by_tiploc2: &HashMap<&'static str, &HspLocation>,
    tz: Tz,
) -> Option<ActualArrivalRecord> {
    let hsp_loc = hsp_by_tiploc2.get(pred.second.as_str())?;

    let planned_arr = hsp_loc.pta.as_deref().and_then(normalize_hhmm)?;
    let actual_arr = hsp_loc.ata.as_deref().and_then(normalize_hhmm)?;

    let actual_arr_delay = compute_actual_arrival_delay(
        pred.ssd.as_deref(),
        &planned_arr,
        &actual_arr,
        pred.planned_dep.as_deref(),
        tz,
    );

    Some(ActualArrivalRecord {
        rid: pred.rid.clone(),
        ssd: pred.ssd.clone(),
        first: pred.first.clone(),
        second: pred.second.clone(),
        planned_dep: pred.planned_dep.clone(),
        is_main_journey: hsp_loc.is_main_journey,
        predicted_delay: pred.predicted_delay,
        planned_arr,
        actual_arr,
        actual_arr_delay,
        toc_code: hsp_loc.toc_code.clone(),
        hsp_location_crs: Some(hsp_loc.crs.clone()),
        hsp_tpls: Some(hsp_loc.hsp_tpls.clone()),
    })
}

/// Upsert so that re-running the enrichment updates rows in place.
pub async fn upsert_actual_arrival(
    conn: &mut SqliteConnection,
    rec: &ActualArrivalRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO actual_arrivals_hsp (
            rid, ssd, first, second, planned_dep,
            is_main_journey, predicted_delay,
            planned_arr, actual_arr, actual_arr_delay,
            toc_code, hsp_location_crs, hsp_tpls
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(rid, first, second, planned_dep) DO UPDATE SET
            ssd = excluded.ssd,
            is_main_journey = excluded.is_main_journey,
            predicted_delay = excluded.predicted_delay,
            planned_arr = excluded.planned_arr,
            actual_arr = excluded.actual_arr,
            actual_arr_delay = excluded.actual_arr_delay,
            toc_code = excluded.toc_code,
            hsp_location_crs = excluded.hsp_location_crs,
            hsp_tpls = excluded.hsp_tpls
        "#,
    )
    .bind(&rec.rid)
    .bind(&rec.ssd)
    .bind(&rec.first)
    .bind(&rec.second)
    .bind(&rec.planned_dep)
    .bind(rec.is_main_journey)
    .bind(rec.predicted_delay)
    .bind(&rec.planned_arr)
    .bind(&rec.actual_arr)
    .bind(rec.actual_arr_delay)
    .bind(&rec.toc_code)
    .bind(&rec.hsp_location_crs)
    .bind(&rec.hsp_tpls)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
