//! Segment extraction: turn per-location forecasts into one record per
//! tracked station pair, with direction filtering and a well-defined
//! precedence among the operational time sources.

use std::collections::HashMap;

use chrono::DateTime;
use chrono_tz::Tz;

use super::forecasts::ForecastLocation;
use super::schedules::{EndpointKind, ScheduleEndpoint};
use super::time::{combine, diff_minutes_wrap, parse_clock};
use crate::route::Route;

/// A single reverse delta at or below this (minutes) rejects the journey
/// outright in the fallback direction vote.
const HARD_REVERSE_MINUTES: f64 = -10.0;

/// Minimum number of votes before the majority rule applies.
const MIN_DIRECTION_VOTES: usize = 2;

/// What kind of departure time feeds the prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepTimeKind {
    Actual,
    Estimate,
    Missing,
}

impl DepTimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepTimeKind::Actual => "actual",
            DepTimeKind::Estimate => "estimate",
            DepTimeKind::Missing => "missing",
        }
    }
}

/// One extracted record for a tracked ordered pair `(first, second)`.
#[derive(Debug, Clone)]
pub struct Segment {
    pub rid: Option<String>,
    pub ssd: Option<String>,
    pub first: &'static str,
    pub second: &'static str,

    /// Planned times at the first station.
    pub planned_dep: Option<String>,
    pub planned_arr: Option<String>,

    /// Best available operational departure at the first station.
    pub dep_time_for_prediction: Option<String>,
    pub dep_time_kind: DepTimeKind,
    pub has_actual_dep: bool,
    pub actual_dep_confirmed: Option<String>,

    pub departure_delay_min: Option<f64>,
    /// Arrival delay at the first station, only used for dwell.
    pub arrival_delay_min: Option<f64>,
    pub dwell_delay_min: Option<f64>,

    /// Raw location snapshots, kept for downstream lookups.
    pub loc_first: ForecastLocation,
    pub loc_second: ForecastLocation,
}

impl Segment {
    /// Planned arrival at the destination station of the segment, used by
    /// the in-progress filter.
    pub fn planned_arr_second(&self) -> Option<&str> {
        first_non_empty(&[&self.loc_second.pta, &self.loc_second.wta])
    }
}

fn first_non_empty<'a>(values: &[&'a Option<String>]) -> Option<&'a str> {
    values
        .iter()
        .filter_map(|v| v.as_deref())
        .find(|s| !s.is_empty())
}

/// tpl -> location, last occurrence winning (usually the latest update).
fn build_tpl_index(forecasts: &[ForecastLocation]) -> HashMap<&str, &ForecastLocation> {
    let mut by_tpl = HashMap::new();
    for loc in forecasts {
        if let Some(tpl) = loc.tpl.as_deref() {
            by_tpl.insert(tpl, loc);
        }
    }
    by_tpl
}

/// Origin and destination from the schedule endpoints, when present.
fn schedule_endpoints(schedules: &[ScheduleEndpoint]) -> (Option<&str>, Option<&str>) {
    let mut origin = None;
    let mut dest = None;
    for ep in schedules {
        match ep.kind {
            EndpointKind::Origin => origin = Some(ep.tpl.as_str()),
            EndpointKind::Destination => dest = Some(ep.tpl.as_str()),
        }
    }
    (origin, dest)
}

/// Schedule-based direction check. `None` means the endpoints were absent
/// or partial and the caller must fall back to the vote.
fn matches_route_direction(schedules: &[ScheduleEndpoint], route: &Route) -> Option<bool> {
    let (origin, dest) = schedule_endpoints(schedules);
    match (origin, dest) {
        (Some(origin), Some(dest)) => {
            Some(origin == route.origin() && dest == route.destination())
        }
        _ => None,
    }
}

fn minutes_of_day(clock: &str) -> Option<f64> {
    let t = parse_clock(clock)?;
    use chrono::Timelike;
    Some(t.hour() as f64 * 60.0 + t.minute() as f64 + t.second() as f64 / 60.0)
}

/// Fallback direction check when schedule endpoints are missing: vote on
/// time-of-day order across the tracked pairs. A single strongly negative
/// delta rejects immediately; otherwise reverse wins only with a majority
/// of at least two votes.
fn is_reverse_by_vote(by_tpl: &HashMap<&str, &ForecastLocation>, route: &Route) -> bool {
    let mut forward = 0usize;
    let mut reverse = 0usize;

    for (a_code, b_code) in route.pairs() {
        let (Some(a), Some(b)) = (by_tpl.get(a_code), by_tpl.get(b_code)) else {
            continue;
        };

        let dep = first_non_empty(&[&a.ptd, &a.wtd, &a.dep_et, &a.dep_at]);
        let arr = first_non_empty(&[&b.pta, &b.wta, &b.arr_et, &b.arr_wet, &b.arr_at]);
        let (Some(dep), Some(arr)) = (dep, arr) else {
            continue;
        };
        let (Some(dep_min), Some(arr_min)) = (minutes_of_day(dep), minutes_of_day(arr)) else {
            continue;
        };

        let mut delta = arr_min - dep_min;
        if delta < -720.0 {
            delta += 1440.0;
        }

        if delta < 0.0 {
            reverse += 1;
            if delta <= HARD_REVERSE_MINUTES {
                return true;
            }
        } else {
            forward += 1;
        }
    }

    if forward + reverse >= MIN_DIRECTION_VOTES {
        return reverse > forward;
    }

    false
}

/// Extract one record per tracked pair present in the forecasts.
///
/// Departure time precedence at the first station:
/// 1. `atd`/`dep_at` - confirmed actual
/// 2. `etd`/`dep_et` - estimate
/// 3. `wtd` - working timetable, treated as estimate
/// 4. `ptd` - planned, treated as estimate; absent means `missing`
pub fn extract_segments(
    forecasts: &[ForecastLocation],
    schedules: &[ScheduleEndpoint],
    route: &Route,
    tz: Tz,
    drop_wrong_direction: bool,
) -> Vec<Segment> {
    if forecasts.is_empty() {
        return Vec::new();
    }

    let rid = forecasts[0].rid.clone();
    let ssd = forecasts[0].ssd.clone();

    let by_tpl = build_tpl_index(forecasts);

    if drop_wrong_direction {
        match matches_route_direction(schedules, route) {
            Some(false) => return Vec::new(),
            Some(true) => {}
            None => {
                if is_reverse_by_vote(&by_tpl, route) {
                    return Vec::new();
                }
            }
        }
    }

    let combine_opt = |clock: Option<&str>, base: Option<DateTime<Tz>>| {
        let ssd = ssd.as_deref()?;
        combine(ssd, clock?, base, tz)
    };

    let mut out = Vec::new();

    for (a_code, b_code) in route.pairs() {
        let (Some(&loc_a), Some(&loc_b)) = (by_tpl.get(a_code), by_tpl.get(b_code)) else {
            continue;
        };

        let planned_dep = first_non_empty(&[&loc_a.ptd, &loc_a.wtd]);

        let actual_dep_confirmed = first_non_empty(&[&loc_a.atd, &loc_a.dep_at]);
        let has_actual_dep = actual_dep_confirmed.is_some();

        let dep_estimate = first_non_empty(&[&loc_a.etd, &loc_a.dep_et]);
        let dep_working = first_non_empty(&[&loc_a.wtd]);
        let dep_planned_only = first_non_empty(&[&loc_a.ptd]);

        let (dep_time_for_prediction, dep_time_kind) = if let Some(actual) = actual_dep_confirmed {
            (Some(actual), DepTimeKind::Actual)
        } else if let Some(est) = dep_estimate {
            (Some(est), DepTimeKind::Estimate)
        } else if let Some(working) = dep_working {
            (Some(working), DepTimeKind::Estimate)
        } else if let Some(planned) = dep_planned_only {
            (Some(planned), DepTimeKind::Estimate)
        } else {
            (None, DepTimeKind::Missing)
        };

        // Departure delay: planned vs best available operational time.
        let planned_dep_dt = combine_opt(planned_dep, None);
        let dep_pred_dt = if planned_dep_dt.is_some() {
            combine_opt(dep_time_for_prediction, planned_dep_dt)
        } else {
            None
        };
        let departure_delay_min = match (planned_dep_dt, dep_pred_dt) {
            (Some(p), Some(a)) => Some(diff_minutes_wrap(p, a)),
            _ => None,
        };

        // Arrival delay at the first station, confirmed preferred over
        // estimate, used only for dwell.
        let planned_arr = first_non_empty(&[&loc_a.pta, &loc_a.wta]);
        let actual_arr_confirmed = first_non_empty(&[&loc_a.ata, &loc_a.arr_at]);
        let arr_estimate = first_non_empty(&[&loc_a.arr_et, &loc_a.arr_wet]);
        let arr_time_for_dwell = actual_arr_confirmed.or(arr_estimate);

        let (planned_arr_dt, arr_dwell_dt) = if planned_dep_dt.is_some() {
            (
                combine_opt(planned_arr, planned_dep_dt),
                combine_opt(arr_time_for_dwell, planned_dep_dt),
            )
        } else {
            (None, None)
        };
        let arrival_delay_min = match (planned_arr_dt, arr_dwell_dt) {
            (Some(p), Some(a)) => Some(diff_minutes_wrap(p, a)),
            _ => None,
        };

        // Dwell: at the route origin it is the departure delay itself,
        // elsewhere the part of the departure delay not inherited from a
        // late arrival.
        let dwell_delay_min = if a_code == route.origin() {
            departure_delay_min
        } else {
            match (departure_delay_min, arrival_delay_min) {
                (Some(dep), Some(arr)) => Some(dep - arr),
                _ => None,
            }
        };

        out.push(Segment {
            rid: rid.clone(),
            ssd: ssd.clone(),
            first: a_code,
            second: b_code,
            planned_dep: planned_dep.map(str::to_string),
            planned_arr: planned_arr.map(str::to_string),
            dep_time_for_prediction: dep_time_for_prediction.map(str::to_string),
            dep_time_kind,
            has_actual_dep,
            actual_dep_confirmed: actual_dep_confirmed.map(str::to_string),
            departure_delay_min,
            arrival_delay_min,
            dwell_delay_min,
            loc_first: loc_a.clone(),
            loc_second: loc_b.clone(),
        });
    }

    out
}
