//! Time-window filtering of extracted segments relative to "now".
//!
//! Both modes use planned times only: operational estimates move around
//! from frame to frame and would make the window flap.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;

use super::segments::Segment;
use super::time::combine;

#[derive(Debug, Clone, Copy)]
pub enum FilterMode {
    /// Keep segments whose planned departure lies within
    /// `[now - before_mins, now + after_mins]`. Debugging aid.
    NearDeparture { before_mins: i64, after_mins: i64 },
    /// Keep segments that have started (or are about to, within the
    /// departure grace) and have not finished (within the arrival grace).
    /// Recommended for live prediction.
    InProgress {
        dep_grace_after_now_mins: i64,
        arr_grace_before_now_mins: i64,
    },
}

impl FilterMode {
    pub fn near_departure() -> Self {
        FilterMode::NearDeparture {
            before_mins: 30,
            after_mins: 180,
        }
    }

    pub fn in_progress() -> Self {
        FilterMode::InProgress {
            dep_grace_after_now_mins: 5,
            arr_grace_before_now_mins: 2,
        }
    }
}

fn planned_dep_dt(seg: &Segment, tz: Tz) -> Option<DateTime<Tz>> {
    combine(seg.ssd.as_deref()?, seg.planned_dep.as_deref()?, None, tz)
}

/// Keep segments matching `mode` relative to `now`.
///
/// Segments without a planned departure are always dropped; in
/// `InProgress` mode, segments without a planned arrival at the
/// destination station are dropped too, because "in progress" cannot be
/// established without knowing when the segment ends.
pub fn filter_segments_by_now(
    segments: Vec<Segment>,
    now: DateTime<Tz>,
    tz: Tz,
    mode: FilterMode,
) -> Vec<Segment> {
    match mode {
        FilterMode::NearDeparture {
            before_mins,
            after_mins,
        } => {
            let win_start = now - Duration::minutes(before_mins);
            let win_end = now + Duration::minutes(after_mins);
            segments
                .into_iter()
                .filter(|seg| {
                    planned_dep_dt(seg, tz)
                        .map(|dep| win_start <= dep && dep <= win_end)
                        .unwrap_or(false)
                })
                .collect()
        }
        FilterMode::InProgress {
            dep_grace_after_now_mins,
            arr_grace_before_now_mins,
        } => {
            let dep_limit = now + Duration::minutes(dep_grace_after_now_mins);
            let arr_limit = now - Duration::minutes(arr_grace_before_now_mins);
            segments
                .into_iter()
                .filter(|seg| {
                    let Some(dep) = planned_dep_dt(seg, tz) else {
                        return false;
                    };
                    // Rollover-safe arrival at the destination station.
                    let arr = seg.ssd.as_deref().and_then(|ssd| {
                        combine(ssd, seg.planned_arr_second()?, Some(dep), tz)
                    });
                    let Some(arr) = arr else {
                        return false;
                    };
                    dep <= dep_limit && arr >= arr_limit
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::darwin::forecasts::ForecastLocation;
    use crate::darwin::segments::DepTimeKind;
    use chrono_tz::Europe::London;

    fn segment(planned_dep: &str, planned_arr_second: Option<&str>) -> Segment {
        let mut loc_second = ForecastLocation::default();
        loc_second.pta = planned_arr_second.map(str::to_string);
        Segment {
            rid: Some("X1".to_string()),
            ssd: Some("2025-04-10".to_string()),
            first: "SOTON",
            second: "SOTPKWY",
            planned_dep: Some(planned_dep.to_string()),
            planned_arr: None,
            dep_time_for_prediction: Some(planned_dep.to_string()),
            dep_time_kind: DepTimeKind::Estimate,
            has_actual_dep: false,
            actual_dep_confirmed: None,
            departure_delay_min: Some(0.0),
            arrival_delay_min: None,
            dwell_delay_min: None,
            loc_first: ForecastLocation::default(),
            loc_second,
        }
    }

    fn now() -> chrono::DateTime<chrono_tz::Tz> {
        combine("2025-04-10", "09:01", None, London).unwrap()
    }

    #[test]
    fn in_progress_keeps_running_segment() {
        let segs = vec![segment("09:00", Some("09:15"))];
        let kept = filter_segments_by_now(segs, now(), London, FilterMode::in_progress());
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn in_progress_departure_grace_boundary() {
        // now + 5 min is the last admissible planned departure.
        let kept = filter_segments_by_now(
            vec![segment("09:06", Some("09:20"))],
            now(),
            London,
            FilterMode::in_progress(),
        );
        assert_eq!(kept.len(), 1);

        let kept = filter_segments_by_now(
            vec![segment("09:07", Some("09:20"))],
            now(),
            London,
            FilterMode::in_progress(),
        );
        assert!(kept.is_empty());
    }

    #[test]
    fn in_progress_arrival_grace_boundary() {
        // now - 2 min is the earliest admissible planned arrival at B.
        let kept = filter_segments_by_now(
            vec![segment("08:40", Some("08:59"))],
            now(),
            London,
            FilterMode::in_progress(),
        );
        assert_eq!(kept.len(), 1);

        let kept = filter_segments_by_now(
            vec![segment("08:40", Some("08:58"))],
            now(),
            London,
            FilterMode::in_progress(),
        );
        assert!(kept.is_empty());
    }

    #[test]
    fn in_progress_drops_segment_without_destination_arrival() {
        let kept = filter_segments_by_now(
            vec![segment("09:00", None)],
            now(),
            London,
            FilterMode::in_progress(),
        );
        assert!(kept.is_empty());
    }

    #[test]
    fn near_departure_window() {
        let mode = FilterMode::near_departure();
        let kept = filter_segments_by_now(
            vec![
                segment("08:30", None), // 31 min before now: out
                segment("08:32", None), // 29 min before now: in
                segment("11:59", None), // 178 min after now: in
                segment("12:05", None), // 184 min after now: out
            ],
            now(),
            London,
            mode,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].planned_dep.as_deref(), Some("08:32"));
        assert_eq!(kept[1].planned_dep.as_deref(), Some("11:59"));
    }

    #[test]
    fn segments_without_planned_departure_are_dropped() {
        let mut seg = segment("09:00", Some("09:15"));
        seg.planned_dep = None;
        let kept =
            filter_segments_by_now(vec![seg], now(), London, FilterMode::in_progress());
        assert!(kept.is_empty());
    }
}
