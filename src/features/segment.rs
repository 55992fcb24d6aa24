//! Build the model input row from one extracted segment.

use chrono_tz::Tz;

use crate::darwin::segments::Segment;
use crate::darwin::time::combine;

use super::time::TimeFeatureExtractor;

/// Canonical feature order, used for display and column layout.
pub const FEATURE_ORDER: [&str; 10] = [
    "departure_delay",
    "dwell_delay",
    "peak",
    "day_of_week",
    "day_of_month",
    "hour_of_day",
    "weekend",
    "season",
    "month",
    "holiday",
];

/// One model input row: numeric delays plus calendar features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub departure_delay: f64,
    pub dwell_delay: f64,
    pub peak: i64,
    pub day_of_week: String,
    pub day_of_month: i64,
    pub hour_of_day: i64,
    pub weekend: i64,
    pub season: String,
    pub month: i64,
    pub holiday: i64,
}

impl FeatureRow {
    /// Numeric view used by the models. Numeric features are addressed by
    /// name; categorical features by one-hot `name=value` keys (e.g.
    /// `day_of_week=Monday`). Unknown keys read as 0.
    pub fn value(&self, key: &str) -> f64 {
        match key {
            "departure_delay" => self.departure_delay,
            "dwell_delay" => self.dwell_delay,
            "peak" => self.peak as f64,
            "day_of_month" => self.day_of_month as f64,
            "hour_of_day" => self.hour_of_day as f64,
            "weekend" => self.weekend as f64,
            "month" => self.month as f64,
            "holiday" => self.holiday as f64,
            _ => match key.split_once('=') {
                Some(("day_of_week", v)) => (self.day_of_week == v) as i64 as f64,
                Some(("season", v)) => (self.season == v) as i64 as f64,
                _ => 0.0,
            },
        }
    }
}

/// Maps a segment record to a feature row.
///
/// Calendar features are anchored on `(ssd, planned_dep)` because that
/// pair is stable across snapshots of the same service. A missing anchor
/// or a missing departure delay yields no row; a missing dwell delay is
/// substituted with 0.0 (common in early updates).
#[derive(Debug, Clone)]
pub struct SegmentFeatureBuilder {
    extractor: TimeFeatureExtractor,
    tz: Tz,
}

impl SegmentFeatureBuilder {
    pub fn new(extractor: TimeFeatureExtractor, tz: Tz) -> Self {
        Self { extractor, tz }
    }

    pub fn build(&self, segment: &Segment) -> Option<FeatureRow> {
        let ssd = segment.ssd.as_deref()?;
        let planned_dep = segment.planned_dep.as_deref()?;
        let anchor = combine(ssd, planned_dep, None, self.tz)?;

        let departure_delay = segment.departure_delay_min?;
        let dwell_delay = segment.dwell_delay_min.unwrap_or(0.0);

        let tf = self.extractor.extract(anchor);

        Some(FeatureRow {
            departure_delay,
            dwell_delay,
            peak: tf.peak,
            day_of_week: tf.day_of_week,
            day_of_month: tf.day_of_month,
            hour_of_day: tf.hour_of_day,
            weekend: tf.weekend,
            season: tf.season,
            month: tf.month,
            holiday: tf.holiday,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::darwin::forecasts::ForecastLocation;
    use crate::darwin::segments::DepTimeKind;
    use chrono_tz::Europe::London;

    fn builder() -> SegmentFeatureBuilder {
        SegmentFeatureBuilder::new(TimeFeatureExtractor::default(), London)
    }

    fn segment() -> Segment {
        Segment {
            rid: Some("X1".to_string()),
            ssd: Some("2025-04-10".to_string()),
            first: "SOTON",
            second: "SOTPKWY",
            planned_dep: Some("09:00".to_string()),
            planned_arr: None,
            dep_time_for_prediction: Some("09:03".to_string()),
            dep_time_kind: DepTimeKind::Estimate,
            has_actual_dep: false,
            actual_dep_confirmed: None,
            departure_delay_min: Some(3.0),
            arrival_delay_min: None,
            dwell_delay_min: None,
            loc_first: ForecastLocation::default(),
            loc_second: ForecastLocation::default(),
        }
    }

    #[test]
    fn builds_row_with_dwell_default() {
        let row = builder().build(&segment()).unwrap();
        assert_eq!(row.departure_delay, 3.0);
        assert_eq!(row.dwell_delay, 0.0);
        assert_eq!(row.day_of_week, "Thursday");
        assert_eq!(row.hour_of_day, 9);
        assert_eq!(row.peak, 1);
        assert_eq!(row.season, "Spring");
    }

    #[test]
    fn missing_departure_delay_yields_nothing() {
        let mut seg = segment();
        seg.departure_delay_min = None;
        assert!(builder().build(&seg).is_none());
    }

    #[test]
    fn missing_anchor_yields_nothing() {
        let mut seg = segment();
        seg.planned_dep = None;
        assert!(builder().build(&seg).is_none());

        let mut seg = segment();
        seg.ssd = None;
        assert!(builder().build(&seg).is_none());
    }

    #[test]
    fn dwell_delay_is_carried_when_present() {
        let mut seg = segment();
        seg.dwell_delay_min = Some(-1.5);
        let row = builder().build(&seg).unwrap();
        assert_eq!(row.dwell_delay, -1.5);
    }

    #[test]
    fn value_addresses_numeric_and_one_hot_keys() {
        let row = builder().build(&segment()).unwrap();
        assert_eq!(row.value("departure_delay"), 3.0);
        assert_eq!(row.value("peak"), 1.0);
        assert_eq!(row.value("day_of_week=Thursday"), 1.0);
        assert_eq!(row.value("day_of_week=Monday"), 0.0);
        assert_eq!(row.value("season=Spring"), 1.0);
        assert_eq!(row.value("no_such_feature"), 0.0);
    }
}
