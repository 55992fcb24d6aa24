//! Calendar features extracted from a zoned timestamp.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, Timelike};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum HolidayError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// A set of public-holiday dates. An empty calendar simply reports no
/// holidays, which is the documented fallback when no data is configured.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    dates: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a one-column CSV of `YYYY-MM-DD` dates. Unparseable lines are
    /// skipped (this tolerates a header row).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, HolidayError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path.as_ref())?;

        let mut dates = HashSet::new();
        let mut skipped = 0usize;
        for result in rdr.records() {
            let record = result?;
            let Some(field) = record.get(0) else {
                continue;
            };
            match NaiveDate::parse_from_str(field.trim(), "%Y-%m-%d") {
                Ok(date) => {
                    dates.insert(date);
                }
                Err(_) => skipped += 1,
            }
        }
        if skipped > 1 {
            warn!(skipped, "Skipped unparseable holiday calendar lines");
        }

        Ok(Self { dates })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeFeatures {
    pub peak: i64,
    pub day_of_week: String,
    pub day_of_month: i64,
    pub hour_of_day: i64,
    pub weekend: i64,
    pub season: String,
    pub month: i64,
    pub holiday: i64,
}

/// Extracts calendar features from a timestamp: weekend is Saturday or
/// Sunday, peak is a weekday morning (07-09) or evening (16-19) hour.
#[derive(Debug, Clone, Default)]
pub struct TimeFeatureExtractor {
    holidays: HolidayCalendar,
}

impl TimeFeatureExtractor {
    pub fn new(holidays: HolidayCalendar) -> Self {
        Self { holidays }
    }

    pub fn extract(&self, dt: DateTime<Tz>) -> TimeFeatures {
        let date = dt.date_naive();
        let hour = dt.hour() as i64;

        let day_of_week = dt.format("%A").to_string();
        let weekend = matches!(day_of_week.as_str(), "Saturday" | "Sunday") as i64;
        let peak = peak_flag(hour, weekend);
        let season = season_for(date).to_string();
        let holiday = self.holidays.contains(date) as i64;

        TimeFeatures {
            peak,
            day_of_week,
            day_of_month: date.day() as i64,
            hour_of_day: hour,
            weekend,
            season,
            month: date.month() as i64,
            holiday,
        }
    }
}

fn peak_flag(hour: i64, weekend: i64) -> i64 {
    if weekend == 1 {
        return 0;
    }
    if (6 < hour && hour < 10) || (16..=19).contains(&hour) {
        1
    } else {
        0
    }
}

/// Season by calendar date: Winter up to Mar 20 and from Dec 21, Spring
/// Mar 21 - Jun 20, Summer Jun 21 - Sep 22, Autumn Sep 23 - Dec 20.
fn season_for(date: NaiveDate) -> &'static str {
    let md = (date.month(), date.day());
    if md <= (3, 20) || md >= (12, 21) {
        "Winter"
    } else if md <= (6, 20) {
        "Spring"
    } else if md <= (9, 22) {
        "Summer"
    } else {
        "Autumn"
    }
}
