pub mod segment;
pub mod time;

pub use segment::{FeatureRow, SegmentFeatureBuilder, FEATURE_ORDER};
pub use time::{HolidayCalendar, TimeFeatureExtractor, TimeFeatures};
