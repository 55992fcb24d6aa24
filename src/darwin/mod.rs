//! Darwin PushPort stream handling.
//!
//! This module covers:
//! - STOMP transport loop with reconnect (`client`)
//! - Frame decompression and XML parsing (`decoder`, `forecasts`, `schedules`)
//! - Per-segment extraction with direction filtering (`segments`)
//! - Time-window filtering relative to "now" (`filter`)
//! - Date/clock arithmetic shared across the crate (`time`)

pub mod client;
pub mod decoder;
pub mod filter;
pub mod forecasts;
pub mod schedules;
pub mod segments;
pub mod time;

pub const NS_V16: &str = "http://www.thalesgroup.com/rtti/PushPort/v16";
pub const NS_FORECASTS_V3: &str = "http://www.thalesgroup.com/rtti/PushPort/Forecasts/v3";
pub const NS_SCHEDULES_V3: &str = "http://www.thalesgroup.com/rtti/PushPort/Schedules/v3";
