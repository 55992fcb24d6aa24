//! HSP (Historical Service Performance) integration: the HTTPS client
//! and the parser that flattens service details into per-location rows.

pub mod client;
pub mod parser;

pub use client::HspClient;
pub use parser::{extract_service_locations, HspLocation};
