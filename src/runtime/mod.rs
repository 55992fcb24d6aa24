pub mod cache;
pub mod pipeline;

pub use cache::{RecentSegmentCache, SegmentId, SegmentState};
pub use pipeline::RealtimePipeline;
