//! Log processing for logtrail
//!
//! This crate provides payload normalization, record filtering, and
//! windowed delivery of filtered result sets.

mod detail;
mod filter;
mod normalize;
mod window;

pub use detail::{RecordSummary, extract_urls};
pub use filter::{FilterOptions, apply, filter_options, matches};
pub use normalize::{DEFAULT_MAX_DEPTH, Normalizer};
pub use window::{
    DEFAULT_OVERSCAN, DEFAULT_PAGE_SIZE, DeliveryMode, Pager, VIRTUALIZE_THRESHOLD, VirtualWindow,
};

// Re-export types used in our public API
pub use logtrail_types::{FilterSpec, LogRecord};
