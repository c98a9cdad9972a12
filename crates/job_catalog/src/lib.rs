//! File-backed job catalog and the overlay that merges replay progress into
//! job lookups.

mod overlay;
mod stats;
mod store;

pub use overlay::JobStatusOverlay;
pub use stats::{job_statistics, CurrentCounts, JobListingView, JobStatistics, PastCounts};
pub use store::{CatalogConfig, JsonCatalogStore};
