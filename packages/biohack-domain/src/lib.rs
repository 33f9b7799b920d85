pub mod dedup;
pub mod query;
pub mod record;
pub mod summary;
pub mod taxonomy;

pub use dedup::dedup_records;
pub use query::normalize_query;
pub use record::{QualityThreshold, Record, SourceType, retain_valid};
pub use summary::Summary;
pub use taxonomy::{Biohack, CategoryGroup, Taxonomy, build_taxonomy};
