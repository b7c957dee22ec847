pub mod analyzer;
pub mod summary;
pub mod types;
pub mod utils;

pub use analyzer::{classify_column, profile_dataset, Profiler};
pub use summary::{recommend_chart, summarize_categorical, summarize_numeric, summarize_temporal};
pub use types::*;
pub use utils::{normalize_headers, parse_timestamp};
