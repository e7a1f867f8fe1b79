//! Offline merge of snapshot exports into a single deduplicated track
//! catalog, in a full and a filtered-and-ranked variant.

pub mod error;
pub mod merge;
pub mod output;
pub mod report;

pub use error::MergeError;
pub use merge::{
    MergeVariant, QUALITY_POPULARITY_FLOOR, dedup_by_id, dedup_by_name_artists,
    discover_snapshots, is_quality, load_snapshots, merge_dir, merge_rows,
};
pub use output::{write_catalog_csv, write_catalog_json};
pub use report::{FileRows, MergeReport, top_genres};
