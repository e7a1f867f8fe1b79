//! One fetch run of the track-catalog pipeline: seeded query
//! generation, paginated search, cross-run dedup against the seen-id
//! ledger, genre enrichment, normalization, and snapshot export.
//!
//! Everything stateful on disk (ledger, genre cache) is an explicit
//! store object loaded at the start of a run and persisted at the end.
//! Concurrent runs against the same files are not supported; callers
//! must serialize invocations themselves.

pub mod error;
pub mod fetch;
pub mod genres;
pub mod ledger;
pub mod queries;
pub mod record;
pub mod run;
pub mod snapshot;

pub use error::PipelineError;
pub use fetch::{BLOCK_CAP, PAGE_SIZE, search_block};
pub use genres::GenreCache;
pub use ledger::SeenLedger;
pub use queries::{MARKETS, SEARCH_THEMES, YEAR_BUCKETS, build_queries, pick_markets};
pub use record::{LIST_DELIMITER, TrackRecord, normalize};
pub use run::{DEFAULT_TARGET, FetchEvent, RunOptions, RunOutcome, run_fetch};
pub use snapshot::{SNAPSHOT_PREFIX, read_snapshot, snapshot_file_name, write_snapshot};
