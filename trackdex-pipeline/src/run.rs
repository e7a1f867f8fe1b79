//! The fetch-run driver: wire the query generator, fetcher, ledger,
//! genre cache, normalizer, and snapshot writer into one run.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use trackdex_client::{CatalogClient, RawTrack};

use crate::error::PipelineError;
use crate::fetch::{BLOCK_CAP, PAGE_SIZE, search_block};
use crate::genres::GenreCache;
use crate::ledger::SeenLedger;
use crate::queries::{build_queries, pick_markets};
use crate::record::{TrackRecord, normalize};
use crate::snapshot::write_snapshot;

/// New tracks a run aims for before it stops searching.
pub const DEFAULT_TARGET: usize = 1000;

/// Everything one fetch run needs to know up front.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Stop collecting once this many new tracks are in hand.
    pub target: usize,
    /// Directory snapshot CSVs land in.
    pub exports_dir: PathBuf,
    /// Path of the seen-id ledger file.
    pub ledger_path: PathBuf,
    /// Path of the artist-genre cache file.
    pub genre_cache_path: PathBuf,
    /// RNG seed; `None` derives one from the current time.
    pub seed: Option<u64>,
}

/// Progress notifications emitted while a run executes, for the caller
/// to render however it likes.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    RunStarted {
        seed: u64,
        queries: usize,
        markets: Vec<String>,
        already_seen: usize,
    },
    BlockStarted {
        query: String,
        market: String,
    },
    BlockFinished {
        new_tracks: usize,
        collected: usize,
        target: usize,
    },
    EnrichingGenres {
        artists: usize,
    },
    WritingSnapshot {
        count: usize,
    },
}

/// How a run ended, short of an error.
#[derive(Debug)]
pub enum RunOutcome {
    /// A snapshot landed on disk.
    Written {
        path: PathBuf,
        count: usize,
        seed: u64,
    },
    /// Every block came back empty of new tracks; nothing was written
    /// and the ledger was not touched.
    Empty { seed: u64 },
}

/// Move unseen tracks from `block` into `collected`, marking their ids
/// seen, stopping as soon as `collected` holds `target` tracks. Items
/// without an id are dropped. Returns the number of tracks kept.
fn take_new_tracks(
    block: Vec<RawTrack>,
    seen: &mut HashSet<String>,
    collected: &mut Vec<RawTrack>,
    target: usize,
) -> usize {
    let mut kept = 0;
    for track in block {
        if collected.len() >= target {
            break;
        }
        let Some(id) = track.id.as_deref() else {
            continue;
        };
        if !seen.insert(id.to_string()) {
            continue;
        }
        collected.push(track);
        kept += 1;
    }
    kept
}

/// Distinct artist ids across `tracks`, sorted for a stable fetch order.
fn collect_artist_ids(tracks: &[RawTrack]) -> Vec<String> {
    let mut ids: Vec<String> = tracks
        .iter()
        .flat_map(|track| track.artist_ids())
        .map(str::to_string)
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Execute one fetch run end to end.
///
/// The ledger is appended only after the snapshot write succeeds, so an
/// aborted run never marks tracks seen that no snapshot holds.
pub fn run_fetch(
    client: &CatalogClient,
    options: &RunOptions,
    progress: &dyn Fn(FetchEvent),
) -> Result<RunOutcome, PipelineError> {
    let seed = options
        .seed
        .unwrap_or_else(|| Utc::now().timestamp() as u64);
    let mut rng = StdRng::seed_from_u64(seed);
    let queries = build_queries(&mut rng);
    let markets = pick_markets(&mut rng);

    let ledger = SeenLedger::new(&options.ledger_path);
    let mut seen = ledger.load()?;
    progress(FetchEvent::RunStarted {
        seed,
        queries: queries.len(),
        markets: markets.clone(),
        already_seen: seen.len(),
    });

    let mut collected: Vec<RawTrack> = Vec::new();
    'markets: for market in &markets {
        for query in &queries {
            progress(FetchEvent::BlockStarted {
                query: query.clone(),
                market: market.clone(),
            });
            let mut block = search_block(client, query, market, BLOCK_CAP, PAGE_SIZE)?;
            // Shuffle within the block so the snapshot does not mirror
            // the API's relevance ordering.
            block.shuffle(&mut rng);
            let new_tracks = take_new_tracks(block, &mut seen, &mut collected, options.target);
            progress(FetchEvent::BlockFinished {
                new_tracks,
                collected: collected.len(),
                target: options.target,
            });
            if collected.len() >= options.target {
                break 'markets;
            }
        }
    }

    if collected.is_empty() {
        log::info!("run {seed}: no unseen tracks found, nothing written");
        return Ok(RunOutcome::Empty { seed });
    }

    let artist_ids = collect_artist_ids(&collected);
    progress(FetchEvent::EnrichingGenres {
        artists: artist_ids.len(),
    });
    let mut cache = GenreCache::load(&options.genre_cache_path)?;
    let fetched = cache.ensure(client, &artist_ids)?;
    log::debug!(
        "genre cache: {fetched} artists fetched, {} entries total",
        cache.len()
    );

    let records: Vec<TrackRecord> = collected
        .iter()
        .map(|track| normalize(track, &cache))
        .collect();
    progress(FetchEvent::WritingSnapshot {
        count: records.len(),
    });
    let path = write_snapshot(&options.exports_dir, &records)?;

    let new_ids: HashSet<String> = records
        .iter()
        .map(|record| record.spotify_id.clone())
        .collect();
    ledger.append(&new_ids)?;

    Ok(RunOutcome::Written {
        path,
        count: records.len(),
        seed,
    })
}
