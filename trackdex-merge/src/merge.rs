//! Combine snapshot exports into one deduplicated catalog.
//!
//! Snapshots are read oldest first, so across the whole corpus the
//! earliest occurrence of a track wins every dedup tier.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use trackdex_pipeline::{SNAPSHOT_PREFIX, TrackRecord, read_snapshot};

use crate::error::MergeError;
use crate::report::MergeReport;

/// Rows at or below this popularity are cut from the optimized catalog.
pub const QUALITY_POPULARITY_FLOOR: u32 = 20;

/// Which catalog the merge produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeVariant {
    /// Every deduplicated row.
    Full,
    /// Deduplicated rows filtered for quality and sorted by popularity.
    Optimized,
}

/// Ordering key for a snapshot file name.
///
/// Primary order is the embedded timestamp, then the row count, then the
/// raw name. Names that do not parse sort after every name that does,
/// with a sentinel that outranks any timestamp digit.
fn snapshot_sort_key(name: &str) -> (String, u64, String) {
    let parsed = name
        .strip_prefix(SNAPSHOT_PREFIX)
        .and_then(|rest| rest.strip_suffix(".csv"))
        .and_then(|rest| rest.split_once('_'))
        .and_then(|(count, stamp)| Some((stamp.to_string(), count.parse::<u64>().ok()?)));
    match parsed {
        Some((stamp, count)) => (stamp, count, name.to_string()),
        None => ("~".to_string(), 0, name.to_string()),
    }
}

/// Snapshot files under `dir`, oldest first.
pub fn discover_snapshots(dir: &Path) -> Result<Vec<PathBuf>, MergeError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(SNAPSHOT_PREFIX) && n.ends_with(".csv"))
        })
        .collect();
    if paths.is_empty() {
        return Err(MergeError::NoSnapshots(dir.to_path_buf()));
    }
    paths.sort_by_key(|path| {
        snapshot_sort_key(&path.file_name().unwrap_or_default().to_string_lossy())
    });
    Ok(paths)
}

/// Read every snapshot in order, concatenating rows.
///
/// A file that fails to parse is skipped with a warning; the merge only
/// fails when not a single file could be read.
pub fn load_snapshots(
    paths: &[PathBuf],
    report: &mut MergeReport,
) -> Result<Vec<TrackRecord>, MergeError> {
    let mut rows = Vec::new();
    let mut readable = 0;
    for path in paths {
        match read_snapshot(path) {
            Ok(records) => {
                report.record_file(path, records.len());
                rows.extend(records);
                readable += 1;
            }
            Err(e) => {
                log::warn!("skipping unreadable snapshot {}: {e}", path.display());
                report.files_skipped += 1;
            }
        }
    }
    if readable == 0 {
        return Err(MergeError::NoValidData);
    }
    Ok(rows)
}

/// Drop rows whose track id was already seen, keeping first occurrences.
/// Rows without an id pass through untouched.
pub fn dedup_by_id(rows: Vec<TrackRecord>) -> Vec<TrackRecord> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| row.spotify_id.is_empty() || seen.insert(row.spotify_id.clone()))
        .collect()
}

/// Drop rows repeating an earlier (name, artists) pair. This catches the
/// same recording released under distinct catalog ids.
pub fn dedup_by_name_artists(rows: Vec<TrackRecord>) -> Vec<TrackRecord> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert((row.name.clone(), row.artists.clone())))
        .collect()
}

/// Whether a row meets the optimized catalog's quality bar.
pub fn is_quality(row: &TrackRecord) -> bool {
    row.popularity > QUALITY_POPULARITY_FLOOR && !row.genres.is_empty()
}

/// Run the dedup tiers (and, for [`MergeVariant::Optimized`], the
/// quality filter and popularity sort) over concatenated rows.
pub fn merge_rows(
    rows: Vec<TrackRecord>,
    variant: MergeVariant,
    report: &mut MergeReport,
) -> Vec<TrackRecord> {
    report.rows_combined = rows.len();
    let rows = dedup_by_id(rows);
    report.after_id_dedup = rows.len();
    let mut rows = dedup_by_name_artists(rows);
    report.after_name_dedup = rows.len();

    if variant == MergeVariant::Optimized {
        rows.retain(is_quality);
        report.after_filter = Some(rows.len());
        // Stable sort preserves first-occurrence order within a
        // popularity tie.
        rows.sort_by(|a, b| b.popularity.cmp(&a.popularity));
    }
    report.summarize_rows(&rows);
    rows
}

/// Merge every snapshot under `dir` into one catalog.
pub fn merge_dir(
    dir: &Path,
    variant: MergeVariant,
) -> Result<(Vec<TrackRecord>, MergeReport), MergeError> {
    let paths = discover_snapshots(dir)?;
    let mut report = MergeReport::default();
    let rows = load_snapshots(&paths, &mut report)?;
    let merged = merge_rows(rows, variant, &mut report);
    Ok((merged, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn row(id: &str, name: &str, artists: &str, popularity: u32, genres: &str) -> TrackRecord {
        TrackRecord {
            spotify_id: id.to_string(),
            name: name.to_string(),
            artists: artists.to_string(),
            album: "Album".to_string(),
            genres: genres.to_string(),
            popularity,
            duration_ms: 200_000,
            release_date: "2020".to_string(),
            preview_url: None,
            track_url: String::new(),
            explicit: false,
            album_image_url: None,
        }
    }

    fn write_csv(path: &Path, rows: &[TrackRecord]) {
        let mut writer = csv::Writer::from_path(path).unwrap();
        for row in rows {
            writer.serialize(row).unwrap();
        }
        writer.flush().unwrap();
    }

    #[test]
    fn test_sort_key_orders_by_timestamp_then_count() {
        let mut names = vec![
            "tracks_500_20250302T000000Z.csv",
            "tracks_90_20250301T120000Z.csv",
            "tracks_1200_20250301T120000Z.csv",
        ];
        names.sort_by_key(|n| snapshot_sort_key(n));
        assert_eq!(
            names,
            [
                "tracks_90_20250301T120000Z.csv",
                "tracks_1200_20250301T120000Z.csv",
                "tracks_500_20250302T000000Z.csv",
            ]
        );
    }

    #[test]
    fn test_sort_key_unparsable_names_sort_last() {
        let mut names = vec!["tracks_weird.csv", "tracks_10_20250101T000000Z.csv"];
        names.sort_by_key(|n| snapshot_sort_key(n));
        assert_eq!(names[1], "tracks_weird.csv");
    }

    #[test]
    fn test_dedup_by_id_keeps_first_occurrence() {
        let rows = vec![
            row("a", "one", "X", 40, "pop"),
            row("a", "one again", "X", 70, "pop"),
            row("b", "two", "Y", 10, ""),
        ];
        let out = dedup_by_id(rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].popularity, 40);
    }

    #[test]
    fn test_dedup_by_id_passes_idless_rows_through() {
        let rows = vec![
            row("", "one", "X", 1, ""),
            row("", "two", "Y", 2, ""),
            row("a", "three", "Z", 3, ""),
        ];
        assert_eq!(dedup_by_id(rows).len(), 3);
    }

    #[test]
    fn test_dedup_by_name_artists_collapses_reissues() {
        let rows = vec![
            row("a", "Song", "Band", 50, "rock"),
            row("b", "Song", "Band", 60, "rock"),
            row("c", "Song", "Other Band", 30, "rock"),
        ];
        let out = dedup_by_name_artists(rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].spotify_id, "a");
    }

    #[test]
    fn test_quality_requires_popularity_and_genres() {
        assert!(is_quality(&row("a", "s", "x", 21, "pop")));
        assert!(!is_quality(&row("a", "s", "x", 20, "pop")));
        assert!(!is_quality(&row("a", "s", "x", 90, "")));
    }

    #[test]
    fn test_optimized_merge_sorts_by_popularity_descending() {
        let rows = vec![
            row("a", "one", "X", 30, "pop"),
            row("b", "two", "Y", 90, "rock"),
            row("c", "three", "Z", 5, "pop"),
            row("d", "four", "W", 60, ""),
        ];
        let mut report = MergeReport::default();
        let out = merge_rows(rows, MergeVariant::Optimized, &mut report);

        let pops: Vec<u32> = out.iter().map(|r| r.popularity).collect();
        assert_eq!(pops, [90, 30]);
        assert_eq!(report.after_filter, Some(2));
        for pair in pops.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn test_full_merge_keeps_low_popularity_rows() {
        let rows = vec![row("a", "one", "X", 0, ""), row("b", "two", "Y", 90, "pop")];
        let mut report = MergeReport::default();
        let out = merge_rows(rows, MergeVariant::Full, &mut report);
        assert_eq!(out.len(), 2);
        assert!(report.after_filter.is_none());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let rows = vec![
            row("a", "one", "X", 50, "pop"),
            row("a", "one", "X", 50, "pop"),
            row("b", "two", "Y", 40, "rock"),
        ];
        let mut first_report = MergeReport::default();
        let once = merge_rows(rows, MergeVariant::Optimized, &mut first_report);
        let mut second_report = MergeReport::default();
        let twice = merge_rows(once.clone(), MergeVariant::Optimized, &mut second_report);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_first_occurrence_wins_across_files() {
        let dir = tempfile::tempdir().unwrap();
        // Older file carries the less popular duplicate; it still wins.
        write_csv(
            &dir.path().join("tracks_1_20250101T000000Z.csv"),
            &[row("a", "Song", "Band", 40, "pop")],
        );
        write_csv(
            &dir.path().join("tracks_1_20250201T000000Z.csv"),
            &[row("a", "Song", "Band", 70, "pop")],
        );

        let (rows, report) = merge_dir(dir.path(), MergeVariant::Full).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].popularity, 40);
        assert_eq!(report.rows_combined, 2);
    }

    #[test]
    fn test_malformed_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            &dir.path().join("tracks_1_20250101T000000Z.csv"),
            &[row("a", "Song", "Band", 40, "pop")],
        );
        fs::write(
            dir.path().join("tracks_1_20250102T000000Z.csv"),
            "not,a,snapshot\n1,2",
        )
        .unwrap();

        let (rows, report) = merge_dir(dir.path(), MergeVariant::Full).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(report.files_skipped, 1);
    }

    #[test]
    fn test_empty_dir_is_no_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            merge_dir(dir.path(), MergeVariant::Full),
            Err(MergeError::NoSnapshots(_))
        ));
    }

    #[test]
    fn test_discover_ignores_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        write_csv(
            &dir.path().join("tracks_1_20250101T000000Z.csv"),
            &[row("a", "Song", "Band", 40, "pop")],
        );
        let paths = discover_snapshots(dir.path()).unwrap();
        assert_eq!(paths.len(), 1);
    }
}
