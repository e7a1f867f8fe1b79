use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::PipelineError;
use crate::record::TrackRecord;

/// File-name prefix shared by every snapshot export.
pub const SNAPSHOT_PREFIX: &str = "tracks_";

/// Snapshot file name for `count` records at `stamp`:
/// `tracks_{count}_{YYYYMMDDTHHMMSSZ}.csv`.
pub fn snapshot_file_name(count: usize, stamp: DateTime<Utc>) -> String {
    format!("{SNAPSHOT_PREFIX}{count}_{}.csv", stamp.format("%Y%m%dT%H%M%SZ"))
}

/// Write one snapshot CSV under `dir`, named for its row count and the
/// current time. Returns the path written.
pub fn write_snapshot(dir: &Path, records: &[TrackRecord]) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(snapshot_file_name(records.len(), Utc::now()));

    let mut writer = csv::Writer::from_path(&path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(path)
}

/// Read one snapshot (or merged catalog) CSV back into records.
pub fn read_snapshot(path: &Path) -> Result<Vec<TrackRecord>, PipelineError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, popularity: u32) -> TrackRecord {
        TrackRecord {
            spotify_id: id.to_string(),
            name: format!("track {id}"),
            artists: "Some Artist".to_string(),
            album: "Some Album".to_string(),
            genres: "pop".to_string(),
            popularity,
            duration_ms: 180_000,
            release_date: "2020-01-01".to_string(),
            preview_url: None,
            track_url: format!("http://open/{id}"),
            explicit: false,
            album_image_url: Some("http://img".to_string()),
        }
    }

    #[test]
    fn test_file_name_embeds_count_and_timestamp() {
        let stamp = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(
            snapshot_file_name(1042, stamp),
            "tracks_1042_20250314T092653Z.csv"
        );
    }

    #[test]
    fn test_write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record("a", 80), record("b", 55)];

        let path = write_snapshot(dir.path(), &records).unwrap();
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("tracks_2_")
        );
        assert_eq!(read_snapshot(&path).unwrap(), records);
    }

    #[test]
    fn test_optional_fields_survive_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let mut sparse = record("a", 10);
        sparse.preview_url = None;
        sparse.album_image_url = None;

        let path = write_snapshot(dir.path(), &[sparse.clone()]).unwrap();
        let back = read_snapshot(&path).unwrap();
        assert_eq!(back, vec![sparse]);
    }

    #[test]
    fn test_empty_snapshot_reads_back_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_snapshot(dir.path(), &[]).unwrap();
        assert!(read_snapshot(&path).unwrap().is_empty());
    }
}
