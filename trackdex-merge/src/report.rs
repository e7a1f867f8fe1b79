use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use trackdex_pipeline::{LIST_DELIMITER, TrackRecord};

/// Row counts at each stage of a merge, for the summary printout.
#[derive(Debug, Default, Serialize)]
pub struct MergeReport {
    pub per_file: Vec<FileRows>,
    pub files_skipped: usize,
    pub rows_combined: usize,
    pub after_id_dedup: usize,
    pub after_name_dedup: usize,
    /// Only set for the optimized variant.
    pub after_filter: Option<usize>,
    pub final_count: usize,
    /// (min, max) popularity across the final rows; `None` when empty.
    pub popularity_range: Option<(u32, u32)>,
    /// Distinct artist names across the final rows.
    pub distinct_artists: usize,
}

#[derive(Debug, Serialize)]
pub struct FileRows {
    pub name: String,
    pub rows: usize,
}

impl MergeReport {
    pub fn record_file(&mut self, path: &Path, rows: usize) {
        self.per_file.push(FileRows {
            name: path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned(),
            rows,
        });
    }

    pub fn files_read(&self) -> usize {
        self.per_file.len()
    }

    /// Fill in the final-row statistics.
    pub fn summarize_rows(&mut self, rows: &[TrackRecord]) {
        self.final_count = rows.len();
        self.popularity_range = rows
            .iter()
            .map(|row| row.popularity)
            .fold(None, |range, p| match range {
                None => Some((p, p)),
                Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
            });
        self.distinct_artists = rows
            .iter()
            .flat_map(|row| row.artists.split(LIST_DELIMITER))
            .filter(|artist| !artist.is_empty())
            .collect::<std::collections::HashSet<_>>()
            .len();
    }
}

/// The `limit` most frequent genre tags across `rows`, most frequent
/// first; ties break alphabetically.
pub fn top_genres(rows: &[TrackRecord], limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        for genre in row.genres.split(LIST_DELIMITER) {
            if !genre.is_empty() {
                *counts.entry(genre).or_default() += 1;
            }
        }
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(genre, count)| (genre.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}
