use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use trackdex_client::{ARTIST_BATCH_LIMIT, CatalogClient};

use crate::error::PipelineError;

/// Persisted artist-id → genre-tags map backing enrichment.
///
/// One JSON object on disk, rewritten wholesale on every persist.
/// Entries are overwritten on re-enrichment rather than merged (the
/// cache favors freshness over history) and are never removed.
pub struct GenreCache {
    path: PathBuf,
    entries: HashMap<String, Vec<String>>,
}

impl GenreCache {
    /// Load the cache from `path`. An absent file is an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        let entries = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            HashMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Genres for one artist. Unknown artists have no genres.
    pub fn genres_for(&self, artist_id: &str) -> &[String] {
        self.entries.get(artist_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Union of genres over `artist_ids`, deduplicated and sorted.
    pub fn genre_union<'a>(&self, artist_ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let set: BTreeSet<&str> = artist_ids
            .into_iter()
            .flat_map(|id| self.genres_for(id).iter().map(String::as_str))
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Directly set an artist's genres, replacing any previous entry.
    pub fn insert(&mut self, artist_id: impl Into<String>, genres: Vec<String>) {
        self.entries.insert(artist_id.into(), genres);
    }

    /// Look up genres for every id in `artist_ids` that is not yet
    /// cached, in batches of [`ARTIST_BATCH_LIMIT`], then persist the
    /// whole cache unconditionally.
    ///
    /// Ids the API does not recognize get an empty entry rather than an
    /// error, so they are not re-requested on every run. Returns the
    /// number of ids that had to be fetched.
    pub fn ensure(
        &mut self,
        client: &CatalogClient,
        artist_ids: &[String],
    ) -> Result<usize, PipelineError> {
        let todo: Vec<String> = artist_ids
            .iter()
            .filter(|id| !id.is_empty() && !self.entries.contains_key(id.as_str()))
            .cloned()
            .collect();

        for batch in todo.chunks(ARTIST_BATCH_LIMIT) {
            let found = client.artists(batch)?;
            for artist in found.into_iter().flatten() {
                if !artist.id.is_empty() {
                    self.entries.insert(artist.id, artist.genres);
                }
            }
            for id in batch {
                if !self.entries.contains_key(id) {
                    log::debug!("artist {id} unknown to the API, caching empty genre list");
                    self.entries.insert(id.clone(), Vec::new());
                }
            }
        }

        self.persist()?;
        Ok(todo.len())
    }

    /// Rewrite the cache file wholesale, creating parent directories as
    /// needed. Runs even when nothing changed so a lookup forced by an
    /// earlier caller still ends up durable.
    pub fn persist(&self) -> Result<(), PipelineError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string(&self.entries)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GenreCache::load(dir.path().join("genres.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_persist_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genres.json");

        let mut cache = GenreCache::load(&path).unwrap();
        cache.insert("a1", vec!["jazz".to_string(), "bebop".to_string()]);
        cache.persist().unwrap();

        let reloaded = GenreCache::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.genres_for("a1"), ["jazz", "bebop"]);
    }

    #[test]
    fn test_unknown_artist_has_empty_genres() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GenreCache::load(dir.path().join("genres.json")).unwrap();
        assert!(cache.genres_for("nope").is_empty());
        assert!(cache.genre_union(["nope", "also-nope"]).is_empty());
    }

    #[test]
    fn test_genre_union_dedups_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = GenreCache::load(dir.path().join("genres.json")).unwrap();
        cache.insert("a1", vec!["rock".to_string(), "pop".to_string()]);
        cache.insert("a2", vec!["pop".to_string(), "disco".to_string()]);

        assert_eq!(cache.genre_union(["a1", "a2"]), ["disco", "pop", "rock"]);
    }

    #[test]
    fn test_insert_overwrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = GenreCache::load(dir.path().join("genres.json")).unwrap();
        cache.insert("a1", vec!["rock".to_string()]);
        cache.insert("a1", vec!["jazz".to_string()]);
        assert_eq!(cache.genres_for("a1"), ["jazz"]);
    }
}
