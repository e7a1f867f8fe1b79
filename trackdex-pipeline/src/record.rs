use serde::{Deserialize, Serialize};
use trackdex_client::RawTrack;

use crate::genres::GenreCache;

/// Delimiter joining multi-valued columns (artists, genres).
pub const LIST_DELIMITER: &str = "; ";

/// The canonical flat shape of one track, as stored in snapshot exports
/// and the merged catalog. Field order is the CSV column order.
///
/// Optional fields serialize as empty CSV cells and explicit JSON nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub spotify_id: String,
    pub name: String,
    pub artists: String,
    pub album: String,
    pub genres: String,
    pub popularity: u32,
    pub duration_ms: u64,
    pub release_date: String,
    pub preview_url: Option<String>,
    pub track_url: String,
    pub explicit: bool,
    pub album_image_url: Option<String>,
}

/// Flatten a raw track plus cached artist genres into a [`TrackRecord`].
///
/// Missing optional sub-structures default to empties; this never fails.
/// Items without an identifier are rejected by the collector and never
/// reach normalization.
pub fn normalize(track: &RawTrack, cache: &GenreCache) -> TrackRecord {
    let album = track.album.clone().unwrap_or_default();
    let artist_names: Vec<&str> = track.artists.iter().map(|a| a.name.as_str()).collect();
    let genres = cache.genre_union(track.artist_ids());
    let album_image_url = album.images.first().map(|image| image.url.clone());

    TrackRecord {
        spotify_id: track.id.clone().unwrap_or_default(),
        name: track.name.clone(),
        artists: artist_names.join(LIST_DELIMITER),
        album: album.name,
        genres: genres.join(LIST_DELIMITER),
        popularity: track.popularity,
        duration_ms: track.duration_ms,
        release_date: album.release_date,
        preview_url: track.preview_url.clone(),
        track_url: track.external_urls.spotify.clone().unwrap_or_default(),
        explicit: track.explicit,
        album_image_url,
    }
}
