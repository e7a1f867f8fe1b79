//! Serde types for the remote API's JSON payloads.
//!
//! The API is treated as untrusted: any field may be absent or null, so
//! everything optional defaults rather than failing deserialization.

use serde::Deserialize;

/// Response from the accounts token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
}

/// Top-level `/search?type=track` response.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub tracks: Option<SearchPage>,
}

/// One page of track search results.
#[derive(Debug, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub items: Vec<RawTrack>,
    #[serde(default)]
    pub total: u64,
}

/// A track as returned by the remote API.
///
/// A track without an `id` is unusable and gets filtered out by the
/// collector; everything else degrades to empty defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTrack {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<RawArtist>,
    #[serde(default)]
    pub album: Option<RawAlbum>,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl RawTrack {
    /// Ids of this track's artists, skipping artists the API returned
    /// without one.
    pub fn artist_ids(&self) -> impl Iterator<Item = &str> {
        self.artists.iter().filter_map(|a| a.id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArtist {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAlbum {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub images: Vec<AlbumImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlbumImage {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

/// `/artists` batch response. Unknown ids come back as null entries.
#[derive(Debug, Default, Deserialize)]
pub struct ArtistsResponse {
    #[serde(default)]
    pub artists: Vec<Option<Artist>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}
