//! Blocking client for the Spotify Web API with session refresh and
//! bounded retries.
//!
//! The pipeline is deliberately single-threaded (the API enforces a
//! global rate limit, so parallel requests only trade throughput for
//! 429s), so all calls block, including backoff sleeps.

pub mod client;
pub mod credentials;
pub mod error;
pub mod types;

pub use client::{ARTIST_BATCH_LIMIT, CallFailure, CatalogClient, MAX_ATTEMPTS, backoff_delay};
pub use credentials::{
    CredentialSource, CredentialSources, Credentials, config_path, credential_sources,
};
pub use error::ClientError;
pub use types::{Artist, RawAlbum, RawArtist, RawTrack, SearchPage};
