use std::sync::Mutex;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::credentials::Credentials;
use crate::error::ClientError;
use crate::types::{Artist, ArtistsResponse, SearchPage, SearchResponse, TokenResponse};

const API_BASE_URL: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fallback rate-limit wait when the server advertises no delay.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(2);

/// Retry budget per remote call. A call that fails this many times in a
/// row aborts the whole run; a persistently failing API is a stop
/// condition, not something to paper over.
pub const MAX_ATTEMPTS: u32 = 8;

/// Largest id batch the artists endpoint accepts per call.
pub const ARTIST_BATCH_LIMIT: usize = 50;

/// Why one attempt of a remote call failed, as data the retry loop
/// (and its tests) can act on.
#[derive(Debug)]
pub enum CallFailure {
    /// Bearer session rejected (HTTP 401); needs a fresh token.
    AuthExpired,
    /// Rate limited (HTTP 429) with the server-advertised delay.
    RateLimited { retry_after: Duration },
    /// Transient server failure (HTTP 5xx).
    ServerError { status: u16 },
    /// Transport-level failure (connect, timeout, read), or a body on a
    /// success status that failed to decode.
    Network(String),
}

impl std::fmt::Display for CallFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthExpired => write!(f, "session expired"),
            Self::RateLimited { retry_after } => {
                write!(f, "rate limited, server asks for {}s", retry_after.as_secs())
            }
            Self::ServerError { status } => write!(f, "server error (HTTP {status})"),
            Self::Network(e) => write!(f, "network error: {e}"),
        }
    }
}

/// Sleep duration before the retry following `failure`.
///
/// `attempt` is 0-based. Auth expiry gets a minimal pause (the fix is
/// the token refresh, not the wait); rate limiting honors the advertised
/// delay plus a safety margin; everything transient backs off linearly.
pub fn backoff_delay(failure: &CallFailure, attempt: u32) -> Duration {
    match failure {
        CallFailure::AuthExpired => Duration::from_secs(1),
        CallFailure::RateLimited { retry_after } => *retry_after + Duration::from_secs(1),
        CallFailure::ServerError { .. } => Duration::from_millis(1500 * (u64::from(attempt) + 1)),
        CallFailure::Network(_) => Duration::from_millis(1200 * (u64::from(attempt) + 1)),
    }
}

/// Parse a Retry-After header value (delta seconds) into a wait duration.
fn advertised_delay(header: Option<&str>) -> Duration {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// HTTP client for the catalog API with bearer-session management and a
/// bounded retry policy.
pub struct CatalogClient {
    http: reqwest::blocking::Client,
    creds: Credentials,
    token: Mutex<String>,
}

impl CatalogClient {
    /// Create a client and establish the initial bearer session.
    ///
    /// Rejected credentials surface here, before the caller issues any
    /// catalog request.
    pub fn new(creds: Credentials) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let token = request_token(&http, &creds)?;
        Ok(Self {
            http,
            creds,
            token: Mutex::new(token),
        })
    }

    /// Search for tracks. `limit` is the page size, `offset` the index
    /// of the first result.
    pub fn search(
        &self,
        query: &str,
        market: &str,
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage, ClientError> {
        let url = format!("{API_BASE_URL}/search");
        let params = [
            ("q", query.to_string()),
            ("type", "track".to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
            ("market", market.to_string()),
        ];
        let resp: SearchResponse = self.get_json(&url, &params)?;
        Ok(resp.tracks.unwrap_or_default())
    }

    /// Batch artist lookup, at most [`ARTIST_BATCH_LIMIT`] ids per call.
    ///
    /// Unknown ids come back as `None` entries; the caller decides what
    /// an absent artist means (for genre enrichment: an empty tag list).
    pub fn artists(&self, ids: &[String]) -> Result<Vec<Option<Artist>>, ClientError> {
        let url = format!("{API_BASE_URL}/artists");
        let params = [("ids", ids.join(","))];
        let resp: ArtistsResponse = self.get_json(&url, &params)?;
        Ok(resp.artists)
    }

    /// Issue a GET and drive the retry policy over classified failures.
    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, ClientError> {
        for attempt in 0..MAX_ATTEMPTS {
            let token = self.bearer_token();
            let result = self
                .http
                .get(url)
                .bearer_auth(&token)
                .query(params)
                .send();

            let failure = match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        // A good status with an undecodable body is as
                        // transient as a dropped connection; retry it.
                        match resp.json() {
                            Ok(parsed) => return Ok(parsed),
                            Err(e) => CallFailure::Network(e.to_string()),
                        }
                    } else if status == reqwest::StatusCode::UNAUTHORIZED {
                        CallFailure::AuthExpired
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = advertised_delay(
                            resp.headers()
                                .get(reqwest::header::RETRY_AFTER)
                                .and_then(|v| v.to_str().ok()),
                        );
                        CallFailure::RateLimited { retry_after }
                    } else if status.is_server_error() {
                        CallFailure::ServerError {
                            status: status.as_u16(),
                        }
                    } else {
                        // Any other status class is not retryable.
                        let message = resp.text().unwrap_or_default();
                        return Err(ClientError::Api {
                            status: status.as_u16(),
                            message,
                        });
                    }
                }
                Err(e) => CallFailure::Network(e.to_string()),
            };

            let delay = backoff_delay(&failure, attempt);
            log::warn!(
                "{url}: attempt {}/{MAX_ATTEMPTS} failed ({failure}), retrying in {:.1}s",
                attempt + 1,
                delay.as_secs_f64(),
            );
            std::thread::sleep(delay);

            if matches!(failure, CallFailure::AuthExpired) {
                if let Err(e) = self.refresh_session() {
                    log::warn!("session refresh failed: {e}");
                }
            }
        }

        Err(ClientError::RetriesExhausted(MAX_ATTEMPTS))
    }

    /// Replace the cached bearer token wholesale.
    fn refresh_session(&self) -> Result<(), ClientError> {
        let token = request_token(&self.http, &self.creds)?;
        *self.lock_token() = token;
        Ok(())
    }

    fn bearer_token(&self) -> String {
        self.lock_token().clone()
    }

    fn lock_token(&self) -> std::sync::MutexGuard<'_, String> {
        // Single writer, no panics while held; recover from poisoning
        // rather than propagating it.
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Obtain a bearer token via the client-credentials flow.
fn request_token(
    http: &reqwest::blocking::Client,
    creds: &Credentials,
) -> Result<String, ClientError> {
    let resp = http
        .post(TOKEN_URL)
        .basic_auth(&creds.client_id, Some(&creds.client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()?;

    let status = resp.status();
    if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ClientError::Auth(
            "client credentials rejected by the accounts service".to_string(),
        ));
    }
    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: "token request failed".to_string(),
        });
    }

    let token: TokenResponse = resp.json()?;
    Ok(token.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_waits_advertised_delay_plus_margin() {
        let failure = CallFailure::RateLimited {
            retry_after: Duration::from_secs(3),
        };
        assert!(backoff_delay(&failure, 0) >= Duration::from_secs(4));
        // The margin is fixed; the attempt number does not change it.
        assert_eq!(backoff_delay(&failure, 5), Duration::from_secs(4));
    }

    #[test]
    fn test_auth_expiry_pauses_minimally() {
        assert_eq!(
            backoff_delay(&CallFailure::AuthExpired, 0),
            Duration::from_secs(1)
        );
        assert_eq!(
            backoff_delay(&CallFailure::AuthExpired, 7),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_server_error_backs_off_linearly() {
        let failure = CallFailure::ServerError { status: 503 };
        assert_eq!(backoff_delay(&failure, 0), Duration::from_millis(1500));
        assert_eq!(backoff_delay(&failure, 1), Duration::from_millis(3000));
        assert_eq!(backoff_delay(&failure, 3), Duration::from_millis(6000));
    }

    #[test]
    fn test_undecodable_body_is_retried_as_transport_failure() {
        let failure = CallFailure::Network("error decoding response body".to_string());
        assert_eq!(backoff_delay(&failure, 0), Duration::from_millis(1200));
        assert_eq!(backoff_delay(&failure, 3), Duration::from_millis(4800));
    }

    #[test]
    fn test_advertised_delay_parses_seconds() {
        assert_eq!(advertised_delay(Some("3")), Duration::from_secs(3));
        assert_eq!(advertised_delay(Some(" 10 ")), Duration::from_secs(10));
    }

    #[test]
    fn test_advertised_delay_defaults_when_missing_or_garbage() {
        assert_eq!(advertised_delay(None), DEFAULT_RETRY_AFTER);
        assert_eq!(advertised_delay(Some("soon")), DEFAULT_RETRY_AFTER);
    }
}
