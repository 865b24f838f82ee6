//! Shared plumbing for the two Amadeus-backed services: the OAuth2
//! client-credentials token cache and the request pacer for the heavily
//! throttled test environment.

use std::time::{Duration, Instant};

use log::*;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{FareBotError, GenericError};

use super::required_var;

pub const TOKEN_ENDPOINT: &str = "https://test.api.amadeus.com/v1/security/oauth2/token";
pub const CITY_LOOKUP_ENDPOINT: &str =
    "https://test.api.amadeus.com/v1/reference-data/locations/cities";
pub const FLIGHT_OFFERS_ENDPOINT: &str = "https://test.api.amadeus.com/v2/shopping/flight-offers";

/// Minimum gap between Amadeus requests.
pub const AMADEUS_PACING_MS: u64 = 500;

const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    /// Fresh enough to use, leaving a margin so a token never expires mid-call.
    fn still_valid(&self, now: Instant) -> bool {
        now + EXPIRY_MARGIN < self.expires_at
    }
}

/// Client-credentials token holder. The first caller fetches a token, later
/// callers reuse it until it nears expiry.
pub struct AmadeusAuth {
    api_key: String,
    api_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl AmadeusAuth {
    pub fn from_env() -> Result<Self, GenericError> {
        Ok(AmadeusAuth {
            api_key: required_var("AMADEUS_API_KEY")?,
            api_secret: required_var("AMADEUS_SECRET")?,
            token: Mutex::new(None),
        })
    }

    pub async fn bearer_token(&self, http: &reqwest::Client) -> Result<String, GenericError> {
        let mut slot = self.token.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.still_valid(Instant::now()) {
                return Ok(cached.value.clone());
            }
        }

        let response = http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.api_key.as_str()),
                ("client_secret", self.api_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FareBotError::from_status("amadeus", status.as_u16(), body).into());
        }

        let token: TokenResponse = response.json().await?;
        trace!("Fetched Amadeus token, expires in {}s.", token.expires_in);

        let cached = CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        };
        let value = cached.value.clone();
        *slot = Some(cached);
        Ok(value)
    }
}

/// Serializes outbound calls so consecutive requests are at least
/// `min_interval` apart.
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval_ms: u64) -> Self {
        RateLimiter {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                trace!("Pacing Amadeus call, waiting {:?}.", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_deserializes() {
        let raw = r#"{"type":"amadeusOAuth2Token","access_token":"abc123","token_type":"Bearer","expires_in":1799}"#;
        let token: TokenResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(token.access_token, "abc123");
        assert_eq!(token.expires_in, 1799);
    }

    #[test]
    fn cached_token_expires_with_margin() {
        let now = Instant::now();
        let fresh = CachedToken {
            value: "t".to_string(),
            expires_at: now + Duration::from_secs(1800),
        };
        assert!(fresh.still_valid(now));

        let nearly_expired = CachedToken {
            value: "t".to_string(),
            expires_at: now + Duration::from_secs(30),
        };
        assert!(!nearly_expired.still_valid(now));
    }

    #[tokio::test]
    async fn rate_limiter_spaces_out_calls() {
        let limiter = RateLimiter::new(100);

        let start = Instant::now();
        limiter.wait().await;
        let first = start.elapsed();
        limiter.wait().await;
        let second = start.elapsed();

        assert!(first < Duration::from_millis(50));
        assert!(second >= Duration::from_millis(90));
    }
}
