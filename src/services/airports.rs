use async_trait::async_trait;
use log::*;
use serde::Deserialize;

use crate::{FareBotError, GenericError};

use super::amadeus::{AmadeusAuth, RateLimiter, AMADEUS_PACING_MS, CITY_LOOKUP_ENDPOINT};
use super::http_client;

#[async_trait]
pub trait AirportLookupService {
    fn new() -> Result<Self, GenericError>
    where
        Self: Sized;
    async fn city_code(&self, city: &str) -> Result<String, GenericError>;
}

/// Resolves city names against the Amadeus city directory.
pub struct AmadeusLocationsService {
    http: reqwest::Client,
    auth: AmadeusAuth,
    limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct LocationsResponse {
    #[serde(default)]
    data: Vec<CityLocation>,
}

#[derive(Debug, Deserialize)]
struct CityLocation {
    #[serde(rename = "iataCode")]
    iata_code: Option<String>,
}

/// The API returns results ranked by relevance; we take whichever it ranks
/// first rather than imposing our own tie-break.
fn first_city_code(data: Vec<CityLocation>, city: &str) -> Result<String, GenericError> {
    data.into_iter()
        .next()
        .and_then(|location| location.iata_code)
        .ok_or_else(|| FareBotError::CityNotFound(city.to_string()).into())
}

#[async_trait]
impl AirportLookupService for AmadeusLocationsService {
    fn new() -> Result<Self, GenericError> {
        Ok(AmadeusLocationsService {
            http: http_client()?,
            auth: AmadeusAuth::from_env()?,
            limiter: RateLimiter::new(AMADEUS_PACING_MS),
        })
    }

    async fn city_code(&self, city: &str) -> Result<String, GenericError> {
        self.limiter.wait().await;
        let token = self.auth.bearer_token(&self.http).await?;

        let response = self
            .http
            .get(CITY_LOOKUP_ENDPOINT)
            .bearer_auth(&token)
            .query(&[("keyword", city), ("max", "2"), ("include", "AIRPORTS")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FareBotError::from_status("amadeus", status.as_u16(), body).into());
        }

        let locations: LocationsResponse = response.json().await?;
        let code = first_city_code(locations.data, city)?;
        trace!("Resolved city {} to IATA code {}.", city, code);
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_the_first_ranked_match() {
        let raw = r#"{
            "data": [
                {"type": "location", "subType": "city", "name": "KOCHI", "iataCode": "COK"},
                {"type": "location", "subType": "city", "name": "KOCHI", "iataCode": "KCZ"}
            ]
        }"#;
        let parsed: LocationsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(first_city_code(parsed.data, "Kochi").unwrap(), "COK");
    }

    #[test]
    fn unknown_city_is_not_found() {
        let parsed: LocationsResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        let err = first_city_code(parsed.data, "Atlantis").unwrap_err();
        let err = err.downcast::<FareBotError>().unwrap();
        assert!(matches!(*err, FareBotError::CityNotFound(ref city) if city == "Atlantis"));
    }

    #[test]
    fn missing_data_key_is_not_found() {
        let parsed: LocationsResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(first_city_code(parsed.data, "Nowhere").is_err());
    }

    #[test]
    fn first_match_without_code_is_not_found() {
        let raw = r#"{"data": [{"name": "SOMEWHERE"}]}"#;
        let parsed: LocationsResponse = serde_json::from_str(raw).unwrap();
        assert!(first_city_code(parsed.data, "Somewhere").is_err());
    }
}
