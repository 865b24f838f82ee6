use async_trait::async_trait;
use chrono::NaiveDate;
use log::*;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{FareBotError, GenericError};

use super::amadeus::{AmadeusAuth, RateLimiter, AMADEUS_PACING_MS, FLIGHT_OFFERS_ENDPOINT};
use super::{http_client, var_or, FlightOffer, TripWindow};

#[async_trait]
pub trait FlightSearchService {
    fn new() -> Result<Self, GenericError>
    where
        Self: Sized;

    /// Search round trips inside the window and return the cheapest offer,
    /// or `None` when the API has nothing for that route.
    async fn check_flights(
        &self,
        origin: &str,
        destination: &str,
        window: &TripWindow,
    ) -> Result<Option<FlightOffer>, GenericError>;
}

pub struct AmadeusFlightsService {
    http: reqwest::Client,
    auth: AmadeusAuth,
    limiter: RateLimiter,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct OffersResponse {
    #[serde(default)]
    data: Vec<RawOffer>,
}

#[derive(Debug, Deserialize)]
struct RawOffer {
    itineraries: Vec<RawItinerary>,
    price: RawPrice,
}

#[derive(Debug, Deserialize)]
struct RawItinerary {
    segments: Vec<RawSegment>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    departure: RawEndpoint,
    arrival: RawEndpoint,
}

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    #[serde(rename = "iataCode")]
    iata_code: String,
    /// Local timestamp such as `2024-03-01T10:05:00`.
    at: String,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    #[serde(rename = "grandTotal")]
    grand_total: String,
}

fn malformed(detail: String) -> GenericError {
    FareBotError::MalformedResponse {
        service: "amadeus",
        detail,
    }
    .into()
}

fn date_of(timestamp: &str) -> Result<NaiveDate, GenericError> {
    let date = timestamp.split('T').next().unwrap_or(timestamp);
    date.parse()
        .map_err(|e| malformed(format!("unparseable departure time {timestamp:?}: {e}")))
}

impl TryFrom<RawOffer> for FlightOffer {
    type Error = GenericError;

    fn try_from(raw: RawOffer) -> Result<Self, Self::Error> {
        let outbound = raw
            .itineraries
            .first()
            .ok_or_else(|| malformed("offer without an outbound itinerary".to_string()))?;
        let inbound = raw
            .itineraries
            .get(1)
            .ok_or_else(|| malformed("offer without a return itinerary".to_string()))?;
        let first_leg = outbound
            .segments
            .first()
            .ok_or_else(|| malformed("outbound itinerary without segments".to_string()))?;
        let last_leg = outbound
            .segments
            .last()
            .ok_or_else(|| malformed("outbound itinerary without segments".to_string()))?;
        let return_leg = inbound
            .segments
            .first()
            .ok_or_else(|| malformed("return itinerary without segments".to_string()))?;

        Ok(FlightOffer {
            price: raw
                .price
                .grand_total
                .parse::<Decimal>()
                .map_err(|e| malformed(format!("unparseable grand total: {e}")))?,
            origin_airport: first_leg.departure.iata_code.clone(),
            destination_airport: last_leg.arrival.iata_code.clone(),
            out_date: date_of(&first_leg.departure.at)?,
            return_date: date_of(&return_leg.departure.at)?,
            stops: outbound.segments.len() - 1,
        })
    }
}

/// Minimum-price scan over the returned offers; the API's ordering is not
/// trusted.
fn find_cheapest(offers: Vec<RawOffer>) -> Result<Option<FlightOffer>, GenericError> {
    let mut cheapest: Option<FlightOffer> = None;
    for raw in offers {
        let offer = FlightOffer::try_from(raw)?;
        match &cheapest {
            Some(best) if best.price <= offer.price => {}
            _ => cheapest = Some(offer),
        }
    }
    Ok(cheapest)
}

#[async_trait]
impl FlightSearchService for AmadeusFlightsService {
    fn new() -> Result<Self, GenericError> {
        Ok(AmadeusFlightsService {
            http: http_client()?,
            auth: AmadeusAuth::from_env()?,
            limiter: RateLimiter::new(AMADEUS_PACING_MS),
            currency: var_or("SEARCH_CURRENCY", "GBP"),
        })
    }

    async fn check_flights(
        &self,
        origin: &str,
        destination: &str,
        window: &TripWindow,
    ) -> Result<Option<FlightOffer>, GenericError> {
        self.limiter.wait().await;
        let token = self.auth.bearer_token(&self.http).await?;

        let depart = window.depart.to_string();
        let return_by = window.return_by.to_string();
        let query = [
            ("originLocationCode", origin),
            ("destinationLocationCode", destination),
            ("departureDate", depart.as_str()),
            ("returnDate", return_by.as_str()),
            ("adults", "1"),
            ("nonStop", "true"),
            ("currencyCode", self.currency.as_str()),
            ("max", "10"),
        ];

        let response = self
            .http
            .get(FLIGHT_OFFERS_ENDPOINT)
            .bearer_auth(&token)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FareBotError::from_status("amadeus", status.as_u16(), body).into());
        }

        let offers: OffersResponse = response.json().await?;
        if offers.data.is_empty() {
            trace!("No offers returned for {} -> {}.", origin, destination);
            return Ok(None);
        }

        let cheapest = find_cheapest(offers.data)?;
        if let Some(offer) = &cheapest {
            trace!(
                "Cheapest offer for {} -> {} is {} {}.",
                origin,
                destination,
                self.currency,
                offer.price
            );
        }
        Ok(cheapest)
    }
}
