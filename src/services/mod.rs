use chrono::{Duration, Local, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{FareBotError, GenericError};

pub mod airports;
pub mod amadeus;
pub mod database;
pub mod flights;
pub mod notifications;

/// One row of the destinations table. `iata_code` starts empty and is filled
/// lazily the first time the city is resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub id: i64,
    pub city: String,
    #[serde(default)]
    pub iata_code: String,
    pub lowest_price: Decimal,
}

impl Destination {
    pub fn needs_iata_code(&self) -> bool {
        self.iata_code.trim().is_empty()
    }
}

/// The cheapest round trip found for one destination. Ephemeral: produced per
/// search, compared against the stored threshold, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightOffer {
    pub price: Decimal,
    pub origin_airport: String,
    pub destination_airport: String,
    pub out_date: NaiveDate,
    pub return_date: NaiveDate,
    pub stops: usize,
}

impl FlightOffer {
    pub fn is_direct(&self) -> bool {
        self.stops == 0
    }
}

/// Search window, recomputed each run rather than stored anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripWindow {
    pub depart: NaiveDate,
    pub return_by: NaiveDate,
}

impl TripWindow {
    /// Departures from tomorrow, returns up to six months out.
    pub fn next_six_months() -> Self {
        Self::from_today(Local::now().date_naive())
    }

    pub fn from_today(today: NaiveDate) -> Self {
        TripWindow {
            depart: today + Duration::days(1),
            return_by: today + Duration::days(180),
        }
    }
}

pub fn http_client() -> Result<reqwest::Client, GenericError> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?)
}

pub fn required_var(name: &'static str) -> Result<String, GenericError> {
    dotenv::var(name).map_err(|_| FareBotError::MissingConfig(name).into())
}

pub fn var_or(name: &'static str, default: &str) -> String {
    dotenv::var(name).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_starts_tomorrow_and_ends_180_days_out() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let window = TripWindow::from_today(today);
        assert_eq!(window.depart, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(
            window.return_by,
            NaiveDate::from_ymd_opt(2024, 6, 29).unwrap()
        );
    }

    #[test]
    fn blank_iata_code_needs_resolving() {
        let mut dest = Destination {
            id: 1,
            city: "Kochi".to_string(),
            iata_code: String::new(),
            lowest_price: Decimal::new(35000, 2),
        };
        assert!(dest.needs_iata_code());

        dest.iata_code = "  ".to_string();
        assert!(dest.needs_iata_code());

        dest.iata_code = "COK".to_string();
        assert!(!dest.needs_iata_code());
    }

    #[test]
    fn destination_rows_deserialize_from_store_json() {
        let raw = r#"[
            {"id": 1, "city": "Paris", "iata_code": "PAR", "lowest_price": 54},
            {"id": 2, "city": "Kochi", "iata_code": "", "lowest_price": 350.5}
        ]"#;
        let rows: Vec<Destination> = serde_json::from_str(raw).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].iata_code, "PAR");
        assert!(rows[1].needs_iata_code());
        assert_eq!(rows[1].lowest_price, Decimal::new(3505, 1));
    }
}
