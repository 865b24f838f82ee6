use log::*;
use rust_decimal::Decimal;

use crate::services::airports::AirportLookupService;
use crate::services::database::DestinationStoreService;
use crate::services::flights::FlightSearchService;
use crate::services::notifications::{deal_message, NotificationService};
use crate::services::{var_or, TripWindow};
use crate::GenericError;

pub struct SweepConfig {
    pub origin: String,
    pub currency: String,
}

impl SweepConfig {
    pub fn from_env() -> Self {
        SweepConfig {
            origin: var_or("ORIGIN_IATA", "LON"),
            currency: var_or("SEARCH_CURRENCY", "GBP"),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub destinations: usize,
    pub deals: usize,
    pub skipped: usize,
}

/// A deal is strictly below the stored threshold. Same currency on both
/// sides is assumed; there is no conversion step.
pub fn is_deal(offer_price: Decimal, threshold: Decimal) -> bool {
    offer_price < threshold
}

/// One full pass over the destinations table. Row failures are logged and
/// the sweep moves on; only a failure to list the table at all is fatal.
pub async fn sweep<S, L, F>(
    store: &S,
    airports: &L,
    flights: &F,
    notifier: &dyn NotificationService,
    config: &SweepConfig,
) -> Result<SweepSummary, GenericError>
where
    S: DestinationStoreService,
    L: AirportLookupService,
    F: FlightSearchService,
{
    let destinations = store.list_destinations().await?;
    let window = TripWindow::next_six_months();
    let mut summary = SweepSummary {
        destinations: destinations.len(),
        ..Default::default()
    };

    for mut destination in destinations {
        if destination.needs_iata_code() {
            let code = match airports.city_code(&destination.city).await {
                Ok(code) => code,
                Err(why) => {
                    warn!(
                        "Skipping {}: could not resolve IATA code: {}",
                        destination.city, why
                    );
                    summary.skipped += 1;
                    continue;
                }
            };
            if let Err(why) = store.update_iata_code(destination.id, &code).await {
                warn!(
                    "Skipping {}: could not store IATA code {}: {}",
                    destination.city, code, why
                );
                summary.skipped += 1;
                continue;
            }
            destination.iata_code = code;
        }

        trace!(
            "Checking flights for {} ({}).",
            destination.city,
            destination.iata_code
        );
        let offer = match flights
            .check_flights(&config.origin, &destination.iata_code, &window)
            .await
        {
            Ok(offer) => offer,
            Err(why) => {
                warn!("Skipping {}: flight search failed: {}", destination.city, why);
                summary.skipped += 1;
                continue;
            }
        };

        let offer = match offer {
            Some(offer) => offer,
            None => {
                trace!("No flights found for {}.", destination.city);
                continue;
            }
        };

        if !is_deal(offer.price, destination.lowest_price) {
            trace!(
                "No deal for {}: offer {} {} against threshold {} {}.",
                destination.city,
                config.currency,
                offer.price,
                config.currency,
                destination.lowest_price
            );
            continue;
        }

        trace!(
            "Deal found for {}: {} {}.",
            destination.city,
            config.currency,
            offer.price
        );
        match notifier.notify(&deal_message(&offer, &config.currency)).await {
            Ok(()) => summary.deals += 1,
            Err(why) => {
                warn!("Notification for {} failed: {}", destination.city, why);
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}
