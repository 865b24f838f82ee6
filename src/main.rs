use log::*;

mod errors;
mod run;
mod services;

pub use errors::{FareBotError, GenericError};

use run::SweepConfig;
use services::airports::{AirportLookupService, AmadeusLocationsService};
use services::database::{DestinationStoreService, SupabaseService};
use services::flights::{AmadeusFlightsService, FlightSearchService};
use services::notifications::{
    NotificationService, NotifyChannel, SendGridService, TwilioService,
};

#[tokio::main]
async fn main() {
    env_logger::builder()
        .filter_module("fare_bot", log::LevelFilter::Trace)
        .init();
    trace!("Logger init with level TRACE.");

    if let Err(why) = run_once().await {
        error!("Sweep aborted: {}", why);
        std::process::exit(1);
    }
}

async fn run_once() -> Result<(), GenericError> {
    let store: SupabaseService = DestinationStoreService::new()?;
    let airports: AmadeusLocationsService = AirportLookupService::new()?;
    let flights: AmadeusFlightsService = FlightSearchService::new()?;

    let channel = NotifyChannel::from_env()?;
    trace!("Notifying over {} channel.", channel);
    let notifier: Box<dyn NotificationService> = match channel {
        NotifyChannel::Email => Box::new(<SendGridService as NotificationService>::new()?),
        NotifyChannel::Sms | NotifyChannel::Whatsapp => {
            Box::new(<TwilioService as NotificationService>::new()?)
        }
    };

    let config = SweepConfig::from_env();
    let summary = run::sweep(&store, &airports, &flights, notifier.as_ref(), &config).await?;

    info!(
        "Sweep finished: {} destinations, {} deals sent, {} skipped.",
        summary.destinations, summary.deals, summary.skipped
    );
    Ok(())
}
