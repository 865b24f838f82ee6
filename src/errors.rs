use thiserror::Error;

/// Boxed error used at the seams between services, so heterogeneous causes
/// (reqwest, serde, postgrest, our own) all travel up with `?`.
pub type GenericError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum FareBotError {
    #[error("no IATA code match for city \"{0}\"")]
    CityNotFound(String),

    #[error("{0} rejected our credentials")]
    Auth(&'static str),

    #[error("{0} rate limit exceeded")]
    RateLimited(&'static str),

    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("environment variable {0} is not set")]
    MissingConfig(&'static str),

    #[error("unsupported notification channel {0:?}")]
    UnknownChannel(String),

    #[error("{service} sent a malformed payload: {detail}")]
    MalformedResponse {
        service: &'static str,
        detail: String,
    },
}

impl FareBotError {
    /// Map an HTTP status from an external API onto the row-scoped error
    /// kinds the orchestrator distinguishes.
    pub fn from_status(service: &'static str, status: u16, body: String) -> Self {
        match status {
            401 | 403 => FareBotError::Auth(service),
            429 => FareBotError::RateLimited(service),
            _ => FareBotError::Api {
                service,
                status,
                body,
            },
        }
    }
}
