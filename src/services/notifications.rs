use async_trait::async_trait;
use derive_more::Display;
use log::*;
use serde::Deserialize;
use serde_json::json;

use crate::{FareBotError, GenericError};

use super::{http_client, required_var, var_or, FlightOffer};

const SENDGRID_SEND_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";
const EMAIL_SUBJECT: &str = "Low fare alert";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NotifyChannel {
    #[display(fmt = "sms")]
    Sms,
    #[display(fmt = "whatsapp")]
    Whatsapp,
    #[display(fmt = "email")]
    Email,
}

impl NotifyChannel {
    pub fn parse(raw: &str) -> Result<Self, GenericError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sms" => Ok(NotifyChannel::Sms),
            "whatsapp" => Ok(NotifyChannel::Whatsapp),
            "email" => Ok(NotifyChannel::Email),
            _ => Err(FareBotError::UnknownChannel(raw.to_string()).into()),
        }
    }

    pub fn from_env() -> Result<Self, GenericError> {
        Self::parse(&var_or("NOTIFY_CHANNEL", "sms"))
    }
}

/// The deal message carries exactly the offer fields: price, both IATA
/// codes, outbound date, inbound date. Stops are appended only when the
/// itinerary is not direct.
pub fn deal_message(offer: &FlightOffer, currency: &str) -> String {
    let mut message = format!(
        "Low price alert! Only {} {} to fly from {} to {}, from {} to {}.",
        currency,
        offer.price,
        offer.origin_airport,
        offer.destination_airport,
        offer.out_date,
        offer.return_date,
    );
    if !offer.is_direct() {
        message.push_str(&format!("\nFlight has {} stop(s).", offer.stops));
    }
    message
}

#[async_trait]
pub trait NotificationService {
    fn new() -> Result<Self, GenericError>
    where
        Self: Sized;
    async fn notify(&self, body: &str) -> Result<(), GenericError>;
}

/// SMS and WhatsApp delivery through the Twilio messages API.
pub struct TwilioService {
    http: reqwest::Client,
    sid: String,
    auth_token: String,
    from_number: String,
    to_number: String,
}

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
    status: String,
}

#[async_trait]
impl NotificationService for TwilioService {
    fn new() -> Result<Self, GenericError> {
        let whatsapp = NotifyChannel::from_env()? == NotifyChannel::Whatsapp;
        let to = required_var("TWILIO_VERIFIED_NUMBER")?;
        let (from_number, to_number) = if whatsapp {
            (
                format!("whatsapp:{}", required_var("TWILIO_WHATSAPP_NUMBER")?),
                format!("whatsapp:{}", to),
            )
        } else {
            (required_var("TWILIO_VIRTUAL_NUMBER")?, to)
        };

        Ok(TwilioService {
            http: http_client()?,
            sid: required_var("TWILIO_SID")?,
            auth_token: required_var("TWILIO_AUTH_TOKEN")?,
            from_number,
            to_number,
        })
    }

    async fn notify(&self, body: &str) -> Result<(), GenericError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.sid
        );
        let params = [
            ("From", self.from_number.as_str()),
            ("To", self.to_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FareBotError::from_status("twilio", status.as_u16(), body).into());
        }

        let delivery: TwilioMessageResponse = response.json().await?;
        trace!(
            "Twilio accepted message {} with status {}.",
            delivery.sid,
            delivery.status
        );
        Ok(())
    }
}

/// Email delivery through the SendGrid v3 mail API.
pub struct SendGridService {
    http: reqwest::Client,
    api_key: String,
    from_email: String,
    to_email: String,
}

#[async_trait]
impl NotificationService for SendGridService {
    fn new() -> Result<Self, GenericError> {
        Ok(SendGridService {
            http: http_client()?,
            api_key: required_var("SENDGRID_API_KEY")?,
            from_email: required_var("ALERT_EMAIL_FROM")?,
            to_email: required_var("ALERT_EMAIL_TO")?,
        })
    }

    async fn notify(&self, body: &str) -> Result<(), GenericError> {
        let payload = json!({
            "personalizations": [{ "to": [{ "email": self.to_email }] }],
            "from": { "email": self.from_email },
            "subject": EMAIL_SUBJECT,
            "content": [{ "type": "text/plain", "value": body }],
        });

        let response = self
            .http
            .post(SENDGRID_SEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FareBotError::from_status("sendgrid", status.as_u16(), body).into());
        }

        trace!("SendGrid accepted mail for {}.", self.to_email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn offer(stops: usize) -> FlightOffer {
        FlightOffer {
            price: "310.00".parse::<Decimal>().unwrap(),
            origin_airport: "LON".to_string(),
            destination_airport: "COK".to_string(),
            out_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            return_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            stops,
        }
    }

    #[test]
    fn message_carries_all_offer_fields() {
        let message = deal_message(&offer(0), "GBP");
        assert!(message.contains("GBP 310.00"));
        assert!(message.contains("from LON to COK"));
        assert!(message.contains("from 2024-03-01 to 2024-03-15"));
        assert!(!message.contains("stop"));
    }

    #[test]
    fn stops_line_only_for_connecting_flights() {
        let message = deal_message(&offer(2), "GBP");
        assert!(message.ends_with("Flight has 2 stop(s)."));
    }

    #[test]
    fn channel_parsing() {
        assert_eq!(NotifyChannel::parse("sms").unwrap(), NotifyChannel::Sms);
        assert_eq!(
            NotifyChannel::parse("WhatsApp").unwrap(),
            NotifyChannel::Whatsapp
        );
        assert_eq!(
            NotifyChannel::parse(" email ").unwrap(),
            NotifyChannel::Email
        );
        assert!(NotifyChannel::parse("carrier-pigeon").is_err());
    }

    #[test]
    fn channel_display_matches_config_spelling() {
        assert_eq!(NotifyChannel::Whatsapp.to_string(), "whatsapp");
    }

    #[test]
    fn twilio_delivery_receipt_deserializes() {
        let raw = r#"{"sid": "SM123", "status": "queued", "num_segments": "1"}"#;
        let receipt: TwilioMessageResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(receipt.sid, "SM123");
        assert_eq!(receipt.status, "queued");
    }
}
