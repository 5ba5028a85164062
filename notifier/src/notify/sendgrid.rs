use super::{Message, NotifyError, Notifier};
use crate::config::NotifyConfig;
use common::JobOffer;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Sends plain-text email through the SendGrid v3 mail API.
pub struct SendGridNotifier {
    client: Client,
    endpoint: String,
    api_key: String,
    sender: String,
    recipient: String,
}

impl SendGridNotifier {
    pub fn new(
        config: &NotifyConfig,
        api_key: String,
        sender: String,
        recipient: String,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v3/mail/send", config.sendgrid_base_url.trim_end_matches('/')),
            api_key,
            sender,
            recipient,
        })
    }

    fn payload(&self, message: &Message) -> Value {
        json!({
            "personalizations": [{
                "to": [{ "email": self.recipient }],
                "subject": message.subject,
            }],
            "from": { "email": self.sender },
            "content": [{ "type": "text/plain", "value": message.body }],
        })
    }
}

impl Notifier for SendGridNotifier {
    fn notify(&self, offer: &JobOffer) -> Result<(), NotifyError> {
        let message = Message::for_offer(offer);
        debug!(offer_id = offer.id(), endpoint = %self.endpoint, "Sending email via SendGrid");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(&message))
            .send()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            offer_id = offer.id(),
            recipient = %self.recipient,
            "Email notification sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn notifier(base_url: &str) -> SendGridNotifier {
        let mut config = Settings::default().notify;
        config.sendgrid_base_url = base_url.to_string();
        SendGridNotifier::new(
            &config,
            "SG.key".to_string(),
            "bot@example.com".to_string(),
            "me@example.com".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_payload_shape() {
        let notifier = notifier("https://api.sendgrid.com/");
        assert_eq!(notifier.endpoint, "https://api.sendgrid.com/v3/mail/send");

        let message = Message {
            subject: "New job offer: Data Analyst at Acme".to_string(),
            body: "body".to_string(),
        };
        let payload = notifier.payload(&message);

        assert_eq!(payload["personalizations"][0]["to"][0]["email"], "me@example.com");
        assert_eq!(
            payload["personalizations"][0]["subject"],
            "New job offer: Data Analyst at Acme"
        );
        assert_eq!(payload["from"]["email"], "bot@example.com");
        assert_eq!(payload["content"][0]["type"], "text/plain");
        assert_eq!(payload["content"][0]["value"], "body");
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let notifier = notifier("http://127.0.0.1:9");
        let offer = JobOffer::new("test", "Data Analyst", "Acme", "https://jobs.example/1").unwrap();
        assert!(matches!(notifier.notify(&offer), Err(NotifyError::Transport(_))));
    }
}
