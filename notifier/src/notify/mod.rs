//! Notification channels for new offers.

use common::JobOffer;
use thiserror::Error;

pub mod log;
pub mod sendgrid;
pub mod throttle;

pub use self::log::LogNotifier;
pub use sendgrid::SendGridNotifier;
pub use throttle::Throttled;

/// Delivery failure for a single offer. Recovered by the caller.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Delivery request failed: {0}")]
    Transport(String),

    #[error("Delivery rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Sends one notification per new offer.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier {
    fn notify(&self, offer: &JobOffer) -> Result<(), NotifyError>;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, offer: &JobOffer) -> Result<(), NotifyError> {
        (**self).notify(offer)
    }
}

/// Subject and plain-text body of a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

impl Message {
    pub fn for_offer(offer: &JobOffer) -> Self {
        let subject = format!("New job offer: {} at {}", offer.title(), offer.company());

        let mut body = String::from("Hello,\n\nA new job offer matches your search:\n\n");
        body.push_str(&format!("Position: {}\n", offer.title()));
        body.push_str(&format!("Company: {}\n", offer.company()));
        if !offer.location().is_empty() {
            body.push_str(&format!("Location: {}\n", offer.location()));
        }
        if let Some(salary) = offer.salary_min() {
            body.push_str(&format!("Salary from: {}\n", salary));
        }
        if let Some(posted_at) = offer.posted_at() {
            body.push_str(&format!("Posted: {}\n", posted_at.format("%Y-%m-%d")));
        }
        if !offer.url().is_empty() {
            body.push_str(&format!("Apply: {}\n", offer.url()));
        }
        if !offer.description().is_empty() {
            body.push_str(&format!("\nDescription:\n{}\n", offer.description()));
        }
        body.push_str(&format!(
            "\nSource: {}\n\n--\nThis is an automatic notification.",
            offer.source()
        ));

        Self { subject, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_message_includes_offer_details() {
        let offer = JobOffer::new("adzuna", "Data Analyst", "Acme", "https://jobs.example/1")
            .unwrap()
            .with_location("Paris")
            .with_salary_min(Some(42000))
            .with_posted_at(Some(Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap()));

        let message = Message::for_offer(&offer);
        assert_eq!(message.subject, "New job offer: Data Analyst at Acme");
        assert!(message.body.contains("Location: Paris"));
        assert!(message.body.contains("Salary from: 42000"));
        assert!(message.body.contains("Posted: 2025-03-14"));
        assert!(message.body.contains("Apply: https://jobs.example/1"));
        assert!(!message.body.contains("Description:"));
    }

    #[test]
    fn test_message_omits_missing_fields() {
        let offer = JobOffer::new("test", "Data Scientist", "Acme", "").unwrap();
        let message = Message::for_offer(&offer);
        assert!(!message.body.contains("Apply:"));
        assert!(!message.body.contains("Salary"));
        assert!(!message.body.contains("Location:"));
    }
}
