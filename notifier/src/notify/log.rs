use super::{Message, NotifyError, Notifier};
use common::JobOffer;
use tracing::info;

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    recipient: Option<String>,
}

impl LogNotifier {
    pub fn new(recipient: Option<String>) -> Self {
        Self { recipient }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, offer: &JobOffer) -> Result<(), NotifyError> {
        let message = Message::for_offer(offer);
        info!(
            recipient = self.recipient.as_deref().unwrap_or("-"),
            offer_id = offer.id(),
            subject = %message.subject,
            body = %message.body,
            "Notification (log channel)"
        );
        Ok(())
    }
}
