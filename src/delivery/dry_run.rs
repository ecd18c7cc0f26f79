use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use super::{Mailer, OutgoingMessage};
use crate::error::DeliveryError;

/// Builds every message like a real run but keeps them instead of sending.
#[derive(Debug, Default)]
pub struct DryRunMailer {
    outbox: Mutex<Vec<OutgoingMessage>>,
}

impl DryRunMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages that would have been sent, in send order.
    pub fn outbox(&self) -> Vec<OutgoingMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for DryRunMailer {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn verify(&self) -> Result<(), DeliveryError> {
        Ok(())
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        info!(
            to = %message.recipient_address,
            subject = %message.subject,
            "would send"
        );
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(message.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_instead_of_sending() {
        let mailer = DryRunMailer::new();
        let message = OutgoingMessage {
            recipient_name: "Avery Lee".into(),
            recipient_address: "avery@example.edu".into(),
            subject: "Hello".into(),
            body: "Body".into(),
        };
        mailer.verify().await.unwrap();
        mailer.send(&message).await.unwrap();
        mailer.send(&message).await.unwrap();
        assert_eq!(mailer.outbox(), vec![message.clone(), message]);
    }
}
