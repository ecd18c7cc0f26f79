use std::time::Duration;

use async_trait::async_trait;
use lettre::address::Address;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::response::Category as ReplyCategory;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use super::{Mailer, OutgoingMessage};
use crate::config::MailSettings;
use crate::error::DeliveryError;

const RELAY_TIMEOUT: Duration = Duration::from_secs(30);

/// STARTTLS mail relay client. One transport serves the whole run, so
/// consecutive messages reuse the authenticated connection.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    relay: String,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings) -> Result<Self, DeliveryError> {
        let sender = parse_mailbox(None, &settings.sender)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(classify_smtp_error)?
            .port(settings.port)
            .timeout(Some(RELAY_TIMEOUT))
            .credentials(Credentials::new(
                settings.sender.clone(),
                settings.credential.clone(),
            ))
            .build();

        debug!(?settings, "smtp transport configured");
        Ok(Self {
            transport,
            sender,
            relay: format!("{}:{}", settings.host, settings.port),
        })
    }

    fn build(&self, message: &OutgoingMessage) -> Result<Message, DeliveryError> {
        let name = (!message.recipient_name.is_empty()).then(|| message.recipient_name.clone());
        let recipient = parse_mailbox(name, &message.recipient_address)?;

        Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|err| DeliveryError::Message(err.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn name(&self) -> &str {
        &self.relay
    }

    async fn verify(&self) -> Result<(), DeliveryError> {
        match self.transport.test_connection().await {
            Ok(true) => {
                info!(relay = %self.relay, "mail relay accepted connection");
                Ok(())
            }
            Ok(false) => Err(DeliveryError::Connection(format!(
                "{} did not respond to NOOP",
                self.relay
            ))),
            Err(err) => Err(classify_smtp_error(err)),
        }
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        let email = self.build(message)?;
        let response = self
            .transport
            .send(email)
            .await
            .map_err(classify_smtp_error)?;
        debug!(to = %message.recipient_address, code = ?response.code(), "message accepted");
        Ok(())
    }
}

fn parse_mailbox(name: Option<String>, address: &str) -> Result<Mailbox, DeliveryError> {
    let address: Address = address
        .trim()
        .parse()
        .map_err(|err: lettre::address::AddressError| DeliveryError::InvalidAddress {
            address: address.to_string(),
            reason: err.to_string(),
        })?;
    Ok(Mailbox::new(name, address))
}

/// 5xx replies in the 53x range are the relay refusing the login; other
/// permanent replies refuse the message. Anything without a reply code never
/// got as far as talking to the relay.
fn classify_smtp_error(err: lettre::transport::smtp::Error) -> DeliveryError {
    let auth_reply = err
        .status()
        .is_some_and(|code| code.category == ReplyCategory::Unspecified3);

    if err.is_permanent() && auth_reply {
        DeliveryError::Authentication(err.to_string())
    } else if err.is_permanent() {
        DeliveryError::Rejected(err.to_string())
    } else if err.is_transient() {
        DeliveryError::Transient(err.to_string())
    } else {
        DeliveryError::Connection(err.to_string())
    }
}
