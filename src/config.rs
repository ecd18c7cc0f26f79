//! Mail relay settings and delivery mode.

use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Connection settings for the mail relay.
///
/// The sender address doubles as the login identity. Debug output masks the
/// credential so settings can be logged.
#[derive(Clone)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub sender: String,
    pub credential: String,
}

impl MailSettings {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        sender: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            sender: sender.into(),
            credential: credential.into(),
        }
    }
}

impl fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .field("credential", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// Build every message but send nothing
    DryRun,
    /// Send through the mail relay
    Send,
    /// Build nothing, count every student as skipped
    Skip,
}
