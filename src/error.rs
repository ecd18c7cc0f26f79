//! Error types for analysis, templating and delivery.

use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop an analysis run. Bad rows never surface here; the
/// cleaner drops and counts them instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("required input file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to read CSV {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot encoding failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownPlaceholder(String),

    #[error("unbalanced brace at byte {0}")]
    UnbalancedBrace(usize),

    #[error("unknown template category '{0}'")]
    UnknownCategory(String),

    #[error("invalid template file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to read template file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a mailer. Credential and network problems are kept
/// apart so an operator can tell them from the message alone.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("could not reach mail relay: {0}")]
    Connection(String),

    #[error("relay rejected message: {0}")]
    Rejected(String),

    #[error("temporary relay failure: {0}")]
    Transient(String),

    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("could not build message: {0}")]
    Message(String),
}

impl DeliveryError {
    pub fn is_credential_problem(&self) -> bool {
        matches!(self, DeliveryError::Authentication(_))
    }

    pub fn is_network_problem(&self) -> bool {
        matches!(self, DeliveryError::Connection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_names_the_path() {
        let err = AnalysisError::MissingFile(PathBuf::from("two-scores.csv"));
        assert_eq!(
            err.to_string(),
            "required input file not found: two-scores.csv"
        );
    }

    #[test]
    fn unknown_placeholder_renders_braces() {
        let err = TemplateError::UnknownPlaceholder("grade".into());
        assert_eq!(err.to_string(), "unknown placeholder '{grade}'");
    }

    #[test]
    fn delivery_problems_are_distinguished() {
        let auth = DeliveryError::Authentication("535 bad credentials".into());
        let net = DeliveryError::Connection("connection refused".into());
        assert!(auth.is_credential_problem());
        assert!(!auth.is_network_problem());
        assert!(net.is_network_problem());
        assert!(!net.is_credential_problem());
    }
}
