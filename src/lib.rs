//! Quiz trend analysis and student notification.
//!
//! Two score exports (quiz 2 and quiz 3) are cleaned, joined per student and
//! classified into a trend category; each category has a message template
//! that can be sent to the student through a mail relay.

pub mod analyzer;
pub mod classify;
pub mod clean;
pub mod config;
pub mod delivery;
pub mod error;
pub mod join;
pub mod loader;
pub mod models;
pub mod report;
pub mod snapshot;
pub mod templates;

pub use analyzer::{Analysis, Analyzer};
pub use classify::Classification;
pub use models::{Category, ClassifiedStudent};
