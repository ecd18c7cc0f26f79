//! Per-student notification delivery.
//!
//! [`deliver`] walks a classification in report order, renders each
//! student's message and hands it to a [`Mailer`]. A failure for one student
//! is recorded and the loop moves on; nothing is retried.

mod dry_run;
mod smtp;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classify::Classification;
use crate::config::DeliveryMode;
use crate::error::DeliveryError;
use crate::models::{Category, ClassifiedStudent};
use crate::templates::TemplateSet;

pub use dry_run::DryRunMailer;
pub use smtp::SmtpMailer;

/// A rendered message addressed to one student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub recipient_name: String,
    pub recipient_address: String,
    pub subject: String,
    pub body: String,
}

/// Something that can put a message in a student's inbox.
#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;

    /// Checks that the relay is reachable and accepts the credentials.
    async fn verify(&self) -> Result<(), DeliveryError>;

    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError>;
}

/// What to send, to whom.
#[derive(Debug, Clone)]
pub struct DeliveryPlan {
    pub mode: DeliveryMode,
    pub course: String,
    /// Categories to notify. `None` means all of them.
    pub only: Option<Vec<Category>>,
}

impl DeliveryPlan {
    pub fn new(mode: DeliveryMode, course: impl Into<String>) -> Self {
        Self {
            mode,
            course: course.into(),
            only: None,
        }
    }

    pub fn only(mut self, categories: Vec<Category>) -> Self {
        self.only = Some(categories);
        self
    }

    pub fn includes(&self, category: Category) -> bool {
        self.only
            .as_ref()
            .map_or(true, |selected| selected.contains(&category))
    }

    /// Number of students this plan would notify.
    pub fn recipients(&self, classification: &Classification) -> usize {
        classification
            .groups()
            .filter(|(category, _)| self.includes(*category))
            .map(|(_, students)| students.len())
            .sum()
    }
}

/// Outcome of a delivery run. Every classified student ends up in exactly
/// one of `sent`, `failed` or `skipped`.
#[derive(Debug, Serialize)]
pub struct DeliveryReport {
    pub run_id: Uuid,
    pub mode: DeliveryMode,
    pub sent: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    /// Set when the relay could not be used at all.
    #[serde(serialize_with = "error_text")]
    pub transport_error: Option<DeliveryError>,
    /// Messages built in dry-run mode, in send order.
    #[serde(skip)]
    pub previews: Vec<OutgoingMessage>,
}

fn error_text<S: Serializer>(error: &Option<DeliveryError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.collect_str(error),
        None => serializer.serialize_none(),
    }
}

impl DeliveryReport {
    fn new(mode: DeliveryMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            sent: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            transport_error: None,
            previews: Vec::new(),
        }
    }

    /// A run where nobody was contacted, with `reason` appended to each entry.
    pub fn all_skipped(mode: DeliveryMode, classification: &Classification, reason: &str) -> Self {
        let mut report = Self::new(mode);
        report.skipped = classification
            .students()
            .map(|student| format!("{} - {reason}", identity(student)))
            .collect();
        report
    }

    pub fn tally(&self) -> (usize, usize, usize) {
        (self.sent.len(), self.failed.len(), self.skipped.len())
    }
}

fn identity(student: &ClassifiedStudent) -> String {
    format!("{} ({})", student.name, student.email)
}

pub fn compose(templates: &TemplateSet, student: &ClassifiedStudent, course: &str) -> OutgoingMessage {
    let rendered = templates.render(student, course);
    OutgoingMessage {
        recipient_name: student.name.clone(),
        recipient_address: student.email.clone(),
        subject: rendered.subject,
        body: rendered.body,
    }
}

/// Sends one message per classified student.
///
/// In dry-run mode `mailer` is never touched: messages go to a
/// [`DryRunMailer`] and end up in `previews`. In send mode the mailer is
/// verified first. If that fails nothing is sent and every student is
/// recorded as skipped, with the cause kept in `transport_error`.
pub async fn deliver(
    mailer: &dyn Mailer,
    classification: &Classification,
    templates: &TemplateSet,
    plan: &DeliveryPlan,
) -> DeliveryReport {
    if plan.mode == DeliveryMode::Skip {
        let report = DeliveryReport::all_skipped(plan.mode, classification, "skipped");
        info!(run_id = %report.run_id, skipped = report.skipped.len(), "delivery skipped");
        return report;
    }

    let preview = DryRunMailer::new();
    let mailer: &dyn Mailer = match plan.mode {
        DeliveryMode::DryRun => &preview,
        _ => mailer,
    };

    let mut report = DeliveryReport::new(plan.mode);
    let span = info_span!("delivery", run_id = %report.run_id, mode = ?plan.mode, mailer = mailer.name());

    async {
        if let Err(err) = mailer.verify().await {
            warn!(error = %err, "mail relay unusable, nothing sent");
            let run_id = report.run_id;
            report = DeliveryReport::all_skipped(plan.mode, classification, "not attempted");
            report.run_id = run_id;
            report.transport_error = Some(err);
            return;
        }

        for (category, students) in classification.groups() {
            if students.is_empty() {
                continue;
            }
            if !plan.includes(category) {
                report.skipped.extend(
                    students
                        .iter()
                        .map(|student| format!("{} - {category} not selected", identity(student))),
                );
                continue;
            }

            info!(%category, students = students.len(), "processing category");
            for student in students {
                let message = compose(templates, student, &plan.course);
                match mailer.send(&message).await {
                    Ok(()) if plan.mode == DeliveryMode::DryRun => {
                        report.sent.push(format!("{} - DRY RUN", identity(student)));
                    }
                    Ok(()) => report.sent.push(identity(student)),
                    Err(err) => {
                        warn!(name = %student.name, email = %student.email, error = %err, "delivery failed");
                        report
                            .failed
                            .push(format!("{} - Error: {err}", identity(student)));
                    }
                }
            }
        }

        let (sent, failed, skipped) = report.tally();
        info!(sent, failed, skipped, "delivery finished");
    }
    .instrument(span)
    .await;

    report.previews = preview.outbox();
    report
}

/// Sends a single fixed message, for checking relay settings by hand.
pub async fn send_test_message(mailer: &dyn Mailer, to: &str) -> Result<(), DeliveryError> {
    mailer.verify().await?;
    mailer
        .send(&OutgoingMessage {
            recipient_name: String::new(),
            recipient_address: to.to_string(),
            subject: "Test email from quiz-trend".to_string(),
            body: concat!(
                "Hello!\n\n",
                "This is a test email from quiz-trend. If you are reading it, the mail ",
                "relay settings are working and student notifications can be sent.\n",
            )
            .to_string(),
        })
        .await
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::testing::RecordingMailer;
    use super::*;
    use crate::classify::classify;
    use crate::models::JoinedStudent;

    fn classification() -> Classification {
        let student = |name: &str, q2: f64, q3: f64| JoinedStudent {
            name: name.to_string(),
            email: format!("{}@example.edu", name.to_lowercase()),
            quiz2_score: q2 / 5.0,
            quiz2_percentage: q2,
            quiz3_score: q3 / 5.0,
            quiz3_percentage: q3,
        };
        classify(&[
            student("Avery", 90.0, 92.0),
            student("Jules", 50.0, 70.0),
            student("Kiara", 55.0, 40.0),
            student("Noor", 80.0, 50.0),
            student("Remy", 70.0, 72.0),
        ])
    }

    fn templates() -> TemplateSet {
        TemplateSet::builtin().unwrap()
    }

    #[tokio::test]
    async fn sends_one_message_per_student_in_category_order() {
        let mailer = RecordingMailer::default();
        let plan = DeliveryPlan::new(DeliveryMode::Send, "COMP 311");
        let report = deliver(&mailer, &classification(), &templates(), &plan).await;

        assert_eq!(report.tally(), (5, 0, 0));
        let sent = mailer.sent.lock().unwrap();
        let recipients: Vec<_> = sent.iter().map(|m| m.recipient_name.as_str()).collect();
        assert_eq!(recipients, vec!["Avery", "Jules", "Kiara", "Noor", "Remy"]);
        assert_eq!(sent[0].subject, "Excellent Work in COMP 311!");
        assert_eq!(report.sent[0], "Avery (avery@example.edu)");
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_run() {
        let mailer = RecordingMailer {
            rejects: HashMap::from([(
                "kiara@example.edu".to_string(),
                "550 mailbox unavailable".to_string(),
            )]),
            ..RecordingMailer::default()
        };
        let plan = DeliveryPlan::new(DeliveryMode::Send, "COMP 311");
        let report = deliver(&mailer, &classification(), &templates(), &plan).await;

        assert_eq!(report.tally(), (4, 1, 0));
        assert_eq!(
            report.failed[0],
            "Kiara (kiara@example.edu) - Error: relay rejected message: 550 mailbox unavailable"
        );
        assert_eq!(mailer.sent.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn dry_run_entries_are_marked() {
        let mailer = RecordingMailer::default();
        let plan = DeliveryPlan::new(DeliveryMode::DryRun, "COMP 311");
        let report = deliver(&mailer, &classification(), &templates(), &plan).await;

        assert_eq!(report.sent.len(), 5);
        assert!(report.sent.iter().all(|entry| entry.ends_with(" - DRY RUN")));
        assert_eq!(report.previews.len(), 5);
        assert_eq!(report.previews[0].subject, "Excellent Work in COMP 311!");
    }

    /// Counts every call so a test can prove the relay was never contacted.
    #[derive(Default)]
    struct CountingMailer {
        verified: AtomicUsize,
        transmitted: AtomicUsize,
    }

    #[async_trait]
    impl Mailer for CountingMailer {
        fn name(&self) -> &str {
            "counting"
        }

        async fn verify(&self) -> Result<(), DeliveryError> {
            self.verified.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send(&self, _message: &OutgoingMessage) -> Result<(), DeliveryError> {
            self.transmitted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn dry_run_never_contacts_the_given_mailer() {
        let mailer = CountingMailer::default();
        let plan = DeliveryPlan::new(DeliveryMode::DryRun, "COMP 311");
        let report = deliver(&mailer, &classification(), &templates(), &plan).await;

        assert_eq!(mailer.verified.load(Ordering::SeqCst), 0);
        assert_eq!(mailer.transmitted.load(Ordering::SeqCst), 0);
        assert_eq!(report.tally(), (5, 0, 0));
        assert_eq!(report.sent[0], "Avery (avery@example.edu) - DRY RUN");
    }

    #[tokio::test]
    async fn send_mode_has_no_previews() {
        let mailer = CountingMailer::default();
        let plan = DeliveryPlan::new(DeliveryMode::Send, "COMP 311");
        let report = deliver(&mailer, &classification(), &templates(), &plan).await;

        assert_eq!(mailer.verified.load(Ordering::SeqCst), 1);
        assert_eq!(mailer.transmitted.load(Ordering::SeqCst), 5);
        assert!(report.previews.is_empty());
    }

    #[test]
    fn recipients_count_only_selected_categories() {
        let classification = classification();
        let all = DeliveryPlan::new(DeliveryMode::Send, "COMP 311");
        assert_eq!(all.recipients(&classification), 5);

        let some = all.only(vec![Category::Declining, Category::Consistent]);
        assert_eq!(some.recipients(&classification), 2);
    }

    #[test]
    fn all_skipped_marks_every_student() {
        let report = DeliveryReport::all_skipped(DeliveryMode::Send, &classification(), "cancelled");
        assert_eq!(report.tally(), (0, 0, 5));
        assert_eq!(report.skipped[0], "Avery (avery@example.edu) - cancelled");
        assert!(report.transport_error.is_none());
    }

    #[tokio::test]
    async fn skip_mode_touches_nothing() {
        let mailer = RecordingMailer::default();
        let plan = DeliveryPlan::new(DeliveryMode::Skip, "COMP 311");
        let report = deliver(&mailer, &classification(), &templates(), &plan).await;

        assert_eq!(report.tally(), (0, 0, 5));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unselected_categories_are_skipped() {
        let mailer = RecordingMailer::default();
        let plan = DeliveryPlan::new(DeliveryMode::Send, "COMP 311")
            .only(vec![Category::Struggling, Category::Declining]);
        let report = deliver(&mailer, &classification(), &templates(), &plan).await;

        assert_eq!(report.tally(), (2, 0, 3));
        assert!(report.skipped.contains(&"Avery (avery@example.edu) - excelling not selected".to_string()));
    }

    #[tokio::test]
    async fn failed_verification_skips_everyone_and_keeps_cause() {
        let mailer = RecordingMailer {
            auth_error: Some("535 5.7.8 bad credentials".to_string()),
            ..RecordingMailer::default()
        };
        let plan = DeliveryPlan::new(DeliveryMode::Send, "COMP 311");
        let report = deliver(&mailer, &classification(), &templates(), &plan).await;

        assert_eq!(report.tally(), (0, 0, 5));
        let error = report.transport_error.as_ref().unwrap();
        assert!(error.is_credential_problem());
        assert_eq!(error.to_string(), "authentication failed: 535 5.7.8 bad credentials");
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn report_serializes_with_error_text() {
        let mailer = RecordingMailer {
            auth_error: Some("535 denied".to_string()),
            ..RecordingMailer::default()
        };
        let plan = DeliveryPlan::new(DeliveryMode::Send, "COMP 311");
        let report = deliver(&mailer, &classification(), &templates(), &plan).await;

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "send");
        assert_eq!(json["transport_error"], "authentication failed: 535 denied");
        assert_eq!(json["skipped"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_message_goes_to_given_address() {
        let mailer = RecordingMailer::default();
        send_test_message(&mailer, "me@example.edu").await.unwrap();
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_address, "me@example.edu");
    }
}
