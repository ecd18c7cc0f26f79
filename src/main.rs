use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use quiz_trend_notifier::config::{DeliveryMode, MailSettings, DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT};
use quiz_trend_notifier::delivery::{
    self, DeliveryPlan, DeliveryReport, DryRunMailer, Mailer, SmtpMailer,
};
use quiz_trend_notifier::error::DeliveryError;
use quiz_trend_notifier::templates::TemplateSet;
use quiz_trend_notifier::{report, snapshot, Analyzer, Category};

#[derive(Parser)]
#[command(name = "quiz-trend")]
#[command(about = "Classify quiz score trends and notify students", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Quiz 2 score export
    #[arg(long, default_value = "two-scores.csv")]
    quiz2: PathBuf,
    /// Quiz 3 score export
    #[arg(long, default_value = "three-scores.csv")]
    quiz3: PathBuf,
}

#[derive(Args)]
struct Relay {
    #[arg(long, env = "SMTP_HOST", default_value = DEFAULT_SMTP_HOST)]
    smtp_host: String,
    #[arg(long, env = "SMTP_PORT", default_value_t = DEFAULT_SMTP_PORT)]
    smtp_port: u16,
    /// Sender address, also used as the relay login
    #[arg(long, env = "SMTP_SENDER")]
    sender: Option<String>,
    /// App password for the sender account
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl Relay {
    fn settings(&self) -> anyhow::Result<MailSettings> {
        let sender = self
            .sender
            .clone()
            .filter(|value| !value.trim().is_empty())
            .context("a sender address is required (--sender or SMTP_SENDER)")?;
        let password = self
            .password
            .clone()
            .filter(|value| !value.is_empty())
            .context("an app password is required (--password or SMTP_PASSWORD)")?;
        Ok(MailSettings::new(&self.smtp_host, self.smtp_port, sender, password))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Classify students, print the report and save a snapshot
    #[command(group(
        ArgGroup::new("snapshot_target")
            .args(["snapshot", "no_snapshot"])
            .multiple(false)
    ))]
    Analyze {
        #[command(flatten)]
        inputs: Inputs,
        /// Snapshot path (default: gradescope_analysis_<timestamp>.json)
        #[arg(long)]
        snapshot: Option<PathBuf>,
        #[arg(long)]
        no_snapshot: bool,
        /// Also write the report to this file
        #[arg(long)]
        report_out: Option<PathBuf>,
    },
    /// Send (or preview) one message per classified student
    Notify {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, value_enum, default_value = "dry-run")]
        mode: DeliveryMode,
        /// Only notify these categories (comma separated)
        #[arg(long, value_delimiter = ',')]
        only: Vec<Category>,
        /// Course name used in messages
        #[arg(long, default_value = "COMP 311")]
        course: String,
        /// TOML file overriding the built-in templates
        #[arg(long)]
        templates: Option<PathBuf>,
        /// Send without asking for confirmation
        #[arg(long)]
        yes: bool,
        /// Write the delivery results as JSON
        #[arg(long)]
        results_out: Option<PathBuf>,
        #[command(flatten)]
        relay: Relay,
    },
    /// Send a single test message to check relay settings
    TestEmail {
        #[arg(long)]
        to: String,
        #[command(flatten)]
        relay: Relay,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} (y/N): ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn explain(err: &DeliveryError) {
    if let Some(hint) = report::delivery_hint(err) {
        eprintln!("{hint}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            inputs,
            snapshot: snapshot_path,
            no_snapshot,
            report_out,
        } => {
            let analysis = Analyzer::new(inputs.quiz2, inputs.quiz3).run()?;
            let text = report::build_report(&analysis);
            println!("{text}");

            if let Some(path) = report_out {
                std::fs::write(&path, &text)
                    .with_context(|| format!("failed to write report to {}", path.display()))?;
                println!("Report written to {}.", path.display());
            }

            if !no_snapshot {
                let path = snapshot::save_snapshot(
                    &analysis.classification,
                    snapshot_path.as_deref(),
                    analysis.generated_at,
                )?;
                println!("Analysis saved to {}", path.display());
            }
        }
        Commands::Notify {
            inputs,
            mode,
            only,
            course,
            templates,
            yes,
            results_out,
            relay,
        } => {
            let analysis = Analyzer::new(inputs.quiz2, inputs.quiz3).run()?;
            let templates = match templates {
                Some(path) => TemplateSet::from_toml_file(&path)?,
                None => TemplateSet::builtin()?,
            };
            let mut plan = DeliveryPlan::new(mode, course);
            if !only.is_empty() {
                plan = plan.only(only);
            }

            let placeholder = DryRunMailer::new();
            let smtp;
            let mut declined = false;
            let mailer: &dyn Mailer = match mode {
                DeliveryMode::Send => {
                    smtp = SmtpMailer::new(&relay.settings()?)?;
                    let total = plan.recipients(&analysis.classification);
                    if !yes && !confirm(&format!("Send emails to {total} students?"))? {
                        println!("Email sending cancelled.");
                        declined = true;
                    }
                    &smtp
                }
                DeliveryMode::DryRun => {
                    println!("DRY RUN MODE - No emails will actually be sent");
                    &placeholder
                }
                DeliveryMode::Skip => &placeholder,
            };

            let outcome = if declined {
                DeliveryReport::all_skipped(mode, &analysis.classification, "cancelled")
            } else {
                delivery::deliver(mailer, &analysis.classification, &templates, &plan).await
            };

            for message in &outcome.previews {
                println!("Would send to {} ({})", message.recipient_name, message.recipient_address);
                println!("Subject: {}", message.subject);
                println!("{}", "-".repeat(30));
            }
            print!("{}", report::build_delivery_summary(&outcome));

            if let Some(path) = results_out {
                let json = serde_json::to_string_pretty(&outcome)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("failed to write results to {}", path.display()))?;
                println!("Results written to {}.", path.display());
            }

            if outcome.transport_error.is_some() {
                bail!("no messages were sent because the mail relay could not be used");
            }
        }
        Commands::TestEmail { to, relay } => {
            let settings = relay.settings()?;
            info!(relay = %settings.host, port = settings.port, "sending test email");
            let mailer = SmtpMailer::new(&settings)?;
            if let Err(err) = delivery::send_test_message(&mailer, &to).await {
                explain(&err);
                return Err(err).context("test email failed");
            }
            println!("Test email sent to {to}.");
        }
    }

    Ok(())
}
