use std::fmt::Write;

use crate::analyzer::Analysis;
use crate::clean::CleanReport;
use crate::delivery::DeliveryReport;
use crate::error::DeliveryError;
use crate::models::Quiz;

const RULE_WIDTH: usize = 60;

pub fn build_report(analysis: &Analysis) -> String {
    let classification = &analysis.classification;
    let mut output = String::new();

    let _ = writeln!(output, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(output, "GRADESCOPE PERFORMANCE ANALYSIS REPORT");
    let _ = writeln!(output, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(
        output,
        "Generated on: {}",
        analysis.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Total Students Analyzed: {}", classification.total());
    let _ = writeln!(output);

    if classification.is_empty() {
        let _ = writeln!(output, "No students with scores on either quiz.");
        let _ = writeln!(output);
    }

    for (category, students) in classification.groups() {
        if students.is_empty() {
            continue;
        }

        let _ = writeln!(
            output,
            "{} STUDENTS ({} students):",
            category.as_str().to_uppercase(),
            students.len()
        );
        let _ = writeln!(output, "{}", "-".repeat(40));

        for student in students {
            let _ = writeln!(output, "• {} ({})", student.name, student.email);
            if student.quiz2_percentage > 0.0 {
                let _ = writeln!(output, "  Quiz 2: {:.1}%", student.quiz2_percentage);
            }
            if student.quiz3_percentage > 0.0 {
                let _ = writeln!(output, "  Quiz 3: {:.1}%", student.quiz3_percentage);
            }
            if student.improvement != 0.0 {
                let _ = writeln!(output, "  Improvement: {:+.1}%", student.improvement);
            }
            let _ = writeln!(output);
        }
    }

    if analysis.quiz2_report.has_issues() || analysis.quiz3_report.has_issues() {
        let _ = writeln!(output, "DATA ISSUES");
        let _ = writeln!(output, "{}", "-".repeat(40));
        write_clean_issues(&mut output, Quiz::Quiz2, &analysis.quiz2_report);
        write_clean_issues(&mut output, Quiz::Quiz3, &analysis.quiz3_report);
    }

    output
}

fn write_clean_issues(output: &mut String, quiz: Quiz, report: &CleanReport) {
    if !report.has_issues() {
        return;
    }

    let label = match quiz {
        Quiz::Quiz2 => "Quiz 2",
        Quiz::Quiz3 => "Quiz 3",
    };
    let _ = writeln!(output, "{label} ({} rows read):", report.input_rows);

    let counts = [
        (report.undecodable, "unreadable rows dropped"),
        (report.missing_identity, "rows without name or email dropped"),
        (report.duplicates, "duplicate rows ignored"),
        (report.non_numeric_scores, "non-numeric scores counted as 0"),
    ];
    for (count, what) in counts {
        if count > 0 {
            let _ = writeln!(output, "  {count} {what}");
        }
    }

    for skipped in &report.zero_max_points {
        let _ = writeln!(
            output,
            "  skipped {} ({}): max points is {}",
            skipped.name,
            skipped.email,
            skipped.max_points.as_deref().unwrap_or("missing")
        );
    }
    let _ = writeln!(output);
}

/// Operator-facing advice for relay problems that are not about one student.
pub fn delivery_hint(error: &DeliveryError) -> Option<&'static str> {
    if error.is_credential_problem() {
        Some("The relay refused the login. Check the sender address and use an app password, not the account password.")
    } else if error.is_network_problem() {
        Some("Could not reach the mail relay. Check the host, port and network connection.")
    } else {
        None
    }
}

/// Tally printed at the end of every notify run.
pub fn build_delivery_summary(report: &DeliveryReport) -> String {
    let (sent, failed, skipped) = report.tally();
    let mut output = String::new();

    let _ = writeln!(output, "Delivery run {} ({:?})", report.run_id, report.mode);
    let _ = writeln!(output, "Sent: {sent}");
    let _ = writeln!(output, "Failed: {failed}");
    let _ = writeln!(output, "Skipped: {skipped}");

    if let Some(error) = &report.transport_error {
        let _ = writeln!(output);
        let _ = writeln!(output, "Mail relay unusable: {error}");
        if let Some(hint) = delivery_hint(error) {
            let _ = writeln!(output, "{hint}");
        }
    }

    if !report.failed.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Failed emails:");
        for failure in &report.failed {
            let _ = writeln!(output, "  - {failure}");
        }
    }

    output
}
