use std::collections::HashSet;

use tracing::{debug, warn};

use crate::models::{CleanedScoreRow, Quiz, RawScoreRow};

/// A row left out because its percentage cannot be computed.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub name: String,
    pub email: String,
    pub max_points: Option<String>,
}

/// What the cleaner threw away, and why.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanReport {
    pub input_rows: usize,
    pub undecodable: usize,
    pub missing_identity: usize,
    pub non_numeric_scores: usize,
    pub duplicates: usize,
    pub zero_max_points: Vec<SkippedRow>,
}

impl CleanReport {
    pub fn has_issues(&self) -> bool {
        self.undecodable > 0
            || self.missing_identity > 0
            || self.non_numeric_scores > 0
            || self.duplicates > 0
            || !self.zero_max_points.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CleanedSet {
    pub rows: Vec<CleanedScoreRow>,
    pub report: CleanReport,
}

/// Filters one export down to rows that can take part in the join.
///
/// Rows without a name or email are dropped. A score that does not parse is
/// kept as absent. Rows whose `Max Points` is missing, non-numeric or zero
/// are skipped and listed in the report. When the same (name, email) appears
/// twice, the first row wins.
pub fn clean_rows(quiz: Quiz, rows: Vec<RawScoreRow>) -> CleanedSet {
    let mut report = CleanReport {
        input_rows: rows.len(),
        ..CleanReport::default()
    };
    let mut seen = HashSet::new();
    let mut cleaned = Vec::with_capacity(rows.len());

    for row in rows {
        let (name, email) = match (non_empty(row.name), non_empty(row.email)) {
            (Some(name), Some(email)) => (name, email),
            _ => {
                report.missing_identity += 1;
                continue;
            }
        };

        let max_points = match row.max_points.as_deref().and_then(parse_number) {
            Some(max) if max > 0.0 => max,
            _ => {
                warn!(%quiz, %name, %email, raw = ?row.max_points, "max points missing or zero, row skipped");
                report.zero_max_points.push(SkippedRow {
                    name,
                    email,
                    max_points: row.max_points,
                });
                continue;
            }
        };

        let total_score = row.total_score.as_deref().and_then(parse_number);
        let cleaned_row = CleanedScoreRow {
            percentage: total_score.map(|score| score / max_points * 100.0),
            name,
            email,
            total_score,
            max_points,
        };

        if !seen.insert(cleaned_row.key()) {
            warn!(%quiz, name = %cleaned_row.name, email = %cleaned_row.email, "duplicate student row ignored");
            report.duplicates += 1;
            continue;
        }

        if total_score.is_none() {
            debug!(%quiz, name = %cleaned_row.name, raw = ?row.total_score, "score is not numeric, treating as missing");
            report.non_numeric_scores += 1;
        }
        cleaned.push(cleaned_row);
    }

    CleanedSet {
        rows: cleaned,
        report,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}
