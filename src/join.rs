use std::collections::BTreeMap;

use crate::models::{CleanedScoreRow, JoinedStudent, StudentKey};

#[derive(Default)]
struct Sides {
    quiz2: Option<CleanedScoreRow>,
    quiz3: Option<CleanedScoreRow>,
}

/// Full outer join of the two cleaned exports on exact (name, email).
///
/// A student present on either side yields one record; whatever is missing,
/// a whole side or just an unparsable score, is filled with 0. Output is
/// sorted by (name, email).
pub fn full_outer_join(quiz2: &[CleanedScoreRow], quiz3: &[CleanedScoreRow]) -> Vec<JoinedStudent> {
    let mut by_key: BTreeMap<StudentKey, Sides> = BTreeMap::new();

    for row in quiz2 {
        by_key.entry(row.key()).or_default().quiz2 = Some(row.clone());
    }
    for row in quiz3 {
        by_key.entry(row.key()).or_default().quiz3 = Some(row.clone());
    }

    by_key
        .into_iter()
        .map(|(key, sides)| {
            let (quiz2_score, quiz2_percentage) = score_and_percentage(sides.quiz2.as_ref());
            let (quiz3_score, quiz3_percentage) = score_and_percentage(sides.quiz3.as_ref());
            JoinedStudent {
                name: key.name,
                email: key.email,
                quiz2_score,
                quiz2_percentage,
                quiz3_score,
                quiz3_percentage,
            }
        })
        .collect()
}

fn score_and_percentage(row: Option<&CleanedScoreRow>) -> (f64, f64) {
    row.map(|row| {
        (
            row.total_score.unwrap_or(0.0),
            row.percentage.unwrap_or(0.0),
        )
    })
    .unwrap_or((0.0, 0.0))
}
