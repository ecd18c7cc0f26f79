use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Category, ClassifiedStudent, JoinedStudent};

type Rule = fn(f64, f64, f64) -> bool;

/// Checked top to bottom, first match wins. Anything that falls through is
/// `Consistent`.
pub const RULES: [(Category, Rule); 4] = [
    (Category::Excelling, excelling),
    (Category::Improving, improving),
    (Category::Struggling, struggling),
    (Category::Declining, declining),
];

fn excelling(q2: f64, q3: f64, _improvement: f64) -> bool {
    q2 >= 85.0 && q3 >= 85.0
}

fn improving(q2: f64, q3: f64, improvement: f64) -> bool {
    improvement >= 15.0 || (q2 < 70.0 && q3 >= 75.0)
}

fn struggling(q2: f64, q3: f64, _improvement: f64) -> bool {
    q2 < 60.0 && q3 < 60.0
}

fn declining(q2: f64, q3: f64, _improvement: f64) -> bool {
    q2 >= 75.0 && q3 < 60.0
}

/// Quiz 3 minus quiz 2. Without a quiz 2 result this is the quiz 3
/// percentage itself, which is not a real delta.
pub fn improvement(quiz2_percentage: f64, quiz3_percentage: f64) -> f64 {
    if quiz2_percentage > 0.0 {
        quiz3_percentage - quiz2_percentage
    } else {
        quiz3_percentage
    }
}

pub fn categorize(quiz2_percentage: f64, quiz3_percentage: f64) -> Category {
    let delta = improvement(quiz2_percentage, quiz3_percentage);
    RULES
        .iter()
        .find(|(_, applies)| applies(quiz2_percentage, quiz3_percentage, delta))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Consistent)
}

/// Students grouped by category. Every category is present, possibly
/// empty, and iterates in report order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classification {
    groups: BTreeMap<Category, Vec<ClassifiedStudent>>,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            groups: Category::ALL
                .into_iter()
                .map(|category| (category, Vec::new()))
                .collect(),
        }
    }
}

impl Classification {
    pub fn students_in(&self, category: Category) -> &[ClassifiedStudent] {
        self.groups.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn groups(&self) -> impl Iterator<Item = (Category, &[ClassifiedStudent])> {
        self.groups
            .iter()
            .map(|(category, students)| (*category, students.as_slice()))
    }

    pub fn students(&self) -> impl Iterator<Item = &ClassifiedStudent> {
        self.groups.values().flatten()
    }

    pub fn total(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn push(&mut self, student: ClassifiedStudent) {
        self.groups.entry(student.category).or_default().push(student);
    }

    /// Fills in any category a hand-edited snapshot left out.
    pub(crate) fn normalized(mut self) -> Self {
        for category in Category::ALL {
            self.groups.entry(category).or_default();
        }
        self
    }
}

/// Drops students with no score on either quiz, then files each remaining
/// student under exactly one category.
pub fn classify(joined: &[JoinedStudent]) -> Classification {
    let mut classification = Classification::default();

    for student in joined {
        let q2 = student.quiz2_percentage;
        let q3 = student.quiz3_percentage;

        if q2 == 0.0 && q3 == 0.0 {
            debug!(name = %student.name, email = %student.email, "no score on either quiz, excluded");
            continue;
        }

        let category = categorize(q2, q3);
        classification.push(ClassifiedStudent {
            name: student.name.clone(),
            email: student.email.clone(),
            quiz2_score: student.quiz2_score,
            quiz2_percentage: q2,
            quiz3_score: student.quiz3_score,
            quiz3_percentage: q3,
            improvement: improvement(q2, q3),
            category,
        });
    }

    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(name: &str, q2: f64, q3: f64) -> JoinedStudent {
        JoinedStudent {
            name: name.to_string(),
            email: format!("{}@example.edu", name.to_lowercase()),
            quiz2_score: q2 / 10.0,
            quiz2_percentage: q2,
            quiz3_score: q3 / 10.0,
            quiz3_percentage: q3,
        }
    }

    #[test]
    fn scenario_categories() {
        assert_eq!(categorize(90.0, 92.0), Category::Excelling);
        assert_eq!(categorize(50.0, 70.0), Category::Improving);
        assert_eq!(categorize(55.0, 40.0), Category::Struggling);
        assert_eq!(categorize(80.0, 50.0), Category::Declining);
        assert_eq!(categorize(70.0, 72.0), Category::Consistent);
    }

    #[test]
    fn missing_quiz2_uses_quiz3_as_improvement() {
        assert_eq!(improvement(0.0, 80.0), 80.0);
        assert_eq!(categorize(0.0, 80.0), Category::Improving);
        // Proxy improvement of 40 still trips the improving rule.
        assert_eq!(categorize(0.0, 40.0), Category::Improving);
        assert_eq!(categorize(0.0, 10.0), Category::Struggling);
    }

    #[test]
    fn excelling_precedes_improving() {
        // 70 -> 100 is a 30 point gain but quiz 2 is below 85.
        assert_eq!(categorize(70.0, 100.0), Category::Improving);
        // 85 -> 100 is also a 15 point gain; rule 1 still wins.
        assert_eq!(categorize(85.0, 100.0), Category::Excelling);
    }

    #[test]
    fn improving_precedes_struggling() {
        // 40 -> 58 is below 60 on both, yet the 18 point gain wins.
        assert_eq!(categorize(40.0, 58.0), Category::Improving);
    }

    #[test]
    fn threshold_boundaries() {
        assert_eq!(categorize(85.0, 85.0), Category::Excelling);
        assert_eq!(categorize(84.9, 85.0), Category::Consistent);
        assert_eq!(categorize(60.0, 75.0), Category::Improving);
        assert_eq!(categorize(70.0, 75.0), Category::Consistent);
        assert_eq!(categorize(59.9, 59.9), Category::Struggling);
        assert_eq!(categorize(60.0, 59.9), Category::Consistent);
        assert_eq!(categorize(75.0, 59.9), Category::Declining);
        assert_eq!(categorize(74.9, 59.9), Category::Consistent);
    }

    #[test]
    fn students_without_scores_are_excluded() {
        let result = classify(&[joined("Ghost", 0.0, 0.0), joined("Avery", 90.0, 92.0)]);
        assert_eq!(result.total(), 1);
        assert!(result.students().all(|s| s.name != "Ghost"));
    }

    #[test]
    fn every_student_lands_in_exactly_one_group() {
        let students = vec![
            joined("A", 90.0, 92.0),
            joined("B", 50.0, 70.0),
            joined("C", 55.0, 40.0),
            joined("D", 80.0, 50.0),
            joined("E", 70.0, 72.0),
            joined("F", 0.0, 80.0),
        ];
        let result = classify(&students);
        assert_eq!(result.total(), students.len());
        for student in &students {
            let hits = result
                .groups()
                .filter(|(_, group)| group.iter().any(|s| s.name == student.name))
                .count();
            assert_eq!(hits, 1, "{} should appear once", student.name);
        }
        for (category, group) in result.groups() {
            assert!(group.iter().all(|s| s.category == category));
        }
    }

    #[test]
    fn all_categories_present_in_order_even_when_empty() {
        let result = classify(&[joined("A", 90.0, 92.0)]);
        let order: Vec<_> = result.groups().map(|(category, _)| category).collect();
        assert_eq!(order, Category::ALL.to_vec());
        assert!(result.students_in(Category::Declining).is_empty());
    }

    #[test]
    fn improvement_is_recorded_on_the_student() {
        let result = classify(&[joined("B", 50.0, 70.0), joined("F", 0.0, 80.0)]);
        let improving = result.students_in(Category::Improving);
        assert_eq!(improving[0].improvement, 20.0);
        assert_eq!(improving[1].improvement, 80.0);
    }
}
