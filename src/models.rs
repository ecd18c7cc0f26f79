use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which export a row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quiz {
    Quiz2,
    Quiz3,
}

impl fmt::Display for Quiz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quiz::Quiz2 => write!(f, "quiz 2"),
            Quiz::Quiz3 => write!(f, "quiz 3"),
        }
    }
}

/// One row of a score export, exactly as read. Score fields stay textual so
/// the cleaner decides what counts as numeric.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawScoreRow {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Email", default)]
    pub email: Option<String>,
    #[serde(rename = "Total Score", default)]
    pub total_score: Option<String>,
    #[serde(rename = "Max Points", default)]
    pub max_points: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedScoreRow {
    pub name: String,
    pub email: String,
    /// `None` when the export held something that is not a number.
    pub total_score: Option<f64>,
    pub max_points: f64,
    pub percentage: Option<f64>,
}

impl CleanedScoreRow {
    pub fn key(&self) -> StudentKey {
        StudentKey {
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Join key. Compared byte for byte: no trimming, no case folding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StudentKey {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedStudent {
    pub name: String,
    pub email: String,
    pub quiz2_score: f64,
    pub quiz2_percentage: f64,
    pub quiz3_score: f64,
    pub quiz3_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedStudent {
    pub name: String,
    pub email: String,
    pub quiz2_score: f64,
    pub quiz2_percentage: f64,
    pub quiz3_score: f64,
    pub quiz3_percentage: f64,
    pub improvement: f64,
    pub category: Category,
}

/// Trend category. Declaration order is the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Excelling,
    Improving,
    Struggling,
    Declining,
    Consistent,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Excelling,
        Category::Improving,
        Category::Struggling,
        Category::Declining,
        Category::Consistent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Excelling => "excelling",
            Category::Improving => "improving",
            Category::Struggling => "struggling",
            Category::Declining => "declining",
            Category::Consistent => "consistent",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown category '{value}'"))
    }
}
