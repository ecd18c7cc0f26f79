use std::path::PathBuf;

use chrono::{DateTime, Local};
use tracing::info;

use crate::classify::{classify, Classification};
use crate::clean::{clean_rows, CleanReport};
use crate::error::AnalysisError;
use crate::join::full_outer_join;
use crate::loader::load_scores;
use crate::models::{Category, Quiz, RawScoreRow};

/// Result of one pass over the two exports. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub generated_at: DateTime<Local>,
    pub classification: Classification,
    pub quiz2_report: CleanReport,
    pub quiz3_report: CleanReport,
}

impl Analysis {
    /// Pure pipeline over already-loaded exports.
    pub fn from_rows(quiz2: Vec<RawScoreRow>, quiz3: Vec<RawScoreRow>) -> Self {
        let quiz2 = clean_rows(Quiz::Quiz2, quiz2);
        let quiz3 = clean_rows(Quiz::Quiz3, quiz3);
        let joined = full_outer_join(&quiz2.rows, &quiz3.rows);
        let classification = classify(&joined);

        Self {
            generated_at: Local::now(),
            classification,
            quiz2_report: quiz2.report,
            quiz3_report: quiz3.report,
        }
    }
}

/// Runs the load → clean → join → classify pipeline for a pair of exports.
///
/// [`Analyzer::run`] always recomputes and leaves the cache alone.
/// [`Analyzer::analysis`] computes once and hands back the cached result on
/// later calls; [`Analyzer::refresh`] replaces the cache wholesale.
#[derive(Debug)]
pub struct Analyzer {
    quiz2_path: PathBuf,
    quiz3_path: PathBuf,
    cached: Option<Analysis>,
}

impl Analyzer {
    pub fn new(quiz2_path: impl Into<PathBuf>, quiz3_path: impl Into<PathBuf>) -> Self {
        Self {
            quiz2_path: quiz2_path.into(),
            quiz3_path: quiz3_path.into(),
            cached: None,
        }
    }

    pub fn run(&self) -> Result<Analysis, AnalysisError> {
        let quiz2 = load_scores(&self.quiz2_path)?;
        let quiz3 = load_scores(&self.quiz3_path)?;

        let mut analysis = Analysis::from_rows(quiz2.rows, quiz3.rows);
        analysis.quiz2_report.undecodable = quiz2.undecodable;
        analysis.quiz3_report.undecodable = quiz3.undecodable;
        analysis.quiz2_report.input_rows += quiz2.undecodable;
        analysis.quiz3_report.input_rows += quiz3.undecodable;

        let groups = &analysis.classification;
        info!(
            students = groups.total(),
            excelling = groups.students_in(Category::Excelling).len(),
            improving = groups.students_in(Category::Improving).len(),
            struggling = groups.students_in(Category::Struggling).len(),
            declining = groups.students_in(Category::Declining).len(),
            consistent = groups.students_in(Category::Consistent).len(),
            "analysis complete"
        );
        Ok(analysis)
    }

    pub fn analysis(&mut self) -> Result<&Analysis, AnalysisError> {
        let analysis = match self.cached.take() {
            Some(analysis) => analysis,
            None => self.run()?,
        };
        Ok(self.cached.insert(analysis))
    }

    pub fn refresh(&mut self) -> Result<&Analysis, AnalysisError> {
        let fresh = self.run()?;
        Ok(self.cached.insert(fresh))
    }
}
