//! JSON snapshot of a classification: category name → list of students.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::classify::Classification;
use crate::error::AnalysisError;

pub fn default_snapshot_name(at: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!(
        "gradescope_analysis_{}.json",
        at.format("%Y%m%d_%H%M%S")
    ))
}

/// Writes the snapshot and returns where it went. Without an explicit path
/// the file is named after `generated_at` in the working directory.
pub fn save_snapshot(
    classification: &Classification,
    path: Option<&Path>,
    generated_at: DateTime<Local>,
) -> Result<PathBuf, AnalysisError> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_snapshot_name(generated_at));

    let json = serde_json::to_string_pretty(classification)?;
    fs::write(&path, json).map_err(|source| AnalysisError::Io {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), students = classification.total(), "snapshot saved");
    Ok(path)
}

pub fn load_snapshot(path: &Path) -> Result<Classification, AnalysisError> {
    if !path.exists() {
        return Err(AnalysisError::MissingFile(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let classification: Classification = serde_json::from_str(&contents)?;
    Ok(classification.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::models::{Category, JoinedStudent};
    use chrono::TimeZone;

    fn sample() -> Classification {
        let student = |name: &str, q2: f64, q3: f64| JoinedStudent {
            name: name.to_string(),
            email: format!("{}@example.edu", name.to_lowercase()),
            quiz2_score: q2 * 0.3,
            quiz2_percentage: q2,
            quiz3_score: q3 * 0.3,
            quiz3_percentage: q3,
        };
        classify(&[
            student("Avery", 90.0, 92.0),
            student("Jules", 2.0 / 3.0 * 100.0, 71.3),
            student("Kiara", 0.0, 80.0),
        ])
    }

    #[test]
    fn snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        let original = sample();

        let written = save_snapshot(&original, Some(&path), Local::now()).unwrap();
        assert_eq!(written, path);

        let reloaded = load_snapshot(&path).unwrap();
        assert_eq!(reloaded, original);
    }

    #[test]
    fn snapshot_is_keyed_by_category_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        save_snapshot(&sample(), Some(&path), Local::now()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        for category in Category::ALL {
            assert!(keys.contains(&category.to_string()));
        }
        assert_eq!(value["excelling"][0]["name"], "Avery");
        assert_eq!(value["improving"][0]["category"], "improving");
    }

    #[test]
    fn partial_snapshot_gains_empty_categories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, "{\"declining\": []}").unwrap();

        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.groups().count(), 5);
        assert!(loaded.is_empty());
    }

    #[test]
    fn default_name_uses_timestamp() {
        let at = Local.with_ymd_and_hms(2026, 2, 3, 14, 5, 9).unwrap();
        assert_eq!(
            default_snapshot_name(at),
            PathBuf::from("gradescope_analysis_20260203_140509.json")
        );
    }
}
