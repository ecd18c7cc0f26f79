use std::path::Path;

use csv::{ReaderBuilder, Trim};
use tracing::{debug, info};

use crate::error::AnalysisError;
use crate::models::RawScoreRow;

/// Rows read from one export plus the count of records the CSV reader
/// could not decode.
#[derive(Debug, Clone, Default)]
pub struct LoadedScores {
    pub rows: Vec<RawScoreRow>,
    pub undecodable: usize,
}

/// Reads a score export. Only `Name`, `Email`, `Total Score` and
/// `Max Points` are looked at; header names are trimmed, cell values are not.
pub fn load_scores(path: &Path) -> Result<LoadedScores, AnalysisError> {
    if !path.exists() {
        return Err(AnalysisError::MissingFile(path.to_path_buf()));
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::Headers)
        .flexible(true)
        .from_path(path)
        .map_err(|source| AnalysisError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut loaded = LoadedScores::default();

    for (index, result) in reader.deserialize::<RawScoreRow>().enumerate() {
        match result {
            Ok(row) => loaded.rows.push(row),
            Err(source) if source.is_io_error() => {
                return Err(AnalysisError::Csv {
                    path: path.to_path_buf(),
                    source,
                });
            }
            Err(err) => {
                debug!(path = %path.display(), record = index + 1, error = %err, "undecodable record dropped");
                loaded.undecodable += 1;
            }
        }
    }

    info!(
        path = %path.display(),
        rows = loaded.rows.len(),
        undecodable = loaded.undecodable,
        "loaded score export"
    );
    Ok(loaded)
}
