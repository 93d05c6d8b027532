use thiserror::Error;

/// Errors raised by the feature pipeline, training and serving layers
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("No match history available - cannot compute conversion rate ceiling")]
    EmptyHistory,

    #[error("No complete rows left for training: {0}")]
    NoTrainingRows(String),

    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Home and away team must differ (got {0} twice)")]
    SameTeam(String),

    #[error("Invalid {label} odds '{value}': expected a decimal number greater than 1")]
    InvalidOdds { label: &'static str, value: String },

    #[error("Latest profile for {team} has no value for {field} (not enough history)")]
    IncompleteProfile { team: String, field: &'static str },

    #[error("Model was trained on features {found:?}, expected {expected:?}")]
    FeatureSchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl PredictorError {
    /// True for errors caused by the caller's request rather than by the artifacts
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            PredictorError::SameTeam(_) | PredictorError::InvalidOdds { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PredictorError>;
