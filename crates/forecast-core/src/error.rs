use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Too few bars for the requested computation, or a ratio whose
    /// denominator is zero and has no meaningful default.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("API error: {0}")]
    ApiError(String),
}

impl AnalysisError {
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, AnalysisError::InsufficientData(_))
    }
}
