use thiserror::Error;

#[derive(Error, Debug)]
pub enum PKError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid model configuration: {0}")]
    InvalidModel(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Solver divergence: {0}")]
    SolverDivergence(String),

    #[error("Unreachable target: {0}")]
    UnreachableTarget(String),
}

pub type PKResult<T> = Result<T, PKError>;

/// Rejects values that are not finite and strictly positive.
pub(crate) fn require_positive(name: &str, value: f64) -> PKResult<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PKError::InvalidParameter(
            format!("{} must be greater than 0 (got {})", name, value)
        ));
    }
    Ok(value)
}

/// Rejects values that are not finite or are negative.
pub(crate) fn require_non_negative(name: &str, value: f64) -> PKResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(PKError::InvalidParameter(
            format!("{} must be 0 or greater (got {})", name, value)
        ));
    }
    Ok(value)
}
