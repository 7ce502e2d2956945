use thiserror::Error;

/// Failures raised while validating prompts and segmentation results.
///
/// All of these are deterministic input-validation failures: they are
/// surfaced to the caller immediately and never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid box: {0}")]
    InvalidBox(String),

    #[error("Invalid point: {0}")]
    InvalidPoint(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("No regions left to rank: {0}")]
    NoRegions(String),

    #[error("Resolution mismatch: {0}")]
    ResolutionMismatch(String),

    #[error("Invalid segmentation results: {0}")]
    InvalidResults(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidBox("zero width".to_string());
        assert!(err.to_string().contains("Invalid box"));
        assert!(err.to_string().contains("zero width"));

        let err = Error::NoRegions("all filtered".to_string());
        assert!(err.to_string().contains("No regions"));
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(
            Error::EmptyResult("x".to_string()),
            Error::EmptyResult("x".to_string())
        );
        assert_ne!(
            Error::EmptyResult("x".to_string()),
            Error::ResolutionMismatch("x".to_string())
        );
    }
}
