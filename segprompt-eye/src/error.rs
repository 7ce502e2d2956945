//! Error types for segprompt-eye

use segprompt_core::Error as CoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error(transparent)]
    Prompt(#[from] CoreError),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to write image {}: {source}", path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),
}

impl VisionError {
    /// The prompt-level error, if this is one.
    pub fn as_prompt(&self) -> Option<&CoreError> {
        match self {
            VisionError::Prompt(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for VisionError {
    fn from(err: ort::Error) -> Self {
        VisionError::Ort(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_error_display() {
        let err = VisionError::Embedding("Test error".to_string());
        assert!(err.to_string().contains("Embedding error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_vision_error_from_core() {
        let err: VisionError = CoreError::InvalidBox("zero width".to_string()).into();
        assert!(matches!(err.as_prompt(), Some(CoreError::InvalidBox(_))));
        assert!(err.to_string().contains("zero width"));
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = VisionError::Io {
            path: PathBuf::from("/nope/out"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let text = err.to_string();
        assert!(text.contains("/nope/out"));
        assert!(text.contains("denied"));
        assert!(err.as_prompt().is_none());
    }
}
