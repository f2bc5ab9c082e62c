//! Error types for segmentation and cutout operations

use thiserror::Error;

/// Result type alias for cutout operations
pub type Result<T> = std::result::Result<T, ObjcutError>;

/// Error types for the cutout pipeline and its fetch utilities
#[derive(Error, Debug)]
pub enum ObjcutError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bytes are not a valid raster format
    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),

    /// Source image cannot be fetched or opened
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Selector received no candidate masks
    #[error("Empty candidate set: the predictor returned no masks")]
    EmptyCandidateSet,

    /// A mask's dimensions differ from the source image
    #[error("Shape mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    ShapeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Network errors during downloads
    #[error("Network error: {0}")]
    Network(String),

    /// Model loading or resolution errors
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pixel processing or encoding errors
    #[error("Processing error: {0}")]
    Processing(String),
}

impl ObjcutError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a source-unavailable error
    pub fn source_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Create a network error with operation context
    pub fn network_error<E: std::fmt::Display>(operation: impl AsRef<str>, error: E) -> Self {
        Self::Network(format!("{}: {}", operation.as_ref(), error))
    }

    /// Create a shape mismatch error from expected and actual dimensions
    #[must_use]
    pub fn shape_mismatch(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::ShapeMismatch {
            expected_width: expected.0,
            expected_height: expected.1,
            actual_width: actual.0,
            actual_height: actual.1,
        }
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {operation} '{path_display}': {error}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = ObjcutError::invalid_config("bad point");
        assert!(matches!(err, ObjcutError::InvalidConfig(_)));

        let err = ObjcutError::inference("session failed");
        assert!(matches!(err, ObjcutError::Inference(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ObjcutError::invalid_config("point out of bounds");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: point out of bounds"
        );

        let err = ObjcutError::EmptyCandidateSet;
        assert!(err.to_string().contains("no masks"));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = ObjcutError::shape_mismatch((10, 20), (10, 21));
        let msg = err.to_string();
        assert!(msg.contains("expected 10x20"));
        assert!(msg.contains("got 10x21"));
    }

    #[test]
    fn test_file_io_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = ObjcutError::file_io_error("read image file", Path::new("/tmp/in.png"), &io_error);
        let msg = err.to_string();
        assert!(msg.contains("read image file"));
        assert!(msg.contains("/tmp/in.png"));
    }
}
