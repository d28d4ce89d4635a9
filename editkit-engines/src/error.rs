//! Engine error types.

use thiserror::Error;

/// Result type for image helpers.
pub type ImageResult<T> = Result<T, ImageError>;

/// Errors raised while decoding, transforming or encoding images.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The data URI is malformed.
    #[error("Invalid data URI: {0}")]
    DataUri(String),

    /// The bytes are not a decodable image.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Encoding to the requested format failed.
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// The source file could not be read.
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    /// The source or format is not handled by this engine.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}
