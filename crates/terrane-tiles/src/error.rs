//! Tile fetch and raster decode errors.

/// Why a tile fetch did not produce bytes.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport-level failure (connection, TLS, body read).
    #[error("http request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("tile request to {url} returned status {status}")]
    Status { status: u16, url: String },

    /// The request did not complete within the configured timeout.
    #[error("tile request timed out")]
    Timeout,

    /// The tile level is outside what the provider serves.
    #[error("level {level} outside provider range {min}..={max}")]
    OutOfRange { level: u8, min: u8, max: u8 },

    /// The producer went away without answering.
    #[error("tile request was cancelled")]
    Cancelled,

    /// The fetch was aborted by its owner.
    #[error("tile request was aborted")]
    Aborted,

    /// The provider failed to build the tile locally.
    #[error("tile generation failed: {0}")]
    Generate(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http(_) | FetchError::Timeout => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(err)
        }
    }
}

/// Errors raised while turning raster bytes into pixels or heights.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decode raster: {0}")]
    Image(#[from] image::ImageError),

    #[error("raster has no pixels")]
    EmptyRaster,

    #[error("tile size must be at least 2, got {0}")]
    InvalidTileSize(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(
            FetchError::Status {
                status: 503,
                url: String::new()
            }
            .is_retryable()
        );
        assert!(
            FetchError::Status {
                status: 429,
                url: String::new()
            }
            .is_retryable()
        );
        assert!(
            !FetchError::Status {
                status: 404,
                url: String::new()
            }
            .is_retryable()
        );
        assert!(!FetchError::Aborted.is_retryable());
    }
}
