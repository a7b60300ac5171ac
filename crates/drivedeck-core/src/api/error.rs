use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not signed in")]
    NotSignedIn,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid file id: '{0}'")]
    InvalidFileId(String),

    #[error("Could not read {path}: {source}")]
    LocalFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
            None => body.to_string(),
            Some((cut, _)) => format!(
                "{}... (truncated, {} total bytes)",
                &body[..cut],
                body.len()
            ),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Whether signing in again could fix this error
    pub fn needs_sign_in(&self) -> bool {
        matches!(self, ApiError::NotSignedIn | ApiError::Unauthorized)
    }
}
