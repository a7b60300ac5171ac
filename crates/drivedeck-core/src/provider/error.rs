use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Sign-in was denied: {0}")]
    Denied(String),

    #[error("OAuth state mismatch - ignoring callback")]
    StateMismatch,

    #[error("Invalid OAuth callback: {0}")]
    Callback(String),

    #[error("Identity provider error: {0}")]
    Provider(#[from] ApiError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
