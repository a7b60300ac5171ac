//! REST client for the Google Drive and People APIs.
//!
//! `ApiClient` is initialized from the Google discovery documents and holds
//! the in-memory access token used for every request. The data methods are
//! single-call passthroughs: no retries, no caching.

pub mod client;
pub mod discovery;
pub mod error;

pub use client::{ApiClient, Endpoints};
pub use discovery::DiscoveryDocument;
pub use error::ApiError;
