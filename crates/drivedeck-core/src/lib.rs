//! drivedeck core library.
//!
//! Everything the front ends need to talk to Google Drive:
//!
//! - `auth`: the persisted session, its storage backends, the expiry timer
//!   and route guards
//! - `provider`: bootstrap of the API client and the OAuth token client,
//!   combined readiness, login and logout
//! - `api`: the Drive/People REST client
//! - `models`: Drive entities
//! - `config`: file and environment configuration

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod models;
pub mod provider;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ProviderConfig, StorageBackend};
pub use url::Url;
