//! Authentication state for the signed-in user.
//!
//! This module provides:
//! - `Session`: an access token plus its absolute expiry
//! - `SessionStore`: the only reader/writer of the persisted session
//! - `SessionStorage` backends: JSON file, OS keychain, memory
//! - `ExpiryTimer`: one-shot timer that ends a session at its expiry
//! - `guard`: redirect decisions for signed-in/signed-out views
//!
//! Validity is always recomputed against the clock; nothing is cached.

pub mod expiry;
pub mod guard;
pub mod keychain;
pub mod session;
pub mod storage;

pub use expiry::{ExpiryTimer, TimerState};
pub use guard::{private_route, public_route, GuardDecision, Route};
pub use keychain::KeyringStorage;
pub use session::{Session, SessionStore};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
