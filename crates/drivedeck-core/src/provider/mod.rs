//! Provider bootstrap and the sign-in lifecycle.
//!
//! Two components are initialized independently and in no particular
//! order: the API client (from the Google discovery documents) and the
//! OAuth token client (from the OpenID configuration). `ProviderSession`
//! only reports ready once both are done, and only then accepts `login`.

pub mod callback;
pub mod error;
pub mod identity;
pub mod pkce;
pub mod readiness;
pub mod session;

pub use callback::CallbackServer;
pub use error::AuthError;
pub use identity::{
    AuthorizePresenter, GoogleTokenClient, IdentityEndpoints, Prompt, TokenClient, TokenResponse,
};
pub use readiness::Readiness;
pub use session::{AuthState, LoginOutcome, ProviderSession};
