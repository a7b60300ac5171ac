//! The signed-in lifecycle, owned by one explicitly constructed handle.
//!
//! Ordering rules:
//! - readiness is reported only after both components finished, in either order
//! - every successful login re-arms the expiry timer (cancelling the old one)
//! - logout cancels the timer before clearing local state

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::identity::{AuthorizePresenter, GoogleTokenClient, Prompt, TokenClient};
use super::readiness::Readiness;
use super::AuthError;
use crate::api::ApiClient;
use crate::auth::{ExpiryTimer, Session, SessionStore};
use crate::clock::Clock;
use crate::config::ProviderConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    SignedIn { expires_at: DateTime<Utc> },
    /// The session ran out; front ends should go back to sign-in
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The provider is still initializing; nothing happened
    NotReady,
    SignedIn(Session),
}

struct Inner {
    store: SessionStore,
    clock: Arc<dyn Clock>,
    timer: ExpiryTimer,
    api: OnceLock<ApiClient>,
    token_client: OnceLock<Arc<dyn TokenClient>>,
    readiness: watch::Sender<Readiness>,
    auth_state: watch::Sender<AuthState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn expire(&self) {
        info!("Session expired");
        self.store.clear();
        if let Some(api) = self.api.get() {
            api.set_token(None);
        }
        self.auth_state.send_replace(AuthState::Expired);
    }
}

/// Cheap to clone; clones share the same provider state.
#[derive(Clone)]
pub struct ProviderSession {
    inner: Arc<Inner>,
}

impl ProviderSession {
    pub fn new(store: SessionStore) -> Self {
        let clock = Arc::clone(store.clock());
        let (readiness, _) = watch::channel(Readiness::default());
        let (auth_state, _) = watch::channel(AuthState::SignedOut);
        Self {
            inner: Arc::new(Inner {
                timer: ExpiryTimer::new(Arc::clone(&clock)),
                store,
                clock,
                api: OnceLock::new(),
                token_client: OnceLock::new(),
                readiness,
                auth_state,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    /// The API client, once initialized
    pub fn api(&self) -> Option<&ApiClient> {
        self.inner.api.get()
    }

    // ===== Readiness =====

    pub fn readiness(&self) -> Readiness {
        *self.inner.readiness.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.readiness().is_ready()
    }

    /// Resolve once both provider components are initialized
    pub async fn wait_ready(&self) {
        let mut rx = self.inner.readiness.subscribe();
        // The sender lives in `self`, so this cannot fail
        let _ = rx.wait_for(Readiness::is_ready).await;
    }

    /// Initialize both provider components in the background.
    ///
    /// Failures are logged and leave the provider not ready.
    pub fn bootstrap(&self, config: &ProviderConfig, presenter: AuthorizePresenter) {
        let api_task = {
            let session = self.clone();
            let api_key = config.api_key.clone();
            let discovery_docs = config.discovery_docs.clone();
            tokio::spawn(async move {
                match ApiClient::load(&api_key, &discovery_docs).await {
                    Ok(client) => session.mark_api_ready(client),
                    Err(e) => error!(error = %e, "Failed to initialize API client"),
                }
            })
        };

        let identity_task = {
            let session = self.clone();
            let client_id = config.client_id.clone();
            let client_secret = config.client_secret.clone();
            let scopes = config.scopes.clone();
            tokio::spawn(async move {
                match GoogleTokenClient::load(client_id, client_secret, scopes, presenter).await {
                    Ok(client) => session.mark_identity_ready(Arc::new(client)),
                    Err(e) => error!(error = %e, "Failed to initialize token client"),
                }
            })
        };

        let mut tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.extend([api_task, identity_task]);
    }

    /// Install the initialized API client.
    ///
    /// A still-valid persisted session is attached to it, so the client
    /// holds a token whenever the store has a valid session.
    pub fn mark_api_ready(&self, client: ApiClient) {
        if let Some(session) = self.inner.store.current() {
            client.set_token(Some(session.token));
        }
        if self.inner.api.set(client).is_err() {
            warn!("API client already initialized");
            return;
        }
        self.inner.readiness.send_modify(|r| r.api_client = true);
        debug!(ready = self.is_ready(), "API client ready");
    }

    pub fn mark_identity_ready(&self, client: Arc<dyn TokenClient>) {
        if self.inner.token_client.set(client).is_err() {
            warn!("Token client already initialized");
            return;
        }
        self.inner.readiness.send_modify(|r| r.identity = true);
        debug!(ready = self.is_ready(), "Token client ready");
    }

    // ===== Auth state =====

    pub fn auth_state(&self) -> AuthState {
        self.inner.auth_state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.auth_state.subscribe()
    }

    /// Pick up a session persisted by an earlier run.
    ///
    /// A valid session gets its expiry timer armed and is returned. An
    /// expired one is handed to the timer at its (past) expiry, which removes
    /// it right away. Unreadable values are left alone; they read as absent
    /// and the next login overwrites them.
    /// Must be called from within a tokio runtime.
    pub fn restore(&self) -> Option<Session> {
        let session = self.inner.store.load()?;
        if !session.is_valid_at(self.inner.clock.now()) {
            debug!(expires_at = %session.expires_at, "Stored session already expired");
            self.arm_expiry(session.expires_at);
            return None;
        }

        if let Some(api) = self.api() {
            api.set_token(Some(session.token.clone()));
        }
        self.arm_expiry(session.expires_at);
        self.inner.auth_state.send_replace(AuthState::SignedIn {
            expires_at: session.expires_at,
        });
        debug!(expires_at = %session.expires_at, "Restored session");
        Some(session)
    }

    /// Sign in through the token client.
    ///
    /// Asks for consent when the API client holds no token and silently
    /// otherwise. Returns `NotReady` without side effects before bootstrap
    /// finished. If the user abandons the provider's flow this never resolves.
    pub async fn login(&self) -> Result<LoginOutcome, AuthError> {
        let (api, token_client) = match (self.inner.api.get(), self.inner.token_client.get()) {
            (Some(api), Some(token_client)) => (api, Arc::clone(token_client)),
            _ => {
                debug!(readiness = ?self.readiness(), "Login requested before provider is ready");
                return Ok(LoginOutcome::NotReady);
            }
        };

        let prompt = if api.has_token() {
            Prompt::Silent
        } else {
            Prompt::Consent
        };
        info!(?prompt, "Requesting access token");
        let grant = token_client.request_access_token(prompt).await?;

        // An old timer firing after the save would clear the new session
        self.inner.timer.cancel();
        let session = Session::from_grant(grant.access_token, grant.expires_in, self.inner.clock.now());
        self.inner.store.save(&session);
        api.set_token(Some(session.token.clone()));
        self.arm_expiry(session.expires_at);
        self.inner.auth_state.send_replace(AuthState::SignedIn {
            expires_at: session.expires_at,
        });
        info!(expires_at = %session.expires_at, "Signed in");

        Ok(LoginOutcome::SignedIn(session))
    }

    /// Sign out locally and revoke the provider grant.
    ///
    /// Local state is always cleared; a failed revocation is only logged.
    pub async fn logout(&self) {
        self.inner.timer.cancel();
        self.inner.store.clear();
        self.inner.auth_state.send_replace(AuthState::SignedOut);
        info!("Signed out");

        let Some(token) = self.api().and_then(ApiClient::take_token) else {
            debug!("No provider token to revoke");
            return;
        };
        match self.inner.token_client.get() {
            Some(token_client) => {
                if let Err(e) = token_client.revoke(&token).await {
                    warn!(error = %e, "Failed to revoke access token");
                }
            }
            None => debug!("Token client not ready, skipping revocation"),
        }
    }

    /// Stop background initialization and the expiry timer
    pub fn shutdown(&self) {
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
        self.inner.timer.cancel();
    }

    fn arm_expiry(&self, expires_at: DateTime<Utc>) {
        let inner = Arc::downgrade(&self.inner);
        self.inner.timer.arm(expires_at, move || {
            if let Some(inner) = inner.upgrade() {
                inner.expire();
            }
        });
    }
}
