//! Redirect decisions for views that need (or must not have) a session.

use super::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignIn,
    Home,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(Route),
}

/// Views that require a signed-in user
pub fn private_route(store: &SessionStore) -> GuardDecision {
    if store.is_valid() {
        GuardDecision::Proceed
    } else {
        GuardDecision::Redirect(Route::SignIn)
    }
}

/// Views only shown while signed out, e.g. the sign-in screen
pub fn public_route(store: &SessionStore) -> GuardDecision {
    if store.is_valid() {
        GuardDecision::Redirect(Route::Home)
    } else {
        GuardDecision::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryStorage, Session};
    use crate::clock::ManualClock;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    #[test]
    fn test_guards_follow_session_validity() {
        let now = Utc::now();
        let clock = ManualClock::new(now);
        let store = SessionStore::new(Arc::new(MemoryStorage::new()), Arc::new(clock.clone()));

        assert_eq!(private_route(&store), GuardDecision::Redirect(Route::SignIn));
        assert_eq!(public_route(&store), GuardDecision::Proceed);

        store.save(&Session::new("abc", now + Duration::minutes(1)));
        assert_eq!(private_route(&store), GuardDecision::Proceed);
        assert_eq!(public_route(&store), GuardDecision::Redirect(Route::Home));

        clock.advance(Duration::minutes(2));
        assert_eq!(private_route(&store), GuardDecision::Redirect(Route::SignIn));
    }
}
