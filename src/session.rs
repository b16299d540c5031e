//! Reactive session view and role guard. The session is a watch channel
//! over a small state machine: `Loading` until the first hydration settles,
//! then `Authenticated` or `Unauthenticated`. Guards are pure decisions; the
//! UI layer performs the actual navigation.

use crate::auth::AuthService;
use crate::client::ClientEvent;
use crate::error::Error;
use crate::role::Role;
use crate::types::{LoginRequest, Profile};
use tokio::sync::{broadcast, watch};
use tracing::debug;

/// Login entry point a guard redirects unauthenticated callers to.
pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Initial state while the profile fetch is in flight.
    Loading,
    Authenticated(Profile),
    Unauthenticated,
}

impl SessionState {
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Authenticated(profile) => Some(profile.role),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// What a guarded route should do for the current session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the protected content.
    Allow,
    /// Session still hydrating; show a neutral waiting indicator.
    Wait,
    /// No session; go to [`LOGIN_ROUTE`].
    RedirectToLogin,
    /// Authenticated with an insufficient role; go to the session's own
    /// dashboard, never an error page.
    Redirect(String),
}

/// Evaluates a required role set against the session state.
#[must_use]
pub fn evaluate(state: &SessionState, allowed: &[Role]) -> GuardDecision {
    match state {
        SessionState::Loading => GuardDecision::Wait,
        SessionState::Unauthenticated => GuardDecision::RedirectToLogin,
        SessionState::Authenticated(profile) => {
            if allowed.contains(&profile.role) {
                GuardDecision::Allow
            } else {
                GuardDecision::Redirect(profile.role.dashboard_route())
            }
        }
    }
}

/// Owns the session state and keeps it consistent with the token store:
/// auth operations move it forward, `SessionInvalidated` events from the
/// HTTP layer drop it back to `Unauthenticated`.
pub struct SessionManager {
    auth: AuthService,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    /// Spawns the event listener, so this must run inside a tokio runtime.
    #[must_use]
    pub fn new(auth: AuthService) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        let events = auth.client().subscribe();
        tokio::spawn(watch_events(events, state.clone()));
        Self { auth, state }
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Subscribes to session state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Guard decision for the current state.
    #[must_use]
    pub fn guard(&self, allowed: &[Role]) -> GuardDecision {
        evaluate(&self.state(), allowed)
    }

    /// Settles the initial `Loading` state: fetches the profile when any
    /// token material is present (an expired access token with a stored
    /// refresh token still hydrates through the transparent refresh path),
    /// otherwise goes straight to `Unauthenticated`.
    pub async fn hydrate(&self) {
        let tokens = self.auth.client().tokens();
        if !tokens.is_authenticated() && tokens.refresh_token().is_none() {
            self.state.send_replace(SessionState::Unauthenticated);
            return;
        }

        match self.auth.current_user().await {
            Ok(profile) => {
                self.state.send_replace(SessionState::Authenticated(profile));
            }
            Err(err) => {
                debug!("session hydration failed: {err}");
                self.state.send_replace(SessionState::Unauthenticated);
            }
        }
    }

    /// Logs in and moves the session to `Authenticated`.
    ///
    /// # Errors
    /// Returns the normalized error for any transport or HTTP failure; the
    /// session state is left untouched on failure.
    pub async fn login(
        &self,
        role: Role,
        credentials: &LoginRequest,
    ) -> Result<Profile, Error> {
        let profile = self.auth.login(role, credentials).await?;
        self.state
            .send_replace(SessionState::Authenticated(profile.clone()));
        Ok(profile)
    }

    /// Logs out and moves the session to `Unauthenticated`. Local
    /// invalidation always happens, even when the server call fails.
    pub async fn logout(&self) {
        self.auth.logout().await;
        self.state.send_replace(SessionState::Unauthenticated);
    }
}

async fn watch_events(
    mut events: broadcast::Receiver<ClientEvent>,
    state: watch::Sender<SessionState>,
) {
    loop {
        match events.recv().await {
            Ok(ClientEvent::SessionInvalidated) => {
                debug!("session invalidated by HTTP layer");
                state.send_replace(SessionState::Unauthenticated);
            }
            Ok(ClientEvent::Notice { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(role: Role) -> Profile {
        Profile {
            user_id: "user-1".to_string(),
            role,
            first_name: None,
            last_name: None,
            email: None,
            phone_number: None,
        }
    }

    #[test]
    fn loading_waits() {
        assert_eq!(
            evaluate(&SessionState::Loading, &[Role::Admin]),
            GuardDecision::Wait
        );
    }

    #[test]
    fn unauthenticated_redirects_to_login() {
        assert_eq!(
            evaluate(&SessionState::Unauthenticated, &[Role::Tenant]),
            GuardDecision::RedirectToLogin
        );
    }

    #[test]
    fn matching_role_is_allowed() {
        let state = SessionState::Authenticated(profile(Role::Tenant));
        assert_eq!(
            evaluate(&state, &[Role::Tenant, Role::Owner]),
            GuardDecision::Allow
        );
    }

    #[test]
    fn insufficient_role_redirects_to_own_dashboard() {
        let state = SessionState::Authenticated(profile(Role::Tenant));
        assert_eq!(
            evaluate(&state, &[Role::Admin]),
            GuardDecision::Redirect("/tenant/dashboard".to_string())
        );
    }

    #[test]
    fn state_helpers() {
        let state = SessionState::Authenticated(profile(Role::Staff));
        assert!(state.is_authenticated());
        assert_eq!(state.role(), Some(Role::Staff));
        assert_eq!(SessionState::Loading.role(), None);
        assert!(!SessionState::Unauthenticated.is_authenticated());
    }
}
