use serde::Serialize;
use utoipa::ToSchema;

/// Which auth surface an unauthenticated client is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthView {
    None,
    Login,
    Signup,
}

/// Client session lifecycle. The app starts in `Loading` until the first
/// session check resolves, then lives in one of the other states for its
/// whole lifetime; there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", content = "view", rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    Unauthenticated(AuthView),
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session check or auth-provider notification resolved.
    SessionChanged { authenticated: bool },
    /// The user navigated to an auth surface.
    Navigate(AuthView),
    /// The user backed out to the landing view.
    Back,
    Logout,
}

impl SessionState {
    pub fn apply(self, event: SessionEvent) -> SessionState {
        use SessionEvent::*;

        match (self, event) {
            (_, SessionChanged {
                authenticated: true,
            }) => SessionState::Authenticated,
            // A signed-out notification keeps whatever auth view is open.
            (SessionState::Unauthenticated(view), SessionChanged { .. }) => {
                SessionState::Unauthenticated(view)
            }
            (_, SessionChanged { .. }) => SessionState::Unauthenticated(AuthView::None),
            (_, Logout) => SessionState::Unauthenticated(AuthView::None),
            (SessionState::Unauthenticated(_), Navigate(view)) => {
                SessionState::Unauthenticated(view)
            }
            (SessionState::Unauthenticated(_), Back) => {
                SessionState::Unauthenticated(AuthView::None)
            }
            // Navigation means nothing while loading or signed in.
            (state, Navigate(_) | Back) => state,
        }
    }
}
