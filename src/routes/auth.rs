use std::sync::Arc;

use actix_web::{
    get, post,
    web::{self, Json},
    Error,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::clients::sensay::SensayError;
use crate::clients::supabase::{AuthProviderError, AuthUser};
use crate::linking;
use crate::middleware::auth::AuthenticatedUser;
use crate::session::{AuthView, SessionEvent, SessionState};
use crate::types::{LoginRequest, SessionResponse, SessionUser, SignupRequest};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Signup: creates the auth-provider user, links the Sensay identity,
/// persists the mapping, and answers with an authenticated session.
#[utoipa::path(
    context_path = "/auth",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created and signed in", body = SessionResponse),
        (status = 400, description = "Rejected by the auth provider"),
        (status = 502, description = "Identity linking failed after retries")
    )
)]
#[post("/signup")]
pub async fn signup(
    app_state: web::Data<Arc<AppState>>,
    web::Json(request): web::Json<SignupRequest>,
) -> Result<Json<SessionResponse>, Error> {
    let state = app_state.get_ref();
    let (user, _provider_session) = linking::link_signup(
        &state.supabase,
        &state.sensay,
        state.identities.as_ref(),
        state.retry,
        &request.email,
        &request.password,
        &request.full_name,
    )
    .await
    .map_err(|e| {
        error!("Signup failed: {:?}", e);
        map_link_error(e)
    })?;

    authenticated_response(state, user)
}

/// Password login against the auth provider. A missing identity mapping is
/// noted but does not block the login; chat operations enforce it.
#[utoipa::path(
    context_path = "/auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Auth provider rejected the credentials")
    )
)]
#[post("/login")]
pub async fn login(
    app_state: web::Data<Arc<AppState>>,
    web::Json(request): web::Json<LoginRequest>,
) -> Result<Json<SessionResponse>, Error> {
    let state = app_state.get_ref();
    let provider_session = state
        .supabase
        .sign_in(&request.email, &request.password)
        .await
        .map_err(|e| actix_web::error::ErrorUnauthorized(e.to_string()))?;

    match state
        .identities
        .find_by_user_id(&provider_session.user.id)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => warn!(
            "No identity mapping for user {}",
            provider_session.user.id
        ),
        Err(e) => warn!("Could not verify identity mapping: {:?}", e),
    }

    authenticated_response(state, provider_session.user)
}

#[utoipa::path(
    context_path = "/auth",
    responses((status = 200, description = "Signed out", body = SessionResponse))
)]
#[post("/logout")]
pub async fn logout(user: Option<AuthenticatedUser>) -> Result<Json<SessionResponse>, Error> {
    if let Some(user) = &user {
        info!("User {} signed out", user.user_id);
    }
    Ok(Json(SessionResponse {
        state: SessionState::Authenticated.apply(SessionEvent::Logout),
        token: None,
        user: None,
    }))
}

/// Session check: resolves `Loading` into the state the client should
/// render, refetching the user from the auth provider when signed in.
#[utoipa::path(
    context_path = "/auth",
    responses((status = 200, description = "Current session state", body = SessionResponse))
)]
#[get("/session")]
pub async fn session(
    app_state: web::Data<Arc<AppState>>,
    user: Option<AuthenticatedUser>,
) -> Result<Json<SessionResponse>, Error> {
    let state = app_state.get_ref();
    match user {
        Some(authenticated) => {
            let auth_user = state
                .supabase
                .get_user_by_id(&authenticated.user_id)
                .await
                .map_err(|e| actix_web::error::ErrorBadGateway(e.to_string()))?;
            Ok(Json(SessionResponse {
                state: SessionState::Loading.apply(SessionEvent::SessionChanged {
                    authenticated: true,
                }),
                token: None,
                user: Some(session_user(auth_user)),
            }))
        }
        None => Ok(Json(SessionResponse {
            state: SessionState::Loading.apply(SessionEvent::SessionChanged {
                authenticated: false,
            }),
            token: None,
            user: None,
        })),
    }
}

fn authenticated_response(
    state: &Arc<AppState>,
    user: AuthUser,
) -> Result<Json<SessionResponse>, Error> {
    let token = sign_jwt(&user.id, &state.config.jwt_secret)
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;
    Ok(Json(SessionResponse {
        state: SessionState::Unauthenticated(AuthView::None).apply(SessionEvent::SessionChanged {
            authenticated: true,
        }),
        token: Some(token),
        user: Some(session_user(user)),
    }))
}

fn session_user(user: AuthUser) -> SessionUser {
    SessionUser {
        id: user.id,
        email: user.email,
        full_name: user.user_metadata.full_name,
    }
}

// Signup failures keep their place in the error taxonomy: provider
// rejections go back verbatim, linking failures read as upstream errors.
fn map_link_error(e: anyhow::Error) -> Error {
    if let Some(provider) = e.downcast_ref::<AuthProviderError>() {
        return actix_web::error::ErrorBadRequest(provider.to_string());
    }
    if e.downcast_ref::<SensayError>().is_some() {
        return actix_web::error::ErrorBadGateway(e.to_string());
    }
    actix_web::error::ErrorInternalServerError(e.to_string())
}

pub fn sign_jwt(user_id: &str, jwt_secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600 * 24 * 7, // Token expires after 1 week
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_ref()),
    )
}
