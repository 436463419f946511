use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::session::SessionState;

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
}

/// What every auth endpoint answers with: the session state the client
/// should render, plus a bearer token and user when signed in.
#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}
