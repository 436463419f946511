use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Failure reported by the auth provider. The message is the provider's own
/// wording and is shown to the user verbatim.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AuthProviderError(pub String);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// The auth provider's view of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// A provider session established by a password sign-in.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: AuthUser,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpMetadata<'a>,
}

#[derive(Serialize)]
struct SignUpMetadata<'a> {
    full_name: &'a str,
}

#[derive(Serialize)]
struct PasswordGrantRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
}

/// HTTP client for the Supabase auth endpoints we bridge: sign-up, password
/// sign-in, and user lookup by id.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuthClient {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        SupabaseAuthClient {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    /// Registers a new user, storing the display name in the provider-side
    /// user metadata.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthUser, AuthProviderError> {
        let response = self
            .keyed(self.http.post(format!("{}/auth/v1/signup", self.base_url)))
            .json(&SignUpRequest {
                email,
                password,
                data: SignUpMetadata { full_name },
            })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }
        response.json::<AuthUser>().await.map_err(transport_error)
    }

    /// Exchanges email and password for a provider session.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthProviderError> {
        let response = self
            .keyed(
                self.http
                    .post(format!("{}/auth/v1/token", self.base_url))
                    .query(&[("grant_type", "password")]),
            )
            .json(&PasswordGrantRequest { email, password })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }
        response
            .json::<AuthSession>()
            .await
            .map_err(transport_error)
    }

    /// Looks a user up by id, for session checks after the provider session
    /// itself is out of our hands.
    pub async fn get_user_by_id(&self, user_id: &str) -> Result<AuthUser, AuthProviderError> {
        let response = self
            .keyed(self.http.get(format!(
                "{}/auth/v1/admin/users/{}",
                self.base_url, user_id
            )))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }
        response.json::<AuthUser>().await.map_err(transport_error)
    }

    fn keyed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }
}

fn transport_error(e: reqwest::Error) -> AuthProviderError {
    error!("HTTP error calling auth provider: {}", e);
    AuthProviderError(e.to_string())
}

async fn provider_error(response: reqwest::Response) -> AuthProviderError {
    let status = response.status();
    let message = response
        .json::<ProviderErrorBody>()
        .await
        .ok()
        .and_then(|body| body.msg.or(body.message).or(body.error_description))
        .unwrap_or_else(|| format!("auth provider returned status {}", status));
    error!("Error response from auth provider: {}", message);
    AuthProviderError(message)
}
