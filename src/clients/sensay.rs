use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

/// Failure talking to the Sensay replica API. Carries the provider's own
/// message when the response body had one, so callers can surface it as-is.
#[derive(Debug, Error)]
#[error("{context}: {message}")]
pub struct SensayError {
    pub context: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message from the replica's chat history, newest last.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryItem {
    pub content: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    success: bool,
    items: Vec<HistoryItem>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    success: bool,
    content: String,
}

#[derive(Deserialize)]
struct CreatedUser {
    id: String,
}

#[derive(Serialize)]
struct CreateUserRequest<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    message: Option<String>,
}

/// HTTP client for the Sensay replica API. Calls are single-shot; retrying
/// is the caller's decision, not this layer's.
#[derive(Clone)]
pub struct SensayClient {
    http: Client,
    base_url: String,
    organization_secret: String,
    api_version: String,
}

impl SensayClient {
    pub fn new(base_url: &str, organization_secret: &str, api_version: &str) -> Self {
        SensayClient {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            organization_secret: organization_secret.to_string(),
            api_version: api_version.to_string(),
        }
    }

    /// Creates the Sensay-side identity for a freshly signed-up user,
    /// requesting our auth-provider user id as the Sensay id. Returns the id
    /// the provider actually assigned.
    pub async fn create_user(&self, id: &str) -> Result<String, SensayError> {
        const CONTEXT: &str = "Failed to create Sensay user";

        debug!("Creating Sensay user for id: {}", id);
        let response = self
            .authed(self.http.post(format!("{}/v1/users", self.base_url)), None)
            .json(&CreateUserRequest { id })
            .send()
            .await
            .map_err(|e| transport_error(CONTEXT, e))?;

        if !response.status().is_success() {
            return Err(provider_error(CONTEXT, response).await);
        }

        let created = response
            .json::<CreatedUser>()
            .await
            .map_err(|e| transport_error(CONTEXT, e))?;
        debug!("Sensay user created: {}", created.id);
        Ok(created.id)
    }

    /// Posts one user message to the replica and returns the assistant's
    /// reply text.
    pub async fn send_message(
        &self,
        replica_uuid: Uuid,
        content: &str,
        external_user_id: &str,
    ) -> Result<String, SensayError> {
        const CONTEXT: &str = "Failed to send message";

        let url = format!(
            "{}/v1/replicas/{}/chat/completions",
            self.base_url, replica_uuid
        );
        let response = self
            .authed(self.http.post(url), Some(external_user_id))
            .json(&CompletionRequest { content })
            .send()
            .await
            .map_err(|e| transport_error(CONTEXT, e))?;

        if !response.status().is_success() {
            return Err(provider_error(CONTEXT, response).await);
        }

        let completion = response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| transport_error(CONTEXT, e))?;
        if !completion.success {
            return Err(SensayError {
                context: CONTEXT,
                message: "provider reported failure".to_string(),
            });
        }
        Ok(completion.content)
    }

    /// Fetches the replica's chat history for one end user, in the order the
    /// provider returns it. Whatever page the provider sends is the whole
    /// result; there is no pagination here.
    pub async fn get_chat_history(
        &self,
        replica_uuid: Uuid,
        external_user_id: &str,
    ) -> Result<Vec<HistoryItem>, SensayError> {
        const CONTEXT: &str = "Failed to get chat history";

        let url = format!("{}/v1/replicas/{}/chat/history", self.base_url, replica_uuid);
        let response = self
            .authed(self.http.get(url), Some(external_user_id))
            .send()
            .await
            .map_err(|e| transport_error(CONTEXT, e))?;

        if !response.status().is_success() {
            return Err(provider_error(CONTEXT, response).await);
        }

        let history = response
            .json::<HistoryResponse>()
            .await
            .map_err(|e| transport_error(CONTEXT, e))?;
        if !history.success {
            return Err(SensayError {
                context: CONTEXT,
                message: "provider reported failure".to_string(),
            });
        }
        Ok(history.items)
    }

    // Every Sensay call carries the organization secret and API version;
    // per-user calls additionally scope to the end user.
    fn authed(&self, request: RequestBuilder, external_user_id: Option<&str>) -> RequestBuilder {
        let request = request
            .header("X-ORGANIZATION-SECRET", &self.organization_secret)
            .header("X-API-Version", &self.api_version);
        match external_user_id {
            Some(id) => request.header("X-USER-ID", id),
            None => request,
        }
    }
}

fn transport_error(context: &'static str, e: impl std::fmt::Display) -> SensayError {
    error!("HTTP error calling Sensay: {}", e);
    SensayError {
        context,
        message: e.to_string(),
    }
}

async fn provider_error(context: &'static str, response: reqwest::Response) -> SensayError {
    let status = response.status();
    let message = response
        .json::<ProviderErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("provider returned status {}", status));
    error!("Error response from Sensay: {}", message);
    SensayError { context, message }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const REPLICA: Uuid = Uuid::nil();

    fn client(server: &MockServer) -> SensayClient {
        SensayClient::new(&server.uri(), "org-secret", "2025-03-25")
    }

    #[tokio::test]
    async fn create_user_returns_assigned_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/users"))
            .and(header("X-ORGANIZATION-SECRET", "org-secret"))
            .and(header("X-API-Version", "2025-03-25"))
            .and(body_json(json!({ "id": "user-1" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "user-1" })))
            .mount(&server)
            .await;

        let id = client(&server).create_user("user-1").await.unwrap();
        assert_eq!(id, "user-1");
    }

    #[tokio::test]
    async fn create_user_wraps_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/users"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({ "message": "user exists" })),
            )
            .mount(&server)
            .await;

        let err = client(&server).create_user("user-1").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to create Sensay user: user exists");
    }

    #[tokio::test]
    async fn send_message_scopes_to_the_end_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/replicas/{}/chat/completions", REPLICA)))
            .and(header("X-USER-ID", "sensay-1"))
            .and(body_json(json!({ "content": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "content": "hi there"
            })))
            .mount(&server)
            .await;

        let reply = client(&server)
            .send_message(REPLICA, "hello", "sensay-1")
            .await
            .unwrap();
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn send_message_surfaces_http_failure_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/replicas/{}/chat/completions", REPLICA)))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({ "message": "replica offline" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .send_message(REPLICA, "hello", "sensay-1")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to send message: replica offline");
    }

    #[tokio::test]
    async fn history_parses_roles_and_timestamps() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/replicas/{}/chat/history", REPLICA)))
            .and(header("X-USER-ID", "sensay-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "type": "array",
                "items": [
                    { "content": "hello", "role": "user", "created_at": "2025-01-01T10:00:00Z" },
                    { "content": "hi", "role": "assistant", "created_at": "2025-01-01T10:00:02Z" }
                ]
            })))
            .mount(&server)
            .await;

        let items = client(&server)
            .get_chat_history(REPLICA, "sensay-1")
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].role, Role::User);
        assert_eq!(items[1].role, Role::Assistant);
        assert!(items[0].created_at < items[1].created_at);
    }

    #[tokio::test]
    async fn history_rejects_unknown_roles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/replicas/{}/chat/history", REPLICA)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "items": [
                    { "content": "??", "role": "system", "created_at": "2025-01-01T10:00:00Z" }
                ]
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .get_chat_history(REPLICA, "sensay-1")
            .await
            .unwrap_err();
        assert_eq!(err.context, "Failed to get chat history");
    }
}
