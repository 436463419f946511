use std::sync::Arc;

use actix_web::{
    get, post,
    web::{self, Json},
    Error, HttpResponse,
};
use tracing::error;

use crate::middleware::auth::AuthenticatedUser;
use crate::models::ExternalIdentity;
use crate::reveal;
use crate::types::{SendMessageQuery, SendMessageRequest, SendMessageResponse, Sender, UiMessage};
use crate::AppState;

/// Sends one user message to the replica and returns the assistant reply.
/// With `stream=true` the reply body is the typewriter reveal instead of
/// JSON. Failures surface immediately; nothing is retried here.
#[utoipa::path(
    context_path = "/chats",
    request_body = SendMessageRequest,
    params(SendMessageQuery),
    responses(
        (status = 200, description = "Assistant reply", body = SendMessageResponse),
        (status = 412, description = "No linked assistant identity"),
        (status = 502, description = "Chat provider error")
    )
)]
#[post("/message")]
pub async fn send_message(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    query: web::Query<SendMessageQuery>,
    web::Json(request): web::Json<SendMessageRequest>,
) -> Result<HttpResponse, Error> {
    let state = app_state.get_ref();
    let content = request.content.trim();
    if content.is_empty() {
        return Err(actix_web::error::ErrorBadRequest("message content is empty"));
    }

    let identity = resolve_identity(state, &authenticated_user.user_id).await?;
    let reply = state
        .sensay
        .send_message(
            state.config.sensay_replica_uuid,
            content,
            &identity.sensay_user_id,
        )
        .await
        .map_err(|e| {
            error!("{}", e);
            actix_web::error::ErrorBadGateway(e.to_string())
        })?;

    if query.stream {
        Ok(HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .streaming(reveal::typewriter(reply, reveal::CHAR_INTERVAL)))
    } else {
        Ok(HttpResponse::Ok().json(SendMessageResponse {
            content: reply,
            sender: Sender::Bot,
        }))
    }
}

/// Returns the conversation so far, shaped for rendering, in the order the
/// provider returned it.
#[utoipa::path(
    context_path = "/chats",
    responses(
        (status = 200, description = "Chat history", body = [UiMessage]),
        (status = 412, description = "No linked assistant identity"),
        (status = 502, description = "Chat provider error")
    )
)]
#[get("/history")]
pub async fn chat_history(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<Json<Vec<UiMessage>>, Error> {
    let state = app_state.get_ref();
    let identity = resolve_identity(state, &authenticated_user.user_id).await?;
    let items = state
        .sensay
        .get_chat_history(state.config.sensay_replica_uuid, &identity.sensay_user_id)
        .await
        .map_err(|e| {
            error!("{}", e);
            actix_web::error::ErrorBadGateway(e.to_string())
        })?;

    Ok(Json(
        items
            .into_iter()
            .map(|item| UiMessage {
                text: item.content,
                sender: item.role.into(),
                timestamp: item.created_at,
            })
            .collect(),
    ))
}

// Every chat operation requires a resolved identity mapping; a missing row
// is terminal for the request, never an anonymous fallback.
async fn resolve_identity(state: &Arc<AppState>, user_id: &str) -> Result<ExternalIdentity, Error> {
    state
        .identities
        .find_by_user_id(user_id)
        .await
        .map_err(|e| {
            error!("Identity lookup failed: {:?}", e);
            actix_web::error::ErrorInternalServerError(e.to_string())
        })?
        .ok_or_else(|| {
            actix_web::error::ErrorPreconditionFailed(
                "no linked assistant identity for this account",
            )
        })
}
