use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::clients::sensay::Role;

#[derive(Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Deserialize, IntoParams)]
pub struct SendMessageQuery {
    /// Stream the reply as a typewriter reveal instead of a JSON body.
    #[serde(default)]
    pub stream: bool,
}

/// Who a rendered message is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl From<Role> for Sender {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Sender::User,
            Role::Assistant => Sender::Bot,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SendMessageResponse {
    pub content: String,
    pub sender: Sender,
}

/// One chat message shaped for rendering.
#[derive(Serialize, ToSchema)]
pub struct UiMessage {
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_provider_role_maps_to_a_sender() {
        assert_eq!(Sender::from(Role::User), Sender::User);
        assert_eq!(Sender::from(Role::Assistant), Sender::Bot);
    }

    #[test]
    fn senders_serialize_as_ui_tags() {
        assert_eq!(serde_json::to_string(&Sender::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Sender::Bot).unwrap(), "\"bot\"");
    }
}
