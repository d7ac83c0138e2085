//! Application hooks
//!
//! The connector handles verification, acknowledgment and client construction;
//! what happens with an event or a notification request is decided by a
//! [`SlackConnectorHooks`] implementation injected into the service.

use async_trait::async_trait;
use axum::Json;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, StatusCode};
use serde_json::Value;
use shared::error::ErrorResponse;

use crate::logic::notification::NotificationTarget;
use crate::logic::user::UserContext;
use crate::logic::{SlackClientBundle, SlackClientFactory};
use crate::types::SlackEvent;

/// `{status, body}` produced by a hook and forwarded to the HTTP caller
#[derive(Debug, Clone, PartialEq)]
pub struct HookResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl HookResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    pub fn ok() -> Self {
        Self::new(200, None)
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self::new(status, Some(body))
    }

    /// Error with the same `{status, statusCode, message}` body as the connector's own errors
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        let body = serde_json::to_value(ErrorResponse::new(status, message)).ok();
        Self::new(status.as_u16(), body)
    }
}

impl Default for HookResponse {
    fn default() -> Self {
        Self::ok()
    }
}

impl IntoResponse for HookResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match self.body {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        }
    }
}

/// Context handed to the event hooks
pub struct EventContext {
    /// Headers of the request being handled
    pub headers: HeaderMap,
    /// The verified payload as received
    pub payload: Value,
    /// `true` on the connector's own follow-up call
    pub dispatched: bool,
    /// Builds Slack clients for stored users
    pub clients: SlackClientFactory,
}

/// Context handed to [`SlackConnectorHooks::send_notification`]
pub struct NotificationContext {
    pub target: NotificationTarget,
    /// Body of the notification request, `Value::Null` when empty
    pub payload: Value,
    pub clients: SlackClientFactory,
}

/// Override points of the connector. Every method has a default.
#[async_trait]
pub trait SlackConnectorHooks: Send + Sync {
    /// Response sent to Slack to acknowledge a fresh event. Must be quick:
    /// it runs inside Slack's 3 second window. `None` means a bare 200.
    async fn event_response(
        &self,
        _ctx: &EventContext,
        _event: &SlackEvent,
    ) -> Result<Option<HookResponse>, anyhow::Error> {
        Ok(None)
    }

    /// Processes a verified event on the self-dispatched call. Not bound by
    /// Slack's deadline; the result goes back to the connector, not to Slack.
    async fn on_event(
        &self,
        _ctx: &EventContext,
        _event: &SlackEvent,
    ) -> Result<Option<HookResponse>, anyhow::Error> {
        Ok(None)
    }

    /// Sends a notification to `user` with the given client bundle.
    async fn send_notification(
        &self,
        _ctx: &NotificationContext,
        _user: &UserContext,
        _slack: &SlackClientBundle,
    ) -> Result<Option<HookResponse>, anyhow::Error> {
        Ok(Some(HookResponse::error(
            StatusCode::NOT_IMPLEMENTED,
            "Not implemented. Provide a SlackConnectorHooks::send_notification implementation.",
        )))
    }
}

/// Hooks with every default in place
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl SlackConnectorHooks for DefaultHooks {}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use serde_json::json;

        async fn body_bytes(response: Response) -> Vec<u8> {
            axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap()
                .to_vec()
        }

        #[tokio::test]
        async fn test_empty_hook_response_has_empty_body() {
            let response = HookResponse::ok().into_response();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_bytes(response).await.is_empty());
        }

        #[tokio::test]
        async fn test_json_hook_response_keeps_status_and_body() {
            let response = HookResponse::json(202, json!({"queued": true})).into_response();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
            let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
            assert_eq!(body, json!({"queued": true}));
        }

        #[tokio::test]
        async fn test_error_hook_response_uses_error_body_shape() {
            let response =
                HookResponse::error(StatusCode::NOT_IMPLEMENTED, "not here").into_response();
            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
            let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
            assert_eq!(
                body,
                json!({"status": 501, "statusCode": 501, "message": "not here"})
            );
        }

        #[test]
        fn test_invalid_status_becomes_500() {
            let response = HookResponse::new(42, None).into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
