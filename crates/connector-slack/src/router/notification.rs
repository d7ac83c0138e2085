//! Notification endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use bytes::Bytes;
use serde_json::Value;
use shared::error::CommonError;
use tracing::trace;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::{API_VERSION_TAG, SERVICE_ROUTE_KEY};
use crate::hooks::HookResponse;
use crate::logic::notification::NotificationTarget;
use crate::service::ConnectorService;

pub fn create_router() -> OpenApiRouter<Arc<ConnectorService>> {
    OpenApiRouter::new()
        .routes(routes!(route_notify_native_user))
        .routes(routes!(route_notify_foreign_user))
}

/// An empty body is `null`; anything else must be JSON.
fn parse_payload(body: &Bytes) -> Result<Value, CommonError> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| CommonError::InvalidRequest {
        msg: "Notification body is not valid JSON".to_string(),
        source: Some(e.into()),
    })
}

#[utoipa::path(
    post,
    path = "/notification/{native_user_id}",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("native_user_id" = String, Path, description = "Stored Slack user id (vendorUserId), URL-encoded"),
    ),
    request_body(content = String, content_type = "application/json", description = "Notification payload handed to the send hook"),
    responses(
        (status = 200, description = "Notification sent; body and status come from the send hook"),
        (status = 404, description = "User not found", body = CommonError),
        (status = 500, description = "Error sending notification", body = CommonError),
    ),
    summary = "Notify a Slack user",
    description = "Looks up a stored Slack user and sends them a notification through the application's send hook",
    operation_id = "notify-native-user",
)]
async fn route_notify_native_user(
    State(ctx): State<Arc<ConnectorService>>,
    Path(native_user_id): Path<String>,
    body: Bytes,
) -> Result<HookResponse, CommonError> {
    trace!(native_user_id = %native_user_id, "Sending notification");
    let payload = parse_payload(&body)?;
    let res = ctx
        .notifications
        .send(NotificationTarget::Native(native_user_id), payload)
        .await;
    trace!(success = res.is_ok(), "Sending notification completed");
    res
}

#[utoipa::path(
    post,
    path = "/notification/{foreign_system}/{foreign_user_id}",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("foreign_system" = String, Path, description = "Id of the system the user id belongs to"),
        ("foreign_user_id" = String, Path, description = "User id in that system"),
    ),
    request_body(content = String, content_type = "application/json", description = "Notification payload handed to the send hook"),
    responses(
        (status = 200, description = "Notification sent; body and status come from the send hook"),
        (status = 404, description = "User not found", body = CommonError),
        (status = 500, description = "Error sending notification", body = CommonError),
    ),
    summary = "Notify a linked user",
    description = "Resolves a user by their identity in another system and sends them a Slack notification",
    operation_id = "notify-foreign-user",
)]
async fn route_notify_foreign_user(
    State(ctx): State<Arc<ConnectorService>>,
    Path((foreign_system, foreign_user_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<HookResponse, CommonError> {
    trace!(
        foreign_system = %foreign_system,
        foreign_user_id = %foreign_user_id,
        "Sending notification"
    );
    let payload = parse_payload(&body)?;
    let res = ctx
        .notifications
        .send(
            NotificationTarget::Foreign {
                system: foreign_system,
                user_id: foreign_user_id,
            },
            payload,
        )
        .await;
    trace!(success = res.is_ok(), "Sending notification completed");
    res
}
