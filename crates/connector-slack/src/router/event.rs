//! Slack Events API endpoint
//!
//! Slack posts here directly; the connector posts here again with `?dispatch`
//! to process the event outside Slack's acknowledgment window.

use std::sync::Arc;

use axum::extract::{Query, State};
use bytes::Bytes;
use http::HeaderMap;
use serde::Deserialize;
use shared::error::CommonError;
use tracing::trace;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::{API_VERSION_TAG, SERVICE_ROUTE_KEY};
use crate::hooks::HookResponse;
use crate::logic::event::WebhookEnvelope;
use crate::service::ConnectorService;
use crate::types::UrlVerificationResponse;

pub fn create_router() -> OpenApiRouter<Arc<ConnectorService>> {
    OpenApiRouter::new().routes(routes!(route_slack_event))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventQuery {
    /// Present on the connector's own follow-up call
    pub dispatch: Option<String>,
}

#[utoipa::path(
    post,
    path = "/event",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(EventQuery),
    request_body(content = String, content_type = "application/json", description = "Raw Slack Events API payload"),
    responses(
        (status = 200, description = "Event acknowledged or processed; url_verification echoes the challenge", body = UrlVerificationResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 403, description = "Not authorized", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
        (status = 501, description = "Signing secret not configured", body = CommonError),
    ),
    summary = "Slack event webhook",
    description = "Verifies the Slack signature, answers url_verification, and acknowledges events. \
                   Events are re-posted to this endpoint with `?dispatch` and handed to the application there.",
    operation_id = "slack-event",
)]
async fn route_slack_event(
    State(ctx): State<Arc<ConnectorService>>,
    Query(query): Query<EventQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<HookResponse, CommonError> {
    let dispatched = query.dispatch.is_some();
    trace!(dispatched, bytes = body.len(), "Received Slack event");
    let res = ctx
        .events
        .route(WebhookEnvelope {
            headers,
            body,
            dispatched,
        })
        .await;
    trace!(success = res.is_ok(), "Slack event handled");
    res
}
