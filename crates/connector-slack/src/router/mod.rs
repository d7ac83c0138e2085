//! Router layer for the Slack connector
//! Contains the HTTP endpoints for Slack events, notifications and OAuth

pub mod event;
pub mod notification;
pub mod oauth;

use std::sync::Arc;

use axum::{Json, Router, routing::get};
use utoipa::openapi::tag::TagBuilder;
use utoipa::openapi::{Info, OpenApi};
use utoipa_axum::router::OpenApiRouter;

use crate::service::ConnectorService;

pub const SERVICE_ROUTE_KEY: &str = "slack";
pub const API_VERSION_TAG: &str = "v1";

/// Create the combined connector router
pub fn create_router() -> OpenApiRouter<Arc<ConnectorService>> {
    OpenApiRouter::new()
        .merge(event::create_router())
        .merge(notification::create_router())
        .merge(oauth::create_router())
}

/// Get the combined OpenAPI spec for the connector
pub fn get_openapi_spec() -> OpenApi {
    let (_, mut spec) = create_router().split_for_parts();

    let mut info = Info::new("slack-connector", "Slack events, notifications and OAuth");
    info.version = API_VERSION_TAG.to_string();
    spec.info = info;
    spec.tags = Some(vec![
        TagBuilder::new()
            .name(SERVICE_ROUTE_KEY)
            .description(Some(
                "Slack Events API webhooks, outbound notifications and the Slack side of OAuth",
            ))
            .build(),
    ]);
    spec
}

/// Routes with state applied, plus the spec at `/openapi.json`
pub fn initiate_router(service: Arc<ConnectorService>) -> Router {
    let (router, _) = create_router().split_for_parts();
    let spec = get_openapi_spec();
    router
        .with_state(service)
        .route("/openapi.json", get(move || async move { Json(spec) }))
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::body::Body;
    use axum::response::Response;
    use serde_json::Value;

    pub(crate) async fn json_body(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
