//! OAuth endpoints
//!
//! `/authorize` sends the user to Slack; Slack sends them back to `/callback`
//! with a code that is exchanged for tokens and stored.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{StatusCode, header};
use serde::{Deserialize, Serialize};
use shared::error::CommonError;
use tracing::{info, trace};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::{API_VERSION_TAG, SERVICE_ROUTE_KEY};
use crate::logic::oauth::complete_authorization;
use crate::service::ConnectorService;

pub fn create_router() -> OpenApiRouter<Arc<ConnectorService>> {
    OpenApiRouter::new()
        .routes(routes!(route_authorize))
        .routes(routes!(route_callback))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuthorizeQuery {
    /// Opaque value returned to `redirect_uri` by Slack
    pub state: Option<String>,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
    /// Must match the `redirect_uri` sent to `/authorize`
    pub redirect_uri: Option<String>,
    /// Set by Slack when the user declined
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub vendor_user_id: String,
}

fn required(value: Option<String>, name: &str) -> Result<String, CommonError> {
    value.ok_or_else(|| CommonError::InvalidRequest {
        msg: format!("Missing {name} query parameter"),
        source: None,
    })
}

#[utoipa::path(
    get,
    path = "/authorize",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(AuthorizeQuery),
    responses(
        (status = 302, description = "Redirect to Slack's authorization page"),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 501, description = "OAuth client id not configured", body = CommonError),
    ),
    summary = "Start Slack OAuth",
    description = "Redirects to Slack to install the app with the configured scopes",
    operation_id = "slack-authorize",
)]
async fn route_authorize(
    State(ctx): State<Arc<ConnectorService>>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, CommonError> {
    trace!("Starting Slack authorization");
    let oauth = ctx.oauth()?;
    let state = required(query.state, "state")?;
    let redirect_uri = required(query.redirect_uri, "redirect_uri")?;
    let url = oauth.authorization_url(&state, &redirect_uri)?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response())
}

#[utoipa::path(
    get,
    path = "/callback",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(CallbackQuery),
    responses(
        (status = 200, description = "User stored", body = CallbackResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
        (status = 501, description = "OAuth client id not configured", body = CommonError),
    ),
    summary = "Finish Slack OAuth",
    description = "Exchanges the authorization code for tokens and stores the Slack user",
    operation_id = "slack-callback",
)]
async fn route_callback(
    State(ctx): State<Arc<ConnectorService>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>, CommonError> {
    let oauth = ctx.oauth()?;
    if let Some(error) = query.error {
        return Err(CommonError::InvalidRequest {
            msg: format!("Slack authorization failed: {error}"),
            source: None,
        });
    }
    let code = required(query.code, "code")?;
    let user =
        complete_authorization(oauth, ctx.store.as_ref(), &code, query.redirect_uri.as_deref())
            .await?;
    info!(vendor_user_id = %user.vendor_user_id, "Slack authorization completed");
    Ok(Json(CallbackResponse {
        vendor_user_id: user.vendor_user_id,
    }))
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use crate::logic::user::{InMemoryUserStore, UserStore};
        use crate::router::initiate_router;
        use crate::router::testing::json_body;
        use crate::types::SlackConnectorConfig;
        use axum::Router;
        use axum::body::Body;
        use axum::routing::post;
        use http::Request;
        use serde_json::json;
        use tower::ServiceExt;

        async fn fake_slack() -> String {
            let app = Router::new().route(
                "/oauth.v2.access",
                post(|| async {
                    Json(json!({
                        "ok": true,
                        "access_token": "xoxb-1",
                        "bot_user_id": "B1",
                        "team": {"id": "T1"},
                    }))
                }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            format!("http://{addr}")
        }

        fn get(uri: &str) -> Request<Body> {
            Request::builder().uri(uri).body(Body::empty()).unwrap()
        }

        #[tokio::test]
        async fn test_without_client_id_is_501() {
            let app = initiate_router(Arc::new(
                ConnectorService::builder(SlackConnectorConfig::default()).build(),
            ));
            let response = app
                .clone()
                .oneshot(get("/authorize?state=s&redirect_uri=https%3A%2F%2Fx"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);

            let response = app.oneshot(get("/callback?code=c")).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        }

        #[tokio::test]
        async fn test_authorize_redirects_to_slack() {
            let app = initiate_router(Arc::new(
                ConnectorService::builder(SlackConnectorConfig {
                    client_id: Some("123.456".to_string()),
                    scope: Some("chat:write".to_string()),
                    ..Default::default()
                })
                .build(),
            ));
            let response = app
                .oneshot(get(
                    "/authorize?state=s1&redirect_uri=https%3A%2F%2Fconn.example.com%2Fcallback",
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FOUND);
            let location = response.headers()[header::LOCATION].to_str().unwrap();
            assert!(location.starts_with("https://slack.com/oauth/v2/authorize?client_id=123.456"));
            assert!(location.contains("state=s1"));
            assert!(location.contains("redirect_uri=https%3A%2F%2Fconn.example.com%2Fcallback"));
        }

        #[tokio::test]
        async fn test_callback_stores_user() {
            let base = fake_slack().await;
            let store = Arc::new(InMemoryUserStore::new());
            let app = initiate_router(Arc::new(
                ConnectorService::builder(SlackConnectorConfig {
                    client_id: Some("123.456".to_string()),
                    slack_api_base: base,
                    ..Default::default()
                })
                .store(store.clone())
                .build(),
            ));

            let response = app.oneshot(get("/callback?code=abc")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(json_body(response).await, json!({"vendorUserId": "T1/bot/B1"}));

            let user = store.get_user("T1/bot/B1").await.unwrap().unwrap();
            assert_eq!(user.vendor_token.access_token, "xoxb-1");
        }

        #[tokio::test]
        async fn test_callback_without_code_is_400() {
            let app = initiate_router(Arc::new(
                ConnectorService::builder(SlackConnectorConfig {
                    client_id: Some("123.456".to_string()),
                    ..Default::default()
                })
                .build(),
            ));
            let response = app
                .oneshot(get("/callback?error=access_denied"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                json_body(response).await["message"],
                "Slack authorization failed: access_denied"
            );
        }
    }
}
