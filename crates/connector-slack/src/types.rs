//! Slack connector type definitions
//!
//! Connector configuration and the Slack Events API payload shapes the router
//! branches on.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
pub const DEFAULT_ACK_DELAY: Duration = Duration::from_millis(100);

pub const SLACK_SIGNATURE_HEADER: &str = "x-slack-signature";
pub const SLACK_TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Query parameter that marks the connector's own follow-up call.
pub const DISPATCH_QUERY_KEY: &str = "dispatch";

/// Configuration for one connector tenant
#[derive(Clone)]
pub struct SlackConnectorConfig {
    /// Signing secret used to verify Slack webhooks. Events are refused (501) without it.
    pub signing_secret: Option<String>,
    /// OAuth client id of the Slack app
    pub client_id: Option<String>,
    /// OAuth client secret of the Slack app
    pub client_secret: Option<String>,
    /// Bot scopes requested during authorization
    pub scope: Option<String>,
    /// User scopes requested during authorization
    pub user_scope: Option<String>,
    /// Public base URL of this connector; `/event?dispatch` is appended for self-dispatch
    pub base_url: String,
    /// How long the synchronous leg waits after spawning the self-dispatch.
    ///
    /// This only makes it likely that the follow-up call is in flight before the
    /// response is sent. Under load the asynchronous leg can still be lost.
    pub ack_delay: Duration,
    /// Base URL of the Slack Web API
    pub slack_api_base: String,
    /// Base URL of the key-value storage service holding user records
    pub storage_url: Option<String>,
    /// Access token for the storage service
    pub storage_token: Option<String>,
}

impl Default for SlackConnectorConfig {
    fn default() -> Self {
        Self {
            signing_secret: None,
            client_id: None,
            client_secret: None,
            scope: None,
            user_scope: None,
            base_url: "http://127.0.0.1:3000".to_string(),
            ack_delay: DEFAULT_ACK_DELAY,
            slack_api_base: DEFAULT_SLACK_API_BASE.to_string(),
            storage_url: None,
            storage_token: None,
        }
    }
}

impl fmt::Debug for SlackConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackConnectorConfig")
            .field("signing_secret", &self.signing_secret.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .field("user_scope", &self.user_scope)
            .field("base_url", &self.base_url)
            .field("ack_delay", &self.ack_delay)
            .field("slack_api_base", &self.slack_api_base)
            .field("storage_url", &self.storage_url)
            .field("storage_token", &self.storage_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A parsed Slack Events API payload
///
/// Only the variants the connector branches on are typed; everything else is
/// carried through as raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum SlackEvent {
    /// One-shot handshake sent when the Request URL is registered. The
    /// challenge is echoed back exactly as received.
    UrlVerification { challenge: Option<Value> },
    /// Event callback wrapping the actual event
    EventCallback(SlackEventCallback),
    /// Any other payload type (`app_rate_limited`, ...)
    Other(Value),
}

impl SlackEvent {
    pub fn from_value(value: &Value) -> Self {
        match value.get("type").and_then(Value::as_str) {
            Some("url_verification") => SlackEvent::UrlVerification {
                challenge: value.get("challenge").cloned(),
            },
            Some("event_callback") => match serde_json::from_value(value.clone()) {
                Ok(callback) => SlackEvent::EventCallback(callback),
                Err(_) => SlackEvent::Other(value.clone()),
            },
            _ => SlackEvent::Other(value.clone()),
        }
    }

    /// Type of the inner event for callbacks (`message`, `app_mention`, ...)
    pub fn event_type(&self) -> Option<&str> {
        match self {
            SlackEvent::EventCallback(callback) => callback.event.get("type").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Slack `event_callback` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackEventCallback {
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub api_app_id: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub event_time: Option<i64>,
    #[serde(default)]
    pub authorizations: Vec<SlackAuthorization>,
    /// The inner event, kept as raw JSON
    pub event: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Slack authorization info
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackAuthorization {
    #[serde(default)]
    pub enterprise_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub is_enterprise_install: bool,
}

/// Response for Slack URL verification challenge
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UrlVerificationResponse {
    pub challenge: String,
}
