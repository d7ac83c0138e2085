//! Event router
//!
//! Decides what happens to a Slack webhook: refused, answered with the
//! verification challenge, relayed to self, or handed to the application.

use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;
use serde_json::{Value, json};
use shared::error::CommonError;
use tracing::{debug, info, warn};

use crate::hooks::{EventContext, HookResponse, SlackConnectorHooks};
use crate::logic::SlackClientFactory;
use crate::logic::dispatch::{DispatchRequest, SelfDispatchRelay};
use crate::logic::signature::{SignatureError, SignatureVerifier, SignedBody};
use crate::types::{SLACK_SIGNATURE_HEADER, SLACK_TIMESTAMP_HEADER, SlackEvent};

/// An inbound `/event` request
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Set when the dispatch marker is on the query string
    pub dispatched: bool,
}

#[derive(Clone)]
pub struct EventRouter {
    verifier: Option<SignatureVerifier>,
    relay: SelfDispatchRelay,
    hooks: Arc<dyn SlackConnectorHooks>,
    clients: SlackClientFactory,
}

impl EventRouter {
    pub fn new(
        verifier: Option<SignatureVerifier>,
        relay: SelfDispatchRelay,
        hooks: Arc<dyn SlackConnectorHooks>,
        clients: SlackClientFactory,
    ) -> Self {
        Self {
            verifier,
            relay,
            hooks,
            clients,
        }
    }

    pub async fn route(&self, envelope: WebhookEnvelope) -> Result<HookResponse, CommonError> {
        let Some(verifier) = &self.verifier else {
            warn!("Received Slack event but no signing secret is configured");
            return Err(CommonError::NotImplemented {
                msg: "Slack signing secret is not configured".to_string(),
            });
        };

        if let Err(e) = verify(verifier, &envelope) {
            warn!(error = %e, dispatched = envelope.dispatched, "Rejected Slack event");
            return Err(CommonError::Authorization {
                msg: "Not authorized".to_string(),
                source: Some(e.into()),
            });
        }

        let payload: Value =
            serde_json::from_slice(&envelope.body).map_err(|e| CommonError::InvalidRequest {
                msg: "Slack event body is not valid JSON".to_string(),
                source: Some(e.into()),
            })?;
        let event = SlackEvent::from_value(&payload);

        if let SlackEvent::UrlVerification { challenge } = &event {
            info!("Answering Slack url_verification");
            let body = match challenge {
                Some(challenge) => json!({ "challenge": challenge }),
                None => json!({}),
            };
            return Ok(HookResponse::json(200, body));
        }

        let ctx = EventContext {
            headers: envelope.headers.clone(),
            payload,
            dispatched: envelope.dispatched,
            clients: self.clients.clone(),
        };

        if envelope.dispatched {
            debug!(event_type = ?event.event_type(), "Processing self-dispatched Slack event");
            let result = self.hooks.on_event(&ctx, &event).await;
            return result
                .map(Option::unwrap_or_default)
                .map_err(event_error);
        }

        let request = DispatchRequest {
            headers: envelope.headers,
            body: envelope.body,
        };
        self.relay
            .acknowledge(request, self.hooks.event_response(&ctx, &event))
            .await
            .map(Option::unwrap_or_default)
            .map_err(event_error)
    }
}

fn verify(verifier: &SignatureVerifier, envelope: &WebhookEnvelope) -> Result<(), SignatureError> {
    let timestamp = header_str(&envelope.headers, SLACK_TIMESTAMP_HEADER)?;
    let signature = header_str(&envelope.headers, SLACK_SIGNATURE_HEADER)?;
    verifier.verify(timestamp, signature, SignedBody::Raw(&envelope.body))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}

fn event_error(e: anyhow::Error) -> CommonError {
    CommonError::Unknown(anyhow::anyhow!("Error processing Slack event: {e}"))
}
