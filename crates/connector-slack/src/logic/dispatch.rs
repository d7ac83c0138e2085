//! Self-dispatch relay
//!
//! Slack expects an acknowledgment within 3 seconds. The relay re-posts the
//! verified request to the connector's own `/event?dispatch` endpoint on a
//! detached task, then answers Slack after a short delay. The follow-up call
//! runs the application hook without Slack's deadline.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, header};
use reqwest::Client;
use tracing::{debug, error, info};

use crate::types::DISPATCH_QUERY_KEY;

/// The verified request to re-post: original headers and raw body
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Fire-and-forget delivery of a [`DispatchRequest`]. Outcomes are only logged.
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, request: DispatchRequest);
}

/// Left to the HTTP client on the follow-up call
const CONNECTION_HEADERS: [HeaderName; 4] = [
    header::HOST,
    header::CONTENT_LENGTH,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
];

pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !CONNECTION_HEADERS.contains(*name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

pub fn event_dispatch_url(base_url: &str) -> String {
    format!("{}/event?{DISPATCH_QUERY_KEY}", base_url.trim_end_matches('/'))
}

/// Re-posts events to the connector over HTTP
#[derive(Clone)]
pub struct HttpEventDispatcher {
    client: Client,
    url: String,
}

impl HttpEventDispatcher {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            url: event_dispatch_url(base_url),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl EventDispatcher for HttpEventDispatcher {
    fn dispatch(&self, request: DispatchRequest) {
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            let result = client
                .post(&url)
                .headers(forwardable_headers(&request.headers))
                .body(request.body)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    debug!(status = %response.status(), "Self-dispatched event handled");
                }
                Ok(response) => {
                    error!(status = %response.status(), url = %url, "Self-dispatched event failed");
                }
                Err(e) => {
                    error!(error = %e, url = %url, "Failed to self-dispatch event");
                }
            }
        });
    }
}

/// Starts the follow-up call and holds the acknowledgment for `ack_delay`
#[derive(Clone)]
pub struct SelfDispatchRelay {
    dispatcher: Arc<dyn EventDispatcher>,
    ack_delay: Duration,
}

impl SelfDispatchRelay {
    pub fn new(dispatcher: Arc<dyn EventDispatcher>, ack_delay: Duration) -> Self {
        Self {
            dispatcher,
            ack_delay,
        }
    }

    /// Dispatches `request`, then runs `respond` and waits out the delay before
    /// handing back its result.
    pub async fn acknowledge<F, T>(&self, request: DispatchRequest, respond: F) -> T
    where
        F: Future<Output = T>,
    {
        info!(bytes = request.body.len(), "Relaying event to self");
        self.dispatcher.dispatch(request);
        let response = respond.await;
        tokio::time::sleep(self.ack_delay).await;
        response
    }
}
