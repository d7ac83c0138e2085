//! Slack Connector
//!
//! Bridges a tenant's function endpoint with Slack:
//! - Slack Events API webhooks, signature-verified and acknowledged within
//!   Slack's 3 second window (`router::event`)
//! - Outbound notifications to stored Slack users (`router::notification`)
//! - The Slack-specific half of the OAuth flow (`router::oauth`)
//!
//! ## Event acknowledgment
//!
//! A fresh delivery from Slack is re-posted to `{base_url}/event?dispatch` on a
//! detached task, and Slack gets its acknowledgment after a short delay. The
//! re-posted request carries the same headers and raw body, passes the same
//! signature check, and runs [`SlackConnectorHooks::on_event`] without Slack's
//! deadline.
//!
//! Application logic plugs in through [`SlackConnectorHooks`].

pub mod hooks;
pub mod logic;
pub mod router;
mod service;
mod types;

pub use hooks::{DefaultHooks, EventContext, HookResponse, NotificationContext, SlackConnectorHooks};
pub use logic::{SlackClient, SlackClientBundle, SlackClientFactory};
pub use service::{ConnectorService, ConnectorServiceBuilder};
pub use types::{
    DEFAULT_ACK_DELAY, DEFAULT_SLACK_API_BASE, DISPATCH_QUERY_KEY, SLACK_SIGNATURE_HEADER,
    SLACK_TIMESTAMP_HEADER, SlackAuthorization, SlackConnectorConfig, SlackEvent,
    SlackEventCallback,
};
