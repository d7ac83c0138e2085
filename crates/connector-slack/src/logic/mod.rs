//! Logic module for the Slack connector
//!
//! Contains:
//! - Signature verification of inbound webhooks
//! - The self-dispatch relay and event router
//! - The notification dispatcher
//! - SlackClient for making HTTP requests to Slack API
//! - User storage, token refresh and the Slack side of OAuth

mod client;
pub mod dispatch;
pub mod event;
pub mod notification;
pub mod oauth;
pub mod signature;
pub mod token;
pub mod user;

pub use client::{
    SlackAuthTestResponse, SlackClient, SlackClientBundle, SlackClientError, SlackClientFactory,
    SlackConversation, SlackPostMessageRequest, SlackPostMessageResponse,
    SlackUpdateMessageRequest,
};
