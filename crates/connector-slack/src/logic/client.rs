//! Slack API Client
//!
//! HTTP client for interacting with Slack's Web API, and the per-request
//! factory that builds clients from stored users.

use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shared::error::CommonError;
use tracing::{error, trace};

use crate::logic::token::TokenSource;
use crate::logic::user::{SlackTokenContext, UserContext, UserStore};
use crate::types::DEFAULT_SLACK_API_BASE;

/// HTTP client for Slack API
#[derive(Clone)]
pub struct SlackClient {
    client: Client,
    token: String,
    api_base: String,
}

impl SlackClient {
    /// Create a new Slack client with the given bot or user token
    pub fn new(token: String) -> Self {
        Self::with_api_base(token, DEFAULT_SLACK_API_BASE)
    }

    pub fn with_api_base(token: String, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            token,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Post a message to a Slack channel
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<SlackPostMessageResponse, SlackClientError> {
        self.post_message_raw(SlackPostMessageRequest {
            channel: channel.to_string(),
            text: Some(text.to_string()),
            blocks: None,
            thread_ts: thread_ts.map(String::from),
            reply_broadcast: None,
            metadata: None,
        })
        .await
    }

    /// Post a message with blocks to a Slack channel
    pub async fn post_message_with_blocks(
        &self,
        channel: &str,
        text: Option<&str>,
        blocks: Vec<Value>,
        thread_ts: Option<&str>,
    ) -> Result<SlackPostMessageResponse, SlackClientError> {
        self.post_message_raw(SlackPostMessageRequest {
            channel: channel.to_string(),
            text: text.map(String::from),
            blocks: Some(blocks),
            thread_ts: thread_ts.map(String::from),
            reply_broadcast: None,
            metadata: None,
        })
        .await
    }

    pub async fn post_message_raw(
        &self,
        request: SlackPostMessageRequest,
    ) -> Result<SlackPostMessageResponse, SlackClientError> {
        trace!(channel = %request.channel, "Posting message to Slack");
        let result: SlackPostMessageResponse = self.call("chat.postMessage", &request).await?;
        trace!(ts = ?result.ts, "Message posted successfully");
        Ok(result)
    }

    /// Update an existing message in Slack
    pub async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
    ) -> Result<SlackPostMessageResponse, SlackClientError> {
        trace!(channel = %channel, ts = %ts, "Updating message in Slack");
        self.call(
            "chat.update",
            &SlackUpdateMessageRequest {
                channel: channel.to_string(),
                ts: ts.to_string(),
                text: Some(text.to_string()),
                blocks: None,
            },
        )
        .await
    }

    /// Delete a message from Slack
    pub async fn delete_message(&self, channel: &str, ts: &str) -> Result<(), SlackClientError> {
        trace!(channel = %channel, ts = %ts, "Deleting message from Slack");
        let _: Value = self
            .call("chat.delete", &json!({ "channel": channel, "ts": ts }))
            .await?;
        Ok(())
    }

    /// Add a reaction to a message. Reacting twice is not an error.
    pub async fn add_reaction(
        &self,
        channel: &str,
        ts: &str,
        emoji: &str,
    ) -> Result<(), SlackClientError> {
        trace!(channel = %channel, ts = %ts, emoji = %emoji, "Adding reaction");
        let result: Result<Value, SlackClientError> = self
            .call(
                "reactions.add",
                &json!({ "channel": channel, "timestamp": ts, "name": emoji }),
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(SlackClientError::Api { error, .. }) if error == "already_reacted" => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// List conversations visible to the token (first page)
    pub async fn list_conversations(&self) -> Result<Vec<SlackConversation>, SlackClientError> {
        let result: SlackConversationsListResponse =
            self.call("conversations.list", &json!({})).await?;
        Ok(result.channels)
    }

    /// Check that the token is usable
    pub async fn auth_test(&self) -> Result<SlackAuthTestResponse, SlackClientError> {
        self.call("auth.test", &json!({})).await
    }

    async fn call<T, R>(&self, method: &str, request: &R) -> Result<T, SlackClientError>
    where
        T: serde::de::DeserializeOwned,
        R: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.api_base, method))
            .bearer_auth(&self.token)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(request)
            .send()
            .await
            .map_err(SlackClientError::Request)?;

        let status = response.status();
        let body = response.text().await.map_err(SlackClientError::Request)?;

        let value: Value = serde_json::from_str(&body).map_err(|e| SlackClientError::Parse {
            body: body.clone(),
            error: e,
        })?;

        if value.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            error!(method = %method, error = %error, status = %status, "Slack API error");
            return Err(SlackClientError::Api {
                error,
                response_metadata: value.get("response_metadata").cloned(),
            });
        }

        serde_json::from_value(value).map_err(|e| SlackClientError::Parse { body, error: e })
    }
}

/// Clients scoped to one stored user: `bot` always, `user` only when the
/// installation granted a user token.
#[derive(Clone)]
pub struct SlackClientBundle {
    pub bot: SlackClient,
    pub user: Option<SlackClient>,
}

impl SlackClientBundle {
    pub fn from_token(token: &SlackTokenContext, api_base: &str) -> Self {
        Self {
            bot: SlackClient::with_api_base(token.access_token.clone(), api_base),
            user: token
                .authed_user
                .as_ref()
                .and_then(|u| u.access_token.clone())
                .map(|t| SlackClient::with_api_base(t, api_base)),
        }
    }
}

/// Looks up stored users and builds fresh clients for them. Nothing is cached
/// between requests.
#[derive(Clone)]
pub struct SlackClientFactory {
    store: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenSource>,
    api_base: String,
}

impl SlackClientFactory {
    pub fn new(store: Arc<dyn UserStore>, tokens: Arc<dyn TokenSource>, api_base: &str) -> Self {
        Self {
            store,
            tokens,
            api_base: api_base.to_string(),
        }
    }

    pub async fn get_user(&self, vendor_user_id: &str) -> Result<Option<UserContext>, CommonError> {
        self.store.get_user(vendor_user_id).await
    }

    pub async fn get_foreign_user(
        &self,
        foreign_system: &str,
        foreign_user_id: &str,
    ) -> Result<Option<UserContext>, CommonError> {
        self.store
            .get_foreign_user(foreign_system, foreign_user_id)
            .await
    }

    /// Builds a client bundle from the user's current token, refreshing it first if needed.
    pub async fn create_slack_client(
        &self,
        user: &UserContext,
    ) -> Result<SlackClientBundle, CommonError> {
        let token = self.tokens.ensure_fresh_token(user).await?;
        Ok(SlackClientBundle::from_token(&token, &self.api_base))
    }
}

/// Errors that can occur when interacting with Slack API
#[derive(Debug, thiserror::Error)]
pub enum SlackClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse response: {error}, body: {body}")]
    Parse {
        body: String,
        #[source]
        error: serde_json::Error,
    },

    #[error("Slack API error: {error}")]
    Api {
        error: String,
        response_metadata: Option<Value>,
    },
}

impl From<SlackClientError> for CommonError {
    fn from(e: SlackClientError) -> Self {
        CommonError::InvalidResponse {
            msg: e.to_string(),
            source: Some(e.into()),
        }
    }
}

/// Request to send a message to Slack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackPostMessageRequest {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Block Kit blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Value>>,
    /// Thread timestamp to reply in thread
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    /// Whether to also post to channel when replying in thread
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_broadcast: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Response from Slack's chat.postMessage and chat.update APIs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackPostMessageResponse {
    pub ok: bool,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub message: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackUpdateMessageRequest {
    pub channel: String,
    pub ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConversation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_channel: bool,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackConversationsListResponse {
    #[serde(default)]
    channels: Vec<SlackConversation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackAuthTestResponse {
    pub ok: bool,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
}
