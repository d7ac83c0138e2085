//! Slack side of the OAuth v2 flow
//!
//! Builds the authorization redirect, exchanges codes and refresh tokens at
//! `oauth.v2.access`, and derives the stored user id from a token response.

use reqwest::Client;
use serde_json::Value;
use shared::error::CommonError;
use tracing::{debug, error, info};
use url::Url;

use crate::logic::user::{SlackTokenContext, SlackUserProfile, UserContext, UserStore};
use crate::types::SlackConnectorConfig;

pub const SLACK_AUTHORIZE_URL: &str = "https://slack.com/oauth/v2/authorize";

#[derive(Clone)]
pub struct SlackOAuth {
    client: Client,
    client_id: String,
    client_secret: Option<String>,
    scope: Option<String>,
    user_scope: Option<String>,
    api_base: String,
}

impl SlackOAuth {
    /// `None` when the config has no client id.
    pub fn from_config(config: &SlackConnectorConfig) -> Option<Self> {
        let client_id = config.client_id.clone()?;
        Some(Self {
            client: Client::new(),
            client_id,
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
            user_scope: config.user_scope.clone(),
            api_base: config.slack_api_base.trim_end_matches('/').to_string(),
        })
    }

    /// URL the user is redirected to in order to install the app.
    pub fn authorization_url(&self, state: &str, redirect_uri: &str) -> Result<Url, CommonError> {
        let mut url = Url::parse(SLACK_AUTHORIZE_URL)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.client_id);
            if let Some(scope) = &self.scope {
                query.append_pair("scope", scope);
            }
            if let Some(user_scope) = &self.user_scope {
                query.append_pair("user_scope", user_scope);
            }
            query.append_pair("state", state);
            query.append_pair("redirect_uri", redirect_uri);
        }
        Ok(url)
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<SlackTokenContext, CommonError> {
        let mut form = vec![("code", code)];
        if let Some(redirect_uri) = redirect_uri {
            form.push(("redirect_uri", redirect_uri));
        }
        self.access(&form).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<SlackTokenContext, CommonError> {
        self.access(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn access(&self, params: &[(&str, &str)]) -> Result<SlackTokenContext, CommonError> {
        let mut form: Vec<(&str, &str)> = vec![("client_id", self.client_id.as_str())];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        form.extend_from_slice(params);

        let value: Value = self
            .client
            .post(format!("{}/oauth.v2.access", self.api_base))
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        if value.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            error!(error = %reason, "oauth.v2.access failed");
            return Err(CommonError::InvalidResponse {
                msg: format!("Slack OAuth error: {reason}"),
                source: None,
            });
        }

        debug!("oauth.v2.access succeeded");
        serde_json::from_value(value).map_err(|e| CommonError::InvalidResponse {
            msg: format!("Unexpected oauth.v2.access response: {e}"),
            source: Some(e.into()),
        })
    }
}

/// Exchanges `code` and stores the resulting user. Foreign identities already
/// linked to the same Slack principal are kept.
pub async fn complete_authorization(
    oauth: &SlackOAuth,
    store: &dyn UserStore,
    code: &str,
    redirect_uri: Option<&str>,
) -> Result<UserContext, CommonError> {
    let mut token = oauth.exchange_code(code, redirect_uri).await?;
    token.stamp_expiry(chrono::Utc::now().timestamp());
    let profile = user_profile(&token)?;

    let foreign_oauth_identities = store
        .get_user(&profile.id)
        .await?
        .map(|existing| existing.foreign_oauth_identities)
        .unwrap_or_default();

    let user = UserContext {
        vendor_user_id: profile.id.clone(),
        vendor_token: token,
        vendor_user_profile: profile,
        foreign_oauth_identities,
    };
    store.save_user(&user).await?;
    info!(vendor_user_id = %user.vendor_user_id, "Stored Slack user after authorization");
    Ok(user)
}

/// Stable id for a Slack principal: `{team}/{bot|user}/{id}`, segments URL-encoded
pub fn unique_slack_user_id(team_id: &str, id: &str, is_bot: bool) -> String {
    format!(
        "{}/{}/{}",
        urlencoding::encode(team_id),
        if is_bot { "bot" } else { "user" },
        urlencoding::encode(id)
    )
}

/// Profile of the principal behind a token response. The installing user wins
/// over the bot when present.
pub fn user_profile(token: &SlackTokenContext) -> Result<SlackUserProfile, CommonError> {
    let team_id = token.team_id().ok_or_else(|| CommonError::InvalidResponse {
        msg: "Slack token response has no team".to_string(),
        source: None,
    })?;

    let (principal, is_bot) = match (&token.authed_user, &token.bot_user_id) {
        (Some(user), _) if !user.id.is_empty() => (user.id.as_str(), false),
        (_, Some(bot)) => (bot.as_str(), true),
        _ => {
            return Err(CommonError::InvalidResponse {
                msg: "Slack token response has neither an authed user nor a bot user".to_string(),
                source: None,
            });
        }
    };

    Ok(SlackUserProfile {
        id: unique_slack_user_id(team_id, principal, is_bot),
        bot_id: token.bot_user_id.clone(),
        user_id: (!is_bot).then(|| principal.to_string()),
        app_id: token.app_id.clone(),
        team_id: Some(team_id.to_string()),
    })
}
