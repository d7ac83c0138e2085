use std::sync::Arc;

use async_trait::async_trait;
use shared::error::CommonError;
use tracing::{info, warn};

use crate::logic::oauth::SlackOAuth;
use crate::logic::user::{SlackTokenContext, UserContext, UserStore};

/// Tokens expiring within this many seconds are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Supplies a usable token for a stored user.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn ensure_fresh_token(
        &self,
        user: &UserContext,
    ) -> Result<SlackTokenContext, CommonError>;
}

pub fn needs_refresh(token: &SlackTokenContext, now: i64) -> bool {
    match (token.expires_at, &token.refresh_token) {
        (Some(expires_at), Some(_)) => expires_at - now <= REFRESH_MARGIN_SECS,
        _ => false,
    }
}

/// Refreshes rotating Slack tokens through `oauth.v2.access` and persists them.
pub struct SlackTokenSource {
    oauth: Option<SlackOAuth>,
    store: Arc<dyn UserStore>,
}

impl SlackTokenSource {
    pub fn new(oauth: Option<SlackOAuth>, store: Arc<dyn UserStore>) -> Self {
        Self { oauth, store }
    }
}

#[async_trait]
impl TokenSource for SlackTokenSource {
    async fn ensure_fresh_token(
        &self,
        user: &UserContext,
    ) -> Result<SlackTokenContext, CommonError> {
        let now = chrono::Utc::now().timestamp();
        let current = &user.vendor_token;
        if !needs_refresh(current, now) {
            return Ok(current.clone());
        }

        let (Some(oauth), Some(refresh_token)) = (&self.oauth, &current.refresh_token) else {
            warn!(
                vendor_user_id = %user.vendor_user_id,
                "Token is expiring but OAuth is not configured; using it as is"
            );
            return Ok(current.clone());
        };

        info!(vendor_user_id = %user.vendor_user_id, "Refreshing Slack token");
        let mut refreshed = oauth.refresh_token(refresh_token).await?;
        refreshed.stamp_expiry(now);
        if refreshed.authed_user.is_none() {
            refreshed.authed_user = current.authed_user.clone();
        }
        if refreshed.team.is_none() {
            refreshed.team = current.team.clone();
        }

        let mut updated = user.clone();
        updated.vendor_token = refreshed.clone();
        self.store.save_user(&updated).await?;
        Ok(refreshed)
    }
}
