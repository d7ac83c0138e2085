//! Notification dispatcher
//!
//! Resolves a target user, builds Slack clients from their token and lets the
//! application hook send the notification.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use shared::error::CommonError;
use tracing::{info, warn};

use crate::hooks::{HookResponse, NotificationContext, SlackConnectorHooks};
use crate::logic::SlackClientFactory;

/// Who a notification is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    /// A stored Slack user id (`vendorUserId`)
    Native(String),
    /// A user known by their id in another system
    Foreign { system: String, user_id: String },
}

impl fmt::Display for NotificationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationTarget::Native(id) => write!(f, "{id}"),
            NotificationTarget::Foreign { system, user_id } => write!(f, "{system}/{user_id}"),
        }
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    hooks: Arc<dyn SlackConnectorHooks>,
    clients: SlackClientFactory,
}

impl NotificationDispatcher {
    pub fn new(hooks: Arc<dyn SlackConnectorHooks>, clients: SlackClientFactory) -> Self {
        Self { hooks, clients }
    }

    pub async fn send(
        &self,
        target: NotificationTarget,
        payload: Value,
    ) -> Result<HookResponse, CommonError> {
        let user = match &target {
            NotificationTarget::Native(id) => self.clients.get_user(id).await?,
            NotificationTarget::Foreign { system, user_id } => {
                self.clients.get_foreign_user(system, user_id).await?
            }
        };
        let Some(user) = user else {
            warn!(target = %target, "Notification target not found");
            return Err(CommonError::NotFound {
                msg: "Not found".to_string(),
                lookup_id: target.to_string(),
                source: None,
            });
        };

        let slack = self
            .clients
            .create_slack_client(&user)
            .await
            .map_err(|e| send_error(e.into()))?;

        info!(vendor_user_id = %user.vendor_user_id, "Sending Slack notification");
        let ctx = NotificationContext {
            target,
            payload,
            clients: self.clients.clone(),
        };
        self.hooks
            .send_notification(&ctx, &user, &slack)
            .await
            .map(Option::unwrap_or_default)
            .map_err(send_error)
    }
}

fn send_error(e: anyhow::Error) -> CommonError {
    CommonError::Unknown(anyhow::anyhow!("Error sending notification to Slack: {e}"))
}
