//! Stored users and their Slack tokens
//!
//! User records belong to an external key-value storage service. The connector
//! reads them to build Slack clients and writes them after an OAuth callback or
//! a token refresh.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::error::CommonError;
use tracing::trace;

/// A stored Slack user: token, profile and links to identities in other systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub vendor_user_id: String,
    pub vendor_token: SlackTokenContext,
    pub vendor_user_profile: SlackUserProfile,
    /// Keyed by foreign system id
    #[serde(default)]
    pub foreign_oauth_identities: HashMap<String, ForeignOAuthIdentity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignOAuthIdentity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_base_url: Option<String>,
}

/// Result of Slack's `oauth.v2.access`, stored as the user's token
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlackTokenContext {
    /// Bot token (`xoxb-`)
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<SlackTeam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authed_user: Option<SlackAuthedUser>,
    /// Present when token rotation is enabled for the app
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Unix seconds, stamped by the connector from `expires_in`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlackTokenContext {
    #[cfg(test)]
    pub(crate) fn bot(access_token: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            ..Default::default()
        }
    }

    /// Sets `expires_at` from `expires_in`, relative to `now`.
    pub fn stamp_expiry(&mut self, now: i64) {
        if let Some(expires_in) = self.expires_in {
            self.expires_at = Some(now + expires_in);
        }
    }

    pub fn team_id(&self) -> Option<&str> {
        self.team.as_ref().map(|t| t.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlackTeam {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The installing user, with a user token (`xoxp-`) when user scopes were granted
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlackAuthedUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlackUserProfile {
    /// Unique id used as `vendorUserId`
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, vendor_user_id: &str) -> Result<Option<UserContext>, CommonError>;

    /// Resolves a user through an identity in another system.
    async fn get_foreign_user(
        &self,
        foreign_system: &str,
        foreign_user_id: &str,
    ) -> Result<Option<UserContext>, CommonError>;

    async fn save_user(&self, user: &UserContext) -> Result<(), CommonError>;
}

fn user_key(vendor_user_id: &str) -> String {
    format!("vendor-user/{}", urlencoding::encode(vendor_user_id))
}

fn foreign_user_key(foreign_system: &str, foreign_user_id: &str) -> String {
    format!(
        "foreign-user/{}/{}",
        urlencoding::encode(foreign_system),
        urlencoding::encode(foreign_user_id)
    )
}

#[derive(Debug, Serialize, Deserialize)]
struct StorageItem<T> {
    data: T,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForeignUserPointer {
    vendor_user_id: String,
}

/// [`UserStore`] backed by the storage service's HTTP API
pub struct HttpUserStore {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpUserStore {
    pub fn new(base_url: &str, access_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn request(&self, method: reqwest::Method, key: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{}", self.base_url, key));
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_item<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, CommonError> {
        trace!(key = %key, "Reading storage item");
        let response = self.request(reqwest::Method::GET, key).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let item: StorageItem<T> = response.json().await?;
        Ok(Some(item.data))
    }

    async fn put_item<T: Serialize>(&self, key: &str, data: &T) -> Result<(), CommonError> {
        trace!(key = %key, "Writing storage item");
        self.request(reqwest::Method::PUT, key)
            .json(&StorageItem { data })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for HttpUserStore {
    async fn get_user(&self, vendor_user_id: &str) -> Result<Option<UserContext>, CommonError> {
        self.get_item(&user_key(vendor_user_id)).await
    }

    async fn get_foreign_user(
        &self,
        foreign_system: &str,
        foreign_user_id: &str,
    ) -> Result<Option<UserContext>, CommonError> {
        let pointer: Option<ForeignUserPointer> = self
            .get_item(&foreign_user_key(foreign_system, foreign_user_id))
            .await?;
        match pointer {
            Some(pointer) => self.get_user(&pointer.vendor_user_id).await,
            None => Ok(None),
        }
    }

    async fn save_user(&self, user: &UserContext) -> Result<(), CommonError> {
        self.put_item(&user_key(&user.vendor_user_id), user).await?;
        for (system, identity) in &user.foreign_oauth_identities {
            self.put_item(
                &foreign_user_key(system, &identity.user_id),
                &ForeignUserPointer {
                    vendor_user_id: user.vendor_user_id.clone(),
                },
            )
            .await?;
        }
        Ok(())
    }
}

/// Process-local [`UserStore`], for local runs and tests
#[derive(Default)]
pub struct InMemoryUserStore {
    users: DashMap<String, UserContext>,
    foreign_users: DashMap<(String, String), String>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user(&self, vendor_user_id: &str) -> Result<Option<UserContext>, CommonError> {
        Ok(self.users.get(vendor_user_id).map(|u| u.value().clone()))
    }

    async fn get_foreign_user(
        &self,
        foreign_system: &str,
        foreign_user_id: &str,
    ) -> Result<Option<UserContext>, CommonError> {
        let vendor_user_id = self
            .foreign_users
            .get(&(foreign_system.to_string(), foreign_user_id.to_string()))
            .map(|id| id.value().clone());
        match vendor_user_id {
            Some(id) => self.get_user(&id).await,
            None => Ok(None),
        }
    }

    async fn save_user(&self, user: &UserContext) -> Result<(), CommonError> {
        for (system, identity) in &user.foreign_oauth_identities {
            self.foreign_users.insert(
                (system.clone(), identity.user_id.clone()),
                user.vendor_user_id.clone(),
            );
        }
        self.users.insert(user.vendor_user_id.clone(), user.clone());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use axum::{
            Json, Router,
            extract::{Path, State},
            routing::get,
        };
        use serde_json::json;
        use std::sync::Arc;

        type Items = Arc<DashMap<String, Value>>;

        async fn fake_storage() -> (String, Items) {
            async fn get_item(
                State(items): State<Items>,
                Path(key): Path<String>,
            ) -> Result<Json<Value>, StatusCode> {
                items
                    .get(&key)
                    .map(|v| Json(v.value().clone()))
                    .ok_or(StatusCode::NOT_FOUND)
            }

            async fn put_item(
                State(items): State<Items>,
                Path(key): Path<String>,
                Json(body): Json<Value>,
            ) -> StatusCode {
                items.insert(key, body);
                StatusCode::OK
            }

            let items: Items = Arc::new(DashMap::new());
            let app = Router::new()
                .route("/{*key}", get(get_item).put(put_item))
                .with_state(items.clone());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
            (format!("http://{addr}"), items)
        }

        fn linked_user() -> UserContext {
            let mut user = fixtures::user("T1/user/U1", "xoxb-1");
            user.foreign_oauth_identities.insert(
                "contoso".to_string(),
                ForeignOAuthIdentity {
                    user_id: "c-42".to_string(),
                    connector_base_url: None,
                },
            );
            user
        }

        #[test]
        fn test_user_context_uses_camel_case() {
            let json = serde_json::to_value(linked_user()).unwrap();
            assert_eq!(json["vendorUserId"], "T1/user/U1");
            assert_eq!(json["vendorToken"]["access_token"], "xoxb-1");
            assert_eq!(json["foreignOAuthIdentities"]["contoso"]["userId"], "c-42");
        }

        #[test]
        fn test_stamp_expiry() {
            let mut token = SlackTokenContext::bot("xoxb-1");
            token.stamp_expiry(1_000);
            assert_eq!(token.expires_at, None);

            token.expires_in = Some(43_200);
            token.stamp_expiry(1_000);
            assert_eq!(token.expires_at, Some(44_200));
        }

        #[tokio::test]
        async fn test_in_memory_store_resolves_foreign_identity() {
            let store = InMemoryUserStore::new();
            store.save_user(&linked_user()).await.unwrap();

            let found = store.get_foreign_user("contoso", "c-42").await.unwrap();
            assert_eq!(found.map(|u| u.vendor_user_id).as_deref(), Some("T1/user/U1"));
            assert!(store.get_foreign_user("contoso", "nope").await.unwrap().is_none());
            assert!(store.get_user("unknown").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_http_store_round_trip_through_storage_service() {
            let (base, items) = fake_storage().await;
            let store = HttpUserStore::new(&base, Some("storage-token".to_string()));

            store.save_user(&linked_user()).await.unwrap();

            assert_eq!(
                items.get("foreign-user/contoso/c-42").map(|v| v.value().clone()),
                Some(json!({"data": {"vendorUserId": "T1/user/U1"}}))
            );

            let user = store.get_user("T1/user/U1").await.unwrap().unwrap();
            assert_eq!(user, linked_user());

            let foreign = store.get_foreign_user("contoso", "c-42").await.unwrap();
            assert_eq!(foreign, Some(linked_user()));
        }

        #[tokio::test]
        async fn test_http_store_missing_user_is_none() {
            let (base, _) = fake_storage().await;
            let store = HttpUserStore::new(&base, None);
            assert!(store.get_user("u1").await.unwrap().is_none());
            assert!(store.get_foreign_user("contoso", "u1").await.unwrap().is_none());
        }
    }
}
