//! Service layer for the Slack connector
//! Wires configuration, storage, hooks and the self-dispatch transport together

use std::sync::Arc;

use shared::error::CommonError;
use tracing::info;

use crate::hooks::{DefaultHooks, SlackConnectorHooks};
use crate::logic::SlackClientFactory;
use crate::logic::dispatch::{EventDispatcher, HttpEventDispatcher, SelfDispatchRelay};
use crate::logic::event::EventRouter;
use crate::logic::notification::NotificationDispatcher;
use crate::logic::oauth::SlackOAuth;
use crate::logic::signature::SignatureVerifier;
use crate::logic::token::{SlackTokenSource, TokenSource};
use crate::logic::user::{HttpUserStore, InMemoryUserStore, UserStore};
use crate::types::SlackConnectorConfig;

/// Main service struct for the connector, shared by every route
#[derive(Clone)]
pub struct ConnectorService {
    pub config: SlackConnectorConfig,
    pub events: EventRouter,
    pub notifications: NotificationDispatcher,
    pub store: Arc<dyn UserStore>,
    oauth: Option<SlackOAuth>,
}

impl ConnectorService {
    pub fn builder(config: SlackConnectorConfig) -> ConnectorServiceBuilder {
        ConnectorServiceBuilder::new(config)
    }

    /// OAuth settings, or 501 when the app has no client id configured
    pub fn oauth(&self) -> Result<&SlackOAuth, CommonError> {
        self.oauth.as_ref().ok_or_else(|| CommonError::NotImplemented {
            msg: "Slack OAuth client id is not configured".to_string(),
        })
    }
}

/// Builds a [`ConnectorService`]. Anything not provided falls back to the
/// configuration-driven default.
pub struct ConnectorServiceBuilder {
    config: SlackConnectorConfig,
    hooks: Option<Arc<dyn SlackConnectorHooks>>,
    store: Option<Arc<dyn UserStore>>,
    dispatcher: Option<Arc<dyn EventDispatcher>>,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl ConnectorServiceBuilder {
    pub fn new(config: SlackConnectorConfig) -> Self {
        Self {
            config,
            hooks: None,
            store: None,
            dispatcher: None,
            tokens: None,
        }
    }

    pub fn hooks(mut self, hooks: Arc<dyn SlackConnectorHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn store(mut self, store: Arc<dyn UserStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the HTTP self-dispatch transport
    pub fn dispatcher(mut self, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn build(self) -> ConnectorService {
        let config = self.config;
        let oauth = SlackOAuth::from_config(&config);

        let store: Arc<dyn UserStore> = match (self.store, &config.storage_url) {
            (Some(store), _) => store,
            (None, Some(url)) => {
                info!(storage_url = %url, "Using HTTP user storage");
                Arc::new(HttpUserStore::new(url, config.storage_token.clone()))
            }
            (None, None) => {
                info!("No storage URL configured, keeping users in memory");
                Arc::new(InMemoryUserStore::new())
            }
        };

        let tokens: Arc<dyn TokenSource> = match self.tokens {
            Some(tokens) => tokens,
            None => Arc::new(SlackTokenSource::new(oauth.clone(), store.clone())),
        };

        let dispatcher: Arc<dyn EventDispatcher> = match self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => {
                let dispatcher = HttpEventDispatcher::new(&config.base_url);
                info!(url = %dispatcher.url(), "Self-dispatching events over HTTP");
                Arc::new(dispatcher)
            }
        };

        let hooks: Arc<dyn SlackConnectorHooks> = match self.hooks {
            Some(hooks) => hooks,
            None => Arc::new(DefaultHooks),
        };
        let clients = SlackClientFactory::new(store.clone(), tokens, &config.slack_api_base);

        let events = EventRouter::new(
            config.signing_secret.as_deref().map(SignatureVerifier::new),
            SelfDispatchRelay::new(dispatcher, config.ack_delay),
            hooks.clone(),
            clients.clone(),
        );
        let notifications = NotificationDispatcher::new(hooks, clients);

        ConnectorService {
            config,
            events,
            notifications,
            store,
            oauth,
        }
    }
}
