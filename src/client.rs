//! Wiring of the client components around one injected session store.

use std::sync::Arc;

use crate::chat::ChatClient;
use crate::config::ClientConfig;
use crate::connectivity::ApiClient;
use crate::error::AppResult;
use crate::identity::{self, AuthGateway, FileTokenStore, GuardDecision, SessionStore, SharedTokenStore};
use crate::notifications::NotificationCenter;

#[derive(Clone)]
pub struct ContestClient {
    pub config: ClientConfig,
    pub sessions: SessionStore,
    pub auth: AuthGateway,
    pub notifications: NotificationCenter,
    pub chat: ChatClient,
}

impl ContestClient {
    /// Build with the file-backed token store from `config.token_path`.
    pub fn new(config: ClientConfig) -> AppResult<Self> {
        let tokens: SharedTokenStore = Arc::new(FileTokenStore::new(&config.token_path));
        Self::with_token_store(config, tokens)
    }

    pub fn with_token_store(config: ClientConfig, tokens: SharedTokenStore) -> AppResult<Self> {
        let sessions = SessionStore::new(tokens.clone());
        let api = ApiClient::new(&config, tokens)?;
        let auth = AuthGateway::new(api.clone(), sessions.clone(), config.endpoints.clone());
        let notifications = NotificationCenter::new(api.clone(), sessions.clone(), config.endpoints.clone());
        let chat = ChatClient::new(api, &config.endpoints);
        Ok(Self { config, sessions, auth, notifications, chat })
    }

    /// Guard decision for `path` against the current session.
    pub fn guard<S: AsRef<str>>(&self, path: &str, required_roles: &[S]) -> GuardDecision {
        identity::evaluate(
            &self.sessions.get_session(),
            self.sessions.is_initialized(),
            path,
            required_roles,
            &self.config.routes,
        )
    }
}
