use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use crate::tprintln;

use crate::config::Endpoints;
use crate::connectivity::ApiClient;
use crate::error::{AppError, AppResult};

use super::principal::{Identity, RawIdentity};
use super::session::{Session, SessionStore};

pub const MSG_INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const MSG_INVALID_INPUT: &str = "Invalid login data";
pub const MSG_SERVER_ERROR: &str = "Server error";
pub const MSG_CONNECTION_ERROR: &str = "Connection error";
pub const MSG_REJECTED_DEFAULT: &str = "Invalid credentials";

#[derive(Debug, Deserialize)]
struct IdentityEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    user: Option<RawIdentity>,
}

#[derive(Debug, Default, Deserialize)]
struct LoginEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<RawIdentity>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: &str, password: &str) -> Self {
        Self { email: email.trim().to_string(), password: password.to_string() }
    }
}

/// Translate a failed login call into the message shown next to the form.
/// Only replies from the backend are classified by status.
pub fn login_failure(err: &AppError) -> AppError {
    if !err.is_remote() {
        return AppError::io("connection_error", MSG_CONNECTION_ERROR);
    }
    match err.http_status() {
        401 => AppError::auth("invalid_credentials", MSG_INVALID_CREDENTIALS),
        422 => AppError::user("invalid_input", MSG_INVALID_INPUT),
        500 => AppError::internal("server_error", MSG_SERVER_ERROR),
        _ => AppError::io("connection_error", MSG_CONNECTION_ERROR),
    }
}

/// Result of one identity fetch, before it is applied to the session.
enum Probe {
    Confirmed(Identity),
    Unauthorized,
    Malformed,
    Unreachable(AppError),
}

/// The only component that talks to the auth endpoints and mutates the session.
#[derive(Clone)]
pub struct AuthGateway {
    api: ApiClient,
    sessions: SessionStore,
    endpoints: Endpoints,
}

impl AuthGateway {
    pub fn new(api: ApiClient, sessions: SessionStore, endpoints: Endpoints) -> Self {
        Self { api, sessions, endpoints }
    }

    pub fn sessions(&self) -> &SessionStore { &self.sessions }

    pub fn api(&self) -> &ApiClient { &self.api }

    async fn probe(&self, token: String) -> Probe {
        match self.api.get_json(&self.endpoints.identity).await {
            Ok(val) => match serde_json::from_value::<IdentityEnvelope>(val) {
                Ok(IdentityEnvelope { success: Some(true), user: Some(raw) }) => Probe::Confirmed(Identity::from_raw(raw, token)),
                Ok(_) => {
                    warn!(target: "auth", "identity response missing success/user");
                    Probe::Malformed
                }
                Err(e) => {
                    warn!(target: "auth", "identity response malformed: {}", e);
                    Probe::Malformed
                }
            },
            Err(e) if e.is_unauthorized() => {
                info!(target: "auth", "stored token rejected by backend");
                Probe::Unauthorized
            }
            Err(e) if matches!(e, AppError::Malformed { .. }) => Probe::Malformed,
            Err(e) => Probe::Unreachable(e),
        }
    }

    /// Establish the session from the stored token. Skips the network when there is none.
    pub async fn check_auth(&self) -> Session {
        let ticket = self.sessions.begin();
        let Some(token) = self.sessions.token() else {
            self.sessions.commit(ticket, Session::Anonymous);
            self.sessions.mark_initialized();
            return self.sessions.get_session();
        };
        self.sessions.mark_loading(ticket);
        match self.probe(token).await {
            Probe::Confirmed(identity) => {
                info!(target: "auth", "authenticated user id={} roles={:?}", identity.id, identity.roles);
                self.sessions.commit(ticket, Session::Authenticated(identity));
            }
            Probe::Unauthorized | Probe::Malformed => {
                self.sessions.commit(ticket, Session::Anonymous);
            }
            Probe::Unreachable(e) => {
                warn!(target: "auth", "identity check failed, keeping stored token: {}", e);
                self.sessions.commit_unconfirmed(ticket);
            }
        }
        self.sessions.mark_initialized();
        self.sessions.get_session()
    }

    /// Authenticate with credentials. The session is left untouched on failure;
    /// success wins over checks still in flight, but not over anything started meanwhile.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<Identity> {
        let req = LoginRequest::new(email, password);
        let seen = self.sessions.snapshot();
        let body = json!({ "email": req.email, "password": req.password });
        let val = match self.api.post_json(&self.endpoints.login, &body).await {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "auth", "login failed for {}: {}", req.email, e);
                return Err(login_failure(&e));
            }
        };
        let env: LoginEnvelope = serde_json::from_value(val).unwrap_or_default();
        match env {
            LoginEnvelope { success: Some(true), token: Some(token), user: Some(raw), .. } if !token.is_empty() => {
                let identity = Identity::from_raw(raw, token);
                if self.sessions.commit_superseding(seen, Session::Authenticated(identity.clone())) {
                    tprintln!("auth.login user={} roles={:?}", identity.id, identity.roles);
                    info!(target: "auth", "login ok user id={}", identity.id);
                } else {
                    warn!(target: "auth", "login for {} superseded by a newer request", req.email);
                }
                Ok(identity)
            }
            LoginEnvelope { message, .. } => {
                let message = message.filter(|m| !m.is_empty()).unwrap_or_else(|| MSG_REJECTED_DEFAULT.to_string());
                Err(AppError::auth("login_rejected", message))
            }
        }
    }

    /// Always ends anonymous locally; backend notification is best-effort.
    pub async fn logout(&self) {
        // Outstanding checks and logins become stale.
        self.sessions.begin();
        if self.sessions.token().is_some() {
            if let Err(e) = self.api.post_empty(&self.endpoints.logout).await {
                warn!(target: "auth", "logout call failed (ignored): {}", e);
            }
        }
        self.sessions.set_session(Session::Anonymous);
        info!(target: "auth", "logged out");
    }

    /// Background re-validation. Only an authorization failure ends the session;
    /// anything else keeps the last known identity.
    pub async fn refresh(&self) -> Option<Identity> {
        let token = self.sessions.token()?;
        let seen = self.sessions.snapshot();
        match self.probe(token).await {
            Probe::Confirmed(identity) => {
                self.sessions.commit(seen, Session::Authenticated(identity.clone()));
                Some(identity)
            }
            Probe::Unauthorized => {
                self.sessions.commit(seen, Session::Anonymous);
                None
            }
            Probe::Malformed => {
                warn!(target: "auth", "refresh got a malformed identity payload, keeping session");
                None
            }
            Probe::Unreachable(e) => {
                warn!(target: "auth", "refresh failed, keeping session: {}", e);
                None
            }
        }
    }
}
