//! In-process mock of the contest REST backend, bound to an ephemeral localhost port.
//! Replies are scripted per `METHOD /path`; every request is counted.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use talentgate::client::ContestClient;
use talentgate::config::ClientConfig;
use talentgate::identity::{MemoryTokenStore, SharedTokenStore};

#[derive(Clone)]
struct Reply {
    status: u16,
    body: Value,
    delay: Duration,
}

#[derive(Default)]
struct MockState {
    replies: Mutex<HashMap<String, Reply>>,
    hits: Mutex<HashMap<String, usize>>,
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    last_auth: Mutex<Option<String>>,
}

pub struct MockBackend {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

async fn dispatch(State(state): State<Arc<MockState>>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let key = format!("{} {}", method, uri.path());
    *state.hits.lock().entry(key.clone()).or_insert(0) += 1;
    state.bodies.lock().insert(key.clone(), body.to_vec());
    if let Some(auth) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        *state.last_auth.lock() = Some(auth.to_string());
    }
    let reply = state.replies.lock().get(&key).cloned();
    let Some(reply) = reply else {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "not found"}))).into_response();
    };
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.body)).into_response()
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
        let addr = listener.local_addr().expect("local addr");
        let app = Router::new().fallback(dispatch).with_state(state.clone());
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("mock backend error: {e:?}");
            }
        });
        Self { addr, state, task }
    }

    pub fn url(&self) -> String { format!("http://{}", self.addr) }

    pub fn reply(&self, method: &str, path: &str, status: u16, body: Value) {
        self.reply_after(method, path, Duration::ZERO, status, body);
    }

    pub fn reply_after(&self, method: &str, path: &str, delay: Duration, status: u16, body: Value) {
        self.state.replies.lock().insert(format!("{} {}", method, path), Reply { status, body, delay });
    }

    pub fn hits(&self, method: &str, path: &str) -> usize {
        self.state.hits.lock().get(&format!("{} {}", method, path)).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize { self.state.hits.lock().values().sum() }

    pub fn last_body(&self, method: &str, path: &str) -> Option<String> {
        self.state.bodies.lock().get(&format!("{} {}", method, path)).map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn last_auth(&self) -> Option<String> { self.state.last_auth.lock().clone() }

    /// `GET /user` answers with this user.
    pub fn serve_user(&self, user: Value) {
        self.reply("GET", "/user", 200, json!({"success": true, "user": user}));
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) { self.task.abort(); }
}

/// Base URL of a port nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind 127.0.0.1:0");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

pub fn client_for(url: &str, tokens: SharedTokenStore) -> ContestClient {
    let cfg = ClientConfig { api_url: url.to_string(), request_timeout_ms: Some(5_000), ..Default::default() };
    ContestClient::with_token_store(cfg, tokens).expect("client")
}

pub fn memory_tokens(token: Option<&str>) -> Arc<MemoryTokenStore> {
    Arc::new(match token {
        Some(t) => MemoryTokenStore::with_token(t),
        None => MemoryTokenStore::default(),
    })
}

pub fn user(id: i64, type_compte: &str, roles: Value) -> Value {
    json!({"id": id, "prenoms": "Awa", "nom": "Kone", "email": "awa@example.test", "type_compte": type_compte, "roles": roles})
}
