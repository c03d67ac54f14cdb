//! REST transport shared by the auth gateway, notifications and chat.
//! Reads the bearer token from the token store on every request, so a login or
//! logout elsewhere is picked up without rebuilding the client.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{RequestBuilder, Url};
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{AppError, AppResult};
use crate::identity::SharedTokenStore;

#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    client: reqwest::Client,
    tokens: SharedTokenStore,
}

impl ApiClient {
    pub fn new(cfg: &ClientConfig, tokens: SharedTokenStore) -> AppResult<Self> {
        let base = Url::parse(&cfg.api_url)
            .map_err(|e| AppError::user("invalid_base_url", &format!("invalid base URL '{}': {}", cfg.api_url, e)))?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(t) = cfg.request_timeout() {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        Ok(Self { base, client, tokens })
    }

    pub fn base(&self) -> &Url { &self.base }

    /// Resolve an endpoint path against the base, keeping any path prefix on the base (e.g. `/api`).
    pub fn url(&self, path: &str) -> AppResult<Url> {
        let joined = format!("{}/{}", self.base.as_str().trim_end_matches('/'), path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| AppError::user("invalid_path", &format!("invalid endpoint '{}': {}", path, e)))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.tokens.load() {
            Ok(Some(token)) => req.bearer_auth(token),
            _ => req,
        }
    }

    pub async fn get_json(&self, path: &str) -> AppResult<Value> {
        let url = self.url(path)?;
        debug!(target: "http", "GET {}", url);
        self.send(self.authorize(self.client.get(url))).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> AppResult<Value> {
        let url = self.url(path)?;
        debug!(target: "http", "POST {}", url);
        self.send(self.authorize(self.client.post(url)).json(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> AppResult<Value> {
        let url = self.url(path)?;
        debug!(target: "http", "POST {}", url);
        self.send(self.authorize(self.client.post(url))).await
    }

    pub async fn post_form(&self, path: &str, form: reqwest::multipart::Form) -> AppResult<Value> {
        let url = self.url(path)?;
        debug!(target: "http", "POST(multipart) {}", url);
        self.send(self.authorize(self.client.post(url)).multipart(form)).await
    }

    async fn send(&self, req: RequestBuilder) -> AppResult<Value> {
        let resp = req.send().await.map_err(|e| AppError::io("transport", &e.to_string()))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| AppError::io("transport", &e.to_string()))?;
        let val: Value = if text.trim().is_empty() { Value::Null } else { serde_json::from_str(&text).unwrap_or(Value::Null) };
        if !status.is_success() {
            let msg = val
                .get("message")
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(AppError::from_status(status.as_u16(), msg));
        }
        if val.is_null() && !text.trim().is_empty() {
            return Err(AppError::malformed("bad_payload", "response body is not JSON"));
        }
        Ok(val)
    }
}

/// Pull `key` out of a `{ success: true, key: ... }` envelope.
pub fn success_field(val: &Value, key: &str) -> AppResult<Value> {
    if val.get("success").and_then(|s| s.as_bool()) != Some(true) {
        let msg = val.get("message").and_then(|m| m.as_str()).unwrap_or("request was not successful");
        return Err(AppError::malformed("unsuccessful", msg));
    }
    val.get(key).cloned().ok_or_else(|| AppError::malformed("missing_field", &format!("response has no '{}'", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryTokenStore;
    use serde_json::json;
    use std::sync::Arc;

    fn client(base: &str) -> ApiClient {
        let cfg = ClientConfig { api_url: base.to_string(), ..Default::default() };
        ApiClient::new(&cfg, Arc::new(MemoryTokenStore::default())).unwrap()
    }

    #[test]
    fn url_keeps_base_prefix() {
        let c = client("http://localhost:8000/api/");
        assert_eq!(c.url("/user").unwrap().as_str(), "http://localhost:8000/api/user");
        assert_eq!(c.url("chat/rooms").unwrap().as_str(), "http://localhost:8000/api/chat/rooms");
    }

    #[test]
    fn bad_base_url_is_user_error() {
        let cfg = ClientConfig { api_url: "not a url".into(), ..Default::default() };
        let err = ApiClient::new(&cfg, Arc::new(MemoryTokenStore::default())).err().unwrap();
        assert_eq!(err.code_str(), "invalid_base_url");
    }

    #[test]
    fn success_envelope() {
        let v = json!({"success": true, "rooms": []});
        assert_eq!(success_field(&v, "rooms").unwrap(), json!([]));
        assert!(success_field(&json!({"success": false}), "rooms").is_err());
        assert!(success_field(&json!({"success": true}), "rooms").is_err());
        assert!(success_field(&json!({"rooms": []}), "rooms").is_err());
    }
}
