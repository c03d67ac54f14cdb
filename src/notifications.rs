//! Unread notification and message counters, refreshed on a fixed period.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::chat::{parse_rooms, total_unread, truthy};
use crate::config::Endpoints;
use crate::connectivity::{success_field, ApiClient};
use crate::error::AppResult;
use crate::identity::SessionStore;
use crate::poller::{spawn_poller, PollHandle};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "truthy")]
    pub is_read: bool,
    #[serde(default)]
    pub chat_room_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationState {
    pub notifications: Vec<Notification>,
    /// Notifications not yet marked read.
    pub unread_notifications: usize,
    /// Sum of unread messages over all chat rooms.
    pub unread_messages: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl NotificationState {
    fn recount(&mut self) {
        self.unread_notifications = self.notifications.iter().filter(|n| !n.is_read).count();
    }
}

struct Inner {
    api: ApiClient,
    sessions: SessionStore,
    endpoints: Endpoints,
    state: watch::Sender<NotificationState>,
}

/// Fetches notifications and unread counts; publishes every change to subscribers.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

impl NotificationCenter {
    pub fn new(api: ApiClient, sessions: SessionStore, endpoints: Endpoints) -> Self {
        let (state, _rx) = watch::channel(NotificationState::default());
        Self { inner: Arc::new(Inner { api, sessions, endpoints, state }) }
    }

    pub fn state(&self) -> NotificationState { self.inner.state.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<NotificationState> { self.inner.state.subscribe() }

    /// Reload notifications and room counters. Does nothing without a stored token.
    pub async fn refresh(&self) -> AppResult<()> {
        if self.inner.sessions.token().is_none() {
            debug!(target: "notifications", "no token, skipping refresh");
            return Ok(());
        }
        let val = self.inner.api.get_json(&self.inner.endpoints.notifications).await?;
        let notifications: Vec<Notification> = serde_json::from_value(success_field(&val, "notifications")?)?;
        let rooms = parse_rooms(&self.inner.api.get_json(&self.inner.endpoints.rooms).await?)?;

        let mut next = NotificationState {
            notifications,
            unread_notifications: 0,
            unread_messages: total_unread(&rooms),
            refreshed_at: Some(Utc::now()),
        };
        next.recount();
        debug!(
            target: "notifications",
            "refreshed: unread_notifications={} unread_messages={}",
            next.unread_notifications, next.unread_messages
        );
        self.inner.state.send_replace(next);
        Ok(())
    }

    pub async fn mark_all_read(&self) -> AppResult<()> {
        let path = format!("{}/read-all", self.inner.endpoints.notifications.trim_end_matches('/'));
        self.inner.api.post_empty(&path).await?;
        self.inner.state.send_modify(|s| {
            s.notifications.iter_mut().for_each(|n| n.is_read = true);
            s.recount();
        });
        Ok(())
    }

    pub async fn mark_read(&self, id: i64) -> AppResult<()> {
        let path = format!("{}/{}/read", self.inner.endpoints.notifications.trim_end_matches('/'), id);
        self.inner.api.post_empty(&path).await?;
        self.inner.state.send_modify(|s| {
            s.notifications.iter_mut().filter(|n| n.id == id).for_each(|n| n.is_read = true);
            s.recount();
        });
        Ok(())
    }

    /// Refresh now and then every `period`. Failures are logged; the next tick retries.
    pub fn start(&self, period: Duration) -> PollHandle {
        let center = self.clone();
        spawn_poller("notifications", period, move || {
            let center = center.clone();
            async move {
                if let Err(e) = center.refresh().await {
                    warn!(target: "notifications", "refresh failed: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn notification_flags_accept_ints() {
        let list: Vec<Notification> = serde_json::from_value(json!([
            {"id": 1, "message": "Welcome", "is_read": 1},
            {"id": 2, "message": "New message", "is_read": false, "chat_room_id": 4},
            {"id": 3, "is_read": null}
        ]))
        .unwrap();
        let mut s = NotificationState { notifications: list, ..Default::default() };
        s.recount();
        assert_eq!(s.unread_notifications, 2);
        assert_eq!(s.notifications[1].chat_room_id, Some(4));
    }
}
