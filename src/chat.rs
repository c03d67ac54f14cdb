//! Chat rooms between contest participants, refreshed by polling.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::Endpoints;
use crate::connectivity::{success_field, ApiClient};
use crate::error::{AppError, AppResult};
use crate::poller::{spawn_poller, PollHandle};

pub const MESSAGES_PAGE_SIZE: u32 = 50;
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Backend ids arrive as numbers or numeric strings.
fn flexible_id<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
    let v = Value::deserialize(de)?;
    Ok(match v {
        Value::Number(n) => n.as_i64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

/// Accepts true/false, 0/1 and null.
pub(crate) fn truthy<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    let v = Value::deserialize(de)?;
    Ok(match v {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().map(|i| i != 0).unwrap_or(false),
        Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    })
}

/// Milliseconds since the epoch for RFC 3339 or `YYYY-MM-DD HH:MM:SS` (UTC); 0 when absent or unparsable.
pub fn timestamp_millis(s: Option<&str>) -> i64 {
    let Some(s) = s.map(str::trim).filter(|s| !s.is_empty()) else { return 0; };
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.timestamp_millis();
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|n| n.and_utc().timestamp_millis())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatUser {
    #[serde(default)]
    pub prenoms: Option<String>,
    #[serde(default)]
    pub nom: Option<String>,
    #[serde(default)]
    pub type_compte: Option<String>,
}

impl ChatUser {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.prenoms.as_deref().unwrap_or(""), self.nom.as_deref().unwrap_or("")).trim().to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoomCategory {
    #[serde(default)]
    pub nom: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessagePreview {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatRoom {
    #[serde(deserialize_with = "flexible_id")]
    pub id: i64,
    #[serde(default)]
    pub category: Option<RoomCategory>,
    #[serde(default)]
    pub unread_count: Option<u64>,
    #[serde(default)]
    pub last_message: Option<MessagePreview>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRoom {
    pub fn title(&self) -> &str {
        self.category.as_ref().and_then(|c| c.nom.as_deref()).unwrap_or("Discussion")
    }

    pub fn unread(&self) -> u64 { self.unread_count.unwrap_or(0) }

    fn last_activity_millis(&self) -> i64 {
        timestamp_millis(self.last_message.as_ref().and_then(|m| m.created_at.as_deref()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub user: Option<ChatUser>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    #[serde(default)]
    pub user: Option<ChatUser>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `messages` is either a bare list or a paginator page with `data`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessagesPayload {
    List(Vec<ChatMessage>),
    Page { data: Vec<ChatMessage> },
}

impl MessagesPayload {
    fn into_vec(self) -> Vec<ChatMessage> {
        match self {
            MessagesPayload::Page { data } => data,
            MessagesPayload::List(list) => list,
        }
    }
}

/// Parse a rooms response and order it by most recent activity first.
pub fn parse_rooms(val: &Value) -> AppResult<Vec<ChatRoom>> {
    let rooms = success_field(val, "rooms")?;
    let mut rooms: Vec<ChatRoom> = serde_json::from_value(rooms)?;
    rooms.sort_by_key(|r| std::cmp::Reverse(r.last_activity_millis()));
    Ok(rooms)
}

/// Parse a messages response in either shape, oldest first.
pub fn parse_messages(val: &Value) -> AppResult<Vec<ChatMessage>> {
    let raw = match success_field(val, "messages") {
        Ok(Value::Null) => return Ok(Vec::new()),
        Ok(v) => v,
        Err(e) => return Err(e),
    };
    let payload: MessagesPayload = serde_json::from_value(raw)?;
    let mut messages = payload.into_vec();
    messages.sort_by_key(|m| timestamp_millis(m.created_at.as_deref()));
    Ok(messages)
}

pub fn total_unread(rooms: &[ChatRoom]) -> u64 { rooms.iter().map(ChatRoom::unread).sum() }

/// Room to open first: the most recent one with unread messages, else the most recent.
pub fn pick_initial_room(rooms: &[ChatRoom]) -> Option<&ChatRoom> {
    rooms.iter().find(|r| r.unread() > 0).or_else(|| rooms.first())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomView {
    pub room_id: i64,
    pub rooms: Vec<ChatRoom>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Clone)]
pub struct ChatClient {
    api: ApiClient,
    rooms_path: String,
    room_prefix: String,
}

impl ChatClient {
    pub fn new(api: ApiClient, endpoints: &Endpoints) -> Self {
        Self {
            api,
            rooms_path: endpoints.rooms.clone(),
            room_prefix: endpoints.room.trim_end_matches('/').to_string(),
        }
    }

    fn room_path(&self, room_id: i64, tail: &str) -> String { format!("{}/{}/{}", self.room_prefix, room_id, tail) }

    pub async fn list_rooms(&self) -> AppResult<Vec<ChatRoom>> {
        let val = self.api.get_json(&self.rooms_path).await?;
        parse_rooms(&val)
    }

    pub async fn messages(&self, room_id: i64, page: u32) -> AppResult<Vec<ChatMessage>> {
        let path = self.room_path(room_id, &format!("messages?page={}&limit={}", page.max(1), MESSAGES_PAGE_SIZE));
        let val = self.api.get_json(&path).await?;
        parse_messages(&val)
    }

    pub async fn mark_room_read(&self, room_id: i64) -> AppResult<()> {
        self.api.post_empty(&self.room_path(room_id, "mark-read")).await?;
        Ok(())
    }

    pub async fn participants(&self, room_id: i64) -> AppResult<Vec<Participant>> {
        let val = self.api.get_json(&self.room_path(room_id, "participants")).await?;
        Ok(serde_json::from_value(success_field(&val, "participants")?)?)
    }

    /// Post a text message. Blank and oversized messages are rejected locally.
    pub async fn send_message(&self, room_id: i64, text: &str) -> AppResult<ChatMessage> {
        let content = text.trim();
        if content.is_empty() {
            return Err(AppError::user("empty_message", "message is empty"));
        }
        if content.chars().count() > MAX_MESSAGE_LEN {
            return Err(AppError::user("message_too_long", format!("message exceeds {} characters", MAX_MESSAGE_LEN)));
        }
        let form = reqwest::multipart::Form::new()
            .text("message", content.to_string())
            .text("type", "text");
        let val = self.api.post_form(&self.room_path(room_id, "message"), form).await?;
        Ok(serde_json::from_value(success_field(&val, "message")?)?)
    }

    /// One refresh of an open room: its messages (then mark read), then the room list.
    pub async fn load_room(&self, room_id: i64) -> AppResult<RoomView> {
        let messages = self.messages(room_id, 1).await?;
        if let Err(e) = self.mark_room_read(room_id).await {
            warn!(target: "chat", "mark-read failed for room {}: {}", room_id, e);
        }
        let mut rooms = self.list_rooms().await?;
        for r in rooms.iter_mut().filter(|r| r.id == room_id) {
            r.unread_count = Some(0);
        }
        Ok(RoomView { room_id, rooms, messages })
    }

    /// Keep `room_id` fresh every `period` until the handle is stopped.
    pub fn watch_room(&self, room_id: i64, period: Duration) -> (PollHandle, watch::Receiver<RoomView>) {
        let (tx, rx) = watch::channel(RoomView { room_id, ..Default::default() });
        let tx = Arc::new(tx);
        let client = self.clone();
        let handle = spawn_poller("chat_room", period, move || {
            let client = client.clone();
            let tx = tx.clone();
            async move {
                match client.load_room(room_id).await {
                    Ok(view) => {
                        debug!(target: "chat", "room {} refreshed: {} messages", room_id, view.messages.len());
                        tx.send_replace(view);
                    }
                    Err(e) => warn!(target: "chat", "room {} refresh failed: {}", room_id, e),
                }
            }
        });
        (handle, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rooms_sorted_by_last_activity() {
        let v = json!({"success": true, "rooms": [
            {"id": 1, "last_message": {"created_at": "2024-03-01T10:00:00Z"}},
            {"id": "2", "unread_count": 4, "last_message": {"created_at": "2024-03-02 08:00:00"}},
            {"id": 3}
        ]});
        let rooms = parse_rooms(&v).unwrap();
        assert_eq!(rooms.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 1, 3]);
        assert_eq!(total_unread(&rooms), 4);
        assert_eq!(rooms[2].title(), "Discussion");
    }

    #[test]
    fn initial_room_prefers_unread() {
        let rooms: Vec<ChatRoom> = serde_json::from_value(json!([{"id": 5}, {"id": 6, "unread_count": 1}])).unwrap();
        assert_eq!(pick_initial_room(&rooms).map(|r| r.id), Some(6));
        assert_eq!(pick_initial_room(&rooms[..1]).map(|r| r.id), Some(5));
        assert!(pick_initial_room(&[]).is_none());
    }

    #[test]
    fn both_message_shapes_normalize_alike() {
        let msgs = json!([
            {"id": 2, "message": "second", "created_at": "2024-01-01T10:05:00Z"},
            {"id": 1, "message": "first", "created_at": "2024-01-01T10:00:00Z"}
        ]);
        let bare = parse_messages(&json!({"success": true, "messages": msgs.clone()})).unwrap();
        let paged = parse_messages(&json!({"success": true, "messages": {"data": msgs, "current_page": 1}})).unwrap();
        assert_eq!(bare, paged);
        assert_eq!(bare.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn timestamps() {
        assert_eq!(timestamp_millis(None), 0);
        assert_eq!(timestamp_millis(Some("garbage")), 0);
        assert_eq!(timestamp_millis(Some("1970-01-01T00:00:01Z")), 1000);
        assert_eq!(timestamp_millis(Some("1970-01-01 00:00:02")), 2000);
        assert_eq!(timestamp_millis(Some("2024-01-01T00:00:00.000000Z")), 1_704_067_200_000);
    }

    #[test]
    fn user_full_name() {
        let u = ChatUser { prenoms: Some("Awa".into()), nom: None, type_compte: None };
        assert_eq!(u.full_name(), "Awa");
    }
}
