use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::session::SessionToken;

pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// One entry of the backend `roles` list. Both shapes occur in the wild.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawRole {
    Plain(String),
    Named {
        #[serde(default)]
        name: Option<String>,
    },
    Other(Value),
}

impl RawRole {
    fn into_name(self) -> Option<String> {
        match self {
            RawRole::Plain(s) => Some(s),
            RawRole::Named { name } => name,
            RawRole::Other(_) => None,
        }
    }
}

/// User payload exactly as the backend sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIdentity {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub prenoms: Option<String>,
    #[serde(default)]
    pub nom: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub type_compte: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default, deserialize_with = "roles_or_null")]
    pub roles: Option<Vec<RawRole>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// `roles: null` and non-list values behave like an absent field.
fn roles_or_null<'de, D>(de: D) -> Result<Option<Vec<RawRole>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = Value::deserialize(de)?;
    match v {
        Value::Array(items) => {
            let roles = items
                .into_iter()
                .map(|item| serde_json::from_value::<RawRole>(item).unwrap_or(RawRole::Other(Value::Null)))
                .collect();
            Ok(Some(roles))
        }
        _ => Ok(None),
    }
}

/// The authenticated principal after normalization.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub account_type: String,
    pub roles: BTreeSet<String>,
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attrs: Map<String, Value>,
    #[serde(skip)]
    pub token: SessionToken,
}

/// Collapse the raw role list into a set of names, then fold in the account type.
pub fn normalize_roles(raw: Option<Vec<RawRole>>, account_type: &str) -> BTreeSet<String> {
    let mut roles: BTreeSet<String> = raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(RawRole::into_name)
        .filter(|r| !r.is_empty())
        .collect();
    if !account_type.is_empty() {
        roles.insert(account_type.to_string());
    }
    roles
}

fn opaque_id(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn display_name_of(first: Option<&str>, last: Option<&str>) -> String {
    let joined = format!("{} {}", first.unwrap_or(""), last.unwrap_or(""));
    let trimmed = joined.trim();
    if trimmed.is_empty() { DEFAULT_DISPLAY_NAME.to_string() } else { trimmed.to_string() }
}

impl Identity {
    pub fn from_raw(raw: RawIdentity, token: SessionToken) -> Self {
        let account_type = raw.type_compte.unwrap_or_default();
        let roles = normalize_roles(raw.roles, &account_type);
        let display_name = display_name_of(raw.prenoms.as_deref(), raw.nom.as_deref());
        Identity {
            id: opaque_id(&raw.id),
            display_name,
            first_name: raw.prenoms,
            last_name: raw.nom,
            email: raw.email,
            account_type,
            roles,
            photo_url: raw.photo_url,
            attrs: raw.extra,
            token,
        }
    }

    /// Two-letter avatar initials, `U` when no name is known.
    pub fn initials(&self) -> String {
        let first = self.first_name.as_deref().and_then(|s| s.chars().next());
        let last = self.last_name.as_deref().and_then(|s| s.chars().next());
        let s: String = first.into_iter().chain(last).collect::<String>().to_uppercase();
        if s.is_empty() { "U".to_string() } else { s }
    }

    pub fn has_literal_role(&self, role: &str) -> bool { self.roles.contains(role) }
}
