use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::principal::Identity;
use super::session::Session;

/// Canonical platform roles, by their wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Promoteur,
    Candidat,
    Jury,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Promoteur => "promoteur",
            Role::Candidat => "candidat",
            Role::Jury => "jury",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "promoteur" => Some(Role::Promoteur),
            "candidat" => Some(Role::Candidat),
            "jury" => Some(Role::Jury),
            _ => None,
        }
    }

    /// Synonyms that satisfy this role without being literally present.
    pub fn aliases(&self) -> &'static [&'static str] {
        role_aliases(self.as_str())
    }
}

static ROLE_ALIASES: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
    m.insert("admin", &["administrator", "superadmin"]);
    m.insert("promoteur", &["organizer", "promoter"]);
    m.insert("candidat", &["candidate", "participant"]);
    m
});

pub fn role_aliases(role: &str) -> &'static [&'static str] {
    ROLE_ALIASES.get(role).copied().unwrap_or(&[])
}

fn matches_directly(identity: &Identity, role: &str) -> bool {
    identity.roles.contains(role) || identity.account_type == role
}

/// Role check against one identity: literal membership, account type, then aliases.
pub fn identity_has_role(identity: &Identity, role: &str) -> bool {
    if matches_directly(identity, role) {
        return true;
    }
    role_aliases(role).iter().any(|alias| matches_directly(identity, alias))
}

/// False unless the session is authenticated.
pub fn has_role(session: &Session, role: &str) -> bool {
    match session.identity() {
        Some(identity) => identity_has_role(identity, role),
        None => false,
    }
}

/// True iff some entry satisfies `has_role`. An empty list is never satisfied;
/// callers treat "no restriction" themselves.
pub fn has_any_role<S: AsRef<str>>(session: &Session, roles: &[S]) -> bool {
    roles.iter().any(|r| has_role(session, r.as_ref()))
}

/// Short label for the header badge, by literal role membership.
pub fn role_label(session: &Session) -> &'static str {
    let Some(identity) = session.identity() else { return "User"; };
    if identity.has_literal_role(Role::Admin.as_str()) {
        "Administrator"
    } else if identity.has_literal_role(Role::Promoteur.as_str()) {
        "Promoter"
    } else if identity.has_literal_role(Role::Candidat.as_str()) {
        "Candidate"
    } else {
        "User"
    }
}
