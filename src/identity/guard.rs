//! Per-navigation access decision. Pure: reads a session snapshot, returns what
//! the view layer should do. Never touches the network or the session store.

use serde::Serialize;

use crate::config::Routes;
use super::authorizer::{has_any_role, has_role, Role};
use super::session::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub to: String,
    /// Originally requested path, so the login flow can return there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl Redirect {
    fn to(path: &str) -> Self { Self { to: path.to_string(), from: None } }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardDecision {
    Checking,
    DeniedUnauthenticated { redirect: Redirect },
    DeniedUnauthorized { redirect: Redirect },
    Granted,
}

impl GuardDecision {
    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            GuardDecision::DeniedUnauthenticated { redirect } | GuardDecision::DeniedUnauthorized { redirect } => Some(redirect),
            _ => None,
        }
    }

    pub fn is_granted(&self) -> bool { matches!(self, GuardDecision::Granted) }
}

/// Home route for the session, first satisfied role wins: admin, promoteur, candidat, then dashboard.
pub fn home_route<'a>(session: &Session, routes: &'a Routes) -> &'a str {
    if has_role(session, Role::Admin.as_str()) {
        &routes.admin_home
    } else if has_role(session, Role::Promoteur.as_str()) {
        &routes.promoter_home
    } else if has_role(session, Role::Candidat.as_str()) {
        &routes.candidate_home
    } else {
        &routes.dashboard
    }
}

/// Decide whether `path` may render.
pub fn evaluate<S: AsRef<str>>(
    session: &Session,
    initialized: bool,
    path: &str,
    required_roles: &[S],
    routes: &Routes,
) -> GuardDecision {
    if !initialized || session.is_pending() {
        return GuardDecision::Checking;
    }
    if !session.is_authenticated() {
        return GuardDecision::DeniedUnauthenticated {
            redirect: Redirect { to: routes.login.clone(), from: Some(path.to_string()) },
        };
    }
    if !required_roles.is_empty() && !has_any_role(session, required_roles) {
        return GuardDecision::DeniedUnauthorized { redirect: Redirect::to(home_route(session, routes)) };
    }
    GuardDecision::Granted
}

/// Where to go right after a login: back to `from` unless it is the site root, else the role home.
pub fn post_login_redirect(session: &Session, from: Option<&str>, routes: &Routes) -> Redirect {
    if !session.is_authenticated() {
        return Redirect::to(&routes.login);
    }
    match from {
        Some(p) if !p.is_empty() && p != "/" => Redirect::to(p),
        _ => Redirect::to(home_route(session, routes)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub path: &'static str,
    pub label: &'static str,
}

/// Header navigation: public links, then links for each role literally held.
pub fn nav_links(session: &Session) -> Vec<NavLink> {
    let mut links = vec![
        NavLink { path: "/", label: "Home" },
        NavLink { path: "/candidats", label: "Candidates" },
        NavLink { path: "/discussions", label: "Discussions" },
    ];
    let Some(identity) = session.identity() else { return links; };
    if identity.has_literal_role(Role::Admin.as_str()) {
        links.push(NavLink { path: "/admin", label: "Administration" });
    }
    if identity.has_literal_role(Role::Promoteur.as_str()) {
        links.push(NavLink { path: "/promoteur", label: "Promoter space" });
        links.push(NavLink { path: "/promoteur/editions", label: "My editions" });
    }
    if identity.has_literal_role(Role::Candidat.as_str()) {
        links.push(NavLink { path: "/candidat", label: "My space" });
        links.push(NavLink { path: "/postuler", label: "Apply" });
    }
    links
}
