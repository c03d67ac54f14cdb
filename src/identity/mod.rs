//! Session and access control for the contest client.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod token_store;
mod provider;
mod authorizer;
mod guard;

pub use principal::{Identity, RawIdentity, RawRole, normalize_roles, DEFAULT_DISPLAY_NAME};
pub use session::{Session, SessionToken, SessionStore, Ticket};
pub use token_store::{TokenStore, SharedTokenStore, FileTokenStore, MemoryTokenStore};
pub use provider::{
    AuthGateway, LoginRequest, login_failure, MSG_CONNECTION_ERROR, MSG_INVALID_CREDENTIALS, MSG_INVALID_INPUT,
    MSG_REJECTED_DEFAULT, MSG_SERVER_ERROR,
};
pub use authorizer::{Role, has_role, has_any_role, identity_has_role, role_aliases, role_label};
pub use guard::{GuardDecision, NavLink, Redirect, evaluate, home_route, nav_links, post_login_redirect};
