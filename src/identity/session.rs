use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};
use crate::tprintln;

use super::principal::Identity;
use super::token_store::SharedTokenStore;

pub type SessionToken = String;

/// Lifecycle of the client's authentication state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Session {
    #[default]
    Uninitialized,
    Loading,
    Authenticated(Identity),
    Anonymous,
}

impl Session {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Session::Authenticated(i) => Some(i),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool { matches!(self, Session::Authenticated(_)) }

    /// True while the state is not yet settled (boot or a check in flight).
    pub fn is_pending(&self) -> bool { matches!(self, Session::Uninitialized | Session::Loading) }

    pub fn label(&self) -> &'static str {
        match self {
            Session::Uninitialized => "uninitialized",
            Session::Loading => "loading",
            Session::Authenticated(_) => "authenticated",
            Session::Anonymous => "anonymous",
        }
    }
}

/// Sequence number handed to a session-mutating request.
pub type Ticket = u64;

struct Inner {
    tx: watch::Sender<Session>,
    tokens: SharedTokenStore,
    initialized: AtomicBool,
    // Latest ticket issued; commits holding an older ticket are stale.
    epoch: Mutex<Ticket>,
    // Ticket of the check that published the current `Loading`, if any.
    loading: Mutex<Option<Ticket>>,
}

/// Current session plus its change feed. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    pub fn new(tokens: SharedTokenStore) -> Self {
        let (tx, _rx) = watch::channel(Session::Uninitialized);
        Self {
            inner: Arc::new(Inner { tx, tokens, initialized: AtomicBool::new(false), epoch: Mutex::new(0), loading: Mutex::new(None) }),
        }
    }

    pub fn get_session(&self) -> Session { self.inner.tx.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<Session> { self.inner.tx.subscribe() }

    pub fn tokens(&self) -> &SharedTokenStore { &self.inner.tokens }

    /// Stored bearer token, if any. Read failures count as "no token".
    pub fn token(&self) -> Option<SessionToken> {
        match self.inner.tokens.load() {
            Ok(t) => t,
            Err(e) => {
                warn!(target: "session", "token read failed: {}", e);
                None
            }
        }
    }

    /// Replace the session and bring durable storage in line with it.
    pub fn set_session(&self, session: Session) {
        let persisted = match &session {
            Session::Authenticated(identity) => self.inner.tokens.save(&identity.token),
            Session::Anonymous => self.inner.tokens.clear(),
            Session::Uninitialized | Session::Loading => Ok(()),
        };
        if let Err(e) = persisted {
            warn!(target: "session", "token persistence failed for state={}: {}", session.label(), e);
        }
        self.publish(session, None);
    }

    /// Publish `Loading` on behalf of the request holding `ticket`.
    pub fn mark_loading(&self, ticket: Ticket) { self.publish(Session::Loading, Some(ticket)); }

    /// Drop to `Anonymous` in memory only; the stored token survives for a later check.
    pub fn mark_unconfirmed(&self) { self.publish(Session::Anonymous, None); }

    pub fn is_initialized(&self) -> bool { self.inner.initialized.load(Ordering::Acquire) }

    pub fn mark_initialized(&self) { self.inner.initialized.store(true, Ordering::Release); }

    /// Issue a new ticket; every earlier outstanding ticket becomes stale.
    pub fn begin(&self) -> Ticket {
        let mut epoch = self.inner.epoch.lock();
        *epoch += 1;
        *epoch
    }

    /// Latest ticket without issuing a new one.
    pub fn snapshot(&self) -> Ticket { *self.inner.epoch.lock() }

    /// Apply `session` only if `ticket` is still the latest. Returns whether it was applied.
    pub fn commit(&self, ticket: Ticket, session: Session) -> bool {
        self.commit_with(ticket, || self.set_session(session))
    }

    /// Like `commit`, but leaves the stored token alone (see `mark_unconfirmed`).
    pub fn commit_unconfirmed(&self, ticket: Ticket) -> bool {
        self.commit_with(ticket, || self.mark_unconfirmed())
    }

    /// Apply `session` if nothing started since `ticket` was observed, and make every
    /// request still in flight stale. Used by results that must win over older checks.
    pub fn commit_superseding(&self, ticket: Ticket, session: Session) -> bool {
        let mut epoch = self.inner.epoch.lock();
        if *epoch != ticket {
            debug!(target: "session", "discarding stale result ticket={} latest={}", ticket, *epoch);
            return false;
        }
        *epoch += 1;
        self.set_session(session);
        true
    }

    // A stale result still settles a `Loading` it published itself and nobody replaced,
    // so the session never stays pending.
    fn commit_with<F: FnOnce()>(&self, ticket: Ticket, apply: F) -> bool {
        let epoch = self.inner.epoch.lock();
        if *epoch != ticket {
            let owns_loading = *self.inner.loading.lock() == Some(ticket) && self.get_session() == Session::Loading;
            if !owns_loading {
                debug!(target: "session", "discarding stale result ticket={} latest={}", ticket, *epoch);
                return false;
            }
            debug!(target: "session", "settling pending state from stale ticket={}", ticket);
        }
        apply();
        true
    }

    fn publish(&self, session: Session, loading: Option<Ticket>) {
        tprintln!("session.set state={}", session.label());
        *self.inner.loading.lock() = loading;
        self.inner.tx.send_replace(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::token_store::{MemoryTokenStore, TokenStore};

    fn ident(token: &str) -> Identity {
        Identity { id: "1".into(), account_type: "candidat".into(), token: token.into(), ..Default::default() }
    }

    #[test]
    fn token_follows_session_state() {
        let tokens = Arc::new(MemoryTokenStore::default());
        let store = SessionStore::new(tokens.clone());
        assert_eq!(store.get_session(), Session::Uninitialized);

        store.set_session(Session::Authenticated(ident("tok")));
        assert_eq!(tokens.load().unwrap().as_deref(), Some("tok"));

        store.set_session(Session::Loading);
        assert_eq!(tokens.load().unwrap().as_deref(), Some("tok"));

        store.set_session(Session::Anonymous);
        assert_eq!(tokens.load().unwrap(), None);
    }

    #[test]
    fn unconfirmed_keeps_token() {
        let tokens = Arc::new(MemoryTokenStore::with_token("tok"));
        let store = SessionStore::new(tokens.clone());
        store.mark_unconfirmed();
        assert_eq!(store.get_session(), Session::Anonymous);
        assert_eq!(tokens.load().unwrap().as_deref(), Some("tok"));
    }

    #[test]
    fn subscribers_see_changes() {
        let store = SessionStore::new(Arc::new(MemoryTokenStore::default()));
        let mut rx = store.subscribe();
        store.set_session(Session::Anonymous);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Session::Anonymous);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn stale_tickets_are_discarded() {
        let store = SessionStore::new(Arc::new(MemoryTokenStore::default()));
        let login = store.begin();
        let logout = store.begin();
        assert!(store.commit(logout, Session::Anonymous));
        assert!(!store.commit(login, Session::Authenticated(ident("late"))));
        assert_eq!(store.get_session(), Session::Anonymous);
        assert_eq!(store.token(), None);

        let seen = store.snapshot();
        assert!(store.commit(seen, Session::Loading));
    }

    #[test]
    fn stale_check_still_settles_its_own_loading() {
        let tokens = Arc::new(MemoryTokenStore::with_token("tok"));
        let store = SessionStore::new(tokens.clone());
        let check = store.begin();
        store.mark_loading(check);
        let _newer = store.begin();
        assert!(store.commit(check, Session::Authenticated(ident("tok"))));
        assert!(store.get_session().is_authenticated());

        // Once someone else replaced the Loading, the stale result is dropped.
        let check = store.begin();
        store.mark_loading(check);
        let logout = store.begin();
        assert!(store.commit(logout, Session::Anonymous));
        assert!(!store.commit(check, Session::Authenticated(ident("tok"))));
        assert_eq!(store.get_session(), Session::Anonymous);
    }

    #[test]
    fn superseding_commit_invalidates_in_flight_requests() {
        let store = SessionStore::new(Arc::new(MemoryTokenStore::default()));
        let check = store.begin();
        store.mark_loading(check);
        let seen = store.snapshot();
        assert!(store.commit_superseding(seen, Session::Authenticated(ident("new"))));
        assert!(!store.commit(check, Session::Anonymous));
        assert_eq!(store.token().as_deref(), Some("new"));

        let seen = store.snapshot();
        store.begin();
        assert!(!store.commit_superseding(seen, Session::Authenticated(ident("late"))));
        assert_eq!(store.token().as_deref(), Some("new"));
    }
}
