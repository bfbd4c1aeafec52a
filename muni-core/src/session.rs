use crate::persist::SnapshotStore;
use muni_schema::{TokenPair, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const AUTH_STORAGE_KEY: &str = "auth-storage";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    Landing,
    Login,
    Register,
    Home,
    Finance,
    Designer,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Home => "/home",
            Route::Finance => "/finance",
            Route::Designer => "/designer",
        }
    }
}

pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, route: Route);
}

pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _route: Route) {}
}

/// Navigator that only records where the app was last sent.
pub struct RouteCell {
    current: watch::Sender<Route>,
}

impl RouteCell {
    pub fn new(initial: Route) -> Self {
        let (current, _) = watch::channel(initial);
        Self { current }
    }

    pub fn current(&self) -> Route {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.current.subscribe()
    }
}

impl Navigator for RouteCell {
    fn navigate(&self, route: Route) {
        debug!(path = route.path(), "navigate");
        self.current.send_replace(route);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub tokens: Option<TokenPair>,
    pub user: Option<User>,
    pub is_authenticated: bool,
}

/// Persisted form of [`Session`] under [`AUTH_STORAGE_KEY`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    #[serde(default)]
    pub tokens: Option<TokenPair>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub is_authenticated: bool,
}

impl From<&Session> for AuthSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            tokens: session.tokens.clone(),
            user: session.user.clone(),
            is_authenticated: session.is_authenticated,
        }
    }
}

impl From<AuthSnapshot> for Session {
    fn from(snapshot: AuthSnapshot) -> Self {
        Self {
            tokens: snapshot.tokens,
            user: snapshot.user,
            is_authenticated: snapshot.is_authenticated,
        }
    }
}

/// Single owner of the session. The HTTP client reads tokens from it and the
/// auth store writes through it, so neither needs a handle on the other.
pub struct SessionCell {
    state: watch::Sender<Session>,
    snapshots: Option<SnapshotStore>,
    navigator: Arc<dyn Navigator>,
}

impl SessionCell {
    pub fn new(snapshots: Option<SnapshotStore>, navigator: Arc<dyn Navigator>) -> Self {
        let restored = snapshots
            .as_ref()
            .map(|store| match store.load::<AuthSnapshot>(AUTH_STORAGE_KEY) {
                Ok(Some(snapshot)) => {
                    info!(authenticated = snapshot.is_authenticated, "restored session");
                    Session::from(snapshot)
                }
                Ok(None) => Session::default(),
                Err(e) => {
                    warn!("ignoring unreadable session snapshot: {e}");
                    Session::default()
                }
            })
            .unwrap_or_default();

        let (state, _) = watch::channel(restored);
        Self {
            state,
            snapshots,
            navigator,
        }
    }

    pub fn ephemeral() -> Self {
        Self::new(None, Arc::new(NoopNavigator))
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().tokens.as_ref().map(|t| t.access.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.borrow().tokens.as_ref().map(|t| t.refresh.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn navigate(&self, route: Route) {
        self.navigator.navigate(route);
    }

    pub fn set_tokens(&self, tokens: TokenPair) {
        self.update(|session| session.tokens = Some(tokens));
    }

    /// Stores the profile. `authenticated` marks a completed login.
    pub fn set_user(&self, user: User, authenticated: bool) {
        self.update(|session| {
            session.user = Some(user);
            if authenticated {
                session.is_authenticated = true;
            }
        });
    }

    /// Clears tokens, user and the authenticated flag, then sends the app to
    /// the landing route.
    pub fn teardown(&self) {
        info!("session cleared");
        self.update(|session| *session = Session::default());
        self.navigator.navigate(Route::Landing);
    }

    fn update(&self, change: impl FnOnce(&mut Session)) {
        self.state.send_modify(change);
        self.persist();
    }

    fn persist(&self) {
        let Some(store) = &self.snapshots else {
            return;
        };
        let snapshot = AuthSnapshot::from(&*self.state.borrow());
        if let Err(e) = store.save(AUTH_STORAGE_KEY, &snapshot) {
            warn!("failed to persist session: {e}");
        }
    }
}
