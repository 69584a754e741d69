use std::path::{Path, PathBuf};
use std::sync::Arc;

use mentor_types::{UpdateProfileRequest, User};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

/// Signed-in user plus the bearer token the API issued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Holds at most one session.
///
/// With a backing file the session survives restarts: it is loaded on
/// construction, rewritten on every mutation and deleted on `clear`.
#[derive(Clone)]
pub struct AuthStore {
    state: Arc<watch::Sender<Option<Session>>>,
    path: Option<Arc<PathBuf>>,
}

impl std::fmt::Debug for AuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStore")
            .field("authenticated", &self.is_authenticated())
            .field("path", &self.path)
            .finish()
    }
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl AuthStore {
    pub fn in_memory() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            state: Arc::new(tx),
            path: None,
        }
    }

    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let session = load_session(&path);
        if session.is_some() {
            info!(path = %path.display(), "restored session");
        }
        let (tx, _rx) = watch::channel(session);
        Self {
            state: Arc::new(tx),
            path: Some(Arc::new(path)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().as_ref().map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn set_auth(&self, user: User, token: impl Into<String>) {
        let session = Session {
            user,
            token: token.into(),
        };
        self.persist(Some(&session));
        self.state.send_replace(Some(session));
    }

    /// Merge a profile patch into the cached user. No-op when signed out.
    pub fn update_user(&self, patch: &UpdateProfileRequest) {
        self.modify_user(|user| patch.apply_to(user));
    }

    /// Replace the cached user with the server's copy, keeping the token.
    pub fn replace_user(&self, user: User) {
        self.modify_user(|cached| *cached = user);
    }

    pub fn clear(&self) {
        let had_session = self.state.send_replace(None).is_some();
        if had_session {
            info!("session cleared");
        }
        self.persist(None);
    }

    fn modify_user(&self, f: impl FnOnce(&mut User)) {
        let mut snapshot = None;
        self.state.send_if_modified(|state| match state {
            Some(session) => {
                f(&mut session.user);
                snapshot = Some(session.clone());
                true
            }
            None => false,
        });
        if let Some(session) = snapshot {
            self.persist(Some(&session));
        }
    }

    fn persist(&self, session: Option<&Session>) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        let result = match session {
            Some(session) => serde_json::to_vec_pretty(session)
                .map_err(std::io::Error::other)
                .and_then(|bytes| {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(path, bytes)
                }),
            None => match std::fs::remove_file(path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "failed to persist session");
        }
    }
}

fn load_session(path: &Path) -> Option<Session> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read session file");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
            None
        }
    }
}
