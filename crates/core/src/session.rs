//! Session identity and readiness.
//!
//! One [`SessionSource`] per client process assigns the opaque identity and
//! publishes readiness over a `tokio::sync::watch` channel. The controller
//! only ever reads it through a [`SessionWatch`].

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

/// The session as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub ready: bool,
}

impl Session {
    /// Not signed in yet.
    pub fn pending() -> Self {
        Self {
            id: String::new(),
            ready: false,
        }
    }

    /// Usable for submits: signalled ready and carrying an identity.
    pub fn is_usable(&self) -> bool {
        self.ready && !self.id.is_empty()
    }
}

/// Assigns the session identity and signals readiness.
pub struct SessionSource {
    tx: watch::Sender<Session>,
}

impl SessionSource {
    /// A source that has not signed in yet.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Session::pending());
        Self { tx }
    }

    /// A source already signed in as `id`.
    pub fn ready(id: impl Into<String>) -> Self {
        let source = Self::new();
        source.tx.send_replace(Session {
            id: id.into(),
            ready: true,
        });
        source
    }

    /// Sign in with a configured identity, or anonymously when none is given.
    pub fn sign_in(&self, identity: Option<&str>) -> Session {
        let configured = identity.map(str::trim).filter(|s| !s.is_empty());
        let anonymous = configured.is_none();
        let id = match configured {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        let session = Session { id, ready: true };
        self.tx.send_replace(session.clone());
        info!(session = %session.id, anonymous, "Session ready");
        session
    }

    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn watch(&self) -> SessionWatch {
        SessionWatch {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SessionSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the session, cheap to clone.
#[derive(Clone)]
pub struct SessionWatch {
    rx: watch::Receiver<Session>,
}

impl SessionWatch {
    pub fn current(&self) -> Session {
        self.rx.borrow().clone()
    }

    /// Wait until the session is usable. Returns `None` if the source is
    /// dropped before that happens.
    pub async fn wait_ready(&mut self) -> Option<Session> {
        self.rx
            .wait_for(Session::is_usable)
            .await
            .ok()
            .map(|session| (*session).clone())
    }
}
