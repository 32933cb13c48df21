//! Connected lobby sessions and fan-out.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;
use uuid::Uuid;

/// Why a broadcast could not reach one session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendFailure {
    /// The session's socket task has ended and dropped its receiver.
    #[error("session {session} is closed")]
    Closed { session: Uuid },

    /// Writing to the session's socket failed.
    #[error("session {session} socket write failed: {message}")]
    Socket { session: Uuid, message: String },
}

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failures: Vec<SendFailure>,
}

/// Active sessions keyed by id, each with its outbound text channel.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: Mutex<HashMap<Uuid, UnboundedSender<String>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, UnboundedSender<String>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new session and hand back the receiving end of its channel.
    pub fn add(&self) -> (Uuid, UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        (id, rx)
    }

    /// Returns whether the session was still registered.
    pub fn remove(&self, id: Uuid) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Queue `text` for every session. Closed sessions are reported and dropped.
    pub fn broadcast(&self, text: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        self.lock().retain(|id, tx| match tx.send(text.to_string()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(_) => {
                warn!(session = %id, "send failed, removing closed session");
                report.failures.push(SendFailure::Closed { session: *id });
                false
            }
        });
        report
    }
}
