//! Per-session change notifications.
//!
//! Delivery is best effort: events for different entities carry no ordering
//! guarantee and a slow subscriber may miss intermediate events entirely
//! (it sees `Lagged`). Subscribers must treat every event as "something
//! changed, re-read" and never as state.
//!
//! A feed lives exactly as long as its session: it is opened when the session
//! is created and removed when it is closed. Subscribing never brings one back.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use crate::types::SessionId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Session,
    Answer,
    Players,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub session_id: SessionId,
    pub kind: ChangeKind,
}

pub struct ChangeNotifier {
    channels: RwLock<HashMap<SessionId, broadcast::Sender<ChangeEvent>>>,
    capacity: usize,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Create the feed for a new session
    pub async fn open(&self, session_id: &str) {
        self.channels
            .write()
            .await
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
    }

    /// Subscribe to one session's feed; `None` once the feed is closed or was never opened
    pub async fn subscribe(&self, session_id: &str) -> Option<broadcast::Receiver<ChangeEvent>> {
        self.channels
            .read()
            .await
            .get(session_id)
            .map(|tx| tx.subscribe())
    }

    /// Signal subscribers of a session. Returns how many receivers were reached.
    pub async fn notify(&self, session_id: &str, kind: ChangeKind) -> usize {
        let channels = self.channels.read().await;
        let Some(tx) = channels.get(session_id) else {
            return 0;
        };
        // No receivers connected is fine
        tx.send(ChangeEvent {
            session_id: session_id.to_string(),
            kind,
        })
        .unwrap_or(0)
    }

    /// Drop a session's feed; open receivers observe `Closed`
    pub async fn close(&self, session_id: &str) {
        if self.channels.write().await.remove(session_id).is_some() {
            tracing::debug!("Closed change feed for session {}", session_id);
        }
    }

    pub async fn is_open(&self, session_id: &str) -> bool {
        self.channels.read().await.contains_key(session_id)
    }

    pub async fn subscriber_count(&self, session_id: &str) -> usize {
        self.channels
            .read()
            .await
            .get(session_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}
