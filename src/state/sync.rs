//! Keeps a client's view of one session converged with the store.
//!
//! Change events are wake-ups only: they may be dropped, coalesced, or arrive
//! in any order. After every wake the follower re-reads the whole snapshot
//! and yields it only when it differs from the last one it handed out. A
//! timer re-check covers notifications that never arrive, and is all a
//! follower has left once the session's feed is gone.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use super::{AppState, SessionSnapshot, SnapshotFingerprint, SnapshotScope};
use crate::error::SessionResult;
use crate::notify::ChangeEvent;
use crate::types::SessionId;

pub struct SessionFollower {
    state: AppState,
    session_id: SessionId,
    scope: SnapshotScope,
    rx: Option<broadcast::Receiver<ChangeEvent>>,
    last: Option<SnapshotFingerprint>,
}

impl SessionFollower {
    /// Subscribes before anything is read, so no change between the first
    /// fetch and the first wait goes unnoticed
    pub async fn new(state: AppState, session_id: &str, scope: SnapshotScope) -> Self {
        let rx = state.notifier.subscribe(session_id).await;
        Self {
            state,
            session_id: session_id.to_string(),
            scope,
            rx,
            last: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Fetch the current snapshot regardless of what was yielded before
    pub async fn prime(&mut self) -> SessionResult<SessionSnapshot> {
        let snapshot = self.state.snapshot(&self.session_id, self.scope).await?;
        self.last = Some(snapshot.fingerprint());
        Ok(snapshot)
    }

    /// Wait for the next reason to re-read. Cancel-safe, so it can sit in a
    /// `tokio::select!` next to a socket.
    pub async fn changed(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            // No feed; poll, and pick the feed up if the session has one again
            tokio::time::sleep(self.state.poll_interval).await;
            self.rx = self.state.notifier.subscribe(&self.session_id).await;
            return;
        };
        match tokio::time::timeout(self.state.poll_interval, rx.recv()).await {
            Err(_) => {}
            Ok(Ok(_)) => self.drain(),
            Ok(Err(RecvError::Lagged(missed))) => {
                tracing::debug!(
                    "Follower of {} lagged by {} events",
                    self.session_id,
                    missed
                );
                self.drain();
            }
            Ok(Err(RecvError::Closed)) => {
                tracing::debug!("Change feed for {} closed", self.session_id);
                self.rx = self.state.notifier.subscribe(&self.session_id).await;
            }
        }
    }

    /// Fold any queued events into the wake we are already handling
    fn drain(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Re-read the session; `Some` only when it changed since the last yield
    pub async fn refresh(&mut self) -> SessionResult<Option<SessionSnapshot>> {
        let snapshot = self.state.snapshot(&self.session_id, self.scope).await?;
        let fingerprint = snapshot.fingerprint();
        if self.last == Some(fingerprint) {
            return Ok(None);
        }
        self.last = Some(fingerprint);
        Ok(Some(snapshot))
    }

    /// Wait for and return the next distinct snapshot
    pub async fn next(&mut self) -> SessionResult<SessionSnapshot> {
        loop {
            self.changed().await;
            if let Some(snapshot) = self.refresh().await? {
                return Ok(snapshot);
            }
        }
    }
}
