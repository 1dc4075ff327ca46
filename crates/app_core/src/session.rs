//! Browse sessions: monotonically increasing ids with cooperative cancellation

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Identifier of one "browse this directory" request
pub type SessionId = u64;

/// Shared flag telling workers to stop picking up new files
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is already cancelled
    pub fn cancelled() -> Self {
        let token = Self::new();
        token.cancel();
        token
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct ActiveSession {
    id: SessionId,
    directory: String,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct SessionState {
    /// Highest id ever issued or adopted
    last: SessionId,
    current: Option<ActiveSession>,
}

/// Issues session ids and tracks which one is current.
///
/// Superseding a session cancels its token; it can never become current
/// again.
#[derive(Debug, Default)]
pub struct SessionManager {
    state: Mutex<SessionState>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new id, strictly greater than any before, and make it current
    pub fn start_session(&self, directory: &str) -> SessionId {
        let mut state = self.state.lock();
        let id = state.last + 1;
        Self::promote(&mut state, id, directory);
        id
    }

    /// Accept an id minted elsewhere (e.g. by the frontend).
    ///
    /// The current session gets its own token back; an id newer than
    /// everything seen becomes current; an older one is already superseded
    /// and gets a cancelled token.
    pub fn adopt(&self, id: SessionId, directory: &str) -> CancellationToken {
        let mut state = self.state.lock();

        if let Some(current) = state.current.as_ref().filter(|c| c.id == id) {
            return current.token.clone();
        }

        if id > state.last {
            return Self::promote(&mut state, id, directory);
        }

        tracing::debug!(session = id, "Request for superseded session");
        CancellationToken::cancelled()
    }

    fn promote(state: &mut SessionState, id: SessionId, directory: &str) -> CancellationToken {
        if let Some(previous) = state.current.take() {
            previous.token.cancel();
            tracing::debug!(
                session = previous.id,
                directory = %previous.directory,
                "Session superseded"
            );
        }

        let token = CancellationToken::new();
        state.last = id;
        state.current = Some(ActiveSession {
            id,
            directory: directory.to_string(),
            token: token.clone(),
        });

        tracing::info!(session = id, directory = %directory, "Session started");
        token
    }

    pub fn is_current(&self, id: SessionId) -> bool {
        self.state.lock().current.as_ref().is_some_and(|c| c.id == id)
    }

    pub fn current(&self) -> Option<SessionId> {
        self.state.lock().current.as_ref().map(|c| c.id)
    }

    pub fn current_directory(&self) -> Option<String> {
        self.state.lock().current.as_ref().map(|c| c.directory.clone())
    }

    /// Token of `id` if it is current
    pub fn token(&self, id: SessionId) -> Option<CancellationToken> {
        self.state
            .lock()
            .current
            .as_ref()
            .filter(|c| c.id == id)
            .map(|c| c.token.clone())
    }
}
