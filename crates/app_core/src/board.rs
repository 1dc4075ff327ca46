//! Consumer-side thumbnail table.
//!
//! Holds one tile per file of the directory being browsed and applies
//! `thumbnail-update` events only while their session is current.

use crate::events::{EventReceiver, ThumbnailStatus, ThumbnailUpdate};
use crate::session::{SessionId, SessionManager};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub status: ThumbnailStatus,
    pub thumbnail_path: Option<String>,
    pub error: Option<String>,
}

impl Tile {
    fn loading() -> Self {
        Self {
            status: ThumbnailStatus::Loading,
            thumbnail_path: None,
            error: None,
        }
    }
}

pub struct ThumbnailBoard {
    sessions: Arc<SessionManager>,
    tiles: HashMap<String, Tile>,
}

impl ThumbnailBoard {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            tiles: HashMap::new(),
        }
    }

    /// Reset the table for a new directory listing
    pub fn begin<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tiles.clear();
        for path in paths {
            self.tiles.insert(path.into(), Tile::loading());
        }
    }

    /// Apply one update; returns false if it was stale and ignored
    pub fn apply(&mut self, update: ThumbnailUpdate) -> bool {
        if !self.sessions.is_current(update.session_id) {
            tracing::trace!(session = update.session_id, path = %update.path, "Stale update ignored");
            return false;
        }

        let tile = self.tiles.entry(update.path).or_insert_with(Tile::loading);
        // A terminal tile is never reopened by a late Loading
        if tile.status.is_terminal() && !update.status.is_terminal() {
            return false;
        }

        tile.status = update.status;
        tile.thumbnail_path = update.thumbnail_path;
        tile.error = update.error;
        true
    }

    /// Apply everything waiting on `rx`; returns how many updates took effect
    pub fn drain(&mut self, rx: &EventReceiver) -> usize {
        rx.try_iter().map(|u| self.apply(u)).filter(|&applied| applied).count()
    }

    pub fn status(&self, path: &str) -> Option<ThumbnailStatus> {
        self.tiles.get(path).map(|t| t.status)
    }

    pub fn thumbnail_path(&self, path: &str) -> Option<&str> {
        self.tiles.get(path)?.thumbnail_path.as_deref()
    }

    pub fn tile(&self, path: &str) -> Option<&Tile> {
        self.tiles.get(path)
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.sessions.current()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
