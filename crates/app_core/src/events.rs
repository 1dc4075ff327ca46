//! `thumbnail-update` events: scheduler -> UI

use crate::generator::GenerateOutcome;
use crate::session::SessionId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Event name seen by the frontend
pub const THUMBNAIL_UPDATE_EVENT: &str = "thumbnail-update";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailStatus {
    Loading,
    Ready,
    Error,
    Unsupported,
}

impl ThumbnailStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ThumbnailStatus::Loading)
    }
}

/// Per-file status transition, tagged with the session that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailUpdate {
    pub path: String,
    pub status: ThumbnailStatus,
    /// Set only when `status` is `Ready`
    pub thumbnail_path: Option<String>,
    pub session_id: SessionId,
    /// Reason for an `Error` status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ThumbnailUpdate {
    pub fn loading(path: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            path: path.into(),
            status: ThumbnailStatus::Loading,
            thumbnail_path: None,
            session_id,
            error: None,
        }
    }

    pub fn ready(path: impl Into<String>, thumbnail: &std::path::Path, session_id: SessionId) -> Self {
        Self {
            path: path.into(),
            status: ThumbnailStatus::Ready,
            thumbnail_path: Some(app_fs::normalize_separators(&thumbnail.to_string_lossy())),
            session_id,
            error: None,
        }
    }

    pub fn from_outcome(path: impl Into<String>, outcome: &GenerateOutcome, session_id: SessionId) -> Self {
        let path = path.into();
        match outcome {
            GenerateOutcome::Ready(thumbnail) => Self::ready(path, thumbnail, session_id),
            GenerateOutcome::Error(reason) => Self {
                path,
                status: ThumbnailStatus::Error,
                thumbnail_path: None,
                session_id,
                error: Some(reason.clone()),
            },
            GenerateOutcome::Unsupported => Self {
                path,
                status: ThumbnailStatus::Unsupported,
                thumbnail_path: None,
                session_id,
                error: None,
            },
        }
    }
}

/// Publishing half of the event channel; cheap to clone
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: Sender<ThumbnailUpdate>,
}

impl EventPublisher {
    /// Publish an update. With no receiver left the update is dropped.
    pub fn publish(&self, update: ThumbnailUpdate) {
        if self.tx.send(update).is_err() {
            tracing::trace!("No event receiver; update dropped");
        }
    }
}

pub type EventReceiver = Receiver<ThumbnailUpdate>;

/// Create an unbounded event channel
pub fn event_channel() -> (EventPublisher, EventReceiver) {
    let (tx, rx) = unbounded();
    (EventPublisher { tx }, rx)
}
