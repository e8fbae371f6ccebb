use crate::{common::types::UserId, engine::LoadedTrack};

/// A queued track. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub link: Option<String>,
    /// Engine-encoded payload handed back to the engine on play.
    pub encoded: String,
    pub requester: UserId,
}

impl Track {
    pub fn from_loaded(loaded: LoadedTrack, requester: UserId) -> Self {
        Self {
            title: loaded.info.title,
            link: loaded.info.uri,
            encoded: loaded.track,
            requester,
        }
    }
}
