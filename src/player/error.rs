use thiserror::Error;

/// Command failures shown to the user. `Display` is the reply text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MusicError {
    #[error("You aren't in a voice channel")]
    NotInVoice,
    #[error("Wasn't able to find the server you're in")]
    GuildNotFound,
    #[error("No song provided")]
    NoQuery,
    #[error("Nothing playing")]
    NothingPlaying,
    #[error("Couldn't find a video with the requested name")]
    NoResults,
    #[error("The audio node is unavailable, try again in a moment")]
    EngineUnavailable,
}
