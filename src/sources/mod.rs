pub mod links;
pub mod resolver;
pub mod spotify;

pub use links::{InputKind, LinkMatcher, SpotifyResource};
pub use resolver::TrackResolver;
pub use spotify::SpotifyClient;
