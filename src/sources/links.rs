use regex::Regex;

/// A Spotify resource parsed out of a share link or URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotifyResource {
    Track(String),
    Album(String),
    Playlist(String),
}

/// What kind of input the resolver was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// A YouTube or SoundCloud link the engine can load directly.
    Direct,
    /// A YouTube short, which the engine cannot play.
    Short,
    Spotify(SpotifyResource),
    /// A URL of some other host.
    UnsupportedLink,
    /// Free text.
    Query,
}

pub struct LinkMatcher {
    youtube: Regex,
    soundcloud: Regex,
    spotify: Regex,
    url: Regex,
}

impl LinkMatcher {
    pub fn new() -> Self {
        Self {
            youtube: Regex::new(
                r"^((?:https?:)?//)?((?:www|m)\.)?((?:youtube(-nocookie)?\.com|youtu\.be))(/(?:[\w\-]+\?v=|embed/|v/)?)([\w\-]+)(\S+)?$",
            )
            .unwrap(),
            soundcloud: Regex::new(r"^(?:(https?)://)?(?:(?:www|m)\.)?(soundcloud\.com|snd\.sc)/(.*)$")
                .unwrap(),
            spotify: Regex::new(
                r"(?:https?://open\.spotify\.com/(?:intl-[a-z]{2}/)?(track|album|playlist)/([A-Za-z0-9]+)|spotify:(track|album|playlist):([A-Za-z0-9]+))",
            )
            .unwrap(),
            url: Regex::new(
                r"(?i)^(https?://)?((([a-z\d]([a-z\d-]*[a-z\d])*)\.)+[a-z]{2,}|((\d{1,3}\.){3}\d{1,3}))(:\d+)?(/[-a-z\d%_.~+]*)*(\?[;&a-z\d%_.~+=-]*)?(#[-a-z\d_]*)?$",
            )
            .unwrap(),
        }
    }

    /// Loose URL check: optional scheme, a domain or IPv4 host, then optional
    /// port, path, query and fragment.
    pub fn is_url(&self, input: &str) -> bool {
        self.url.is_match(input)
    }

    pub fn classify(&self, input: &str) -> InputKind {
        if self.youtube.is_match(input) || self.soundcloud.is_match(input) {
            if input.contains("/shorts/") {
                return InputKind::Short;
            }
            return InputKind::Direct;
        }

        if let Some(caps) = self.spotify.captures(input) {
            let kind = caps.get(1).or_else(|| caps.get(3)).map(|m| m.as_str());
            let id = caps.get(2).or_else(|| caps.get(4)).map(|m| m.as_str().to_string());
            match (kind, id) {
                (Some("track"), Some(id)) => return InputKind::Spotify(SpotifyResource::Track(id)),
                (Some("album"), Some(id)) => return InputKind::Spotify(SpotifyResource::Album(id)),
                (Some("playlist"), Some(id)) => {
                    return InputKind::Spotify(SpotifyResource::Playlist(id));
                }
                _ => {}
            }
        }

        if self.is_url(input) {
            InputKind::UnsupportedLink
        } else {
            InputKind::Query
        }
    }
}

impl Default for LinkMatcher {
    fn default() -> Self {
        Self::new()
    }
}
