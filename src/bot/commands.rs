/// A recognised music command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Play(&'a str),
    Skip,
    Clear,
    Shuffle,
    Loop,
    Queue,
}

impl<'a> Command<'a> {
    /// Parses `content` if it starts with `prefix` and names a known command.
    pub fn parse(prefix: &str, content: &'a str) -> Option<Self> {
        let rest = content.trim_start().strip_prefix(prefix)?;
        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "play" | "p" => Some(Self::Play(args)),
            "skip" | "next" => Some(Self::Skip),
            "clear" | "stop" => Some(Self::Clear),
            "shuffle" | "mix" => Some(Self::Shuffle),
            "loop" => Some(Self::Loop),
            "queue" | "q" => Some(Self::Queue),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Play(_) => "play",
            Self::Skip => "skip",
            Self::Clear => "clear",
            Self::Shuffle => "shuffle",
            Self::Loop => "loop",
            Self::Queue => "queue",
        }
    }
}
