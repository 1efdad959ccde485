//! Remote-control line protocol.
//!
//! Each command is a single newline-terminated line of text. The player may
//! answer with free-form text or not at all.

use std::fmt;

/// A command understood by the player's remote-control interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Append a file or playlist to the queue.
    Add(String),
    Play,
    Stop,
    /// Output volume, 0–100.
    Volume(u8),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Add(path) => write!(f, "add {path}"),
            Command::Play => f.write_str("play"),
            Command::Stop => f.write_str("stop"),
            Command::Volume(level) => write!(f, "volume {level}"),
        }
    }
}

impl Command {
    /// The exact bytes written to the socket.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_newline_terminated() {
        assert_eq!(Command::Play.to_line(), "play\n");
        assert_eq!(Command::Stop.to_line(), "stop\n");
        assert_eq!(Command::Volume(35).to_line(), "volume 35\n");
        assert_eq!(
            Command::Add("/music/A/A.m3u".to_string()).to_line(),
            "add /music/A/A.m3u\n"
        );
    }
}
