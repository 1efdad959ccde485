//! Error types for the cadenza-player crate.

use std::path::PathBuf;

use thiserror::Error;

/// Media could not be resolved into something the player can queue.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The media source path does not exist.
    #[error("Media not found: {0}")]
    NotFound(PathBuf),

    /// A directory was given but holds no playable files.
    #[error("No media files in {0}")]
    NoMedia(PathBuf),

    /// Listing the directory or writing the playlist failed.
    #[error("Media I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// All errors that can originate from player operations.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// Spawning the player failed or the process exited on its own.
    #[error("Process error: {0}")]
    Process(String),

    /// Connect, write or read on the control socket failed.
    #[error("Session error: {0}")]
    Session(#[from] std::io::Error),

    /// A command needs an open control connection and there is none.
    #[error("Player is not connected")]
    NotConnected,

    /// Volume outside 0–100. Nothing is sent.
    #[error("Volume {0} out of range (0-100)")]
    VolumeOutOfRange(i32),

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl PlayerError {
    /// Short error code used in log fields and HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PlayerError::Process(_) => "PROCESS_ERROR",
            PlayerError::Session(_) => "SESSION_ERROR",
            PlayerError::NotConnected => "NOT_CONNECTED",
            PlayerError::VolumeOutOfRange(_) => "VOLUME_OUT_OF_RANGE",
            PlayerError::Media(_) => "MEDIA_ERROR",
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, PlayerError>;
