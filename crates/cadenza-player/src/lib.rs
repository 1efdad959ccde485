//! cadenza-player: lifecycle and remote control of the external media player.
//!
//! A [`PlayerSession`] owns one player process and one line-oriented control
//! connection to it. Commands are serialized through the session, so it can
//! be shared behind an `Arc` by any number of trigger callbacks.
//!
//! ```rust,no_run
//! use cadenza_core::config::PlayerConfig;
//! use cadenza_player::{PlayerSession, VlcLauncher};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = PlayerConfig::default();
//!     let session = PlayerSession::new(config.clone(), Box::new(VlcLauncher::from_config(&config)));
//!
//!     session.start(Some("/music/morning.m3u")).await;
//!     session.play().await.ok();
//!     session.close().await;
//! }
//! ```

pub mod error;
pub mod playlist;
pub mod process;
pub mod protocol;
pub mod session;

pub use error::{MediaError, PlayerError, Result};
pub use playlist::{resolve_media, M3uPlaylistBuilder, PlaylistBuilder};
pub use process::{PlayerProcess, ProcessLauncher, VlcLauncher};
pub use protocol::Command;
pub use session::{PlayerSession, PlayerState, PlayerStatus};
