//! Launching and terminating the external player process.
//!
//! [`ProcessLauncher`] is the seam between [`crate::PlayerSession`] and the
//! operating system, so the session state machine can be driven against a
//! stand-in listener without spawning a real player.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use cadenza_core::config::PlayerConfig;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{PlayerError, Result};

/// Spawns a player whose remote-control listener binds `control_addr`.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, control_addr: &str, media: Option<&str>) -> Result<Box<dyn PlayerProcess>>;
}

/// A running player process owned by the session.
#[async_trait]
pub trait PlayerProcess: Send {
    fn pid(&self) -> Option<u32>;

    /// `false` once the process has exited.
    fn is_alive(&mut self) -> bool;

    /// Kill the process and reap it, waiting at most `grace`.
    async fn terminate(&mut self, grace: Duration);
}

/// Launches VLC with its `rc` remote-control interface.
pub struct VlcLauncher {
    binary: String,
    extra_args: Vec<String>,
}

impl VlcLauncher {
    pub fn new(binary: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            extra_args,
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(config.binary.clone(), config.extra_args.clone())
    }

    /// Full argument list passed to the binary.
    pub fn args(&self, control_addr: &str, media: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "--intf".to_string(),
            "rc".to_string(),
            "--rc-host".to_string(),
            control_addr.to_string(),
            "--verbose".to_string(),
            "2".to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        if let Some(media) = media {
            args.push(media.to_string());
        }
        args
    }
}

impl ProcessLauncher for VlcLauncher {
    fn launch(&self, control_addr: &str, media: Option<&str>) -> Result<Box<dyn PlayerProcess>> {
        let args = self.args(control_addr, media);
        debug!(binary = %self.binary, ?args, "spawning player");

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlayerError::Process(format!("spawn {} failed: {e}", self.binary)))?;

        Ok(Box::new(ChildProcess { child }))
    }
}

/// A spawned OS process. Dropping it kills the child.
struct ChildProcess {
    child: Child,
}

#[async_trait]
impl PlayerProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn terminate(&mut self, grace: Duration) {
        if !self.is_alive() {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            warn!("failed to signal player process: {e}");
        }
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "player process reaped"),
            Ok(Err(e)) => warn!("waiting for player process failed: {e}"),
            Err(_) => warn!(grace_ms = grace.as_millis() as u64, "player process did not exit in time"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_select_rc_interface_and_media_last() {
        let launcher = VlcLauncher::new("vlc", vec!["--no-video".to_string()]);
        let args = launcher.args("127.0.0.1:44500", Some("/music/A.m3u"));
        assert_eq!(
            args,
            vec![
                "--intf",
                "rc",
                "--rc-host",
                "127.0.0.1:44500",
                "--verbose",
                "2",
                "--no-video",
                "/music/A.m3u",
            ]
        );
    }

    #[test]
    fn args_without_media() {
        let launcher = VlcLauncher::new("vlc", Vec::new());
        let args = launcher.args("127.0.0.1:44500", None);
        assert_eq!(args.last().map(String::as_str), Some("2"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_process_error() {
        let launcher = VlcLauncher::new("/nonexistent/cadenza-player-binary", Vec::new());
        let err = launcher.launch("127.0.0.1:1", None).err().expect("spawn must fail");
        assert_eq!(err.code(), "PROCESS_ERROR");
    }
}
