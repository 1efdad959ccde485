//! `PlayerSession`: the single point of control over the external player
//! process and its remote-control connection.
//!
//! Every public method takes the internal lock for its whole duration, so a
//! start and a stop landing in the same tick can never interleave socket
//! writes. Any connect or send failure moves the session to `Failed`, releases
//! the socket and the process, and leaves it in `Stopped`.

use std::io;
use std::time::Duration;

use cadenza_core::config::PlayerConfig;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{PlayerError, Result};
use crate::process::{PlayerProcess, ProcessLauncher};
use crate::protocol::Command;

const ACK_BUF_LEN: usize = 1024;

/// Lifecycle of the player session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Stopped,
    Starting,
    Connected,
    Playing,
    Failed,
}

/// Point-in-time view of the session for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub pid: Option<u32>,
    pub control_addr: String,
    pub last_error: Option<String>,
}

struct Inner {
    state: PlayerState,
    process: Option<Box<dyn PlayerProcess>>,
    socket: Option<TcpStream>,
    last_error: Option<String>,
}

impl Inner {
    fn transition(&mut self, next: PlayerState) {
        if self.state != next {
            info!(from = ?self.state, to = ?next, "player state");
            self.state = next;
        }
    }

    fn process_alive(&mut self) -> bool {
        self.process.as_mut().is_some_and(|p| p.is_alive())
    }
}

pub struct PlayerSession {
    config: PlayerConfig,
    launcher: Box<dyn ProcessLauncher>,
    inner: Mutex<Inner>,
}

impl PlayerSession {
    pub fn new(config: PlayerConfig, launcher: Box<dyn ProcessLauncher>) -> Self {
        Self {
            config,
            launcher,
            inner: Mutex::new(Inner {
                state: PlayerState::Stopped,
                process: None,
                socket: None,
                last_error: None,
            }),
        }
    }

    pub async fn state(&self) -> PlayerState {
        self.inner.lock().await.state
    }

    pub async fn is_playing(&self) -> bool {
        self.state().await == PlayerState::Playing
    }

    /// `true` while the player process is alive.
    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.process_alive()
    }

    pub async fn status(&self) -> PlayerStatus {
        let inner = self.inner.lock().await;
        PlayerStatus {
            state: inner.state,
            pid: inner.process.as_ref().and_then(|p| p.pid()),
            control_addr: self.config.control_addr(),
            last_error: inner.last_error.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Spawn the player (optionally pre-loading `media`) and connect to its
    /// control listener.
    ///
    /// Failures are logged and recorded in [`PlayerStatus::last_error`]; the
    /// returned state tells the caller where the session ended up.
    pub async fn start(&self, media: Option<&str>) -> PlayerState {
        let mut inner = self.inner.lock().await;
        if inner.process_alive() {
            warn!("player is already running");
            return inner.state;
        }
        self.start_locked(&mut inner, media).await
    }

    /// Queue `media` on the running player, or start one with it preloaded.
    ///
    /// The liveness check and the action share one lock, so of two
    /// concurrent callers exactly one starts the process and the other
    /// queues onto it.
    pub async fn start_or_queue(&self, media: &str) -> Result<PlayerState> {
        let mut inner = self.inner.lock().await;
        if !inner.process_alive() {
            return Ok(self.start_locked(&mut inner, Some(media)).await);
        }
        if inner.socket.is_none() {
            warn!(path = media, "add ignored: player is not connected");
        } else {
            self.send_locked(&mut inner, &Command::Add(media.to_string()))
                .await?;
        }
        Ok(inner.state)
    }

    /// (Re)connect to the control listener of the running process.
    pub async fn connect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.socket.is_some() {
            return Ok(());
        }
        if !inner.process_alive() {
            return Err(PlayerError::Process("player process is not running".to_string()));
        }
        if let Err(e) = self.connect_locked(&mut inner).await {
            self.fail(&mut inner, &e).await;
            return Err(e);
        }
        Ok(())
    }

    /// Release the socket and the process. Safe to call in any state, any
    /// number of times.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if inner.socket.is_none() && inner.process.is_none() {
            debug!("player session already closed");
            inner.transition(PlayerState::Stopped);
            return;
        }
        self.release(&mut inner).await;
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Send a raw command and return the player's acknowledgement, if any.
    pub async fn send(&self, command: Command) -> Result<Option<String>> {
        let mut inner = self.inner.lock().await;
        self.send_locked(&mut inner, &command).await
    }

    /// Queue a file or playlist. A no-op when there is no control connection.
    pub async fn add_to_queue(&self, path: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.socket.is_none() {
            warn!(path, "add ignored: player is not connected");
            return Ok(());
        }
        self.send_locked(&mut inner, &Command::Add(path.to_string()))
            .await
            .map(|_| ())
    }

    /// Start playback and apply the startup volume. Does nothing when already
    /// playing.
    pub async fn play(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == PlayerState::Playing {
            debug!("play ignored: already playing");
            return Ok(());
        }
        if inner.socket.is_none() {
            warn!(state = ?inner.state, "play ignored: player is not connected");
            return Err(PlayerError::NotConnected);
        }

        self.send_locked(&mut inner, &Command::Play).await?;
        inner.transition(PlayerState::Playing);

        let volume = self.config.startup_volume();
        self.send_locked(&mut inner, &Command::Volume(volume)).await?;
        Ok(())
    }

    /// Stop playback. Does nothing unless currently playing.
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != PlayerState::Playing {
            info!(state = ?inner.state, "stop ignored: nothing is playing");
            return Ok(());
        }
        self.send_locked(&mut inner, &Command::Stop).await?;
        inner.transition(PlayerState::Connected);
        Ok(())
    }

    /// Set the output volume. Levels outside 0–100 are rejected before any
    /// state is touched.
    pub async fn set_volume(&self, level: i32) -> Result<()> {
        let level = match u8::try_from(level) {
            Ok(v) if v <= 100 => v,
            _ => {
                warn!(level, "volume rejected: must be between 0 and 100");
                return Err(PlayerError::VolumeOutOfRange(level));
            }
        };
        let mut inner = self.inner.lock().await;
        self.send_locked(&mut inner, &Command::Volume(level))
            .await
            .map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Internal helpers (caller holds the lock)
    // -----------------------------------------------------------------------

    async fn start_locked(&self, inner: &mut Inner, media: Option<&str>) -> PlayerState {
        // Leftovers from a process that exited on its own.
        self.release(inner).await;
        inner.transition(PlayerState::Starting);

        let addr = self.config.control_addr();
        match self.launcher.launch(&addr, media) {
            Ok(process) => {
                info!(pid = ?process.pid(), %addr, media = ?media, "player process spawned");
                inner.process = Some(process);
            }
            Err(e) => {
                self.fail(inner, &e).await;
                return inner.state;
            }
        }

        if let Err(e) = self.connect_locked(inner).await {
            self.fail(inner, &e).await;
        }
        inner.state
    }

    /// Bounded retry-connect: the process needs an unknown amount of time
    /// before its listener accepts connections.
    async fn connect_locked(&self, inner: &mut Inner) -> Result<()> {
        let addr = self.config.control_addr();
        let attempts = self.config.connect_attempts.max(1);
        let io_timeout = Duration::from_millis(self.config.io_timeout_ms);
        let max_delay = Duration::from_millis(
            self.config
                .connect_backoff_max_ms
                .max(self.config.connect_backoff_ms),
        );
        let mut delay = Duration::from_millis(self.config.connect_backoff_ms);
        let mut last_err: Option<io::Error> = None;

        for attempt in 1..=attempts {
            tokio::time::sleep(delay).await;

            if !inner.process_alive() {
                return Err(PlayerError::Process(
                    "player process exited before its control listener came up".to_string(),
                ));
            }

            match tokio::time::timeout(io_timeout, TcpStream::connect(&addr)).await {
                Ok(Ok(stream)) => {
                    info!(%addr, attempt, "connected to player control listener");
                    inner.socket = Some(stream);
                    inner.transition(PlayerState::Connected);
                    inner.last_error = None;

                    // Greeting banner, if the player prints one.
                    if let Some(socket) = inner.socket.as_mut() {
                        if let Some(banner) = read_ack(socket, self.ack_timeout()).await? {
                            debug!(banner = %banner.trim(), "player greeting");
                        }
                    }
                    return Ok(());
                }
                Ok(Err(e)) => {
                    debug!(%addr, attempt, error = %e, "control listener not ready");
                    last_err = Some(e);
                }
                Err(_) => {
                    debug!(%addr, attempt, "connect timed out");
                    last_err = Some(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
                }
            }

            delay = (delay * 2).min(max_delay);
        }

        warn!(%addr, attempts, "giving up on player control listener");
        Err(PlayerError::Session(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "no connection attempt made")
        })))
    }

    async fn send_locked(&self, inner: &mut Inner, command: &Command) -> Result<Option<String>> {
        let outcome = {
            let Some(socket) = inner.socket.as_mut() else {
                return Err(PlayerError::NotConnected);
            };
            exchange(
                socket,
                command,
                Duration::from_millis(self.config.io_timeout_ms),
                self.ack_timeout(),
            )
            .await
        };

        match outcome {
            Ok(ack) => {
                info!(%command, "sent player command");
                if let Some(ref text) = ack {
                    debug!(%command, ack = %text.trim(), "player response");
                }
                Ok(ack)
            }
            Err(e) => {
                let err = PlayerError::Session(e);
                self.fail(inner, &err).await;
                Err(err)
            }
        }
    }

    async fn fail(&self, inner: &mut Inner, err: &PlayerError) {
        inner.transition(PlayerState::Failed);
        error!(code = err.code(), error = %err, "player session failed");
        inner.last_error = Some(err.to_string());
        self.release(inner).await;
    }

    async fn release(&self, inner: &mut Inner) {
        if let Some(mut socket) = inner.socket.take() {
            let _ = socket.shutdown().await;
            info!("player control connection closed");
        }
        if let Some(mut process) = inner.process.take() {
            let pid = process.pid();
            process
                .terminate(Duration::from_millis(self.config.io_timeout_ms))
                .await;
            info!(pid = ?pid, "player process terminated");
        }
        inner.transition(PlayerState::Stopped);
    }

    fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.config.ack_timeout_ms)
    }
}

/// Write one command line and collect whatever the player answers within
/// `ack_timeout`.
async fn exchange(
    socket: &mut TcpStream,
    command: &Command,
    io_timeout: Duration,
    ack_timeout: Duration,
) -> io::Result<Option<String>> {
    let line = command.to_line();
    match tokio::time::timeout(io_timeout, socket.write_all(line.as_bytes())).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out"));
        }
    }
    read_ack(socket, ack_timeout).await
}

/// `Ok(None)` when the player stays silent; an error when it hung up.
async fn read_ack(socket: &mut TcpStream, ack_timeout: Duration) -> io::Result<Option<String>> {
    let mut buf = [0u8; ACK_BUF_LEN];
    match tokio::time::timeout(ack_timeout, socket.read(&mut buf)).await {
        Err(_) => Ok(None),
        Ok(Ok(0)) => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "player closed the control connection",
        )),
        Ok(Ok(n)) => Ok(Some(String::from_utf8_lossy(&buf[..n]).into_owned())),
        Ok(Err(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use async_trait::async_trait;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    /// Launcher that spawns nothing; the test owns the "listener".
    #[derive(Clone, Default)]
    struct FakeLauncher {
        launches: Arc<AtomicUsize>,
        terminations: Arc<AtomicUsize>,
        fail_spawn: bool,
    }

    struct FakeProcess {
        alive: Arc<AtomicBool>,
        terminations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PlayerProcess for FakeProcess {
        fn pid(&self) -> Option<u32> {
            Some(4242)
        }
        fn is_alive(&mut self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
        async fn terminate(&mut self, _grace: Duration) {
            self.alive.store(false, Ordering::SeqCst);
            self.terminations.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ProcessLauncher for FakeLauncher {
        fn launch(&self, _addr: &str, _media: Option<&str>) -> Result<Box<dyn PlayerProcess>> {
            if self.fail_spawn {
                return Err(PlayerError::Process("spawn refused".to_string()));
            }
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeProcess {
                alive: Arc::new(AtomicBool::new(true)),
                terminations: Arc::clone(&self.terminations),
            }))
        }
    }

    fn test_config(port: u16) -> PlayerConfig {
        PlayerConfig {
            port,
            connect_attempts: 3,
            connect_backoff_ms: 5,
            connect_backoff_max_ms: 20,
            io_timeout_ms: 500,
            ack_timeout_ms: 20,
            default_volume: 100,
            ..PlayerConfig::default()
        }
    }

    /// Accepts one connection and records every received line until EOF.
    async fn recording_listener() -> (u16, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut lines = BufReader::new(stream).lines();
            let mut received = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                received.push(line);
            }
            received
        });
        (port, handle)
    }

    async fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        listener.local_addr().expect("addr").port()
    }

    fn session(port: u16, launcher: &FakeLauncher) -> PlayerSession {
        PlayerSession::new(test_config(port), Box::new(launcher.clone()))
    }

    #[tokio::test]
    async fn start_connects() {
        let (port, server) = recording_listener().await;
        let launcher = FakeLauncher::default();
        let s = session(port, &launcher);

        assert_eq!(s.start(None).await, PlayerState::Connected);
        assert!(s.is_running().await);
        assert_eq!(s.status().await.pid, Some(4242));

        s.close().await;
        assert!(server.await.expect("server").is_empty());
    }

    #[tokio::test]
    async fn play_twice_sends_one_play() {
        let (port, server) = recording_listener().await;
        let launcher = FakeLauncher::default();
        let s = session(port, &launcher);
        s.start(None).await;

        s.play().await.expect("first play");
        s.play().await.expect("second play");
        assert!(s.is_playing().await);

        s.close().await;
        let lines = server.await.expect("server");
        assert_eq!(lines, vec!["play", "volume 100"]);
    }

    #[tokio::test]
    async fn stop_after_play_returns_to_connected() {
        let (port, server) = recording_listener().await;
        let launcher = FakeLauncher::default();
        let s = session(port, &launcher);
        s.start(None).await;

        s.play().await.expect("play");
        s.stop().await.expect("stop");
        s.stop().await.expect("second stop is a no-op");
        assert_eq!(s.state().await, PlayerState::Connected);

        s.close().await;
        let lines = server.await.expect("server");
        assert_eq!(lines, vec!["play", "volume 100", "stop"]);
    }

    #[tokio::test]
    async fn set_volume_bounds() {
        let (port, server) = recording_listener().await;
        let launcher = FakeLauncher::default();
        let s = session(port, &launcher);
        s.start(None).await;

        assert!(matches!(
            s.set_volume(-1).await,
            Err(PlayerError::VolumeOutOfRange(-1))
        ));
        assert!(matches!(
            s.set_volume(101).await,
            Err(PlayerError::VolumeOutOfRange(101))
        ));
        assert_eq!(s.state().await, PlayerState::Connected);
        s.set_volume(0).await.expect("0 is valid");
        s.set_volume(100).await.expect("100 is valid");

        s.close().await;
        let lines = server.await.expect("server");
        assert_eq!(lines, vec!["volume 0", "volume 100"]);
    }

    #[tokio::test]
    async fn add_queues_path() {
        let (port, server) = recording_listener().await;
        let launcher = FakeLauncher::default();
        let s = session(port, &launcher);
        s.start(None).await;

        s.add_to_queue("/music/A.m3u").await.expect("add");

        s.close().await;
        assert_eq!(server.await.expect("server"), vec!["add /music/A.m3u"]);
    }

    #[tokio::test]
    async fn concurrent_start_or_queue_launches_once() {
        let (port, server) = recording_listener().await;
        let launcher = FakeLauncher::default();
        let s = session(port, &launcher);

        let (a, b) = tokio::join!(
            s.start_or_queue("/music/A.m3u"),
            s.start_or_queue("/music/B.m3u")
        );
        assert_eq!(a.expect("first"), PlayerState::Connected);
        assert_eq!(b.expect("second"), PlayerState::Connected);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);

        s.close().await;
        let lines = server.await.expect("server");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("add /music/"));
    }

    #[tokio::test]
    async fn start_or_queue_spawn_failure_reports_state() {
        let launcher = FakeLauncher {
            fail_spawn: true,
            ..FakeLauncher::default()
        };
        let s = session(unused_port().await, &launcher);
        let state = s.start_or_queue("/music/A.m3u").await.expect("state");
        assert_eq!(state, PlayerState::Stopped);
        assert!(s.status().await.last_error.is_some());
    }

    #[tokio::test]
    async fn stop_when_stopped_sends_nothing() {
        let launcher = FakeLauncher::default();
        let s = session(unused_port().await, &launcher);

        s.stop().await.expect("no-op");
        assert_eq!(s.state().await, PlayerState::Stopped);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn add_without_connection_is_a_noop() {
        let launcher = FakeLauncher::default();
        let s = session(unused_port().await, &launcher);
        s.add_to_queue("/music/A.m3u").await.expect("no-op");
        assert_eq!(s.state().await, PlayerState::Stopped);
    }

    #[tokio::test]
    async fn play_without_connection_is_rejected() {
        let launcher = FakeLauncher::default();
        let s = session(unused_port().await, &launcher);
        assert!(matches!(s.play().await, Err(PlayerError::NotConnected)));
        assert_eq!(s.state().await, PlayerState::Stopped);
    }

    #[tokio::test]
    async fn unreachable_listener_ends_stopped_and_releases_process() {
        let launcher = FakeLauncher::default();
        let s = session(unused_port().await, &launcher);

        assert_eq!(s.start(None).await, PlayerState::Stopped);
        assert!(!s.is_running().await);
        assert_eq!(launcher.terminations.load(Ordering::SeqCst), 1);
        assert!(s.status().await.last_error.is_some());
    }

    #[tokio::test]
    async fn spawn_failure_ends_stopped() {
        let launcher = FakeLauncher {
            fail_spawn: true,
            ..FakeLauncher::default()
        };
        let s = session(unused_port().await, &launcher);
        assert_eq!(s.start(Some("/music/A.m3u")).await, PlayerState::Stopped);
        let status = s.status().await;
        assert!(status.last_error.expect("recorded").contains("spawn refused"));
    }

    #[tokio::test]
    async fn send_failure_closes_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let (hangup_tx, hangup_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let _ = hangup_rx.await;
            drop(stream);
        });

        let launcher = FakeLauncher::default();
        let s = session(port, &launcher);
        assert_eq!(s.start(None).await, PlayerState::Connected);

        hangup_tx.send(()).expect("signal");
        server.await.expect("server");

        let err = s.play().await.expect_err("peer is gone");
        assert_eq!(err.code(), "SESSION_ERROR");
        assert_eq!(s.state().await, PlayerState::Stopped);
        assert!(!s.is_running().await);
        assert_eq!(launcher.terminations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_while_running_is_a_noop() {
        let (port, server) = recording_listener().await;
        let launcher = FakeLauncher::default();
        let s = session(port, &launcher);

        s.start(None).await;
        assert_eq!(s.start(None).await, PlayerState::Connected);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);

        s.close().await;
        server.await.expect("server");
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (port, server) = recording_listener().await;
        let launcher = FakeLauncher::default();
        let s = session(port, &launcher);
        s.start(None).await;

        s.close().await;
        s.close().await;
        assert_eq!(s.state().await, PlayerState::Stopped);
        assert_eq!(launcher.terminations.load(Ordering::SeqCst), 1);
        server.await.expect("server");
    }
}
