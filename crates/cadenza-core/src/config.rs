use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PLAYER_HOST: &str = "127.0.0.1";
pub const DEFAULT_PLAYER_PORT: u16 = 44500;
pub const DEFAULT_HTTP_BIND: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const MAX_VOLUME: u8 = 100;

/// Top-level config (cadenza.toml + CADENZA_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenzaConfig {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// Smart outlets, addressed by their zero-based position in this list.
    #[serde(default)]
    pub outlets: Vec<OutletConfig>,
}

/// External player process and its remote-control listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Player executable, resolved through `PATH` when not absolute.
    pub binary: String,
    pub host: String,
    pub port: u16,
    /// Extra arguments placed before the media path.
    pub extra_args: Vec<String>,
    /// Volume applied right after playback starts. Values above 100 are clamped.
    pub default_volume: u8,
    /// Connection attempts made while waiting for the listener to come up.
    pub connect_attempts: u32,
    /// Delay before the first connection attempt; doubled after each failure.
    pub connect_backoff_ms: u64,
    pub connect_backoff_max_ms: u64,
    /// Bound on a single connect or write.
    pub io_timeout_ms: u64,
    /// How long to wait for an acknowledgement line after a command.
    pub ack_timeout_ms: u64,
    /// Start the player (without media) before the scheduler begins firing.
    pub launch_on_boot: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: "vlc".to_string(),
            host: DEFAULT_PLAYER_HOST.to_string(),
            port: DEFAULT_PLAYER_PORT,
            extra_args: Vec::new(),
            default_volume: MAX_VOLUME,
            connect_attempts: 10,
            connect_backoff_ms: 250,
            connect_backoff_max_ms: 2_000,
            io_timeout_ms: 2_000,
            ack_timeout_ms: 300,
            launch_on_boot: true,
        }
    }
}

impl PlayerConfig {
    /// `host:port` of the remote-control listener.
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn startup_volume(&self) -> u8 {
        self.default_volume.min(MAX_VOLUME)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory generated playlists are written to.
    pub playlist_dir: String,
    /// File extensions (without the dot) included in generated playlists.
    pub extensions: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            playlist_dir: format!("{}/playlists", home_dir()),
            extensions: vec!["mp3".to_string(), "mp4".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on trigger callbacks running at the same time.
    pub worker_pool_size: usize,
    pub tick_ms: u64,
    /// Minutes the timer replays after a stall before it starts skipping.
    pub max_catch_up_minutes: u32,
    /// How long shutdown waits for in-flight callbacks.
    pub shutdown_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
            tick_ms: 1_000,
            max_catch_up_minutes: 5,
            shutdown_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind")]
    pub bind: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
            port: default_http_port(),
        }
    }
}

/// A smart outlet switched by plain HTTP GET requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutletConfig {
    pub name: String,
    pub on_url: String,
    pub off_url: String,
}

fn home_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cadenza", home)
}
fn default_db_path() -> String {
    format!("{}/cadenza.db", home_dir())
}
fn default_http_bind() -> String {
    DEFAULT_HTTP_BIND.to_string()
}
fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

impl CadenzaConfig {
    /// Load config from a TOML file with CADENZA_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `CADENZA_CONFIG` env var
    ///   3. ~/.cadenza/cadenza.toml
    ///
    /// Nested keys use a double underscore: `CADENZA_PLAYER__PORT=44501`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("CADENZA_CONFIG").ok())
            .unwrap_or_else(default_config_path);
        tracing::debug!(%path, "loading config");

        let config: CadenzaConfig = Figment::from(Serialized::defaults(CadenzaConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CADENZA_").split("__"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    format!("{}/cadenza.toml", home_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.toml");
        let cfg = CadenzaConfig::load(path.to_str()).expect("load");
        assert_eq!(cfg.player.port, DEFAULT_PLAYER_PORT);
        assert_eq!(cfg.player.default_volume, 100);
        assert_eq!(cfg.scheduler.worker_pool_size, 4);
        assert!(cfg.outlets.is_empty());
    }

    #[test]
    fn toml_overrides_only_named_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cadenza.toml");
        fs::write(
            &path,
            r#"
            [player]
            port = 44600
            default_volume = 80

            [[outlets]]
            name = "amp"
            on_url = "http://10.0.0.5/relay/0?turn=on"
            off_url = "http://10.0.0.5/relay/0?turn=off"
            "#,
        )
        .expect("write");

        let cfg = CadenzaConfig::load(path.to_str()).expect("load");
        assert_eq!(cfg.player.port, 44600);
        assert_eq!(cfg.player.default_volume, 80);
        assert_eq!(cfg.player.host, DEFAULT_PLAYER_HOST);
        assert_eq!(cfg.player.connect_attempts, 10);
        assert_eq!(cfg.outlets.len(), 1);
        assert_eq!(cfg.outlets[0].name, "amp");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cadenza.toml");
        fs::write(&path, "[player]\nport = \"not a number\"\n").expect("write");
        let err = CadenzaConfig::load(path.to_str()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn startup_volume_is_clamped() {
        let cfg = PlayerConfig {
            default_volume: 250,
            ..PlayerConfig::default()
        };
        assert_eq!(cfg.startup_volume(), 100);
    }
}
