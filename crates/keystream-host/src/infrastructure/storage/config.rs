//! TOML configuration for the host daemon.
//!
//! Read from an explicit `--config` path, or from the platform config
//! directory:
//! - Linux:   `$XDG_CONFIG_HOME/keystream/config.toml` (or `~/.config/...`)
//! - Windows: `%APPDATA%\keystream\config.toml`
//! - macOS:   `~/Library/Application Support/keystream/config.toml`
//!
//! A missing file yields the defaults; a partial file fills the gaps from
//! them.
//!
//! ```toml
//! [server]
//! bind_address = "127.0.0.1"
//! port = 8000
//!
//! [capture]
//! initial_delay_ms = 400
//!
//! [overlay]
//! capture_command = ["grim", "{path}"]
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use keystream_core::KeyName;

use crate::application::classify_input::ToggleChord;
use crate::application::repeat_timers::RepeatSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid bind address `{0}`")]
    BindAddress(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub capture: CaptureConfig,
    pub broadcast: BroadcastConfig,
    pub overlay: OverlayConfig,
    pub logging: LoggingConfig,
}

/// Observer endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// URL path observers connect to.
    #[serde(default = "default_path")]
    pub path: String,
}

/// Repeat timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_repeat_interval_ms")]
    pub repeat_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BroadcastConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on one send to one observer before it is dropped.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

/// Overlay toggle chord and the external programs behind it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlayConfig {
    #[serde(default = "default_toggle_key")]
    pub toggle_key: String,
    /// Keys that must be held when `toggle_key` goes down.
    #[serde(default = "default_toggle_chord")]
    pub toggle_chord: Vec<String>,
    #[serde(default = "default_screenshot_path")]
    pub screenshot_path: PathBuf,
    #[serde(default = "default_border_width")]
    pub border_width: u32,
    #[serde(default = "default_border_color")]
    pub border_color: [u8; 3],
    /// Screenshot program; `{path}` is replaced by the output file.
    #[serde(default = "default_capture_command")]
    pub capture_command: Vec<String>,
    /// Fullscreen image viewer; `{path}` is replaced by the image file.
    #[serde(default = "default_viewer_command")]
    pub viewer_command: Vec<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `"info"` or `"keystream_host=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; stderr only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_path() -> String {
    "/ws".to_string()
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_repeat_interval_ms() -> u64 {
    100
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_send_timeout_ms() -> u64 {
    1000
}
fn default_toggle_key() -> String {
    "right".to_string()
}
fn default_toggle_chord() -> Vec<String> {
    vec!["ctrl".to_string(), "space".to_string()]
}
fn default_screenshot_path() -> PathBuf {
    PathBuf::from("screenshot_with_border.png")
}
fn default_border_width() -> u32 {
    10
}
fn default_border_color() -> [u8; 3] {
    [255, 165, 0]
}
fn default_capture_command() -> Vec<String> {
    ["scrot", "--overwrite", "{path}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_viewer_command() -> Vec<String> {
    ["feh", "--fullscreen", "--hide-pointer", "{path}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_close_timeout_ms() -> u64 {
    2000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            path: default_path(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            repeat_interval_ms: default_repeat_interval_ms(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            toggle_key: default_toggle_key(),
            toggle_chord: default_toggle_chord(),
            screenshot_path: default_screenshot_path(),
            border_width: default_border_width(),
            border_color: default_border_color(),
            capture_command: default_capture_command(),
            viewer_command: default_viewer_command(),
            poll_interval_ms: default_poll_interval_ms(),
            close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl ServerConfig {
    /// Parses `bind_address` and `port` into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| ConfigError::BindAddress(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl CaptureConfig {
    pub fn repeat_settings(&self) -> RepeatSettings {
        RepeatSettings {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            interval: Duration::from_millis(self.repeat_interval_ms),
        }
    }
}

impl BroadcastConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl OverlayConfig {
    pub fn chord(&self) -> ToggleChord {
        ToggleChord::new(
            self.toggle_key.as_str(),
            self.toggle_chord.iter().map(|k| KeyName::new(k.as_str())),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

/// Path of the config file in the platform config directory.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the configuration.
///
/// With `path == None` the platform location is used, and a platform without
/// a config directory simply gets the defaults.  A missing file yields the
/// defaults in both cases.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match config_file_path() {
            Ok(p) => p,
            Err(ConfigError::NoPlatformConfigDir) => return Ok(AppConfig::default()),
            Err(e) => return Err(e),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("keystream"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("keystream"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("keystream")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.server.bind_address, "0.0.0.0");
        assert_eq!(cfg.server.path, "/ws");
        assert_eq!(cfg.capture.repeat_settings(), RepeatSettings::default());
        assert_eq!(cfg.broadcast.poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.broadcast.send_timeout(), Duration::from_secs(1));
        assert_eq!(cfg.overlay.border_width, 10);
        assert_eq!(cfg.overlay.border_color, [255, 165, 0]);
        assert_eq!(cfg.overlay.close_timeout(), Duration::from_secs(2));
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.logging.file.is_none());
    }

    #[test]
    fn test_default_chord_is_ctrl_space_right() {
        let chord = OverlayConfig::default().chord();
        assert_eq!(chord, ToggleChord::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let cfg = parse_config(
            r#"
            [server]
            port = 9100

            [capture]
            initial_delay_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.bind_address, "0.0.0.0");
        assert_eq!(cfg.capture.initial_delay_ms, 250);
        assert_eq!(cfg.capture.repeat_interval_ms, 100);
        assert_eq!(cfg.overlay, OverlayConfig::default());
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        assert_eq!(parse_config("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = parse_config("[server\nport = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_explicit_file_yields_defaults() {
        let cfg = load_config(Some(Path::new("/nonexistent/keystream/config.toml"))).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_socket_addr_rejects_hostnames() {
        let server = ServerConfig {
            bind_address: "localhost".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            server.socket_addr(),
            Err(ConfigError::BindAddress(_))
        ));
    }

    #[test]
    fn test_socket_addr_combines_ip_and_port() {
        let server = ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 8123,
            ..ServerConfig::default()
        };
        assert_eq!(server.socket_addr().unwrap(), "127.0.0.1:8123".parse().unwrap());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut cfg = AppConfig::default();
        cfg.overlay.viewer_command = vec!["imv".into(), "-f".into(), "{path}".into()];
        cfg.logging.file = Some(PathBuf::from("/var/log/keystream.log"));

        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let restored = parse_config(&text).unwrap();

        assert_eq!(cfg, restored);
    }
}
