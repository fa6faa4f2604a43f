//! TOML-based configuration for a Rally node.
//!
//! Reads and writes [`NodeSettings`] from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\Rally\config.toml`
//! - Linux:    `~/.config/rally/config.toml` (or `$XDG_CONFIG_HOME/rally/…`)
//! - macOS:    `~/Library/Application Support/Rally/config.toml`
//!
//! Every field has a serde default, so a missing file, an empty file, or a file
//! written by an older release all load cleanly:
//!
//! ```toml
//! [node]
//! display_name = "Living room"
//!
//! [discovery]
//! stale_timeout_secs = 6.0
//! prune_interval_secs = 1.5
//!
//! [lobby]
//! backend = "in-process"
//! visibility = "public"
//! ```
//!
//! # Discovery timings
//!
//! A discovered session is pruned once it has not been refreshed for
//! `stale_timeout_secs`. The prune pass runs every `prune_interval_secs`; the
//! timeout should cover at least four passes, otherwise a single lost
//! broadcast makes a session flicker out of the list. [`NodeSettings::validate`]
//! warns about a smaller ratio and rejects non-positive values.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::infrastructure::lobby::LobbyVisibility;

/// Minimum recommended `stale_timeout / prune_interval`.
pub const MIN_PRUNE_RATIO: f64 = 4.0;

/// Longest accepted discovery timing. Timer deadlines past this overflow.
pub const MAX_DISCOVERY_SECS: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is outside its allowed range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level node configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeSettings {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub lobby: LobbyConfig,
}

/// Identity and logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// Input to the handshake tag. Nodes only see sessions with the same name.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Name advertised for hosted sessions.
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether a session/player template is configured. Hosting is refused
    /// without one.
    #[serde(default = "default_true")]
    pub player_template: bool,
}

/// LAN discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// UDP port hosts answer discovery requests on.
    #[serde(default = "default_discovery_port")]
    pub port: u16,
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_secs: f64,
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: f64,
    /// Cadence of automatic refreshes while browsing.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: f64,
}

/// Transport backend selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    /// Backend names tried in order for local-network sessions.
    #[serde(default = "default_preference")]
    pub preference: Vec<String>,
    /// Backend used when no preferred one is registered and available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// TCP port hosted sessions listen on.
    #[serde(default = "default_game_port")]
    pub game_port: u16,
    /// IP address to bind the game listener to. `"0.0.0.0"` binds all
    /// interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Which lobby directory backs lobby-service discovery.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LobbyBackendKind {
    #[default]
    Disabled,
    InProcess,
}

/// Lobby advertisement settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LobbyConfig {
    #[serde(default)]
    pub backend: LobbyBackendKind,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub visibility: LobbyVisibility,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_app_name() -> String {
    "rally".to_string()
}
fn default_display_name() -> String {
    "Rally session".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_discovery_port() -> u16 {
    47777
}
fn default_stale_timeout() -> f64 {
    6.0
}
fn default_prune_interval() -> f64 {
    1.5
}
fn default_probe_interval() -> f64 {
    3.0
}
fn default_preference() -> Vec<String> {
    vec!["tcp".to_string()]
}
fn default_game_port() -> u16 {
    7777
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_capacity() -> u32 {
    4
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            display_name: default_display_name(),
            log_level: default_log_level(),
            player_template: default_true(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            port: default_discovery_port(),
            stale_timeout_secs: default_stale_timeout(),
            prune_interval_secs: default_prune_interval(),
            probe_interval_secs: default_probe_interval(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            preference: default_preference(),
            fallback: None,
            game_port: default_game_port(),
            bind_address: default_bind_address(),
        }
    }
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            backend: LobbyBackendKind::default(),
            capacity: default_capacity(),
            visibility: LobbyVisibility::default(),
        }
    }
}

/// Values that [`NodeSettings::validate`] rejects map to the defaults.
impl DiscoveryConfig {
    pub fn stale_timeout(&self) -> Duration {
        seconds(self.stale_timeout_secs, default_stale_timeout())
    }

    pub fn prune_interval(&self) -> Duration {
        seconds(self.prune_interval_secs, default_prune_interval())
    }

    pub fn probe_interval(&self) -> Duration {
        seconds(self.probe_interval_secs, default_probe_interval())
    }
}

fn seconds(value: f64, fallback: f64) -> Duration {
    timing(value).unwrap_or_else(|| Duration::from_secs_f64(fallback))
}

/// A usable timer period: at least one nanosecond, at most
/// [`MAX_DISCOVERY_SECS`].
fn timing(value: f64) -> Option<Duration> {
    if value > MAX_DISCOVERY_SECS {
        return None;
    }
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|duration| !duration.is_zero())
}

impl NodeSettings {
    /// Checks value ranges.
    ///
    /// Returns human-readable warnings for values that are allowed but
    /// unwise; each is also logged.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a non-positive or non-finite
    /// interval, an empty app name, a zero lobby capacity, or an unparseable
    /// bind address.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        if self.node.app_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "node.app_name",
                reason: "must not be empty".to_string(),
            });
        }

        let d = &self.discovery;
        for (field, value) in [
            ("discovery.stale_timeout_secs", d.stale_timeout_secs),
            ("discovery.prune_interval_secs", d.prune_interval_secs),
            ("discovery.probe_interval_secs", d.probe_interval_secs),
        ] {
            if timing(value).is_none() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!(
                        "must be between 1ns and {MAX_DISCOVERY_SECS}s, got {value}"
                    ),
                });
            }
        }

        if self.lobby.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "lobby.capacity",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.transport.bind_address.parse::<IpAddr>().is_err() {
            return Err(ConfigError::Invalid {
                field: "transport.bind_address",
                reason: format!("{:?} is not an IP address", self.transport.bind_address),
            });
        }

        let mut warnings = Vec::new();
        let ratio = d.stale_timeout_secs / d.prune_interval_secs;
        if ratio < MIN_PRUNE_RATIO {
            warnings.push(format!(
                "stale timeout {}s covers only {ratio:.1} prune passes of {}s; sessions may flicker",
                d.stale_timeout_secs, d.prune_interval_secs
            ));
        }
        for warning in &warnings {
            warn!("{warning}");
        }
        Ok(warnings)
    }

    /// Parsed game listener bind address. Falls back to `0.0.0.0` when the
    /// stored value does not parse; [`validate`](Self::validate) reports that
    /// case as an error.
    pub fn bind_address(&self) -> IpAddr {
        self.transport
            .bind_address
            .parse()
            .unwrap_or(IpAddr::from([0, 0, 0, 0]))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads settings from the default location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<NodeSettings, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads settings from `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<NodeSettings, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(NodeSettings::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `settings` to the default location.
///
/// # Errors
///
/// See [`save_config_to`].
pub fn save_config(settings: &NodeSettings) -> Result<(), ConfigError> {
    save_config_to(&config_file_path()?, settings)
}

/// Persists `settings` to `path`, creating the directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, settings: &NodeSettings) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(settings)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the `Rally`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Rally"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("rally"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Rally")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
