//! Shared configuration for the kodilink binary.
//!
//! TOML profiles using the integration's historical key names, password
//! resolution (env var or plaintext), and translation to
//! `kodilink_core::IntegrationConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use kodilink_core::{Credentials, Endpoint, IntegrationConfig};

/// Kodi web server port when a profile names none.
pub const DEFAULT_KODI_PORT: u16 = 8080;
/// TVHeadend web port when a profile names none.
pub const DEFAULT_TVHEADEND_PORT: u16 = 9981;

const ENV_PREFIX: &str = "KODILINK_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found (available: {available})")]
    ProfileNotFound { name: String, available: String },

    #[error("profile '{profile}' configures neither Kodi nor TVHeadend")]
    NoBackend { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is requested.
    pub default_profile: Option<String>,

    /// Timers shared by every profile.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named Kodi/TVHeadend pairs.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

/// Timer and storage settings, all durations in seconds.
#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default = "default_epg_interval")]
    pub epg_interval: u64,

    #[serde(default = "default_epg_ttl")]
    pub epg_ttl: u64,

    #[serde(default = "default_epg_page_limit")]
    pub epg_page_limit: u32,

    #[serde(default = "default_max_probe_attempts")]
    pub max_probe_attempts: u32,

    /// Volume and ping check every N poll ticks, 0 disables it.
    #[serde(default = "default_liveness_every")]
    pub liveness_every: u32,

    /// Where channel mappings are cached. Platform data dir when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            epg_interval: default_epg_interval(),
            epg_ttl: default_epg_ttl(),
            epg_page_limit: default_epg_page_limit(),
            max_probe_attempts: default_max_probe_attempts(),
            liveness_every: default_liveness_every(),
            data_dir: None,
        }
    }
}

fn default_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    5
}
fn default_epg_interval() -> u64 {
    10
}
fn default_epg_ttl() -> u64 {
    2 * 3600
}
fn default_epg_page_limit() -> u32 {
    1000
}
fn default_max_probe_attempts() -> u32 {
    4
}
fn default_liveness_every() -> u32 {
    10
}

/// One Kodi (plus optional TVHeadend) installation.
///
/// Key names follow the integration's legacy settings so existing
/// setups can be pasted in as-is.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default = "default_entity_id")]
    pub entity_id: String,

    /// Kodi host name or URL (e.g. "192.168.1.20" or "http://kodi.lan").
    pub kodiclient_url: Option<String>,
    pub kodiclient_port: Option<u16>,
    pub kodiclient_user: Option<String>,
    /// Plaintext password. Prefer `kodiclient_password_env`.
    pub kodiclient_password: Option<String>,
    /// Environment variable holding the Kodi password.
    pub kodiclient_password_env: Option<String>,
    /// Kodi event-server (TCP) port, 9090 when unset.
    pub kodieventserver_port: Option<u16>,

    /// TVHeadend host name or URL.
    pub tvheadendclient_url: Option<String>,
    pub tvheadendclient_port: Option<u16>,
    pub tvheadendclient_user: Option<String>,
    pub tvheadendclient_password: Option<String>,
    pub tvheadendclient_password_env: Option<String>,

    /// Comma-separated Kodi channel numbers shown in the EPG. Empty means
    /// every mapped channel.
    #[serde(default)]
    pub epgchannels: String,

    /// Override `defaults.timeout`.
    pub timeout: Option<u64>,
    /// Override `defaults.poll_interval`.
    pub poll_interval: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            entity_id: default_entity_id(),
            kodiclient_url: None,
            kodiclient_port: None,
            kodiclient_user: None,
            kodiclient_password: None,
            kodiclient_password_env: None,
            kodieventserver_port: None,
            tvheadendclient_url: None,
            tvheadendclient_port: None,
            tvheadendclient_user: None,
            tvheadendclient_password: None,
            tvheadendclient_password_env: None,
            epgchannels: String::new(),
            timeout: None,
            poll_interval: None,
        }
    }
}

fn default_entity_id() -> String {
    kodilink_core::config::DEFAULT_ENTITY_ID.into()
}

impl Config {
    /// Pick `requested`, else the configured default profile.
    pub fn profile(&self, requested: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.into(),
                available: if self.profiles.is_empty() {
                    "none".into()
                } else {
                    self.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
                },
            })
    }
}

// ── Config file path ────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "kodilink", "kodilink")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default root for cached channel mappings.
pub fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("data"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("kodilink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load `path` merged with `KODILINK_*` variables. Nested keys use a
/// double underscore, e.g. `KODILINK_PROFILES__DEFAULT__KODICLIENT_URL`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile resolution ──────────────────────────────────────────────

/// Parse `epgchannels` ("1, 2,7").
pub fn parse_channel_list(raw: &str) -> Result<Vec<u32>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>().map_err(|_| ConfigError::Validation {
                field: "epgchannels".into(),
                reason: format!("'{s}' is not a channel number"),
            })
        })
        .collect()
}

/// Password from the named env var, else the plaintext value.
fn resolve_password(env_name: Option<&str>, plaintext: Option<&str>) -> SecretString {
    if let Some(val) = env_name.and_then(|name| std::env::var(name).ok()) {
        return SecretString::from(val);
    }
    SecretString::from(plaintext.unwrap_or_default().to_owned())
}

fn credentials(
    user: Option<&str>,
    password_env: Option<&str>,
    password: Option<&str>,
) -> Option<Credentials> {
    let username = user.filter(|u| !u.is_empty())?;
    Some(Credentials {
        username: username.to_owned(),
        password: resolve_password(password_env, password),
    })
}

fn validate_port(field: &str, port: Option<u16>) -> Result<Option<u16>, ConfigError> {
    match port {
        Some(0) => Err(ConfigError::Validation {
            field: field.into(),
            reason: "port must be between 1 and 65535".into(),
        }),
        other => Ok(other),
    }
}

/// `http://{host}:{port}` from a bare host or a full URL.
fn base_url(field: &str, raw: &str, port: Option<u16>, default_port: u16) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let invalid = |reason: String| ConfigError::Validation {
        field: field.into(),
        reason,
    };
    if raw.is_empty() {
        return Err(invalid("host is empty".into()));
    }

    let candidate = if raw.contains("://") {
        raw.to_owned()
    } else {
        format!("http://{raw}")
    };
    let mut url = Url::parse(&candidate).map_err(|e| invalid(format!("'{raw}': {e}")))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid(format!("'{raw}' has no host")));
    }

    let port = port.or_else(|| url.port()).unwrap_or(default_port);
    url.set_port(Some(port))
        .map_err(|()| invalid(format!("cannot set port on '{raw}'")))?;
    Ok(url)
}

/// Build an `IntegrationConfig` from a profile and the shared defaults.
pub fn profile_to_integration_config(
    defaults: &Defaults,
    profile: &Profile,
    profile_name: &str,
) -> Result<IntegrationConfig, ConfigError> {
    let kodi_port = validate_port("kodiclient_port", profile.kodiclient_port)?;
    let event_port = validate_port("kodieventserver_port", profile.kodieventserver_port)?;
    let tvh_port = validate_port("tvheadendclient_port", profile.tvheadendclient_port)?;

    let kodi = profile
        .kodiclient_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .map(|raw| -> Result<Endpoint, ConfigError> {
            let url = base_url("kodiclient_url", raw, kodi_port, DEFAULT_KODI_PORT)?;
            let mut ep = Endpoint::new(url);
            ep.credentials = credentials(
                profile.kodiclient_user.as_deref(),
                profile.kodiclient_password_env.as_deref(),
                profile.kodiclient_password.as_deref(),
            );
            Ok(ep)
        })
        .transpose()?;

    let tvheadend = profile
        .tvheadendclient_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .map(|raw| -> Result<Endpoint, ConfigError> {
            let url = base_url("tvheadendclient_url", raw, tvh_port, DEFAULT_TVHEADEND_PORT)?;
            let mut ep = Endpoint::new(url);
            ep.credentials = credentials(
                profile.tvheadendclient_user.as_deref(),
                profile.tvheadendclient_password_env.as_deref(),
                profile.tvheadendclient_password.as_deref(),
            );
            Ok(ep)
        })
        .transpose()?;

    if kodi.is_none() && tvheadend.is_none() {
        return Err(ConfigError::NoBackend {
            profile: profile_name.into(),
        });
    }

    // Only an explicit port needs its own endpoint; core falls back to
    // the Kodi host on 9090.
    let kodi_events = match (&kodi, event_port) {
        (Some(ep), Some(port)) => {
            let host = ep.host().unwrap_or_default();
            let url = Url::parse(&format!("tcp://{host}:{port}")).map_err(|e| {
                ConfigError::Validation {
                    field: "kodieventserver_port".into(),
                    reason: e.to_string(),
                }
            })?;
            Some(Endpoint::new(url))
        }
        _ => None,
    };

    if profile.entity_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "entity_id".into(),
            reason: "must not be empty".into(),
        });
    }

    let data_root = defaults.data_dir.clone().unwrap_or_else(default_data_dir);

    Ok(IntegrationConfig {
        entity_id: profile.entity_id.clone(),
        kodi,
        kodi_events,
        tvheadend,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        poll_interval: Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval)),
        epg_interval: Duration::from_secs(defaults.epg_interval),
        epg_ttl: Duration::from_secs(defaults.epg_ttl),
        epg_page_limit: defaults.epg_page_limit,
        max_probe_attempts: defaults.max_probe_attempts.max(1),
        liveness_every: defaults.liveness_every,
        epg_channels: parse_channel_list(&profile.epgchannels)?,
        data_dir: Some(data_root.join(profile_name)),
        ..IntegrationConfig::default()
    })
}
