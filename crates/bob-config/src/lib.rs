//! Shared configuration for BOB tools.
//!
//! TOML file + `BOB_` environment layering, operator-settings
//! persistence, and translation to `bob_core::CoreConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use bob_api::{ReconnectConfig, TlsMode};
use bob_core::{CoreConfig, Settings, SimulatorConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

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

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub stream: Stream,
    #[serde(default)]
    pub probe: Probe,
    #[serde(default)]
    pub simulator: Simulator,
    #[serde(default)]
    pub buffer: Buffer,
    #[serde(default)]
    pub render: Render,
    /// Operator settings, rewritten whenever a toggle changes.
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Backend {
    /// Backend base URL.
    pub url: String,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Accept self-signed certificates.
    pub insecure: bool,
    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".into(),
            timeout: 10,
            insecure: false,
            ca_cert: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Stream {
    pub path: String,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// `0` retries forever.
    pub max_retries: u32,
}

impl Default for Stream {
    fn default() -> Self {
        Self {
            path: bob_api::transport::DEFAULT_STREAM_PATH.into(),
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_retries: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Probe {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for Probe {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Simulator {
    pub interval_ms: u64,
    pub max_batch: usize,
    pub seed: Option<u64>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            max_batch: 8,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Buffer {
    pub capacity: usize,
}

impl Default for Buffer {
    fn default() -> Self {
        Self {
            capacity: bob_core::buffer::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Render {
    pub window_ms: u64,
    /// Overlay redraw rate.
    pub fps: u32,
    pub frame_width: f64,
    pub frame_height: f64,
}

impl Default for Render {
    fn default() -> Self {
        Self {
            window_ms: 2_000,
            fps: 30,
            frame_width: bob_core::config::DEFAULT_FRAME_WIDTH,
            frame_height: bob_core::config::DEFAULT_FRAME_HEIGHT,
        }
    }
}

impl Render {
    /// Time between overlay redraws.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "bob", "bob").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("bob");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from `path` + environment. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("BOB_").split("__"));

    Ok(figment.extract()?)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Validate `cfg` and build the runtime `CoreConfig`.
pub fn to_core_config(cfg: &Config) -> Result<CoreConfig, ConfigError> {
    let url: url::Url = cfg
        .backend
        .url
        .parse()
        .map_err(|_| invalid("backend.url", format!("invalid URL: {}", cfg.backend.url)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("backend.url", "scheme must be http or https"));
    }
    if !cfg.stream.path.starts_with('/') {
        return Err(invalid("stream.path", "must start with '/'"));
    }
    if cfg.buffer.capacity == 0 {
        return Err(invalid("buffer.capacity", "must be at least 1"));
    }
    if cfg.render.window_ms == 0 {
        return Err(invalid("render.window_ms", "must be positive"));
    }
    if cfg.backend.timeout == 0 {
        return Err(invalid("backend.timeout", "must be positive"));
    }
    if cfg.probe.interval_secs == 0 {
        return Err(invalid("probe.interval_secs", "must be positive"));
    }
    if cfg.probe.timeout_secs == 0 {
        return Err(invalid("probe.timeout_secs", "must be positive"));
    }
    if cfg.simulator.interval_ms == 0 {
        return Err(invalid("simulator.interval_ms", "must be positive"));
    }

    let tls = if cfg.backend.insecure {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = cfg.backend.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    let mut core = CoreConfig::new(url);
    core.tls = tls;
    core.timeout = Duration::from_secs(cfg.backend.timeout);
    core.stream_path.clone_from(&cfg.stream.path);
    core.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(cfg.stream.initial_delay_ms),
        max_delay: Duration::from_millis(cfg.stream.max_delay_ms),
        max_retries: (cfg.stream.max_retries > 0).then_some(cfg.stream.max_retries),
    };
    core.probe_interval = Duration::from_secs(cfg.probe.interval_secs);
    core.probe_timeout = Duration::from_secs(cfg.probe.timeout_secs);
    core.simulator = SimulatorConfig {
        interval: Duration::from_millis(cfg.simulator.interval_ms),
        batch_sizes: 0..=cfg.simulator.max_batch,
        seed: cfg.simulator.seed,
    };
    core.buffer_capacity = cfg.buffer.capacity;
    core.render_window = Duration::from_millis(cfg.render.window_ms);
    core.frame_width = cfg.render.frame_width;
    core.frame_height = cfg.render.frame_height;
    Ok(core)
}
