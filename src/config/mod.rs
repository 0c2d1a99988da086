use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 8001;
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 10;

fn default_bind_address() -> String {
    // The catalog is meant to be reachable from other devices in the house.
    "0.0.0.0".to_string()
}

// ─── ObservabilityConfig ─────────────────────────────────────────────────────

/// Observability configuration (`[observability]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log SQLite queries that exceed this threshold (milliseconds). Default: 100.
    /// Set to 0 to disable slow query logging.
    pub slow_query_threshold_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 100,
        }
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// HTTP server port (default: 8001).
    port: Option<u16>,
    /// Bind address for the HTTP server (default: "0.0.0.0").
    bind_address: Option<String>,
    /// Log level filter string, e.g. "debug", "info,shelfd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Token signing secret. The SECRET_KEY env var takes priority; when both
    /// are absent a secret is generated and persisted under the data dir.
    secret_key: Option<String>,
    /// Access token lifetime in minutes (default: 10).
    token_ttl_minutes: Option<i64>,
    /// Observability configuration (`[observability]`).
    observability: Option<ObservabilityConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── ShelfConfig ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ShelfConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    /// Bind address for the HTTP server (SHELFD_BIND env var, default: "0.0.0.0").
    pub bind_address: String,
    /// Log output format: "pretty" (default) | "json" (structured for Loki/Elasticsearch).
    pub log_format: String,
    /// HS256 signing secret for access tokens.
    ///
    /// Resolution order: SECRET_KEY env var (a `.env` file is honored),
    /// `secret_key` in config.toml, then a generated secret persisted to
    /// `{data_dir}/secret_key`.
    pub secret_key: String,
    /// Access token lifetime in minutes.
    pub token_ttl_minutes: i64,
    /// Observability: slow query threshold.
    pub observability: ObservabilityConfig,
}

impl ShelfConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    ///
    /// The signing secret is the one field that must always resolve: when
    /// neither SECRET_KEY nor the TOML provides one, a random secret is
    /// generated and persisted so tokens survive restarts.
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let bind_address = bind_address
            .or(std::env::var("SHELFD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let log_format = std::env::var("SHELFD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let secret_key = match std::env::var("SECRET_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.secret_key)
        {
            Some(key) => key,
            None => crate::auth::get_or_create_secret(&data_dir)?,
        };

        let token_ttl_minutes = toml
            .token_ttl_minutes
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_TOKEN_TTL_MINUTES);

        let observability = toml.observability.unwrap_or_default();

        Ok(Self {
            port,
            data_dir,
            log,
            bind_address,
            log_format,
            secret_key,
            token_ttl_minutes,
            observability,
        })
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/shelfd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("shelfd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/shelfd or ~/.local/share/shelfd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("shelfd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("shelfd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\shelfd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("shelfd");
        }
    }
    // Fallback
    PathBuf::from(".shelfd")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
