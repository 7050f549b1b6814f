//! Runtime configuration — one immutable snapshot resolved at startup
//! and shared behind an `Arc`. Nothing here hot-reloads; changing the
//! port or paths means restarting the service. The cookie file is the
//! exception by design: it is re-read on every request so a rotated
//! export takes effect immediately.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 3001;

/// Names resolved under the data dir when not overridden.
const COOKIES_FILE_NAME: &str = "cookies.json";
const PROFILE_DIR_NAME: &str = "profile";

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// HTTP server port (default: 3001).
    port: Option<u16>,
    /// Bind address (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Path to the saved cookie export (default: {data_dir}/cookies.json).
    cookies_file: Option<PathBuf>,
    /// Browser profile directory (default: {data_dir}/profile).
    profile_dir: Option<PathBuf>,
    /// Run the capture browser headless (default: true).
    headless: Option<bool>,
    /// Log level filter string, e.g. "debug", "info,dashsnap=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "text" (default, human-readable) | "json" (structured).
    log_format: Option<String>,
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

// ─── ServiceConfig ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    /// Bind address for the HTTP server (DASHSNAP_BIND env var).
    pub bind_address: String,
    /// Data directory for cookies, browser profile, and config.toml.
    pub data_dir: PathBuf,
    /// Saved browser cookie export, replayed into every capture.
    pub cookies_file: PathBuf,
    /// Persistent browser profile (user-data dir), created on demand.
    pub profile_dir: PathBuf,
    /// Run the capture browser headless. Turn off to watch a capture
    /// happen locally while debugging cookie problems.
    pub headless: bool,
    /// Log level filter string.
    pub log: String,
    /// Log output format: "text" (default) | "json".
    pub log_format: String,
}

impl ServiceConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
        cookies_file: Option<PathBuf>,
        profile_dir: Option<PathBuf>,
        headless: Option<bool>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let bind_address = bind_address
            .or(std::env::var("DASHSNAP_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let cookies_file = cookies_file
            .or(toml.cookies_file)
            .unwrap_or_else(|| data_dir.join(COOKIES_FILE_NAME));

        let profile_dir = profile_dir
            .or(std::env::var("DASHSNAP_PROFILE_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from))
            .or(toml.profile_dir)
            .unwrap_or_else(|| data_dir.join(PROFILE_DIR_NAME));

        let headless = headless.or(toml.headless).unwrap_or(true);

        let log_format = std::env::var("DASHSNAP_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "text".to_string());

        Self {
            port,
            bind_address,
            data_dir,
            cookies_file,
            profile_dir,
            headless,
            log,
            log_format,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            port: DEFAULT_PORT,
            bind_address: default_bind_address(),
            cookies_file: data_dir.join(COOKIES_FILE_NAME),
            profile_dir: data_dir.join(PROFILE_DIR_NAME),
            data_dir,
            headless: true,
            log: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/dashsnap
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("dashsnap");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/dashsnap or ~/.local/share/dashsnap
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("dashsnap");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("dashsnap");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\dashsnap
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("dashsnap");
        }
    }
    // Fallback
    PathBuf::from(".dashsnap")
}
