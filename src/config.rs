//! Configuration loading and validation
//!
//! Settings come from the environment (`PORT`, `PAGESHOT_*`), can be
//! overridden by CLI flags, and are validated once at startup. Invalid or
//! unsatisfiable configuration is fatal: the service refuses to start rather
//! than run degraded.

use crate::cli::Cli;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Executable locations probed when no explicit path is configured.
///
/// Mirrors the install layouts of the google-chrome and chromium packages on
/// the distributions this service is deployed to.
const CHROME_CANDIDATES: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/sbin/chromium",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),

    #[error("browser executable not found at configured path {0:?}")]
    ExecutableMissing(PathBuf),

    #[error("no browser executable found (set PAGESHOT_CHROME_PATH or install Chrome/Chromium)")]
    ExecutableUnresolvable,
}

/// Main configuration for the screenshot service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// HTTP listen port (env `PORT`, default 3000)
    pub port: u16,

    /// Browser executable override (env `PAGESHOT_CHROME_PATH`)
    ///
    /// If None, a list of well-known install locations is probed at startup.
    pub chrome_path: Option<PathBuf>,

    /// Whether the bundled-browser download is skipped (env
    /// `PAGESHOT_SKIP_BROWSER_DOWNLOAD`, default true)
    ///
    /// This build never downloads a browser, so `false` is rejected at
    /// validation instead of silently running without one.
    pub skip_browser_download: bool,

    /// Maximum number of in-flight capture requests (env
    /// `PAGESHOT_MAX_CONCURRENT`)
    ///
    /// Each capture owns a whole browser process, so this is the lever that
    /// bounds process and memory growth under load.
    pub max_concurrent_captures: usize,

    /// How long a request may wait for a capture slot before it is rejected
    /// with 503 (default 5 seconds)
    pub queue_wait: Duration,

    /// Hard navigation timeout (default 30 seconds)
    pub navigation_timeout: Duration,

    /// Fixed pause after navigation settles, before capture (default 2
    /// seconds)
    ///
    /// Deliberately unconditional; gives deferred client-side rendering a
    /// chance to finish.
    pub settle_delay: Duration,

    /// How long a released browser gets to exit before it is killed
    pub release_grace: Duration,

    /// Page viewport used for every capture
    pub viewport: Viewport,

    /// Directory of landing-page assets (env `PAGESHOT_STATIC_DIR`)
    pub static_dir: PathBuf,

    /// Origins allowed by the CORS layer (env `PAGESHOT_ALLOWED_ORIGINS`,
    /// comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            chrome_path: None,
            skip_browser_download: true,
            max_concurrent_captures: num_cpus::get().clamp(1, 8),
            queue_wait: Duration::from_secs(5),
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            release_grace: Duration::from_secs(5),
            viewport: Viewport::default(),
            static_dir: PathBuf::from("public"),
            allowed_origins: Vec::new(),
        }
    }
}

/// Browser viewport geometry.
///
/// Fixed per service instance; the 2x device scale factor keeps text crisp
/// in the rendered PNG.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            device_scale_factor: 2.0,
        }
    }
}

impl Config {
    /// Build the effective configuration: defaults, then environment, then
    /// CLI overrides.
    pub fn load(args: &Cli) -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;

        if let Some(port) = args.port {
            config.port = port;
        }
        if let Some(chrome_path) = &args.chrome_path {
            config.chrome_path = Some(chrome_path.clone());
        }
        if let Some(max_concurrent) = args.max_concurrent {
            config.max_concurrent_captures = max_concurrent;
        }
        if let Some(timeout) = args.timeout {
            config.navigation_timeout = Duration::from_secs(timeout);
        }
        if let Some(static_dir) = &args.static_dir {
            config.static_dir = static_dir.clone();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(port) = env_parse::<u16>("PORT")? {
            config.port = port;
        }
        if let Ok(path) = std::env::var("PAGESHOT_CHROME_PATH") {
            if !path.is_empty() {
                config.chrome_path = Some(PathBuf::from(path));
            }
        }
        if let Some(skip) = env_parse::<bool>("PAGESHOT_SKIP_BROWSER_DOWNLOAD")? {
            config.skip_browser_download = skip;
        }
        if let Some(max) = env_parse::<usize>("PAGESHOT_MAX_CONCURRENT")? {
            config.max_concurrent_captures = max;
        }
        if let Ok(origins) = std::env::var("PAGESHOT_ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Ok(dir) = std::env::var("PAGESHOT_STATIC_DIR") {
            if !dir.is_empty() {
                config.static_dir = PathBuf::from(dir);
            }
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_captures == 0 {
            return Err(ConfigError::Invalid(
                "max concurrent captures must be greater than 0".into(),
            ));
        }
        if self.navigation_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "navigation timeout must be greater than 0".into(),
            ));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ConfigError::Invalid(
                "viewport dimensions must be greater than 0".into(),
            ));
        }
        if self.viewport.device_scale_factor <= 0.0 {
            return Err(ConfigError::Invalid(
                "device scale factor must be greater than 0".into(),
            ));
        }
        if !self.skip_browser_download {
            return Err(ConfigError::Invalid(
                "bundled browser download is not supported; install Chrome/Chromium \
                 and set PAGESHOT_CHROME_PATH"
                    .into(),
            ));
        }
        Ok(())
    }

    /// Resolve the browser executable, probing well-known locations when no
    /// explicit path is configured. Called once at startup; failure is
    /// fatal.
    pub fn resolve_executable(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.chrome_path {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(ConfigError::ExecutableMissing(path.clone()));
        }

        CHROME_CANDIDATES
            .iter()
            .map(Path::new)
            .find(|p| p.is_file())
            .map(Path::to_path_buf)
            .ok_or(ConfigError::ExecutableUnresolvable)
    }
}

fn env_parse<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
        _ => Ok(None),
    }
}

/// Chrome command-line flags for one capture session.
///
/// The set follows the containerized deployment the service runs in: no OS
/// sandbox, no GPU, single process, fixed window geometry. Each session gets
/// its own profile directory so concurrent browsers never share state.
pub fn chrome_args(config: &Config, profile_dir: &Path) -> Vec<String> {
    vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-software-rasterizer".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--no-zygote".to_string(),
        "--single-process".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
        format!("--user-data-dir={}", profile_dir.display()),
    ]
}

pub fn build_browser_config(
    config: &Config,
    profile_dir: &Path,
) -> Result<chromiumoxide::browser::BrowserConfig, String> {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .args(chrome_args(config, profile_dir));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build()
}
