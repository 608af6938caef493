use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Default per-subprocess timeout applied to every toolchain invocation.
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 300;
/// Default number of Jobs allowed to run at the same time.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;
/// Default number of pages recognized in parallel during raster OCR.
pub const DEFAULT_PAGE_CONCURRENCY: usize = 1;
/// Default request body limit for uploads (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the extraction server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Which strategy chain the orchestrator is allowed to use.
    pub pipeline_mode: PipelineMode,
    /// Parent directory for job workspaces; the system temp dir when unset.
    pub workspace_root: Option<PathBuf>,
    /// Upper bound on the runtime of a single toolchain subprocess.
    pub stage_timeout_secs: u64,
    /// Admission limit for concurrently running Jobs.
    pub max_concurrent_jobs: usize,
    /// Pages recognized in parallel during raster OCR.
    pub page_concurrency: usize,
    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
    /// Comma-separated CORS origins; permissive when unset.
    pub cors_origins: Option<String>,
}

/// Strategy chains supported by the orchestrator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Normalization pass first (when ocrmypdf is installed), then direct text and raster OCR.
    #[default]
    Full,
    /// Direct text extraction followed by raster OCR only.
    Simple,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: None,
            pipeline_mode: PipelineMode::Full,
            workspace_root: None,
            stage_timeout_secs: DEFAULT_STAGE_TIMEOUT_SECS,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            page_concurrency: DEFAULT_PAGE_CONCURRENCY,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_origins: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            pipeline_mode: load_env_optional("OCR_PIPELINE_MODE")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("OCR_PIPELINE_MODE".into()))
                })
                .transpose()?
                .unwrap_or_default(),
            workspace_root: load_env_optional("OCR_WORKSPACE_ROOT").map(PathBuf::from),
            stage_timeout_secs: load_positive(
                "OCR_STAGE_TIMEOUT_SECS",
                DEFAULT_STAGE_TIMEOUT_SECS,
            )?,
            max_concurrent_jobs: load_positive(
                "OCR_MAX_CONCURRENT_JOBS",
                DEFAULT_MAX_CONCURRENT_JOBS,
            )?,
            page_concurrency: load_positive("OCR_PAGE_CONCURRENCY", DEFAULT_PAGE_CONCURRENCY)?,
            max_upload_bytes: load_positive("OCR_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            cors_origins: load_env_optional("OCR_CORS_ORIGINS"),
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_positive<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match load_env_optional(key) {
        None => Ok(default),
        Some(raw) => {
            parse_positive(raw.trim()).ok_or_else(|| ConfigError::InvalidValue(key.into()))
        }
    }
}

fn parse_positive<T>(raw: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    raw.parse::<T>().ok().filter(|value| *value > T::default())
}

impl std::str::FromStr for PipelineMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" | "ocrmypdf" => Ok(Self::Full),
            "simple" | "tesseract" => Ok(Self::Simple),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        server_port = ?config.server_port,
        pipeline_mode = ?config.pipeline_mode,
        workspace_root = ?config.workspace_root,
        stage_timeout_secs = config.stage_timeout_secs,
        max_concurrent_jobs = config.max_concurrent_jobs,
        page_concurrency = config.page_concurrency,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
