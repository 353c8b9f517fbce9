use std::{path::PathBuf, time::Duration};

pub const PRESIGN_TTL_ENV: &str = "KBMEDIA_PRESIGN_TTL_SECS";
pub const CACHE_DIR_ENV: &str = "KBMEDIA_CACHE_DIR";
pub const S3_ENDPOINT_ENV: &str = "KBMEDIA_S3_ENDPOINT";
pub const NO_CACHE_ENV: &str = "KBMEDIA_NO_CACHE";

pub const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{env_var} must be a positive number of seconds, got {value:?}")]
    InvalidTtl { env_var: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub presign_ttl: Duration,
    /// `None` disables the media cache.
    pub cache_dir: Option<PathBuf>,
    pub s3_endpoint: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            presign_ttl: DEFAULT_PRESIGN_TTL,
            cache_dir: Some(default_cache_dir()),
            s3_endpoint: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source. `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(raw) = lookup(PRESIGN_TTL_ENV) {
            settings.presign_ttl = parse_ttl(&raw)?;
        }

        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|d| !d.is_empty()) {
            settings.cache_dir = Some(PathBuf::from(dir));
        }

        if lookup(NO_CACHE_ENV).is_some_and(|v| !v.is_empty()) {
            settings.cache_dir = None;
        }

        settings.s3_endpoint = lookup(S3_ENDPOINT_ENV).filter(|e| !e.is_empty());

        Ok(settings)
    }
}

fn parse_ttl(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTtl {
            env_var: PRESIGN_TTL_ENV.to_string(),
            value: raw.to_string(),
        }),
    }
}

pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("kbmedia")
}
