//! `APM_*` environment variable overrides, the fourth layer in the
//! precedence chain (§ "compiled-in defaults, `/etc/<app>/config.toml`,
//! `$XDG_CONFIG_HOME/<app>/config.toml`, environment variables prefixed
//! `APM_`, CLI flags").

use crate::error::{ConfigError, Result};
use crate::types::{AppConfig, ColorMode, LogFormat, LogLevel, UniverseBackend};
use std::path::PathBuf;

/// The `APM_*` variables this crate recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApmEnvVar {
    /// `APM_UNIVERSE_BACKEND`
    UniverseBackend,
    /// `APM_WORKER_POOL_SIZE`
    WorkerPoolSize,
    /// `APM_INSTALL_VIRTUAL_PREFERS_FIRST`
    InstallVirtualPrefersFirst,
    /// `APM_REMOVE_DEPENDS_DEFAULT`
    RemoveDependsDefault,
    /// `APM_LOCK_TIMEOUT`, in seconds
    LockTimeout,
    /// `APM_LOG_FORMAT`
    LogFormat,
    /// `APM_LOG_LEVEL`
    LogLevel,
    /// `APM_CACHE_DIR`
    CacheDir,
    /// `APM_IMAGE_HISTORY_DIR`
    ImageHistoryDir,
    /// `APM_COLOR`
    Color,
}

impl ApmEnvVar {
    /// The variable's name as it appears in the process environment.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UniverseBackend => "APM_UNIVERSE_BACKEND",
            Self::WorkerPoolSize => "APM_WORKER_POOL_SIZE",
            Self::InstallVirtualPrefersFirst => "APM_INSTALL_VIRTUAL_PREFERS_FIRST",
            Self::RemoveDependsDefault => "APM_REMOVE_DEPENDS_DEFAULT",
            Self::LockTimeout => "APM_LOCK_TIMEOUT",
            Self::LogFormat => "APM_LOG_FORMAT",
            Self::LogLevel => "APM_LOG_LEVEL",
            Self::CacheDir => "APM_CACHE_DIR",
            Self::ImageHistoryDir => "APM_IMAGE_HISTORY_DIR",
            Self::Color => "APM_COLOR",
        }
    }

    /// Read this variable from the process environment, if set.
    #[must_use]
    pub fn get(self) -> Option<String> {
        std::env::var(self.as_str()).ok()
    }

    /// Read this variable and parse it as a `bool`, accepting the usual
    /// truthy spellings.
    fn as_bool(self) -> Option<bool> {
        self.get().map(|v| matches!(
            v.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ))
    }
}

/// Parse a plain integer-seconds or unit-suffixed duration string
/// (e.g. `"30"`, `"30s"`, `"5m"`, `"1h"`) into seconds.
pub fn parse_duration_secs(s: &str) -> Result<u64> {
    let s = s.trim();
    if let Ok(n) = s.parse::<u64>() {
        return Ok(n);
    }

    let split_at = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split_at);
    let n: u64 = digits.parse().map_err(|_| {
        ConfigError::EnvError {
            var: ApmEnvVar::LockTimeout.as_str().to_string(),
            message: format!("'{s}' is not a valid duration"),
        }
    })?;

    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86_400,
        other => {
            return Err(ConfigError::EnvError {
                var: ApmEnvVar::LockTimeout.as_str().to_string(),
                message: format!("unrecognized duration unit '{other}'"),
            })
        }
    };

    Ok(n * multiplier)
}

/// Collect an [`AppConfig`] layer from whichever `APM_*` variables are
/// currently set, applying [`crate::types`]'s parsers and reporting the
/// first unparseable value as an error.
pub fn from_env() -> Result<AppConfig> {
    let mut config = AppConfig::default();

    if let Some(v) = ApmEnvVar::UniverseBackend.get() {
        config.universe_backend = Some(parse_universe_backend(&v)?);
    }
    if let Some(v) = ApmEnvVar::WorkerPoolSize.get() {
        config.worker_pool_size = Some(v.parse().map_err(|_| ConfigError::EnvError {
            var: ApmEnvVar::WorkerPoolSize.as_str().to_string(),
            message: format!("'{v}' is not a valid worker pool size"),
        })?);
    }
    config.install_virtual_prefers_first = ApmEnvVar::InstallVirtualPrefersFirst.as_bool();
    config.remove_depends_default = ApmEnvVar::RemoveDependsDefault.as_bool();
    if let Some(v) = ApmEnvVar::LockTimeout.get() {
        config.lock_timeout_secs = Some(parse_duration_secs(&v)?);
    }
    if let Some(v) = ApmEnvVar::LogFormat.get() {
        config.log_format = Some(LogFormat::parse(&v).ok_or_else(|| ConfigError::EnvError {
            var: ApmEnvVar::LogFormat.as_str().to_string(),
            message: format!("'{v}' is not 'human' or 'json'"),
        })?);
    }
    if let Some(v) = ApmEnvVar::LogLevel.get() {
        config.log_level = Some(LogLevel::parse(&v).ok_or_else(|| ConfigError::EnvError {
            var: ApmEnvVar::LogLevel.as_str().to_string(),
            message: format!("'{v}' is not a recognized log level"),
        })?);
    }
    if let Some(v) = ApmEnvVar::CacheDir.get() {
        config.cache_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = ApmEnvVar::ImageHistoryDir.get() {
        config.image_history_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = ApmEnvVar::Color.get() {
        config.color = Some(ColorMode::parse(&v).ok_or_else(|| ConfigError::EnvError {
            var: ApmEnvVar::Color.as_str().to_string(),
            message: format!("'{v}' is not 'auto', 'always', or 'never'"),
        })?);
    }

    Ok(config)
}

fn parse_universe_backend(s: &str) -> Result<UniverseBackend> {
    match s.to_ascii_lowercase().as_str() {
        "host" => Ok(UniverseBackend::Host),
        "container" => Ok(UniverseBackend::Container),
        "image" => Ok(UniverseBackend::Image),
        other => Err(ConfigError::EnvError {
            var: ApmEnvVar::UniverseBackend.as_str().to_string(),
            message: format!("'{other}' is not 'host', 'container', or 'image'"),
        }),
    }
}
