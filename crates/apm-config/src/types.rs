//! The A1 Application Configuration document: an all-optional layer as it
//! appears in a config file or environment variable, and the fully
//! defaulted [`ResolvedConfig`] a run actually executes against.

use std::path::PathBuf;
use std::time::Duration;

/// Which concrete Package Universe backend a run talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UniverseBackend {
    /// The running host's package database.
    Host,
    /// A named container's package database.
    Container,
    /// A named declarative image's recorded state.
    Image,
}

/// Output framing for both logs and command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-oriented text.
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parse from a config value or `APM_LOG_FORMAT`/`--format` string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// When to emit ANSI color codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Color if stdout is a TTY and `--no-color`/`NO_COLOR` is absent.
    #[default]
    Auto,
    /// Always emit color codes.
    Always,
    /// Never emit color codes.
    Never,
}

impl ColorMode {
    /// Parse from a config value, `APM_COLOR`, or `--no-color`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "always" => Some(Self::Always),
            "never" => Some(Self::Never),
            _ => None,
        }
    }
}

/// `tracing`'s familiar five levels, stored as a plain enum so the config
/// document doesn't need to depend on `tracing`'s own filter syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only fatal conditions.
    Error,
    /// Recoverable but noteworthy conditions.
    Warn,
    /// High-level progress, the default.
    Info,
    /// Per-step diagnostic detail.
    Debug,
    /// Everything, including backend chatter.
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    /// Parse from a config value or `APM_LOG_LEVEL`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }

    /// The `tracing` filter directive this level corresponds to.
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Raise the level by `n` notches (used by repeated `-v` flags),
    /// saturating at `Trace`.
    #[must_use]
    pub fn raised_by(self, n: u8) -> Self {
        let levels = [Self::Error, Self::Warn, Self::Info, Self::Debug, Self::Trace];
        let start = levels.iter().position(|&l| l == self).unwrap_or(2);
        let idx = (start + n as usize).min(levels.len() - 1);
        levels[idx]
    }
}

/// The document form of A1: every field optional, as loaded from a single
/// layer (a config file, or an `APM_*` environment variable, or a CLI
/// flag). Layers are merged field-by-field in [`crate::loader::ConfigLoader`].
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct AppConfig {
    /// Which Universe backend this run targets.
    pub universe_backend: Option<UniverseBackend>,
    /// Execution Driver worker-pool size.
    pub worker_pool_size: Option<u32>,
    /// Whether a bare virtual-package name prefers the first provider.
    pub install_virtual_prefers_first: Option<bool>,
    /// Default for `--remove-depends` when the CLI flag is absent.
    pub remove_depends_default: Option<bool>,
    /// Seconds to wait for the backend lock before giving up.
    pub lock_timeout_secs: Option<u64>,
    /// `human` or `json` log/output framing.
    pub log_format: Option<LogFormat>,
    /// Minimum level emitted to the log sink.
    pub log_level: Option<LogLevel>,
    /// A4 cache root directory.
    pub cache_dir: Option<PathBuf>,
    /// Image Reconciler history store directory.
    pub image_history_dir: Option<PathBuf>,
    /// ANSI color policy.
    pub color: Option<ColorMode>,
}

/// The fully defaulted configuration a run actually executes against,
/// produced by [`crate::loader::ConfigLoader::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Which Universe backend this run targets.
    pub universe_backend: UniverseBackend,
    /// Execution Driver worker-pool size. Default 20.
    pub worker_pool_size: u32,
    /// Whether a bare virtual-package name prefers the first provider.
    /// Default `false`.
    pub install_virtual_prefers_first: bool,
    /// Default for `--remove-depends` when the CLI flag is absent.
    /// Default `false`.
    pub remove_depends_default: bool,
    /// How long to wait for the backend lock before giving up. Default 30s.
    pub lock_timeout: Duration,
    /// `human` or `json` log/output framing.
    pub log_format: LogFormat,
    /// Minimum level emitted to the log sink.
    pub log_level: LogLevel,
    /// A4 cache root directory.
    pub cache_dir: PathBuf,
    /// Image Reconciler history store directory.
    pub image_history_dir: PathBuf,
    /// ANSI color policy.
    pub color: ColorMode,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        let dirs = directories::ProjectDirs::from("", "", "apm");
        let (default_cache, default_history) = dirs
            .as_ref()
            .map(|d| (d.cache_dir().to_path_buf(), d.data_dir().join("images")))
            .unwrap_or_else(|| {
                (
                    PathBuf::from("/var/cache/apm"),
                    PathBuf::from("/var/lib/apm/images"),
                )
            });

        Self {
            universe_backend: UniverseBackend::Host,
            worker_pool_size: 20,
            install_virtual_prefers_first: false,
            remove_depends_default: false,
            lock_timeout: Duration::from_secs(30),
            log_format: LogFormat::Human,
            log_level: LogLevel::Info,
            cache_dir: default_cache,
            image_history_dir: default_history,
            color: ColorMode::Auto,
        }
    }
}

impl ResolvedConfig {
    /// Apply every field present in `layer`, overwriting whatever this
    /// value already held. Used to fold successive [`AppConfig`] layers
    /// into a running resolution in precedence order.
    pub fn apply(&mut self, layer: AppConfig) {
        if let Some(v) = layer.universe_backend {
            self.universe_backend = v;
        }
        if let Some(v) = layer.worker_pool_size {
            self.worker_pool_size = v;
        }
        if let Some(v) = layer.install_virtual_prefers_first {
            self.install_virtual_prefers_first = v;
        }
        if let Some(v) = layer.remove_depends_default {
            self.remove_depends_default = v;
        }
        if let Some(v) = layer.lock_timeout_secs {
            self.lock_timeout = Duration::from_secs(v);
        }
        if let Some(v) = layer.log_format {
            self.log_format = v;
        }
        if let Some(v) = layer.log_level {
            self.log_level = v;
        }
        if let Some(v) = layer.cache_dir {
            self.cache_dir = v;
        }
        if let Some(v) = layer.image_history_dir {
            self.image_history_dir = v;
        }
        if let Some(v) = layer.color {
            self.color = v;
        }
    }

    /// Build the per-invocation [`apm_core::Context`] Planner and
    /// Execution Driver calls take, rooting the Universe backing-store
    /// snapshot and lock file under `state_dir` while honoring this
    /// document's independently configurable `cache_dir` and
    /// `image_history_dir`.
    #[must_use]
    pub fn to_context(&self, state_dir: impl Into<PathBuf>) -> apm_core::Context {
        let mut context = apm_core::Context::new(state_dir);
        context.cache_dir = self.cache_dir.clone();
        context.image_history_dir = self.image_history_dir.clone();
        context.worker_pool_size = self.worker_pool_size;
        context.install_virtual_prefers_first = self.install_virtual_prefers_first;
        context.remove_depends_default = self.remove_depends_default;
        context.lock_timeout = self.lock_timeout;
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_defaults() {
        let resolved = ResolvedConfig::default();
        assert_eq!(resolved.worker_pool_size, 20);
        assert!(!resolved.install_virtual_prefers_first);
        assert!(!resolved.remove_depends_default);
        assert_eq!(resolved.lock_timeout, Duration::from_secs(30));
        assert_eq!(resolved.log_format, LogFormat::Human);
        assert_eq!(resolved.color, ColorMode::Auto);
    }

    #[test]
    fn apply_overrides_only_set_fields() {
        let mut resolved = ResolvedConfig::default();
        resolved.apply(AppConfig {
            worker_pool_size: Some(8),
            ..Default::default()
        });
        assert_eq!(resolved.worker_pool_size, 8);
        assert_eq!(resolved.log_format, LogFormat::Human);
    }

    #[test]
    fn log_level_raises_saturating() {
        assert_eq!(LogLevel::Info.raised_by(1), LogLevel::Debug);
        assert_eq!(LogLevel::Info.raised_by(10), LogLevel::Trace);
    }

    #[test]
    fn to_context_carries_independent_cache_dir() {
        let mut resolved = ResolvedConfig::default();
        resolved.cache_dir = PathBuf::from("/srv/apm/cache");
        let context = resolved.to_context("/var/lib/apm");
        assert_eq!(context.cache_dir, PathBuf::from("/srv/apm/cache"));
        assert_eq!(context.universe_store, PathBuf::from("/var/lib/apm/universe"));
        assert_eq!(context.worker_pool_size, 20);
    }
}
