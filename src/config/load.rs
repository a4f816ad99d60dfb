use std::{
    env,
    path::{Path, PathBuf},
};

use super::schema::Settings;

/// Configuration loading helpers.
///
/// `Settings::load` reads an optional config file, then environment variables
/// (prefix `REFRAIN__`) on top, and falls back to struct defaults.
impl Settings {
    /// Load settings from the resolved config path and the environment.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        Self::load_from(resolve_config_path().as_deref())
    }

    /// Load settings from `path` (if any) and the environment.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("REFRAIN")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Reject values the loops cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer.depth == 0 {
            return Err("buffer.depth must be >= 1".to_string());
        }
        if self.pipeline.window_ms == 0 {
            return Err("pipeline.window_ms must be >= 1".to_string());
        }
        if self.pipeline.pre_roll_ms >= self.pipeline.window_ms {
            return Err("pipeline.pre_roll_ms must be shorter than pipeline.window_ms".to_string());
        }
        if !(0.0..=1.0).contains(&self.pipeline.fallback_ratio) {
            return Err("pipeline.fallback_ratio must be within 0.0..=1.0".to_string());
        }
        if self.pipeline.normalize_headroom_db > 0.0 {
            return Err("pipeline.normalize_headroom_db must be <= 0".to_string());
        }
        if self.cleanup.attempts == 0 {
            return Err("cleanup.attempts must be >= 1".to_string());
        }
        if self.controller.max_failures == 0 {
            return Err("controller.max_failures must be >= 1".to_string());
        }
        if self.analyzer.max_failures == 0 {
            return Err("analyzer.max_failures must be >= 1".to_string());
        }
        if self.fetch.program.trim().is_empty() {
            return Err("fetch.program must not be empty".to_string());
        }
        Ok(())
    }
}

/// Resolve the config path from `REFRAIN_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("REFRAIN_CONFIG_PATH") {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/refrain/config.toml`
/// or `~/.config/refrain/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    };

    config_home.map(|d| d.join("refrain").join("config.toml"))
}
