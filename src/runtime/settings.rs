use std::path::Path;

use tracing::warn;

use crate::config;

/// Load settings, falling back to defaults when the file or environment is
/// unusable. Configuration is optional; a bad file must not stop a role.
pub fn load_settings(path: Option<&Path>) -> config::Settings {
    let loaded = match path {
        Some(p) => config::Settings::load_from(Some(p)),
        None => config::Settings::load(),
    };
    match loaded {
        Ok(s) => {
            if let Err(msg) = s.validate() {
                warn!("invalid config, using defaults: {msg}");
                config::Settings::default()
            } else {
                s
            }
        }
        Err(e) => {
            warn!("failed to load config, using defaults: {e}");
            config::Settings::default()
        }
    }
}
