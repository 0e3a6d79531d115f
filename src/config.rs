//! Runtime configuration.
//!
//! Layered the usual way: built-in defaults, then an optional config file,
//! then `VIDLENS_*` environment variables. Nothing here is required; the
//! defaults run against a launched headless browser.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use binding_center::BindingCenterConfig;
use serde::{Deserialize, Serialize};
use vidlens_core_types::retry::RetryPolicy;
use video_scanner::PlatformHints;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// DevTools websocket of an already running browser. When unset a
    /// headless browser is launched instead.
    pub ws_url: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self { ws_url: None }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionSettings {
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Extra host substrings treated as wrapped-player platforms, on top of
    /// the built-in list.
    pub wrapped_hosts: Vec<String>,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 1000,
            wrapped_hosts: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub browser: BrowserSettings,
    pub resolution: ResolutionSettings,
    pub log_level: Option<String>,
}

impl Settings {
    /// Defaults, then the optional file, then `VIDLENS_*` variables
    /// (`VIDLENS_RESOLUTION__RETRY_ATTEMPTS=5` style).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("VIDLENS")
                .separator("__")
                .try_parsing(true),
        );
        let settings = builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        Ok(settings)
    }

    /// Effective log level: CLI flag first, then the config file, then
    /// "info". `RUST_LOG` still overrides all of these at init time.
    pub fn effective_log_level(&self, cli_override: Option<&str>) -> String {
        cli_override
            .map(str::to_string)
            .or_else(|| self.log_level.clone())
            .unwrap_or_else(|| "info".to_string())
    }

    pub fn binding_center(&self) -> BindingCenterConfig {
        let mut hints = PlatformHints::default();
        hints
            .wrapped_hosts
            .extend(self.resolution.wrapped_hosts.iter().cloned());
        BindingCenterConfig {
            retry: RetryPolicy::new(
                self.resolution.retry_attempts,
                Duration::from_millis(self.resolution.retry_delay_ms),
            ),
            hints,
            ..BindingCenterConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_policy() {
        let settings = Settings::default();
        let config = settings.binding_center();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay, Duration::from_secs(1));
        assert!(!config.hints.wrapped_hosts.is_empty());
    }

    #[test]
    fn log_level_prefers_cli_then_file() {
        let mut settings = Settings::default();
        assert_eq!(settings.effective_log_level(None), "info");

        settings.log_level = Some("debug".to_string());
        assert_eq!(settings.effective_log_level(None), "debug");
        assert_eq!(settings.effective_log_level(Some("trace")), "trace");
    }

    #[test]
    fn extra_wrapped_hosts_extend_the_builtins() {
        let mut settings = Settings::default();
        settings
            .resolution
            .wrapped_hosts
            .push("mytube".to_string());
        let config = settings.binding_center();
        assert!(config
            .hints
            .wrapped_hosts
            .iter()
            .any(|h| h == "mytube"));
        assert!(config
            .hints
            .wrapped_hosts
            .iter()
            .any(|h| h == "brightcove"));
    }
}
