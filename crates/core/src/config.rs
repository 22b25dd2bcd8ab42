// Demo configuration and asset resolution

use crate::error::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ASSET_ENV: &str = "LOOPTRACK_ASSET";
pub const ORIGIN_ENV: &str = "LOOPTRACK_ORIGIN";

const MAX_GAIN: f32 = 4.0;
const MAX_HTTP_RETRIES: u32 = 8;

/// Settings shared by all three sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Asset path, relative to `origin` when one is set
    pub asset: String,
    /// Serving origin: an http(s) base URL or a directory
    pub origin: Option<String>,
    /// Gain applied by the graph-routed sessions
    pub gain: f32,
    pub sample_rate: u32,
    pub channels: u16,
    /// Retries for a failed remote fetch
    pub http_retries: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            asset: "bgm.mp3".to_string(),
            origin: None,
            gain: 1.0,
            sample_rate: 48000,
            channels: 2,
            http_retries: 2,
        }
    }
}

impl DemoConfig {
    /// Load a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| AudioError::ConfigError(format!("Failed to read {:?}: {}", path, e)))?;
        let config: DemoConfig = serde_json::from_str(&content)?;
        log::info!("Loaded config from {:?}", path);
        config.validated()
    }

    /// Apply `LOOPTRACK_ASSET` / `LOOPTRACK_ORIGIN` from the environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(asset) = lookup(ASSET_ENV) {
            self.asset = asset;
        }
        if let Some(origin) = lookup(ORIGIN_ENV) {
            self.origin = Some(origin);
        }
        self
    }

    /// Reject unusable output formats, clamp the gain and retry count
    pub fn validated(mut self) -> Result<Self> {
        if self.sample_rate == 0 {
            return Err(AudioError::ConfigError("sample_rate must be > 0".into()));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(AudioError::ConfigError(format!(
                "channels must be 1 or 2, got {}",
                self.channels
            )));
        }
        if !self.gain.is_finite() {
            return Err(AudioError::ConfigError("gain must be finite".into()));
        }
        self.gain = self.gain.clamp(0.0, MAX_GAIN);
        self.http_retries = self.http_retries.min(MAX_HTTP_RETRIES);
        Ok(self)
    }

    /// The source string handed to the fetcher
    pub fn resolve_asset(&self) -> String {
        match self.origin.as_deref() {
            None | Some("") => self.asset.clone(),
            Some(origin) if is_remote(origin) => format!(
                "{}/{}",
                origin.trim_end_matches('/'),
                self.asset.trim_start_matches('/')
            ),
            Some(origin) => PathBuf::from(origin)
                .join(self.asset.trim_start_matches('/'))
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// Whether a source should go over HTTP rather than the filesystem
pub fn is_remote(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_partial_json() {
        let config: DemoConfig = serde_json::from_str(r#"{ "gain": 0.5 }"#).unwrap();
        assert_eq!(config.asset, "bgm.mp3");
        assert_eq!(config.gain, 0.5);
        assert_eq!(config.sample_rate, 48000);
    }

    #[test]
    fn test_resolve_asset() {
        let mut config = DemoConfig::default();
        assert_eq!(config.resolve_asset(), "bgm.mp3");

        config.origin = Some("http://localhost:5173/".into());
        assert_eq!(config.resolve_asset(), "http://localhost:5173/bgm.mp3");

        config.origin = Some("/srv/public".into());
        assert_eq!(
            PathBuf::from(config.resolve_asset()),
            PathBuf::from("/srv/public/bgm.mp3")
        );
    }

    #[test]
    fn test_overrides() {
        let config = DemoConfig::default().with_overrides(|key| match key {
            ASSET_ENV => Some("loop.wav".to_string()),
            _ => None,
        });
        assert_eq!(config.asset, "loop.wav");
        assert_eq!(config.origin, None);
    }

    #[test]
    fn test_validation() {
        let config = DemoConfig {
            gain: 12.0,
            ..DemoConfig::default()
        };
        assert_eq!(config.validated().unwrap().gain, MAX_GAIN);

        let config = DemoConfig {
            channels: 6,
            ..DemoConfig::default()
        };
        assert!(matches!(config.validated(), Err(AudioError::ConfigError(_))));
    }

    #[test]
    fn test_retries_are_bounded() {
        let config = DemoConfig {
            http_retries: 1000,
            ..DemoConfig::default()
        };
        assert_eq!(config.validated().unwrap().http_retries, MAX_HTTP_RETRIES);
        assert_eq!(DemoConfig::default().validated().unwrap().http_retries, 2);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("looptrack-config-does-not-exist.json");
        assert_eq!(DemoConfig::load(&path).unwrap(), DemoConfig::default());
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("HTTPS://example.com/a.mp3"));
        assert!(!is_remote("assets/a.mp3"));
    }
}
