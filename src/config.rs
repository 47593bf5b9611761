use crate::page::DEFAULT_CONTENT_SELECTORS;
use crate::transport::DEFAULT_USER_AGENT;
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_DELAY_MS: u64 = 1_500;
pub const MAX_DELAY_MS: u64 = 60_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 25;
const MAX_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Pause between two downloads. Zero disables the pause.
    pub delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Content-region selectors, tried in order.
    pub content_selectors: Vec<String>,
    pub show_preview: bool,
    /// Write the CSV manifest and JSON summary next to the images.
    pub write_manifest: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            content_selectors: DEFAULT_CONTENT_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            show_preview: true,
            write_manifest: true,
        }
    }
}

impl DownloaderConfig {
    /// Clamps limits and drops blank selectors; an empty selector list or user agent falls
    /// back to the defaults.
    pub fn normalized(mut self) -> Self {
        self.delay_ms = self.delay_ms.min(MAX_DELAY_MS);
        self.timeout_secs = self.timeout_secs.clamp(1, MAX_TIMEOUT_SECS);

        let user_agent = self.user_agent.trim();
        self.user_agent = if user_agent.is_empty() {
            DEFAULT_USER_AGENT.to_string()
        } else {
            user_agent.to_string()
        };

        let mut selectors: Vec<String> = Vec::new();
        for raw in self.content_selectors {
            let trimmed = raw.trim();
            if trimmed.is_empty() || selectors.iter().any(|existing| existing == trimmed) {
                continue;
            }
            selectors.push(trimmed.to_string());
        }
        self.content_selectors = if selectors.is_empty() {
            Self::default().content_selectors
        } else {
            selectors
        };
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Reads the config at `path`; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<DownloaderConfig> {
    if !path.exists() {
        return Ok(DownloaderConfig::default());
    }
    let bytes = std::fs::read(path)?;
    let parsed: DownloaderConfig =
        serde_json::from_slice(&bytes).map_err(|e| EngineError::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(parsed.normalized())
}

pub fn save_config(path: &Path, config: &DownloaderConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&dir.path().join("nope.json")).expect("load");
        assert_eq!(cfg, DownloaderConfig::default());
        assert_eq!(cfg.delay(), Duration::from_millis(1_500));
        assert_eq!(cfg.content_selectors[0], ".entry-content");
    }

    #[test]
    fn partial_file_keeps_other_defaults_and_clamps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"delay_ms": 999999, "timeout_secs": 0, "content_selectors": [" ", ".story", ".story"]}"#,
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.delay_ms, MAX_DELAY_MS);
        assert_eq!(cfg.timeout_secs, 1);
        assert_eq!(cfg.content_selectors, vec![".story".to_string()]);
        assert!(cfg.show_preview);
        assert_eq!(cfg.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn invalid_json_is_reported_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").expect("write");
        let err = load_config(&path).expect_err("should fail");
        assert!(
            matches!(err, EngineError::InvalidConfig { ref path, .. } if path.ends_with("config.json")),
            "err={err}"
        );
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");
        let cfg = DownloaderConfig {
            delay_ms: 0,
            write_manifest: false,
            ..DownloaderConfig::default()
        };
        save_config(&path, &cfg).expect("save");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }
}
