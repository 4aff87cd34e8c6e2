//! Project manifest (`vivid.toml`) loading.
//!
//! Every field is optional; a project without a manifest runs with the
//! defaults below.

use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;

/// Window/output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Audio session settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Block size in frames.
    pub block_size: usize,
    /// Disables the audio callback entirely.
    pub disabled: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 256,
            disabled: false,
        }
    }
}

/// Parsed `vivid.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Window settings.
    pub window: WindowConfig,
    /// Audio settings.
    pub audio: AudioConfig,
    /// Extra asset search roots, relative to the project directory.
    pub asset_paths: Vec<String>,
    /// Editor bridge port override (after `VIVID_EDITOR_PORT`).
    pub editor_port: Option<u16>,
}

impl ProjectConfig {
    /// Loads `<project>/vivid.toml`, or defaults when absent.
    pub fn load(project_dir: &Path) -> anyhow::Result<Self> {
        let path = project_dir.join("vivid.toml");
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_manifest_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.audio.sample_rate, 48000);
        assert!(config.asset_paths.is_empty());
    }

    #[test]
    fn partial_manifest_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("vivid.toml"),
            "[window]\nwidth = 1920\nheight = 1080\n\n[audio]\nblock_size = 512\n\nasset_paths = [\"media\"]\n",
        )
        .unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.audio.block_size, 512);
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.asset_paths, vec!["media".to_string()]);
    }

    #[test]
    fn invalid_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("vivid.toml"), "window = 3").unwrap();
        assert!(ProjectConfig::load(dir.path()).is_err());
    }
}
