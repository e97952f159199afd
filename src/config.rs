use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PssError, Result};

// Defaults taken from the stock PS2 FMV settings
fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    448
}

fn default_bitrate() -> u32 {
    8000
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ps2str() -> String {
    "bin/ps2str".to_string()
}

fn default_vgmstream() -> String {
    "bin/vgmstream-cli".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub encode: EncodeConfig,
    #[serde(default)]
    pub decode: DecodeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Directory the bundled tools live in. Defaults to the executable's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_dir: Option<PathBuf>,
    /// ffmpeg binary, relative to `tool_dir` unless absolute
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    /// ps2str binary (encoder, multiplexer and demultiplexer)
    #[serde(default = "default_ps2str")]
    pub ps2str: String,
    /// vgmstream command line decoder
    #[serde(default = "default_vgmstream")]
    pub vgmstream: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Video bitrate in kbps
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
    #[serde(default)]
    pub keep_intermediates: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeConfig {
    #[serde(default)]
    pub keep_intermediates: bool,
}

/// Fully resolved locations of the external programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ps2str: PathBuf,
    pub vgmstream: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tool_dir: None,
            ffmpeg: default_ffmpeg(),
            ps2str: default_ps2str(),
            vgmstream: default_vgmstream(),
        }
    }
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            bitrate: default_bitrate(),
            keep_intermediates: false,
        }
    }
}

impl ToolsConfig {
    /// Resolve every tool against `tool_dir`, falling back to `fallback_dir`
    /// when the configuration does not name one.
    pub fn resolve(&self, fallback_dir: &Path) -> ToolPaths {
        let base = self.tool_dir.as_deref().unwrap_or(fallback_dir);

        ToolPaths {
            ffmpeg: resolve_tool(base, &self.ffmpeg),
            ps2str: resolve_tool(base, &self.ps2str),
            vgmstream: resolve_tool(base, &self.vgmstream),
        }
    }
}

fn resolve_tool(base: &Path, name: &str) -> PathBuf {
    let mut path = base.join(name);
    if path.extension().is_none() && !std::env::consts::EXE_EXTENSION.is_empty() {
        path.set_extension(std::env::consts::EXE_EXTENSION);
    }
    path
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PssError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PssError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| PssError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
