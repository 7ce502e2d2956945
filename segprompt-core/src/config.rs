//! Configuration for prompt sessions and rendering

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Compute backend for mask composition and embedding inference.
///
/// Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Accelerator,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Accelerator => write!(f, "accelerator"),
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "accelerator" | "gpu" | "cuda" => Ok(Device::Accelerator),
            other => Err(Error::Configuration(format!("unknown device: {}", other))),
        }
    }
}

/// Options for a single render call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// One random color per mask instead of the fixed blue.
    pub random_color: bool,
    /// Close/open each mask before compositing to drop speckle noise.
    pub better_quality: bool,
    /// Composite at the mask resolution instead of the image resolution.
    pub retina: bool,
    /// Trace mask outlines on top of the overlay.
    pub with_contours: bool,
    /// Seed for random colors; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            random_color: true,
            better_quality: true,
            retina: false,
            with_contours: true,
            seed: None,
        }
    }
}

/// File-level configuration for the `segprompt` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub device: Device,
    /// Directory the rendered overlay is written to.
    pub output_dir: PathBuf,
    /// Directory holding the CLIP encoders and tokenizer for text prompts.
    pub model_dir: Option<PathBuf>,
    /// Formatter minimum area for the "everything" prompt.
    pub min_area: usize,
    pub render: RenderOptions,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            device: Device::Cpu,
            output_dir: PathBuf::from("./output"),
            model_dir: None,
            min_area: 0,
            render: RenderOptions::default(),
        }
    }
}

impl PromptConfig {
    /// Load from a TOML file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: PromptConfig = toml::from_str(text)
            .map_err(|e| Error::Configuration(format!("invalid config: {}", e)))?;
        config.validate().map_err(Error::Configuration)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.output_dir.as_os_str().is_empty() {
            return Err("Output directory must not be empty".to_string());
        }

        if let Some(dir) = &self.model_dir {
            if dir.as_os_str().is_empty() {
                return Err("Model directory must not be empty when set".to_string());
            }
        }

        Ok(())
    }
}
