use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::detection::DEFAULT_LABEL;
use crate::error::{Result, VisionError};
use crate::image_io;
use crate::normalizer::MIN_INLINE_IMAGE_LEN;
use crate::renderer;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_line_width")]
    pub line_width: u32,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// TrueType/OpenType font used for labels instead of the bundled DejaVu Sans.
    #[serde(default)]
    pub font_path: Option<String>,
    #[serde(default = "default_fallback_label")]
    pub fallback_label: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NormalizerConfig {
    #[serde(default = "default_min_inline_image_len")]
    pub min_inline_image_len: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_output_dir() -> String {
    "./output".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_color() -> String {
    "#2563eb".to_string()
}

fn default_line_width() -> u32 {
    4
}

fn default_font_size() -> f32 {
    24.0
}

fn default_fallback_label() -> String {
    DEFAULT_LABEL.to_string()
}

fn default_min_inline_image_len() -> usize {
    MIN_INLINE_IMAGE_LEN
}

fn default_format() -> String {
    "png".to_string()
}

fn default_quality() -> u8 {
    90
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            log_level: default_log_level(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            color: default_color(),
            line_width: default_line_width(),
            font_size: default_font_size(),
            font_path: None,
            fallback_label: default_fallback_label(),
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            min_inline_image_len: default_min_inline_image_len(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            quality: default_quality(),
        }
    }
}

impl Config {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_path(path);
        }

        if let Some(path) = Self::discover_config_file()? {
            Self::load_from_path(&path)
        } else {
            Ok(Config::default())
        }
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            VisionError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn discover_config_file() -> Result<Option<PathBuf>> {
        let current_dir = env::current_dir().map_err(|e| {
            VisionError::Config(format!(
                "Failed to determine current directory for config discovery: {}",
                e
            ))
        })?;

        let local_config = current_dir.join("faucet-vision.toml");
        if local_config.exists() {
            return Ok(Some(local_config));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config/faucet-vision/config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        Ok(None)
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.output_dir.trim().is_empty() {
            return Err(VisionError::InvalidConfig(
                "output_dir cannot be empty".to_string(),
            ));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.general.log_level.as_str()) {
            return Err(VisionError::InvalidConfig(format!(
                "Invalid log_level '{}'. Must be one of: trace, debug, info, warn, error",
                self.general.log_level
            )));
        }

        renderer::parse_hex_color(&self.render.color)?;

        if !(1..=64).contains(&self.render.line_width) {
            return Err(VisionError::InvalidConfig(format!(
                "line_width must be between 1 and 64, got {}",
                self.render.line_width
            )));
        }

        if !(self.render.font_size.is_finite() && self.render.font_size > 0.0) {
            return Err(VisionError::InvalidConfig(format!(
                "font_size must be a positive number, got {}",
                self.render.font_size
            )));
        }

        if let Some(font) = &self.render.font_path {
            if font.trim().is_empty() {
                return Err(VisionError::InvalidConfig(
                    "font_path cannot be empty when set".to_string(),
                ));
            }
        }

        if self.render.fallback_label.trim().is_empty() {
            return Err(VisionError::InvalidConfig(
                "fallback_label cannot be empty".to_string(),
            ));
        }

        image_io::format_from_name(&self.output.format)
            .map_err(|e| VisionError::InvalidConfig(e.to_string()))?;

        if !(1..=100).contains(&self.output.quality) {
            return Err(VisionError::InvalidConfig(format!(
                "quality must be between 1 and 100, got {}",
                self.output.quality
            )));
        }

        Ok(())
    }

    pub fn ensure_paths(&self) -> Result<()> {
        let path = Path::new(&self.general.output_dir);
        fs::create_dir_all(path).map_err(|e| {
            VisionError::Config(format!(
                "Failed to create output directory '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
