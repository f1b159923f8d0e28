//! Configuration types and loading
//!
//! Attachment intake settings: image compression preferences and the
//! fixed size/count ceilings enforced on pending attachments.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::units::MIB;

/// Image compression preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompressionSettings {
    /// Compress images before attaching them
    pub enabled: bool,
    /// Lossy encoding quality, 1-100
    pub quality: u8,
    /// Bound on the longer image side, in pixels
    pub max_width_or_height: u32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            quality: 80,
            max_width_or_height: 1920,
        }
    }
}

impl CompressionSettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Check that quality and dimension are in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::InvalidValue {
                key: "quality".to_string(),
                message: format!("{} is outside 1-100", self.quality),
            });
        }
        if self.max_width_or_height == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_width_or_height".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Ceilings on pending attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct IntakeLimits {
    /// Per-item ceiling for images and text files (original size)
    pub max_item_bytes: u64,
    /// Ceiling on the summed size of all pending text files
    pub max_total_text_bytes: u64,
    /// Maximum number of pending images
    pub max_images: usize,
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            max_item_bytes: 10 * MIB,
            max_total_text_bytes: 10 * MIB,
            max_images: 8,
        }
    }
}

/// Attachment intake configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub compression: CompressionSettings,
    pub limits: IntakeLimits,
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl IntakeConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables keep their defaults; the ceilings are not
    /// configurable from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.compression.validate()?;
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = lookup("CHAT_COMPRESS_IMAGES") {
            config.compression.enabled = parse_bool("CHAT_COMPRESS_IMAGES", &v)?;
        }
        if let Some(v) = lookup("CHAT_IMAGE_QUALITY") {
            config.compression.quality = parse_number("CHAT_IMAGE_QUALITY", &v)?;
        }
        if let Some(v) = lookup("CHAT_IMAGE_MAX_DIMENSION") {
            config.compression.max_width_or_height = parse_number("CHAT_IMAGE_MAX_DIMENSION", &v)?;
        }

        config.compression.validate()?;
        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {:?}", other),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

/// Live handle to the compression settings
///
/// Clones share the same underlying value. The host updates it whenever the
/// user moves a slider; readers take a [`snapshot`](Self::snapshot) each time
/// they need the current values.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<CompressionSettings>>,
}

impl SharedSettings {
    pub fn new(settings: CompressionSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> CompressionSettings {
        *self.inner.read()
    }

    /// Replace the settings after validating them
    pub fn replace(&self, settings: CompressionSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        *self.inner.write() = settings;
        tracing::debug!(?settings, "Compression settings replaced");
        Ok(())
    }

    /// Modify the settings in place; rejected edits leave them untouched
    pub fn update(&self, f: impl FnOnce(&mut CompressionSettings)) -> Result<(), ConfigError> {
        let mut guard = self.inner.write();
        let mut next = *guard;
        f(&mut next);
        next.validate()?;
        *guard = next;
        Ok(())
    }
}
