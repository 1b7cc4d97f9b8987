//! Startup parameters for bring-up.
//!
//! Window size, names and the validation toggle are explicit values handed to
//! [`crate::GraphicsContext::new`], loaded from TOML or defaulted.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    #[serde(default = "default_window_title")]
    pub title: String,
    #[serde(default = "default_window_width")]
    pub width: u32,
    #[serde(default = "default_window_height")]
    pub height: u32,
    #[serde(default)]
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_window_title(),
            width: default_window_width(),
            height: default_window_height(),
            resizable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VulkanConfig {
    #[serde(default = "default_application_name")]
    pub application_name: String,
    #[serde(default = "default_engine_name")]
    pub engine_name: String,
    /// Enables `VK_LAYER_KHRONOS_validation` and the debug messenger.
    #[serde(default = "default_enable_validation")]
    pub enable_validation: bool,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            engine_name: default_engine_name(),
            enable_validation: default_enable_validation(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive such as `info` or `vk_bringup=debug,vulkan=warn`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

/// Root configuration for a bring-up run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BringupConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub vulkan: VulkanConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BringupConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BringupConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the TOML file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        EnvFilter::try_new(&self.logging.level).map_err(|e| {
            ConfigError::Invalid(format!("invalid log level '{}': {}", self.logging.level, e))
        })?;
        Ok(())
    }
}

fn default_window_title() -> String {
    "Vulkan".to_string()
}

fn default_window_width() -> u32 {
    800
}

fn default_window_height() -> u32 {
    600
}

fn default_application_name() -> String {
    "Hello Triangle".to_string()
}

fn default_engine_name() -> String {
    "No Engine".to_string()
}

fn default_enable_validation() -> bool {
    cfg!(debug_assertions)
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = BringupConfig::from_toml_str("").unwrap();
        assert_eq!(config, BringupConfig::default());
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.vulkan.enable_validation, cfg!(debug_assertions));
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config = BringupConfig::from_toml_str(
            r#"
            [window]
            width = 1024
            height = 768

            [vulkan]
            enable_validation = false
            "#,
        )
        .unwrap();
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 768);
        assert_eq!(config.window.title, "Vulkan");
        assert!(!config.vulkan.enable_validation);
        assert_eq!(config.vulkan.application_name, "Hello Triangle");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_zero_width_is_rejected() {
        let err = BringupConfig::from_toml_str("[window]\nwidth = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = BringupConfig::from_toml_str("[window]\nfullscreen = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = BringupConfig::load("/nonexistent/vk-bringup.toml").unwrap_err();
        match err {
            ConfigError::Io { path, .. } => assert!(path.ends_with("vk-bringup.toml")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = BringupConfig::load_or_default(None::<&str>).unwrap();
        assert_eq!(config, BringupConfig::default());
    }
}
