//! Error types for device bring-up.
//!
//! Every failure in this crate is fatal for startup: nothing is retried and no
//! partially created device, queue or swapchain survives an error. The binary
//! reports the error chain and exits.

use std::fmt;
use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// A specialized `Result` type for bring-up operations.
pub type Result<T> = std::result::Result<T, BringupError>;

/// The queue role that could not be satisfied during queue negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueRole {
    Graphics,
    Presentation,
}

impl fmt::Display for QueueRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueRole::Graphics => write!(f, "graphics"),
            QueueRole::Presentation => write!(f, "presentation"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BringupError {
    /// The instance enumerated zero physical devices.
    #[error("failed to find GPUs with Vulkan support")]
    NoDevicesAvailable,

    /// Devices exist, but none passed every capability check.
    #[error("failed to find a suitable GPU among {candidates} candidate(s)")]
    NoSuitableDevice { candidates: usize },

    /// The selected device has no queue family for the given role.
    #[error("could not find a queue family for {role}")]
    NoSuitableQueues { role: QueueRole },

    /// The surface query collaborator returned data a conformant surface never reports.
    #[error("non-conformant surface: {0}")]
    NonConformantSurface(&'static str),

    #[error("validation layer {0} requested but not available")]
    MissingValidationLayer(String),

    #[error("required instance extension {0} is not supported")]
    MissingInstanceExtension(String),

    #[error("failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("name contains an interior NUL byte: {0}")]
    InvalidName(#[from] std::ffi::NulError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while loading or validating [`crate::config::BringupConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_error_names_the_role() {
        let err = BringupError::NoSuitableQueues { role: QueueRole::Presentation };
        assert_eq!(err.to_string(), "could not find a queue family for presentation");
    }

    #[test]
    fn test_vk_result_converts() {
        let err: BringupError = vk::Result::ERROR_DEVICE_LOST.into();
        assert!(matches!(err, BringupError::Vulkan(vk::Result::ERROR_DEVICE_LOST)));
    }
}
