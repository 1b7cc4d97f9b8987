//! Vulkan bring-up: picks a physical device, negotiates graphics and present
//! queues, and configures a swapchain for a window surface.
//!
//! The negotiation steps ([`select_device`], [`negotiate`], [`configure`])
//! work on plain data and small collaborator traits, so they run without a
//! driver. [`GraphicsContext`] wires them to a real instance and window.

pub mod capabilities;
pub mod config;
mod context;
pub mod device;
pub mod error;
pub mod instance;
pub mod logging;
pub mod queues;
pub mod selector;
pub mod surface;
pub mod surface_config;
pub mod swapchain;

pub use capabilities::{DeviceCandidate, DeviceFeatures, DeviceRequirements, QueueFamily, SuitabilityReport};
pub use config::BringupConfig;
pub use context::GraphicsContext;
pub use error::{BringupError, ConfigError, QueueRole, Result};
pub use logging::init_logging;
pub use queues::{negotiate, AssignmentKind, PresentSupport, QueueAssignment};
pub use selector::select_device;
pub use surface_config::{configure, FramebufferSize, SurfaceQuery, SurfaceSupport, SwapchainConfig};
pub use swapchain::Swapchain;
