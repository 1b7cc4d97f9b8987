//! Swapchain parameter negotiation.
//!
//! Every choice made here has a fallback, so resolving a [`SwapchainConfig`]
//! cannot fail once the surface data has been fetched. It is meant to be run
//! again whenever the surface changes size.

use ash::prelude::VkResult;
use ash::vk;
use tracing::info;

use crate::error::{BringupError, Result};

pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

pub const PREFERRED_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;

/// Always supported by a conformant surface.
pub const FALLBACK_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

/// Image count wanted for triple buffering, even if the surface allows fewer.
pub const PREFERRED_IMAGE_COUNT: u32 = 3;

/// `currentExtent.width` value meaning the window system leaves the size to us.
pub const UNDEFINED_EXTENT: u32 = u32::MAX;

/// Capabilities, formats and present modes reported for a device/surface pair.
///
/// The format and present mode lists are never empty.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    capabilities: vk::SurfaceCapabilitiesKHR,
    formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub fn new(
        capabilities: vk::SurfaceCapabilitiesKHR,
        formats: Vec<vk::SurfaceFormatKHR>,
        present_modes: Vec<vk::PresentModeKHR>,
    ) -> Result<Self> {
        if formats.is_empty() {
            return Err(BringupError::NonConformantSurface("no surface formats reported"));
        }
        if present_modes.is_empty() {
            return Err(BringupError::NonConformantSurface("no present modes reported"));
        }
        Ok(Self { capabilities, formats, present_modes })
    }

    pub fn capabilities(&self) -> &vk::SurfaceCapabilitiesKHR {
        &self.capabilities
    }

    pub fn formats(&self) -> &[vk::SurfaceFormatKHR] {
        &self.formats
    }

    pub fn present_modes(&self) -> &[vk::PresentModeKHR] {
        &self.present_modes
    }
}

/// Fetches [`SurfaceSupport`] for the selected device and surface.
pub trait SurfaceQuery {
    fn surface_support(&self) -> Result<SurfaceSupport>;
}

/// Source of the window's current framebuffer size in pixels.
///
/// Only consulted when the surface leaves the extent undefined.
pub trait FramebufferSize {
    fn framebuffer_size(&self) -> vk::Extent2D;
}

impl FramebufferSize for vk::Extent2D {
    fn framebuffer_size(&self) -> vk::Extent2D {
        *self
    }
}

impl FramebufferSize for winit::window::Window {
    fn framebuffer_size(&self) -> vk::Extent2D {
        let size = self.inner_size();
        vk::Extent2D { width: size.width, height: size.height }
    }
}

/// Everything swapchain creation needs from negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub min_image_count: u32,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
}

impl SwapchainConfig {
    pub fn negotiate(support: &SurfaceSupport, window: &(impl FramebufferSize + ?Sized)) -> Self {
        let capabilities = support.capabilities();
        let surface_format = choose_surface_format(support.formats());
        Self {
            min_image_count: choose_image_count(capabilities),
            format: surface_format.format,
            color_space: surface_format.color_space,
            extent: choose_extent(capabilities, window),
            present_mode: choose_present_mode(support.present_modes()),
            pre_transform: capabilities.current_transform,
            composite_alpha: choose_composite_alpha(capabilities.supported_composite_alpha),
        }
    }
}

/// Queries the surface and resolves a [`SwapchainConfig`].
pub fn configure(
    query: &impl SurfaceQuery,
    window: &(impl FramebufferSize + ?Sized),
) -> Result<SwapchainConfig> {
    let support = query.surface_support()?;
    let config = SwapchainConfig::negotiate(&support, window);
    info!(
        "Swapchain config: {} images, {:?}/{:?}, {}x{}, {:?}",
        config.min_image_count,
        config.format,
        config.color_space,
        config.extent.width,
        config.extent.height,
        config.present_mode
    );
    Ok(config)
}

/// `max(3, minImageCount)`, lowered to `maxImageCount` when that is bounded.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = PREFERRED_IMAGE_COUNT.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        count
    }
}

/// The preferred sRGB BGRA format if listed, else the first reported format.
///
/// The fallback is not checked against the device's render target support.
/// Panics if `formats` is empty; [`SurfaceSupport`] never is.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format
                && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .unwrap_or(formats[0])
}

pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&PREFERRED_PRESENT_MODE) {
        PREFERRED_PRESENT_MODE
    } else {
        FALLBACK_PRESENT_MODE
    }
}

/// The surface's current extent when defined, else the window's framebuffer
/// size clamped per dimension into the supported range.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window: &(impl FramebufferSize + ?Sized),
) -> vk::Extent2D {
    if capabilities.current_extent.width != UNDEFINED_EXTENT {
        return capabilities.current_extent;
    }

    let size = window.framebuffer_size();
    let (min, max) = (capabilities.min_image_extent, capabilities.max_image_extent);
    vk::Extent2D {
        width: size.width.max(min.width).min(max.width),
        height: size.height.max(min.height).min(max.height),
    }
}

pub fn choose_composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|&mode| supported.contains(mode))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// Adapts a closure as a [`SurfaceQuery`].
impl<F> SurfaceQuery for F
where
    F: Fn() -> VkResult<SurfaceSupportParts>,
{
    fn surface_support(&self) -> Result<SurfaceSupport> {
        let (capabilities, formats, present_modes) = self()?;
        SurfaceSupport::new(capabilities, formats, present_modes)
    }
}

/// Raw query results as returned by the driver.
pub type SurfaceSupportParts = (
    vk::SurfaceCapabilitiesKHR,
    Vec<vk::SurfaceFormatKHR>,
    Vec<vk::PresentModeKHR>,
);
