use std::sync::Arc;

use ash::extensions::khr;
use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use tracing::info;
use winit::window::Window;

use crate::error::Result;
use crate::instance::Instance;
use crate::queues::PresentSupport;
use crate::surface_config::{SurfaceQuery, SurfaceSupport};

/// A presentation surface bound to a window.
///
/// Holds a reference to the window so the window outlives the surface:
/// `vkDestroySurfaceKHR` runs in `drop` before the window reference is
/// released.
pub struct Surface {
    loader: khr::Surface,
    surface: vk::SurfaceKHR,
    window: Arc<Window>,
}

impl Surface {
    pub fn new(instance: &Instance, window: Arc<Window>) -> Result<Self> {
        let surface = unsafe {
            ash_window::create_surface(
                instance.entry(),
                instance.raw(),
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )?
        };
        let loader = khr::Surface::new(instance.entry(), instance.raw());
        info!("Vulkan surface created.");
        Ok(Self { loader, surface, window })
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Surface queries scoped to one physical device.
    pub fn for_device(&self, physical_device: vk::PhysicalDevice) -> SurfaceProbe<'_> {
        SurfaceProbe {
            loader: &self.loader,
            physical_device,
            surface: self.surface,
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.surface, None) };
        info!("Vulkan surface destroyed.");
    }
}

/// Answers presentation and swapchain support questions for a device/surface pair.
pub struct SurfaceProbe<'a> {
    loader: &'a khr::Surface,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
}

impl PresentSupport for SurfaceProbe<'_> {
    fn supports_present(&self, family_index: u32) -> VkResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(self.physical_device, family_index, self.surface)
        }
    }
}

impl SurfaceQuery for SurfaceProbe<'_> {
    fn surface_support(&self) -> Result<SurfaceSupport> {
        let (capabilities, formats, present_modes) = unsafe {
            (
                self.loader
                    .get_physical_device_surface_capabilities(self.physical_device, self.surface)?,
                self.loader
                    .get_physical_device_surface_formats(self.physical_device, self.surface)?,
                self.loader
                    .get_physical_device_surface_present_modes(self.physical_device, self.surface)?,
            )
        };
        SurfaceSupport::new(capabilities, formats, present_modes)
    }
}
