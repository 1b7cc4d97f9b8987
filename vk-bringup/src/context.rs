use std::sync::Arc;

use ash::vk;
use raw_window_handle::HasRawDisplayHandle;
use tracing::{info, warn};
use winit::window::Window;

use crate::capabilities::{enumerate_candidates, DeviceCandidate, DeviceRequirements};
use crate::config::BringupConfig;
use crate::device::LogicalDevice;
use crate::error::Result;
use crate::instance::Instance;
use crate::queues::{negotiate, QueueAssignment};
use crate::selector::select_device;
use crate::surface::Surface;
use crate::surface_config::{configure, SwapchainConfig};
use crate::swapchain::Swapchain;

/// Every Vulkan object created during bring-up.
///
/// Fields are declared in teardown order and dropped in that order:
/// swapchain, device, surface (then the window, once the surface no longer
/// references it), debug messenger, instance.
pub struct GraphicsContext {
    swapchain: Swapchain,
    device: LogicalDevice,
    surface: Surface,
    instance: Instance,
    physical_device: DeviceCandidate,
    requirements: DeviceRequirements,
    queue_assignment: QueueAssignment,
}

impl GraphicsContext {
    pub fn new(config: &BringupConfig, window: Arc<Window>) -> Result<Self> {
        let requirements = DeviceRequirements::default();

        let instance = Instance::new(&config.vulkan, window.raw_display_handle())?;
        let surface = Surface::new(&instance, window)?;

        let candidates = enumerate_candidates(instance.raw())?;
        let physical_device = select_device(candidates, &requirements)?;

        let probe = surface.for_device(physical_device.handle);
        let queue_assignment = negotiate(&physical_device.queue_families, &probe)?;

        let device = LogicalDevice::new(
            instance.raw(),
            physical_device.handle,
            &queue_assignment,
            &requirements,
        )?;

        let swapchain_config = configure(&probe, surface.window().as_ref())?;
        let swapchain = Swapchain::new(
            instance.raw(),
            Arc::clone(device.raw()),
            surface.handle(),
            &swapchain_config,
            &queue_assignment,
            vk::SwapchainKHR::null(),
        )?;

        info!("Vulkan bring-up complete on {}.", physical_device.name);
        Ok(Self {
            swapchain,
            device,
            surface,
            instance,
            physical_device,
            requirements,
            queue_assignment,
        })
    }

    /// Renegotiates the surface configuration and replaces the swapchain.
    ///
    /// Waits for the device to go idle first. The previous swapchain is
    /// handed to the driver as `oldSwapchain` and destroyed afterwards.
    pub fn recreate_swapchain(&mut self) -> Result<()> {
        self.device.wait_idle()?;

        let probe = self.surface.for_device(self.physical_device.handle);
        let swapchain_config = configure(&probe, self.surface.window().as_ref())?;
        let swapchain = Swapchain::new(
            self.instance.raw(),
            Arc::clone(self.device.raw()),
            self.surface.handle(),
            &swapchain_config,
            &self.queue_assignment,
            self.swapchain.handle(),
        )?;

        let retired = std::mem::replace(&mut self.swapchain, swapchain);
        drop(retired);
        info!(
            "Swapchain recreated at {}x{}.",
            swapchain_config.extent.width, swapchain_config.extent.height
        );
        Ok(())
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> &DeviceCandidate {
        &self.physical_device
    }

    pub fn requirements(&self) -> &DeviceRequirements {
        &self.requirements
    }

    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    pub fn queue_assignment(&self) -> &QueueAssignment {
        &self.queue_assignment
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn swapchain_config(&self) -> &SwapchainConfig {
        self.swapchain.config()
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        if let Err(err) = self.device.wait_idle() {
            warn!("device_wait_idle failed during teardown: {}", err);
        }
        info!("Tearing down Vulkan context.");
    }
}
