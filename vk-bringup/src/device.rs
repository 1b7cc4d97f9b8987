use std::ffi::CStr;
use std::os::raw::c_char;
use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::capabilities::{extended_dynamic_state_extension, DeviceFeatures, DeviceRequirements};
use crate::error::Result;
use crate::queues::QueueAssignment;

const QUEUE_PRIORITY: f32 = 0.5;

/// Device extensions to enable for `requirements`.
///
/// The extended dynamic state feature block is only valid with its
/// extension enabled.
pub fn device_extensions(requirements: &DeviceRequirements) -> Vec<&'static CStr> {
    let mut extensions = requirements.extensions.clone();
    if requirements.features.extended_dynamic_state
        && !extensions.contains(&extended_dynamic_state_extension())
    {
        extensions.push(extended_dynamic_state_extension());
    }
    extensions
}

/// The logical device and the graphics and present queues taken from it.
pub struct LogicalDevice {
    device: Arc<ash::Device>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl LogicalDevice {
    /// Requests one queue per distinct family in `assignment`, the extensions
    /// from `requirements`, and every flag set in `requirements.features`.
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        assignment: &QueueAssignment,
        requirements: &DeviceRequirements,
    ) -> Result<Self> {
        let priorities = [QUEUE_PRIORITY];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = assignment
            .unique_families()
            .into_iter()
            .map(|family_index| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family_index)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extensions = device_extensions(requirements);
        let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|name| name.as_ptr()).collect();

        let DeviceFeatures {
            shader_draw_parameters,
            dynamic_rendering,
            extended_dynamic_state,
        } = requirements.features;
        let mut vulkan11 = vk::PhysicalDeviceVulkan11Features {
            shader_draw_parameters: shader_draw_parameters.into(),
            ..Default::default()
        };
        let mut vulkan13 = vk::PhysicalDeviceVulkan13Features {
            dynamic_rendering: dynamic_rendering.into(),
            ..Default::default()
        };
        let mut dynamic_state = vk::PhysicalDeviceExtendedDynamicStateFeaturesEXT {
            extended_dynamic_state: extended_dynamic_state.into(),
            ..Default::default()
        };
        let mut features2 = vk::PhysicalDeviceFeatures2::builder()
            .push_next(&mut vulkan11)
            .push_next(&mut vulkan13);
        if extended_dynamic_state {
            features2 = features2.push_next(&mut dynamic_state);
        }

        let create_info = vk::DeviceCreateInfo::builder()
            .push_next(&mut features2)
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_ptrs);

        let device = unsafe { instance.create_device(physical_device, &create_info, None)? };
        info!(
            "Logical device created with {} queue families and {} extensions.",
            queue_create_infos.len(),
            extension_ptrs.len()
        );

        let graphics_queue = unsafe { device.get_device_queue(assignment.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(assignment.present_family, 0) };

        Ok(Self {
            device: Arc::new(device),
            graphics_queue,
            present_queue,
        })
    }

    pub fn raw(&self) -> &Arc<ash::Device> {
        &self.device
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe { self.device.destroy_device(None) };
        info!("Vulkan logical device destroyed.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_state_extension_added_when_feature_requested() {
        let requirements = DeviceRequirements::default();
        let extensions = device_extensions(&requirements);
        assert_eq!(extensions.len(), requirements.extensions.len() + 1);
        assert_eq!(extensions.last().copied(), Some(extended_dynamic_state_extension()));
    }

    #[test]
    fn test_dynamic_state_extension_not_duplicated() {
        let mut requirements = DeviceRequirements::default();
        requirements.extensions.push(extended_dynamic_state_extension());
        let extensions = device_extensions(&requirements);
        assert_eq!(extensions.len(), requirements.extensions.len());
    }

    #[test]
    fn test_no_dynamic_state_extension_without_feature() {
        let mut requirements = DeviceRequirements::default();
        requirements.features.extended_dynamic_state = false;
        assert_eq!(device_extensions(&requirements), requirements.extensions);
    }
}
