use std::borrow::Cow;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use ash::extensions::ext::DebugUtils;
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, info};

use crate::config::VulkanConfig;
use crate::error::{BringupError, Result};

pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = *p_callback_data;
    let message = if callback_data.p_message.is_null() {
        Cow::from("")
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE => {
            tracing::debug!(target: "vulkan", "validation layer: type {:?} msg: {}", message_type, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            tracing::info!(target: "vulkan", "validation layer: type {:?} msg: {}", message_type, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!(target: "vulkan", "validation layer: type {:?} msg: {}", message_type, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!(target: "vulkan", "validation layer: type {:?} msg: {}", message_type, message);
        }
        _ => {
            tracing::trace!(target: "vulkan", "validation layer: severity {:?} type {:?} msg: {}", message_severity, message_type, message);
        }
    }
    vk::FALSE
}

fn debug_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
        .build()
}

/// Returns the first name in `required` that is not in `available`.
fn first_missing<'a>(required: &[&'a CStr], available: &[&CStr]) -> Option<&'a CStr> {
    required
        .iter()
        .copied()
        .find(|name| !available.contains(name))
}

/// Owns the loader entry, the instance and, with validation on, the debug
/// messenger. Dropping it destroys the messenger and then the instance.
pub struct Instance {
    entry: ash::Entry,
    instance: ash::Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Creates an API 1.3 instance with the surface extensions the display
    /// needs.
    pub fn new(config: &VulkanConfig, display_handle: RawDisplayHandle) -> Result<Self> {
        let entry = unsafe { ash::Entry::load()? };

        let app_name = CString::new(config.application_name.as_str())?;
        let engine_name = CString::new(config.engine_name.as_str())?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_3);

        let validation_layer = CString::new(VALIDATION_LAYER)?;
        let mut layers: Vec<*const c_char> = Vec::new();
        if config.enable_validation {
            let properties = unsafe { entry.enumerate_instance_layer_properties()? };
            let available: Vec<&CStr> = properties
                .iter()
                .map(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) })
                .collect();
            if !available.contains(&validation_layer.as_c_str()) {
                return Err(BringupError::MissingValidationLayer(VALIDATION_LAYER.to_string()));
            }
            layers.push(validation_layer.as_ptr());
        }

        let mut extensions: Vec<&CStr> = ash_window::enumerate_required_extensions(display_handle)?
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) })
            .collect();
        if config.enable_validation {
            extensions.push(DebugUtils::name());
        }

        let properties = unsafe { entry.enumerate_instance_extension_properties(None)? };
        let available: Vec<&CStr> = properties
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
            .collect();
        if let Some(missing) = first_missing(&extensions, &available) {
            return Err(BringupError::MissingInstanceExtension(
                missing.to_string_lossy().into_owned(),
            ));
        }
        let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|name| name.as_ptr()).collect();

        // Chained so instance creation and destruction are also covered.
        let mut instance_debug_info = debug_messenger_create_info();
        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extension_ptrs);
        if config.enable_validation {
            create_info = create_info.push_next(&mut instance_debug_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!("Vulkan instance created (validation: {}).", config.enable_validation);

        let mut this = Self { entry, instance, debug_utils: None };
        if config.enable_validation {
            let loader = DebugUtils::new(&this.entry, &this.instance);
            let messenger = unsafe { loader.create_debug_utils_messenger(&debug_messenger_create_info(), None)? };
            this.debug_utils = Some((loader, messenger));
            debug!("Vulkan debug messenger created.");
        }
        Ok(this)
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn raw(&self) -> &ash::Instance {
        &self.instance
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
                debug!("Vulkan debug messenger destroyed.");
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_missing_extension() {
        let surface = CString::new("VK_KHR_surface").unwrap();
        let xlib = CString::new("VK_KHR_xlib_surface").unwrap();
        let wayland = CString::new("VK_KHR_wayland_surface").unwrap();
        let required = [surface.as_c_str(), wayland.as_c_str()];
        let available = [surface.as_c_str(), xlib.as_c_str()];

        assert_eq!(first_missing(&required, &available), Some(wayland.as_c_str()));
        assert_eq!(first_missing(&required[..1], &available), None);
    }

    #[test]
    fn test_debug_messenger_routes_all_reported_severities() {
        let info = debug_messenger_create_info();
        assert!(info.message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR));
        assert!(info.message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
        assert!(info.message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION));
        assert!(info.pfn_user_callback.is_some());
    }
}
