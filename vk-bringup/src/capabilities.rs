//! Physical device capability probing.
//!
//! [`probe`] snapshots everything device selection needs to know about a
//! physical device into a [`DeviceCandidate`]. The candidate answers the
//! suitability questions without touching the driver again.

use std::collections::HashSet;
use std::ffi::{CStr, CString};

use ash::extensions::khr;
use ash::vk;
use tracing::{debug, warn};

use crate::error::Result;

/// Device extensions every selected device must expose.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![
        khr::Swapchain::name(),
        vk::KhrSpirv14Fn::name(),
        vk::KhrSynchronization2Fn::name(),
        vk::KhrCreateRenderpass2Fn::name(),
    ]
}

/// Extension backing [`DeviceFeatures::extended_dynamic_state`].
pub fn extended_dynamic_state_extension() -> &'static CStr {
    vk::ExtExtendedDynamicStateFn::name()
}

/// Device feature flags, by name.
///
/// Used both for what a device reports and for what device creation
/// requests, so the two can be compared field by field.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFeatures {
    /// `VkPhysicalDeviceVulkan11Features::shaderDrawParameters`
    pub shader_draw_parameters: bool,
    /// `VkPhysicalDeviceVulkan13Features::dynamicRendering`
    pub dynamic_rendering: bool,
    /// `VkPhysicalDeviceExtendedDynamicStateFeaturesEXT::extendedDynamicState`
    pub extended_dynamic_state: bool,
}

impl DeviceFeatures {
    /// Every flag this crate's device needs.
    pub const fn required() -> Self {
        Self {
            shader_draw_parameters: true,
            dynamic_rendering: true,
            extended_dynamic_state: true,
        }
    }

    /// True if every flag set in `requested` is also set in `self`.
    pub fn covers(&self, requested: &DeviceFeatures) -> bool {
        (!requested.shader_draw_parameters || self.shader_draw_parameters)
            && (!requested.dynamic_rendering || self.dynamic_rendering)
            && (!requested.extended_dynamic_state || self.extended_dynamic_state)
    }
}

/// What a physical device has to offer to be selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequirements {
    pub min_api_version: u32,
    pub extensions: Vec<&'static CStr>,
    pub features: DeviceFeatures,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        Self {
            min_api_version: vk::API_VERSION_1_3,
            extensions: required_device_extensions(),
            features: DeviceFeatures::required(),
        }
    }
}

/// One entry of a device's queue family list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamily {
    pub index: u32,
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
}

impl QueueFamily {
    pub fn supports_graphics(&self) -> bool {
        self.flags.contains(vk::QueueFlags::GRAPHICS)
    }
}

/// A physical device plus the cached results of probing it.
///
/// Every field defaults to "not satisfied": API version 0, no queue
/// families, no extensions, no features.
#[derive(Debug, Clone, Default)]
pub struct DeviceCandidate {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub queue_families: Vec<QueueFamily>,
    pub extensions: HashSet<CString>,
    pub features: DeviceFeatures,
}

/// Outcome of each suitability check for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuitabilityReport {
    pub api_version: bool,
    pub graphics_queue: bool,
    pub missing_extensions: Vec<&'static CStr>,
    pub features: bool,
}

impl SuitabilityReport {
    pub fn is_suitable(&self) -> bool {
        self.api_version && self.graphics_queue && self.missing_extensions.is_empty() && self.features
    }
}

impl DeviceCandidate {
    pub fn meets_api_version(&self, min_api_version: u32) -> bool {
        self.api_version >= min_api_version
    }

    /// Index of the first queue family with graphics support.
    pub fn first_graphics_family(&self) -> Option<u32> {
        self.queue_families
            .iter()
            .find(|family| family.supports_graphics())
            .map(|family| family.index)
    }

    pub fn supports_extension(&self, name: &CStr) -> bool {
        self.extensions.contains(name)
    }

    pub fn missing_extensions(&self, required: &[&'static CStr]) -> Vec<&'static CStr> {
        required
            .iter()
            .copied()
            .filter(|name| !self.supports_extension(name))
            .collect()
    }

    pub fn assess(&self, requirements: &DeviceRequirements) -> SuitabilityReport {
        SuitabilityReport {
            api_version: self.meets_api_version(requirements.min_api_version),
            graphics_queue: self.first_graphics_family().is_some(),
            missing_extensions: self.missing_extensions(&requirements.extensions),
            features: self.features.covers(&requirements.features),
        }
    }

    pub fn is_suitable(&self, requirements: &DeviceRequirements) -> bool {
        self.assess(requirements).is_suitable()
    }
}

/// Formats a packed Vulkan version as `major.minor.patch`.
pub fn format_api_version(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

/// Queries `physical_device` and caches the results.
///
/// Never fails: a query that errors leaves the corresponding field in its
/// "not satisfied" default.
pub fn probe(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> DeviceCandidate {
    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    let queue_families: Vec<QueueFamily> = unsafe { instance.get_physical_device_queue_family_properties(physical_device) }
        .iter()
        .enumerate()
        .map(|(index, family)| QueueFamily {
            index: index as u32,
            flags: family.queue_flags,
            queue_count: family.queue_count,
        })
        .collect();

    let extensions: HashSet<CString> =
        match unsafe { instance.enumerate_device_extension_properties(physical_device) } {
            Ok(properties) => properties
                .iter()
                .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }.to_owned())
                .collect(),
            Err(e) => {
                warn!("Failed to enumerate extensions of device {}: {}", name, e);
                HashSet::new()
            }
        };

    let features = query_features(instance, physical_device, properties.api_version, &extensions);

    debug!(
        "Probed device {} ({:?}): API {}, {} queue families, {} extensions, {:?}",
        name,
        properties.device_type,
        format_api_version(properties.api_version),
        queue_families.len(),
        extensions.len(),
        features
    );

    DeviceCandidate {
        handle: physical_device,
        name,
        device_type: properties.device_type,
        api_version: properties.api_version,
        queue_families,
        extensions,
        features,
    }
}

fn query_features(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    api_version: u32,
    extensions: &HashSet<CString>,
) -> DeviceFeatures {
    // The 1.1 feature block can only be chained on 1.2+ devices.
    if api_version < vk::API_VERSION_1_2 {
        return DeviceFeatures::default();
    }
    let has_extended_dynamic_state = extensions.contains(extended_dynamic_state_extension());

    let mut vulkan11 = vk::PhysicalDeviceVulkan11Features::default();
    let mut vulkan13 = vk::PhysicalDeviceVulkan13Features::default();
    let mut extended_dynamic_state = vk::PhysicalDeviceExtendedDynamicStateFeaturesEXT::default();
    {
        let mut features2 = vk::PhysicalDeviceFeatures2::builder().push_next(&mut vulkan11);
        if api_version >= vk::API_VERSION_1_3 {
            features2 = features2.push_next(&mut vulkan13);
        }
        if has_extended_dynamic_state {
            features2 = features2.push_next(&mut extended_dynamic_state);
        }
        unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
    }

    DeviceFeatures {
        shader_draw_parameters: vulkan11.shader_draw_parameters == vk::TRUE,
        dynamic_rendering: vulkan13.dynamic_rendering == vk::TRUE,
        extended_dynamic_state: has_extended_dynamic_state
            && extended_dynamic_state.extended_dynamic_state == vk::TRUE,
    }
}

/// Probes every physical device the instance enumerates, in enumeration order.
pub fn enumerate_candidates(instance: &ash::Instance) -> Result<Vec<DeviceCandidate>> {
    let physical_devices = unsafe { instance.enumerate_physical_devices()? };
    debug!("Found {} physical devices.", physical_devices.len());
    Ok(physical_devices
        .into_iter()
        .map(|physical_device| probe(instance, physical_device))
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ash::vk::Handle;

    pub(crate) fn family(index: u32, flags: vk::QueueFlags) -> QueueFamily {
        QueueFamily { index, flags, queue_count: 1 }
    }

    /// A candidate that passes every default requirement.
    pub(crate) fn suitable_candidate(raw: u64, name: &str) -> DeviceCandidate {
        DeviceCandidate {
            handle: vk::PhysicalDevice::from_raw(raw),
            name: name.to_string(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            api_version: vk::API_VERSION_1_3,
            queue_families: vec![family(0, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)],
            extensions: required_device_extensions()
                .into_iter()
                .chain([extended_dynamic_state_extension()])
                .map(CStr::to_owned)
                .collect(),
            features: DeviceFeatures::required(),
        }
    }

    #[test]
    fn test_default_candidate_is_not_suitable() {
        let report = DeviceCandidate::default().assess(&DeviceRequirements::default());
        assert!(!report.api_version);
        assert!(!report.graphics_queue);
        assert_eq!(report.missing_extensions.len(), 4);
        assert!(!report.features);
        assert!(!report.is_suitable());
    }

    #[test]
    fn test_suitable_candidate_passes_every_check() {
        let candidate = suitable_candidate(1, "gpu");
        assert!(candidate.is_suitable(&DeviceRequirements::default()));
    }

    #[test]
    fn test_api_1_2_is_rejected() {
        let mut candidate = suitable_candidate(1, "old");
        candidate.api_version = vk::make_api_version(0, 1, 2, 198);
        let report = candidate.assess(&DeviceRequirements::default());
        assert!(!report.api_version);
        assert!(!report.is_suitable());
    }

    #[test]
    fn test_newer_patch_version_is_accepted() {
        let mut candidate = suitable_candidate(1, "new");
        candidate.api_version = vk::make_api_version(0, 1, 3, 250);
        assert!(candidate.meets_api_version(vk::API_VERSION_1_3));
    }

    #[test]
    fn test_missing_extension_is_reported_by_name() {
        let mut candidate = suitable_candidate(1, "gpu");
        candidate.extensions.remove(vk::KhrSynchronization2Fn::name());
        let report = candidate.assess(&DeviceRequirements::default());
        assert_eq!(report.missing_extensions, vec![vk::KhrSynchronization2Fn::name()]);
    }

    #[test]
    fn test_extension_match_is_exact() {
        let mut candidate = suitable_candidate(1, "gpu");
        candidate.extensions.remove(khr::Swapchain::name());
        candidate
            .extensions
            .insert(CString::new("VK_KHR_swapchain_mutable_format").unwrap());
        assert!(!candidate.supports_extension(khr::Swapchain::name()));
    }

    #[test]
    fn test_compute_only_device_has_no_graphics_family() {
        let mut candidate = suitable_candidate(1, "compute");
        candidate.queue_families = vec![
            family(0, vk::QueueFlags::COMPUTE),
            family(1, vk::QueueFlags::TRANSFER),
        ];
        assert_eq!(candidate.first_graphics_family(), None);
        assert!(!candidate.assess(&DeviceRequirements::default()).graphics_queue);
    }

    #[test]
    fn test_first_graphics_family_skips_earlier_families() {
        let mut candidate = suitable_candidate(1, "gpu");
        candidate.queue_families = vec![
            family(0, vk::QueueFlags::TRANSFER),
            family(1, vk::QueueFlags::GRAPHICS),
            family(2, vk::QueueFlags::GRAPHICS),
        ];
        assert_eq!(candidate.first_graphics_family(), Some(1));
    }

    #[test]
    fn test_missing_feature_flag_fails_feature_check() {
        let mut candidate = suitable_candidate(1, "gpu");
        candidate.features.dynamic_rendering = false;
        assert!(!candidate.assess(&DeviceRequirements::default()).features);
    }

    #[test]
    fn test_features_cover_only_requested_flags() {
        let available = DeviceFeatures { dynamic_rendering: true, ..Default::default() };
        let requested = DeviceFeatures { dynamic_rendering: true, ..Default::default() };
        assert!(available.covers(&requested));
        assert!(!available.covers(&DeviceFeatures::required()));
    }

    #[test]
    fn test_format_api_version() {
        assert_eq!(format_api_version(vk::make_api_version(0, 1, 3, 275)), "1.3.275");
    }
}
