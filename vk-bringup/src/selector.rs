//! Physical device selection.

use tracing::{debug, info};

use crate::capabilities::{format_api_version, DeviceCandidate, DeviceRequirements};
use crate::error::{BringupError, Result};

/// Returns the first candidate, in enumeration order, that passes every check
/// in `requirements`.
///
/// There is no ranking between suitable devices. Fails with
/// [`BringupError::NoDevicesAvailable`] for an empty list and
/// [`BringupError::NoSuitableDevice`] when nothing qualifies.
pub fn select_device(
    candidates: Vec<DeviceCandidate>,
    requirements: &DeviceRequirements,
) -> Result<DeviceCandidate> {
    if candidates.is_empty() {
        return Err(BringupError::NoDevicesAvailable);
    }

    let total = candidates.len();
    for candidate in candidates {
        let report = candidate.assess(requirements);
        if report.is_suitable() {
            info!(
                "Selected physical device: {} ({:?}, API {})",
                candidate.name,
                candidate.device_type,
                format_api_version(candidate.api_version)
            );
            return Ok(candidate);
        }

        debug!(
            "Rejected device {}: api_version_ok={}, graphics_queue={}, features_ok={}, missing_extensions={:?}",
            candidate.name,
            report.api_version,
            report.graphics_queue,
            report.features,
            report.missing_extensions
        );
    }

    Err(BringupError::NoSuitableDevice { candidates: total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::tests::suitable_candidate;
    use ash::extensions::khr;
    use ash::vk;
    use rstest::rstest;

    fn unsuitable_candidate(raw: u64) -> DeviceCandidate {
        let mut candidate = suitable_candidate(raw, &format!("unsuitable-{raw}"));
        candidate.api_version = vk::API_VERSION_1_1;
        candidate
    }

    #[test]
    fn test_no_candidates_is_no_devices_available() {
        let err = select_device(Vec::new(), &DeviceRequirements::default()).unwrap_err();
        assert!(matches!(err, BringupError::NoDevicesAvailable));
    }

    #[rstest]
    #[case(1, 0)]
    #[case(3, 0)]
    #[case(3, 1)]
    #[case(3, 2)]
    #[case(5, 4)]
    fn test_single_suitable_device_found_at_any_position(#[case] count: u64, #[case] position: u64) {
        let candidates = (0..count)
            .map(|i| {
                if i == position {
                    suitable_candidate(100 + i, "chosen")
                } else {
                    unsuitable_candidate(100 + i)
                }
            })
            .collect();

        let selected = select_device(candidates, &DeviceRequirements::default()).unwrap();
        assert_eq!(selected.name, "chosen");
        assert_eq!(vk::Handle::as_raw(selected.handle), 100 + position);
    }

    #[test]
    fn test_first_match_wins_over_better_device() {
        let mut integrated = suitable_candidate(1, "integrated");
        integrated.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;
        let discrete = suitable_candidate(2, "discrete");

        let selected = select_device(vec![integrated, discrete], &DeviceRequirements::default()).unwrap();
        assert_eq!(selected.name, "integrated");
    }

    #[test]
    fn test_all_lacking_extensions_is_no_suitable_device() {
        let candidates = (0..3)
            .map(|i| {
                let mut candidate = suitable_candidate(i, "no-swapchain");
                candidate.extensions.remove(khr::Swapchain::name());
                candidate
            })
            .collect();

        let err = select_device(candidates, &DeviceRequirements::default()).unwrap_err();
        assert!(matches!(err, BringupError::NoSuitableDevice { candidates: 3 }));
    }

    #[test]
    fn test_device_without_features_is_skipped() {
        let mut lacking = suitable_candidate(1, "lacking");
        lacking.features.extended_dynamic_state = false;
        let capable = suitable_candidate(2, "capable");

        let selected = select_device(vec![lacking, capable], &DeviceRequirements::default()).unwrap();
        assert_eq!(selected.name, "capable");
    }
}
