//! Queue family negotiation for graphics and presentation.
//!
//! The search order is fixed and must not be rearranged, since on hardware
//! with asymmetric families it decides which layout is chosen:
//!
//! 1. the first graphics family, if it can also present;
//! 2. otherwise the first family that can do both;
//! 3. otherwise the first graphics family plus the first presenting family.

use ash::prelude::VkResult;
use ash::vk;
use tracing::{info, warn};

use crate::capabilities::QueueFamily;
use crate::error::{BringupError, QueueRole, Result};

/// Answers whether a queue family of the selected device can present to the
/// surface.
pub trait PresentSupport {
    fn supports_present(&self, family_index: u32) -> VkResult<bool>;
}

impl<F> PresentSupport for F
where
    F: Fn(u32) -> VkResult<bool>,
{
    fn supports_present(&self, family_index: u32) -> VkResult<bool> {
        self(family_index)
    }
}

/// Which step of the search produced the assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    /// The first graphics family also presents.
    FirstGraphicsFamily,
    /// A later family supports both roles.
    CombinedFamily,
    /// Graphics and presentation live on different families. Swapchain images
    /// need concurrent sharing or explicit ownership transfers.
    SeparateFamilies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueAssignment {
    pub graphics_family: u32,
    pub present_family: u32,
    pub kind: AssignmentKind,
}

impl QueueAssignment {
    pub fn is_shared(&self) -> bool {
        self.graphics_family == self.present_family
    }

    /// Distinct family indices, one queue to request for each.
    pub fn unique_families(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics_family]
        } else {
            vec![self.graphics_family, self.present_family]
        }
    }

    /// Image sharing mode for swapchain images and the families that share them.
    pub fn image_sharing(&self) -> (vk::SharingMode, Vec<u32>) {
        if self.is_shared() {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        } else {
            (vk::SharingMode::CONCURRENT, self.unique_families())
        }
    }
}

/// Picks the graphics and present families of the selected device.
pub fn negotiate(families: &[QueueFamily], present: &impl PresentSupport) -> Result<QueueAssignment> {
    let graphics_family = families
        .iter()
        .find(|family| family.supports_graphics())
        .map(|family| family.index)
        .ok_or(BringupError::NoSuitableQueues { role: QueueRole::Graphics })?;

    let assignment = if present.supports_present(graphics_family)? {
        QueueAssignment {
            graphics_family,
            present_family: graphics_family,
            kind: AssignmentKind::FirstGraphicsFamily,
        }
    } else if let Some(combined) = find_family(families, present, |family| family.supports_graphics())? {
        QueueAssignment {
            graphics_family: combined,
            present_family: combined,
            kind: AssignmentKind::CombinedFamily,
        }
    } else if let Some(present_family) = find_family(families, present, |_| true)? {
        QueueAssignment {
            graphics_family,
            present_family,
            kind: AssignmentKind::SeparateFamilies,
        }
    } else {
        return Err(BringupError::NoSuitableQueues { role: QueueRole::Presentation });
    };

    match assignment.kind {
        AssignmentKind::SeparateFamilies => warn!(
            "Graphics family {} cannot present; presenting from family {}",
            assignment.graphics_family, assignment.present_family
        ),
        kind => info!(
            "Queue families: graphics {}, present {} ({:?})",
            assignment.graphics_family, assignment.present_family, kind
        ),
    }
    Ok(assignment)
}

/// First family matching `filter` that can also present.
fn find_family(
    families: &[QueueFamily],
    present: &impl PresentSupport,
    filter: impl Fn(&QueueFamily) -> bool,
) -> Result<Option<u32>> {
    for family in families.iter().filter(|family| filter(family)) {
        if present.supports_present(family.index)? {
            return Ok(Some(family.index));
        }
    }
    Ok(None)
}
