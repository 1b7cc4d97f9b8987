use std::sync::Arc;

use ash::extensions::khr;
use ash::vk;
use tracing::{debug, info};

use crate::error::Result;
use crate::queues::QueueAssignment;
use crate::surface_config::SwapchainConfig;

/// Builds the creation parameters for a swapchain from a negotiated config.
///
/// `queue_family_indices` must outlive the returned builder; it is only read
/// when the assignment uses separate families.
pub fn swapchain_create_info<'a>(
    surface: vk::SurfaceKHR,
    config: &SwapchainConfig,
    sharing_mode: vk::SharingMode,
    queue_family_indices: &'a [u32],
    old_swapchain: vk::SwapchainKHR,
) -> vk::SwapchainCreateInfoKHRBuilder<'a> {
    vk::SwapchainCreateInfoKHR::builder()
        .surface(surface)
        .min_image_count(config.min_image_count)
        .image_format(config.format)
        .image_color_space(config.color_space)
        .image_extent(config.extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(sharing_mode)
        .queue_family_indices(queue_family_indices)
        .pre_transform(config.pre_transform)
        .composite_alpha(config.composite_alpha)
        .present_mode(config.present_mode)
        .clipped(true)
        .old_swapchain(old_swapchain)
}

pub struct Swapchain {
    device: Arc<ash::Device>,
    loader: khr::Swapchain,
    swapchain: vk::SwapchainKHR,
    config: SwapchainConfig,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
}

impl Swapchain {
    /// Creates the swapchain and one color view per image.
    ///
    /// Pass the handle of the swapchain being replaced as `old_swapchain`, or
    /// `vk::SwapchainKHR::null()`. The old swapchain is still owned by the
    /// caller and must be dropped afterwards.
    pub fn new(
        instance: &ash::Instance,
        device: Arc<ash::Device>,
        surface: vk::SurfaceKHR,
        config: &SwapchainConfig,
        assignment: &QueueAssignment,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        let loader = khr::Swapchain::new(instance, &device);
        let (sharing_mode, queue_family_indices) = assignment.image_sharing();
        let create_info =
            swapchain_create_info(surface, config, sharing_mode, &queue_family_indices, old_swapchain);

        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };
        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(err) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(err.into());
            }
        };
        info!(
            "Swapchain created with {} images ({}x{}, {:?}).",
            images.len(),
            config.extent.width,
            config.extent.height,
            sharing_mode
        );

        let mut this = Self {
            device,
            loader,
            swapchain,
            config: *config,
            image_views: Vec::with_capacity(images.len()),
            images,
        };
        // Views are pushed one at a time so a failure part way still cleans up.
        for index in 0..this.images.len() {
            let view_info = image_view_create_info(this.images[index], config.format);
            let view = unsafe { this.device.create_image_view(&view_info, None)? };
            this.image_views.push(view);
        }
        Ok(this)
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn loader(&self) -> &khr::Swapchain {
        &self.loader
    }

    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        debug!("Swapchain destroyed.");
    }
}

fn image_view_create_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo {
    vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .build()
}
