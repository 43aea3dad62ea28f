use std::sync::Arc;
use ash::prelude::VkResult;
use ash::vk;
use color_eyre::Result;
use crate::renderer::core::device::RenderDevice;
use crate::renderer::core::target::Surface;

pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub loader: ash::khr::swapchain::Device,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub present_mode: vk::PresentModeKHR,

    device: Arc<ash::Device>,
}

impl Swapchain {
    /// Creates a swapchain for `surface`. Pass the previous swapchain as `old_swapchain` when
    /// recreating so the driver can hand over its resources.
    pub fn new(
        surface: &Surface,
        surface_format: vk::SurfaceFormatKHR,
        present_mode: vk::PresentModeKHR,
        window_size: (u32, u32),
        old_swapchain: vk::SwapchainKHR,
        instance: &ash::Instance,
        dev: &RenderDevice,
    ) -> Result<Self> {
        let surface_capabilities = unsafe {
            surface.loader
                .get_physical_device_surface_capabilities(dev.physical, surface.handle)?
        };

        let extent = choose_extent(&surface_capabilities, window_size);

        let min_image_count = {
            let min = surface_capabilities.min_image_count;
            let max = surface_capabilities.max_image_count;
            // Request one more image than the minimum so acquiring does not stall on the driver
            if max > 0 && min + 1 > max {
                max
            } else {
                min + 1
            }
        };
        let pre_transform = if surface_capabilities
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            surface_capabilities.current_transform
        };

        let loader = ash::khr::swapchain::Device::new(instance, &dev.logical);
        let swapchain_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle)
            .min_image_count(min_image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .image_array_layers(1)
            .old_swapchain(old_swapchain);

        let handle = unsafe {
            loader.create_swapchain(&swapchain_info, None)?
        };

        let mut swapchain = Self {
            handle,
            loader,
            images: Vec::new(),
            image_views: Vec::new(),
            extent,
            format: surface_format.format,
            present_mode,
            device: dev.logical.clone(),
        };
        // Views are filled in after the handle is owned so a failure here still destroys it
        swapchain.create_image_views()?;

        Ok(swapchain)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Returns the index of the next presentable image and whether the swapchain is suboptimal
    pub fn acquire_next_image(&self, image_available: vk::Semaphore) -> VkResult<(u32, bool)> {
        unsafe {
            self.loader.acquire_next_image(
                self.handle,
                u64::MAX,
                image_available,
                vk::Fence::null(),
            )
        }
    }

    /// Queues `image_index` for presentation once `render_finished` is signaled.
    /// Returns whether the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        render_finished: vk::Semaphore,
        image_index: u32,
    ) -> VkResult<bool> {
        let wait_semaphores = [render_finished];
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    fn create_image_views(&mut self) -> Result<()> {
        self.images = unsafe { self.loader.get_swapchain_images(self.handle)? };

        for image in self.images.iter() {
            let view_info = vk::ImageViewCreateInfo::default()
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::R,
                    g: vk::ComponentSwizzle::G,
                    b: vk::ComponentSwizzle::B,
                    a: vk::ComponentSwizzle::A,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image(*image);
            let view = unsafe { self.device.create_image_view(&view_info, None)? };
            self.image_views.push(view);
        }

        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        }
    }
}

/// Uses the surface's fixed extent when it has one, otherwise the window size clamped to
/// what the surface supports
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: window_size.0.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: window_size.1.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_surface_extent_wins() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: 640, height: 480 },
            ..Default::default()
        };
        assert_eq!(choose_extent(&capabilities, (1920, 1080)), vk::Extent2D { width: 640, height: 480 });
    }

    #[test]
    fn window_size_is_clamped_to_surface_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 16, height: 16 },
            max_image_extent: vk::Extent2D { width: 1024, height: 1024 },
            ..Default::default()
        };
        assert_eq!(choose_extent(&capabilities, (4000, 8)), vk::Extent2D { width: 1024, height: 16 });
    }
}
