use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::OptionExt;
use color_eyre::Result;
use winit::window::Window;
use crate::renderer::core::device::RenderDevice;
use crate::renderer::core::instance::RenderInstance;
use crate::renderer::core::swapchain::Swapchain;

pub struct Surface {
    pub handle: vk::SurfaceKHR,
    pub loader: ash::khr::surface::Instance,
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}

/// Presentation target of the renderer, encapsulating the window, surface, and swapchain
pub struct RenderTarget {
    pub window: Arc<Window>,

    // Declared before `surface` so it is destroyed first
    pub swapchain: Swapchain,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub surface: Surface,
}

impl RenderTarget {
    pub fn new(
        window: Arc<Window>,
        surface: Surface,
        vsync: bool,
        ins: &RenderInstance,
        dev: &RenderDevice,
    ) -> Result<Self> {
        let surface_formats = unsafe {
            surface.loader
                .get_physical_device_surface_formats(dev.physical, surface.handle)?
        };
        let surface_present_modes = unsafe {
            surface.loader
                .get_physical_device_surface_present_modes(dev.physical, surface.handle)?
        };

        let surface_format = choose_surface_format(&surface_formats)?;
        let present_mode = choose_present_mode(&surface_present_modes, vsync);
        log::debug!("Surface format {:?}, present mode {:?}", surface_format, present_mode);

        let swapchain = Swapchain::new(
            &surface,
            surface_format,
            present_mode,
            window.inner_size().into(),
            vk::SwapchainKHR::null(),
            &ins.instance,
            dev,
        )?;

        Ok(Self {
            window,
            swapchain,
            surface_format,
            present_mode,
            surface,
        })
    }

    /// Replaces the swapchain with one matching the current window size.
    /// The caller must make sure the GPU no longer uses the old swapchain images.
    pub fn recreate(&mut self, ins: &RenderInstance, dev: &RenderDevice) -> Result<()> {
        let swapchain = Swapchain::new(
            &self.surface,
            self.surface_format,
            self.present_mode,
            self.window.inner_size().into(),
            self.swapchain.handle,
            &ins.instance,
            dev,
        )?;
        self.swapchain = swapchain;

        log::info!(
            "Recreated swapchain at {}x{} with {} images",
            self.swapchain.extent.width,
            self.swapchain.extent.height,
            self.swapchain.image_count(),
        );

        Ok(())
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.extent();
        extent.width as f32 / extent.height.max(1) as f32
    }

    pub fn is_minimized(&self) -> bool {
        let size = self.window.inner_size();
        size.width == 0 || size.height == 0
    }
}

/// Prefers 8-bit sRGB BGRA and falls back to whatever the surface lists first
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
        .ok_or_eyre("No suitable surface format found")
}

/// FIFO is always available; without vsync MAILBOX is used when the surface has it
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    modes
        .iter()
        .copied()
        .find(|mode| *mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn prefers_srgb_surface_format() {
        let formats = [format(vk::Format::R8G8B8A8_UNORM), format(vk::Format::B8G8R8A8_SRGB)];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn falls_back_to_first_surface_format() {
        let formats = [format(vk::Format::R8G8B8A8_UNORM), format(vk::Format::B8G8R8A8_UNORM)];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::R8G8B8A8_UNORM);
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn present_mode_follows_vsync() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::MAILBOX);
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO], false), vk::PresentModeKHR::FIFO);
    }
}
