pub mod camera;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod resources;
pub mod shader_data;
pub mod util;

use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::OptionExt;
use color_eyre::Result;
use winit::window::Window;
use crate::renderer::commands::CommandBuffers;
use crate::renderer::config::RenderConfig;
use crate::renderer::core::device::RenderDevice;
use crate::renderer::core::instance::RenderInstance;
use crate::renderer::core::target::RenderTarget;
use crate::renderer::frame::{FrameLoop, FrameOutcome, FrameResources, FrameSyncPool};
use crate::renderer::pipeline::render_pattern::{Framebuffers, RenderPattern};
use crate::renderer::pipeline::{Pipeline, PipelineBuilder};
use crate::renderer::resources::image::{Image, DEPTH_FORMAT};
use crate::renderer::resources::model::GpuModel;
use crate::renderer::resources::uniform::Uniform;
use crate::renderer::shader_data::{PerDrawData, UniformBlock};
use crate::scene::Scene;

/// Everything that depends on the swapchain images and is rebuilt with them.
/// Fields drop top to bottom, so users go before what they reference.
struct SwapchainResources {
    command_buffers: CommandBuffers,
    // Referenced by the recorded command buffers, held until they are freed
    #[allow(dead_code)]
    framebuffers: Framebuffers,
    #[allow(dead_code)]
    pipeline: Pipeline,
    uniforms: Vec<Uniform<UniformBlock>>,
    #[allow(dead_code)]
    depth_image: Image,
}

pub struct Renderer {
    config: RenderConfig,
    frame_loop: FrameLoop,

    // Declaration order is teardown order
    swapchain_resources: Option<SwapchainResources>,
    sync: FrameSyncPool,
    models: Vec<GpuModel>,
    target: RenderTarget,
    device: RenderDevice,
    instance: RenderInstance,

    resize_requested: bool,
}

impl Renderer {
    pub fn new(
        window: Arc<Window>,
        scene: &Scene,
        config: RenderConfig,
    ) -> Result<Self> {
        // Sync slots and the frame loop must agree on the slot count
        let config = config.validated();
        let instance = RenderInstance::new(&window, config.validation)?;
        let surface = instance.create_surface(&window)?;
        let device = RenderDevice::new(&instance, &surface)?;
        let target = RenderTarget::new(window, surface, config.vsync, &instance, &device)?;

        let models = scene
            .models()
            .iter()
            .map(|model| GpuModel::upload(model, &device))
            .collect::<Result<Vec<GpuModel>>>()?;
        log::info!("Uploaded {} models", models.len());

        let sync = FrameSyncPool::new(
            config.frames_in_flight,
            target.swapchain.image_count(),
            device.logical.clone(),
        )?;

        let swapchain_resources = Self::create_swapchain_resources(
            &config,
            &device,
            &target,
            &models,
        )?;

        Ok(Self {
            frame_loop: FrameLoop::new(config.frames_in_flight),
            config,

            swapchain_resources: Some(swapchain_resources),
            sync,
            models,
            target,
            device,
            instance,

            resize_requested: false,
        })
    }

    pub fn request_resize(&mut self) {
        self.resize_requested = true;
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.target.aspect_ratio()
    }

    pub fn draw(&mut self, block: &UniformBlock) -> Result<()> {
        // Nothing can be presented to a zero-sized surface
        if self.target.is_minimized() {
            return Ok(());
        }

        if self.resize_requested {
            self.recreate_swapchain()?;
        }

        let resources = self.swapchain_resources
            .as_mut()
            .ok_or_eyre("Swapchain resources are missing")?;
        let mut backend = FrameResources {
            device: &self.device.logical,
            queue: self.device.graphics_queue.handle,
            swapchain: &self.target.swapchain,
            sync: &mut self.sync,
            uniforms: &mut resources.uniforms,
            command_buffers: &resources.command_buffers,
        };

        match self.frame_loop.draw_frame(&mut backend, block)? {
            FrameOutcome::Presented => {}
            FrameOutcome::SwapchainStale => {
                log::debug!("Swapchain is stale, recreating before the next frame");
                self.resize_requested = true;
            }
        }

        Ok(())
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        self.device.wait_idle()?;

        // Release the old resources before allocating their replacements
        self.swapchain_resources = None;
        self.target.recreate(&self.instance, &self.device)?;
        self.sync.reset_images(self.target.swapchain.image_count())?;
        self.swapchain_resources = Some(Self::create_swapchain_resources(
            &self.config,
            &self.device,
            &self.target,
            &self.models,
        )?);

        self.resize_requested = false;
        Ok(())
    }

    fn create_swapchain_resources(
        config: &RenderConfig,
        device: &RenderDevice,
        target: &RenderTarget,
        models: &[GpuModel],
    ) -> Result<SwapchainResources> {
        let extent = target.extent();
        let image_count = target.swapchain.image_count();

        let depth_image = device.create_depth_image(extent)?;

        let uniforms = (0..image_count)
            .map(|_| Uniform::new(&UniformBlock::default(), device))
            .collect::<Result<Vec<_>>>()?;

        let render_pattern = RenderPattern::basic(
            target.swapchain.format,
            DEPTH_FORMAT,
            device.logical.clone(),
        )?;
        let pipeline = PipelineBuilder::new(render_pattern, device.logical.clone())
            .add_shader(vk::ShaderStageFlags::VERTEX, config.shader_path("mesh.vert.spv"))?
            .add_shader(vk::ShaderStageFlags::FRAGMENT, config.shader_path("mesh.frag.spv"))?
            .set_uniform_buffer(&uniforms, 0, vk::ShaderStageFlags::VERTEX)?
            .push_constant_range(vk::ShaderStageFlags::FRAGMENT, size_of::<PerDrawData>() as u32)
            .create(image_count)?;

        let framebuffers = pipeline.render_pattern().create_framebuffers(
            &target.swapchain.image_views,
            depth_image.view,
            extent,
        )?;

        let command_buffers = CommandBuffers::record(
            image_count,
            extent,
            config.clear_color,
            &framebuffers,
            &pipeline,
            models,
            device.command_pool,
            device.logical.clone(),
        )?;

        Ok(SwapchainResources {
            command_buffers,
            framebuffers,
            pipeline,
            uniforms,
            depth_image,
        })
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // In-flight frames still reference everything below
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle before teardown: {}", e);
        }
        log::info!("Releasing renderer resources after {} frames", self.frame_loop.frame_index());
    }
}
