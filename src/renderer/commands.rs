use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;
use crate::renderer::pipeline::render_pattern::Framebuffers;
use crate::renderer::pipeline::Pipeline;
use crate::renderer::resources::model::GpuModel;

/// Primary command buffers, one per swapchain image, recorded once and replayed every frame
pub struct CommandBuffers {
    buffers: Vec<vk::CommandBuffer>,
    command_pool: vk::CommandPool,
    device: Arc<ash::Device>,
}

impl CommandBuffers {
    pub fn record(
        image_count: usize,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
        framebuffers: &Framebuffers,
        pipeline: &Pipeline,
        models: &[GpuModel],
        command_pool: vk::CommandPool,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(image_count as u32);
        let buffers = unsafe { device.allocate_command_buffers(&alloc_info)? };

        // Owned from here on so a recording failure frees the buffers
        let command_buffers = Self {
            buffers,
            command_pool,
            device,
        };

        for (image_index, cmd) in command_buffers.buffers.iter().enumerate() {
            let framebuffer = framebuffers
                .get(image_index)
                .ok_or_eyre("Missing framebuffer for swapchain image")?;
            let descriptor_set = pipeline
                .descriptor_set(image_index)
                .ok_or_else(|| eyre!("Missing descriptor set for swapchain image {}", image_index))?;

            command_buffers.record_one(
                *cmd,
                framebuffer,
                descriptor_set,
                extent,
                clear_color,
                pipeline,
                models,
            )?;
        }

        log::debug!("Recorded {} command buffers for {} models", image_count, models.len());

        Ok(command_buffers)
    }

    pub fn get(&self, image_index: usize) -> Option<vk::CommandBuffer> {
        self.buffers.get(image_index).copied()
    }

    fn record_one(
        &self,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        descriptor_set: vk::DescriptorSet,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
        pipeline: &Pipeline,
        models: &[GpuModel],
    ) -> Result<()> {
        let device = &self.device;

        let begin_info = vk::CommandBufferBeginInfo::default();
        unsafe { device.begin_command_buffer(cmd, &begin_info)? };

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: clear_color },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(pipeline.render_pass())
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[render_area]);
        }

        pipeline.bind_pipeline(cmd);
        pipeline.bind_descriptor_sets(cmd, 0, &[descriptor_set]);

        for model in models {
            pipeline.update_push_constants(cmd, &model.material);
            model.mesh.draw(cmd, device);
        }

        unsafe {
            device.cmd_end_render_pass(cmd);
            device.end_command_buffer(cmd)?;
        }

        Ok(())
    }
}

impl Drop for CommandBuffers {
    fn drop(&mut self) {
        unsafe {
            self.device.free_command_buffers(self.command_pool, &self.buffers);
        }
    }
}
