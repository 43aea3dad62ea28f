use std::sync::Arc;
use ash::vk;
use color_eyre::Result;

/// Render pass layout shared by the pipeline and the framebuffers it draws into
pub struct RenderPattern {
    pub render_pass: vk::RenderPass,
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    device: Arc<ash::Device>,
}

impl RenderPattern {
    /// One color attachment that is cleared and then presented, plus a cleared depth attachment
    pub fn basic(
        color_format: vk::Format,
        depth_format: vk::Format,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            vk::AttachmentDescription::default()
                .format(depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let subpasses = [
            vk::SubpassDescription::default()
                .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                .color_attachments(&color_refs)
                .depth_stencil_attachment(&depth_ref),
        ];

        let dependencies = [external_dependency()];

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);
        let render_pass = unsafe {
            device.create_render_pass(&render_pass_info, None)?
        };

        Ok(Self {
            render_pass,
            color_format,
            depth_format,
            device,
        })
    }

    /// One framebuffer per swapchain image view, all sharing `depth_view`
    pub fn create_framebuffers(
        &self,
        color_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<Framebuffers> {
        let mut framebuffers = Framebuffers {
            handles: Vec::with_capacity(color_views.len()),
            device: self.device.clone(),
        };

        for view in color_views {
            let attachments = [*view, depth_view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe {
                self.device.create_framebuffer(&framebuffer_info, None)?
            };
            framebuffers.handles.push(framebuffer);
        }

        Ok(framebuffers)
    }
}

/// Orders this frame's attachment clears after the presentation engine released the color
/// image and after every earlier frame finished with the shared depth image
fn external_dependency() -> vk::SubpassDependency {
    let attachment_stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
        | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;

    vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(attachment_stages)
        .src_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .dst_stage_mask(attachment_stages)
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
        )
}

impl Drop for RenderPattern {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

pub struct Framebuffers {
    handles: Vec<vk::Framebuffer>,
    device: Arc<ash::Device>,
}

impl Framebuffers {
    pub fn get(&self, image_index: usize) -> Option<vk::Framebuffer> {
        self.handles.get(image_index).copied()
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        unsafe {
            for framebuffer in self.handles.drain(..) {
                self.device.destroy_framebuffer(framebuffer, None);
            }
        }
    }
}
