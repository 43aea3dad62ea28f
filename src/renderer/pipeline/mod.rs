pub mod descriptor_set_layout_builder;
pub mod render_pattern;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use ash::vk;
use bytemuck::Pod;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use smallvec::SmallVec;
use crate::renderer::pipeline::descriptor_set_layout_builder::DescriptorSetLayoutBuilder;
use crate::renderer::pipeline::render_pattern::RenderPattern;
use crate::renderer::resources::shader::ShaderModule;
use crate::renderer::resources::uniform::Uniform;
use crate::renderer::resources::vertex::Vertex;

/// A graphics pipeline together with the render pass and descriptor sets it was built for
pub struct Pipeline {
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    descriptor_sets: Vec<vk::DescriptorSet>,
    push_constant_stages: vk::ShaderStageFlags,

    // Dropped after the pipeline that references it
    render_pattern: RenderPattern,
    device: Arc<ash::Device>,
}

impl Pipeline {
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pattern.render_pass
    }

    pub fn render_pattern(&self) -> &RenderPattern {
        &self.render_pattern
    }

    pub fn descriptor_set(&self, index: usize) -> Option<vk::DescriptorSet> {
        self.descriptor_sets.get(index).copied()
    }

    pub fn bind_pipeline(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
        }
    }

    pub fn bind_descriptor_sets(
        &self,
        command_buffer: vk::CommandBuffer,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.layout,
                first_set,
                descriptor_sets,
                &[],
            );
        }
    }

    pub fn update_push_constants<T: Pod>(
        &self,
        command_buffer: vk::CommandBuffer,
        data: &T,
    ) {
        unsafe {
            self.device.cmd_push_constants(
                command_buffer,
                self.layout,
                self.push_constant_stages,
                0,
                bytemuck::bytes_of(data),
            );
        }
    }

    /// Destroys every object owned by the pipeline. Null handles are skipped by Vulkan,
    /// so a partially built pipeline releases cleanly.
    fn release(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
            // Destroying the pool frees the sets allocated from it
            self.device.destroy_descriptor_pool(self.descriptor_pool, None);
            self.device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }
        self.pipeline = vk::Pipeline::null();
        self.layout = vk::PipelineLayout::null();
        self.descriptor_pool = vk::DescriptorPool::null();
        self.descriptor_set_layout = vk::DescriptorSetLayout::null();
        self.descriptor_sets.clear();
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.release();
    }
}

/// Uniform buffer bindings keyed by binding index. Registering the same index for another
/// stage widens the stage mask as long as the buffers are the same.
#[derive(Debug, Default)]
struct UniformBindings {
    bindings: BTreeMap<u32, UniformBinding>,
}

#[derive(Debug, PartialEq)]
struct UniformBinding {
    stages: vk::ShaderStageFlags,
    // One buffer per descriptor set copy
    buffers: Vec<(vk::Buffer, vk::DeviceSize)>,
}

impl UniformBindings {
    fn insert(
        &mut self,
        index: u32,
        stage: vk::ShaderStageFlags,
        buffers: Vec<(vk::Buffer, vk::DeviceSize)>,
    ) -> Result<()> {
        if buffers.is_empty() {
            return Err(eyre!("Uniform binding {} has no buffers", index));
        }

        match self.bindings.get_mut(&index) {
            Some(existing) if existing.buffers == buffers => {
                existing.stages |= stage;
                Ok(())
            }
            Some(_) => Err(eyre!(
                "Uniform binding {} is already registered with different buffers",
                index,
            )),
            None => {
                self.bindings.insert(index, UniformBinding { stages: stage, buffers });
                Ok(())
            }
        }
    }

    /// Every binding must provide exactly one buffer per descriptor set
    fn check_set_count(&self, set_count: usize) -> Result<()> {
        for (index, binding) in self.bindings.iter() {
            if binding.buffers.len() != set_count {
                return Err(eyre!(
                    "Uniform binding {} has {} buffers but {} descriptor sets were requested",
                    index,
                    binding.buffers.len(),
                    set_count,
                ));
            }
        }
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

fn check_shader_stages(stages: &[vk::ShaderStageFlags]) -> Result<()> {
    for required in [vk::ShaderStageFlags::VERTEX, vk::ShaderStageFlags::FRAGMENT] {
        match stages.iter().filter(|stage| **stage == required).count() {
            0 => return Err(eyre!("Pipeline has no {:?} shader", required)),
            1 => {}
            _ => return Err(eyre!("Pipeline has more than one {:?} shader", required)),
        }
    }
    Ok(())
}

/// Collects everything a graphics pipeline needs; `create` consumes the builder so no
/// binding can be registered after the pipeline exists
pub struct PipelineBuilder {
    device: Arc<ash::Device>,
    render_pattern: RenderPattern,
    shaders: SmallVec<[ShaderModule; 2]>,
    uniform_bindings: UniformBindings,
    push_constant_ranges: Vec<vk::PushConstantRange>,
    cull_mode: vk::CullModeFlags,
    front_face: vk::FrontFace,
}

impl PipelineBuilder {
    pub fn new(render_pattern: RenderPattern, device: Arc<ash::Device>) -> Self {
        Self {
            device,
            render_pattern,
            shaders: SmallVec::new(),
            uniform_bindings: UniformBindings::default(),
            push_constant_ranges: Vec::new(),
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
        }
    }

    pub fn add_shader(
        mut self,
        stage: vk::ShaderStageFlags,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let shader = ShaderModule::new(path, stage, self.device.clone())?;
        self.shaders.push(shader);
        Ok(self)
    }

    /// Binds `buffers[i]` at `index` in descriptor set `i`
    pub fn set_uniform_buffer<T: Pod>(
        mut self,
        buffers: &[Uniform<T>],
        index: u32,
        stage: vk::ShaderStageFlags,
    ) -> Result<Self> {
        let buffers = buffers
            .iter()
            .map(|uniform| (uniform.handle(), uniform.size()))
            .collect();
        self.uniform_bindings.insert(index, stage, buffers)?;
        Ok(self)
    }

    pub fn push_constant_range(mut self, stage: vk::ShaderStageFlags, size: u32) -> Self {
        self.push_constant_ranges.push(vk::PushConstantRange {
            stage_flags: stage,
            offset: 0,
            size,
        });
        self
    }

    /// Builds the pipeline with `set_count` descriptor sets
    pub fn create(self, set_count: usize) -> Result<Pipeline> {
        let stages = self.shaders.iter().map(|s| s.stage).collect::<SmallVec<[_; 2]>>();
        check_shader_stages(&stages)?;
        self.uniform_bindings.check_set_count(set_count)?;

        let push_constant_stages = self.push_constant_ranges
            .iter()
            .fold(vk::ShaderStageFlags::empty(), |acc, range| acc | range.stage_flags);

        // Handles start out null and are filled in one by one; an early return drops
        // the pipeline, which releases whatever exists so far
        let mut pipeline = Pipeline {
            pipeline: vk::Pipeline::null(),
            layout: vk::PipelineLayout::null(),
            descriptor_set_layout: vk::DescriptorSetLayout::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            descriptor_sets: Vec::new(),
            push_constant_stages,
            render_pattern: self.render_pattern,
            device: self.device.clone(),
        };

        pipeline.descriptor_set_layout = self.uniform_bindings.bindings
            .iter()
            .fold(DescriptorSetLayoutBuilder::new(), |builder, (index, binding)| {
                builder.add_binding(*index, vk::DescriptorType::UNIFORM_BUFFER, 1, binding.stages)
            })
            .build(&self.device)
            .wrap_err("Failed to create descriptor set layout")?;

        if !self.uniform_bindings.is_empty() && set_count > 0 {
            pipeline.descriptor_pool = create_descriptor_pool(
                &self.device,
                self.uniform_bindings.bindings.len() * set_count,
                set_count,
            )?;
            pipeline.descriptor_sets = allocate_descriptor_sets(
                &self.device,
                pipeline.descriptor_pool,
                pipeline.descriptor_set_layout,
                set_count,
            )?;
            write_descriptor_sets(&self.device, &pipeline.descriptor_sets, &self.uniform_bindings);
        }

        let set_layouts = [pipeline.descriptor_set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&self.push_constant_ranges);
        pipeline.layout = unsafe {
            self.device
                .create_pipeline_layout(&layout_info, None)
                .wrap_err("Failed to create pipeline layout")?
        };

        let shader_stages = self.shaders
            .iter()
            .map(|shader| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(shader.stage)
                    .module(shader.module)
                    .name(c"main")
            })
            .collect::<SmallVec<[_; 2]>>();

        let vertex_input_description = Vertex::input_description();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_attribute_descriptions(&vertex_input_description.attributes)
            .vertex_binding_descriptions(&vertex_input_description.bindings)
            .flags(vertex_input_description.flags);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_bias_enable(false);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            // 1 sample per pixel means no multisampling
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false);

        let color_blend_attachments = [
            vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false),
        ];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        // Viewport and scissor are set while recording so resizes do not need a new pipeline
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_info = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_info)
            .layout(pipeline.layout)
            .render_pass(pipeline.render_pattern.render_pass)
            .subpass(0);

        pipeline.pipeline = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, e)| eyre!("Failed to create graphics pipeline: {}", e))?[0]
        };

        log::info!(
            "Created pipeline with {} shader stages, {} uniform bindings and {} descriptor sets",
            self.shaders.len(),
            self.uniform_bindings.bindings.len(),
            pipeline.descriptor_sets.len(),
        );

        // Shader modules are no longer needed once the pipeline exists
        drop(self.shaders);

        Ok(pipeline)
    }
}

fn create_descriptor_pool(
    device: &ash::Device,
    descriptor_count: usize,
    max_sets: usize,
) -> Result<vk::DescriptorPool> {
    let pool_sizes = [vk::DescriptorPoolSize {
        ty: vk::DescriptorType::UNIFORM_BUFFER,
        descriptor_count: descriptor_count as u32,
    }];
    let pool_info = vk::DescriptorPoolCreateInfo::default()
        .pool_sizes(&pool_sizes)
        .max_sets(max_sets as u32);
    Ok(unsafe { device.create_descriptor_pool(&pool_info, None)? })
}

fn allocate_descriptor_sets(
    device: &ash::Device,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
    count: usize,
) -> Result<Vec<vk::DescriptorSet>> {
    let layouts = vec![layout; count];
    let alloc_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool)
        .set_layouts(&layouts);
    Ok(unsafe { device.allocate_descriptor_sets(&alloc_info)? })
}

fn write_descriptor_sets(
    device: &ash::Device,
    sets: &[vk::DescriptorSet],
    uniform_bindings: &UniformBindings,
) {
    let buffer_infos = sets
        .iter()
        .enumerate()
        .flat_map(|(set_index, set)| {
            uniform_bindings.bindings.iter().map(move |(binding, uniform)| {
                let (buffer, range) = uniform.buffers[set_index];
                (*set, *binding, [vk::DescriptorBufferInfo { buffer, offset: 0, range }])
            })
        })
        .collect::<Vec<_>>();

    let writes = buffer_infos
        .iter()
        .map(|(set, binding, info)| {
            vk::WriteDescriptorSet::default()
                .dst_set(*set)
                .dst_binding(*binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(info)
        })
        .collect::<Vec<_>>();

    unsafe {
        device.update_descriptor_sets(&writes, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn buffers(raw: &[u64]) -> Vec<(vk::Buffer, vk::DeviceSize)> {
        raw.iter().map(|h| (vk::Buffer::from_raw(*h), 64)).collect()
    }

    #[test]
    fn same_index_for_another_stage_widens_the_mask() {
        let mut bindings = UniformBindings::default();
        bindings.insert(0, vk::ShaderStageFlags::VERTEX, buffers(&[1, 2])).unwrap();
        bindings.insert(0, vk::ShaderStageFlags::FRAGMENT, buffers(&[1, 2])).unwrap();

        assert_eq!(bindings.bindings.len(), 1);
        assert_eq!(
            bindings.bindings[&0].stages,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        );
    }

    #[test]
    fn conflicting_buffers_at_one_index_are_rejected() {
        let mut bindings = UniformBindings::default();
        bindings.insert(0, vk::ShaderStageFlags::VERTEX, buffers(&[1, 2])).unwrap();
        assert!(bindings.insert(0, vk::ShaderStageFlags::FRAGMENT, buffers(&[3, 4])).is_err());
        assert!(bindings.insert(1, vk::ShaderStageFlags::FRAGMENT, Vec::new()).is_err());
    }

    #[test]
    fn every_binding_needs_one_buffer_per_set() {
        let mut bindings = UniformBindings::default();
        bindings.insert(0, vk::ShaderStageFlags::VERTEX, buffers(&[1, 2, 3])).unwrap();
        bindings.insert(2, vk::ShaderStageFlags::FRAGMENT, buffers(&[4, 5, 6])).unwrap();

        assert!(bindings.check_set_count(3).is_ok());
        assert!(bindings.check_set_count(2).is_err());
        assert!(UniformBindings::default().check_set_count(2).is_ok());
    }

    #[test]
    fn vertex_and_fragment_stages_are_required_once() {
        let vs = vk::ShaderStageFlags::VERTEX;
        let fs = vk::ShaderStageFlags::FRAGMENT;
        assert!(check_shader_stages(&[vs, fs]).is_ok());
        assert!(check_shader_stages(&[fs, vs]).is_ok());
        assert!(check_shader_stages(&[vs]).is_err());
        assert!(check_shader_stages(&[vs, fs, fs]).is_err());
        assert!(check_shader_stages(&[]).is_err());
    }
}
