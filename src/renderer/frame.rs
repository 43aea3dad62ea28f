use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;
use crate::renderer::commands::CommandBuffers;
use crate::renderer::core::swapchain::Swapchain;
use crate::renderer::error::GraphicsDeviceError;
use crate::renderer::resources::uniform::Uniform;
use crate::renderer::shader_data::UniformBlock;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Submitted,
    Presenting,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { image_index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// The image was queued but the swapchain is suboptimal or out of date
    Stale,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The swapchain has to be recreated before the next frame
    SwapchainStale,
}

/// GPU side of a frame. `slot` names the in-flight synchronization slot, `image_index` the
/// swapchain image.
pub trait FrameBackend {
    /// Blocks until the previous submission that used `slot` has retired
    fn wait_slot(&mut self, slot: usize) -> Result<()>;

    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome>;

    fn upload_uniform(&mut self, image_index: u32, block: &UniformBlock) -> Result<()>;

    fn submit(&mut self, slot: usize, image_index: u32) -> Result<()>;

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome>;
}

/// Drives one acquire, submit and present cycle per call
pub struct FrameLoop {
    frames_in_flight: usize,
    frame_index: u64,
    state: FrameState,
}

impl FrameLoop {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
            frame_index: 0,
            state: FrameState::Idle,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn current_slot(&self) -> usize {
        (self.frame_index % self.frames_in_flight as u64) as usize
    }

    pub fn draw_frame<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        block: &UniformBlock,
    ) -> Result<FrameOutcome> {
        let result = self.run(backend, block);
        // Whatever happened, the next frame starts from scratch
        self.state = FrameState::Idle;
        result
    }

    fn run<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        block: &UniformBlock,
    ) -> Result<FrameOutcome> {
        let slot = self.current_slot();

        self.state = FrameState::Acquiring;
        backend.wait_slot(slot)?;
        let (image_index, suboptimal) = match backend.acquire(slot)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => return Ok(FrameOutcome::SwapchainStale),
        };
        backend.upload_uniform(image_index, block)?;

        self.state = FrameState::Submitted;
        backend.submit(slot, image_index)?;

        self.state = FrameState::Presenting;
        let presented = backend.present(slot, image_index)?;

        self.frame_index += 1;

        if suboptimal || presented == PresentOutcome::Stale {
            Ok(FrameOutcome::SwapchainStale)
        } else {
            Ok(FrameOutcome::Presented)
        }
    }
}

/// Semaphores and fence owned by one in-flight slot
struct FrameSync {
    image_available: vk::Semaphore,
    in_flight: vk::Fence,
}

/// Synchronization objects for every in-flight slot, plus per-image bookkeeping
pub struct FrameSyncPool {
    slots: Vec<FrameSync>,
    // Indexed by swapchain image; a semaphore still pending presentation must not be
    // signaled again, so these follow the images rather than the slots
    render_finished: Vec<vk::Semaphore>,
    // Fence of the slot that last rendered into each swapchain image
    images_in_flight: Vec<vk::Fence>,
    device: Arc<ash::Device>,
}

impl FrameSyncPool {
    pub fn new(frames_in_flight: usize, image_count: usize, device: Arc<ash::Device>) -> Result<Self> {
        let mut pool = Self {
            slots: Vec::with_capacity(frames_in_flight),
            render_finished: Vec::new(),
            images_in_flight: Vec::new(),
            device,
        };

        for _ in 0..frames_in_flight {
            let image_available = pool.create_semaphore()?;
            // Created signaled so the first wait on each slot returns immediately
            let fence_info = vk::FenceCreateInfo::default()
                .flags(vk::FenceCreateFlags::SIGNALED);
            let in_flight = match unsafe { pool.device.create_fence(&fence_info, None) } {
                Ok(fence) => fence,
                Err(e) => {
                    unsafe { pool.device.destroy_semaphore(image_available, None) };
                    return Err(e.into());
                }
            };
            pool.slots.push(FrameSync { image_available, in_flight });
        }

        pool.reset_images(image_count)?;

        Ok(pool)
    }

    /// Rebuilds the per-image state after the swapchain changed.
    /// The device must be idle.
    pub fn reset_images(&mut self, image_count: usize) -> Result<()> {
        self.destroy_render_finished();
        self.images_in_flight = vec![vk::Fence::null(); image_count];
        for _ in 0..image_count {
            let semaphore = self.create_semaphore()?;
            self.render_finished.push(semaphore);
        }
        Ok(())
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        Ok(unsafe {
            self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        })
    }

    fn slot(&self, slot: usize) -> Result<&FrameSync> {
        self.slots
            .get(slot)
            .ok_or_else(|| eyre!("Frame slot {} out of range", slot))
    }

    fn render_finished(&self, image_index: u32) -> Result<vk::Semaphore> {
        self.render_finished
            .get(image_index as usize)
            .copied()
            .ok_or_else(|| eyre!("Swapchain image {} out of range", image_index))
    }

    fn destroy_render_finished(&mut self) {
        for semaphore in self.render_finished.drain(..) {
            unsafe { self.device.destroy_semaphore(semaphore, None) };
        }
    }
}

impl Drop for FrameSyncPool {
    fn drop(&mut self) {
        self.destroy_render_finished();
        unsafe {
            for sync in self.slots.drain(..) {
                self.device.destroy_semaphore(sync.image_available, None);
                self.device.destroy_fence(sync.in_flight, None);
            }
        }
    }
}

/// Vulkan implementation of the frame backend, borrowing the renderer's per-frame resources
pub struct FrameResources<'a> {
    pub device: &'a ash::Device,
    pub queue: vk::Queue,
    pub swapchain: &'a Swapchain,
    pub sync: &'a mut FrameSyncPool,
    pub uniforms: &'a mut [Uniform<UniformBlock>],
    pub command_buffers: &'a CommandBuffers,
}

fn device_error(result: vk::Result) -> color_eyre::Report {
    GraphicsDeviceError::from(result).into()
}

impl FrameBackend for FrameResources<'_> {
    fn wait_slot(&mut self, slot: usize) -> Result<()> {
        let fence = self.sync.slot(slot)?.in_flight;
        unsafe {
            self.device
                .wait_for_fences(&[fence], true, u64::MAX)
                .map_err(device_error)?;
        }
        Ok(())
    }

    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let sync = self.sync.slot(slot)?;
        let (image_index, suboptimal) = match self.swapchain.acquire_next_image(sync.image_available) {
            Ok(acquired) => acquired,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Ok(AcquireOutcome::OutOfDate),
            Err(e) => return Err(device_error(e)),
        };
        let in_flight = sync.in_flight;

        // The image may still be in use by a submission from another slot
        let image_fence = self.sync.images_in_flight
            .get_mut(image_index as usize)
            .ok_or_else(|| eyre!("Swapchain image {} out of range", image_index))?;
        if *image_fence != vk::Fence::null() && *image_fence != in_flight {
            unsafe {
                self.device
                    .wait_for_fences(&[*image_fence], true, u64::MAX)
                    .map_err(device_error)?;
            }
        }
        *image_fence = in_flight;

        Ok(AcquireOutcome::Acquired { image_index, suboptimal })
    }

    fn upload_uniform(&mut self, image_index: u32, block: &UniformBlock) -> Result<()> {
        self.uniforms
            .get_mut(image_index as usize)
            .ok_or_eyre("No uniform buffer for swapchain image")?
            .set(block)
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> Result<()> {
        let sync = self.sync.slot(slot)?;
        let render_finished = self.sync.render_finished(image_index)?;
        let cmd = self.command_buffers
            .get(image_index as usize)
            .ok_or_eyre("No command buffer for swapchain image")?;

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [render_finished];
        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            // A failed submit leaves this fence unsignaled; the error ends the frame loop
            self.device
                .reset_fences(&[sync.in_flight])
                .map_err(device_error)?;
            self.device
                .queue_submit(self.queue, &[submit_info], sync.in_flight)
                .map_err(device_error)?;
        }

        Ok(())
    }

    fn present(&mut self, _slot: usize, image_index: u32) -> Result<PresentOutcome> {
        let render_finished = self.sync.render_finished(image_index)?;
        match self.swapchain.present(self.queue, render_finished, image_index) {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
            Err(e) => Err(device_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};
    use crate::renderer::camera::Camera;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Upload(u32, UniformBlock),
        Submit(usize, u32),
        Present(usize, u32),
    }

    struct StubBackend {
        calls: Vec<Call>,
        image_count: u32,
        next_image: u32,
        acquire_outcomes: Vec<AcquireOutcome>,
        present_outcome: PresentOutcome,
        fail_submit: Option<GraphicsDeviceError>,
    }

    impl StubBackend {
        fn new(image_count: u32) -> Self {
            Self {
                calls: Vec::new(),
                image_count,
                next_image: 0,
                acquire_outcomes: Vec::new(),
                present_outcome: PresentOutcome::Presented,
                fail_submit: None,
            }
        }

        fn uploads(&self) -> Vec<UniformBlock> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Upload(_, block) => Some(*block),
                    _ => None,
                })
                .collect()
        }
    }

    impl FrameBackend for StubBackend {
        fn wait_slot(&mut self, slot: usize) -> Result<()> {
            self.calls.push(Call::Wait(slot));
            Ok(())
        }

        fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            if !self.acquire_outcomes.is_empty() {
                return Ok(self.acquire_outcomes.remove(0));
            }
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            Ok(AcquireOutcome::Acquired { image_index, suboptimal: false })
        }

        fn upload_uniform(&mut self, image_index: u32, block: &UniformBlock) -> Result<()> {
            self.calls.push(Call::Upload(image_index, *block));
            Ok(())
        }

        fn submit(&mut self, slot: usize, image_index: u32) -> Result<()> {
            self.calls.push(Call::Submit(slot, image_index));
            match self.fail_submit {
                Some(e) => Err(e.into()),
                None => Ok(()),
            }
        }

        fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
            self.calls.push(Call::Present(slot, image_index));
            Ok(self.present_outcome)
        }
    }

    fn block(x: f32) -> UniformBlock {
        UniformBlock { mvp: Mat4::from_translation(Vec3::new(x, 0.0, 0.0)) }
    }

    #[test]
    fn one_frame_runs_in_protocol_order() {
        let mut frame_loop = FrameLoop::new(2);
        let mut backend = StubBackend::new(3);

        let outcome = frame_loop.draw_frame(&mut backend, &block(1.0)).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented);
        assert_eq!(backend.calls, vec![
            Call::Wait(0),
            Call::Acquire(0),
            Call::Upload(0, block(1.0)),
            Call::Submit(0, 0),
            Call::Present(0, 0),
        ]);
        assert_eq!(frame_loop.state(), FrameState::Idle);
        assert_eq!(frame_loop.frame_index(), 1);
    }

    #[test]
    fn slots_rotate_independently_of_images() {
        let mut frame_loop = FrameLoop::new(2);
        let mut backend = StubBackend::new(3);

        for _ in 0..4 {
            frame_loop.draw_frame(&mut backend, &block(0.0)).unwrap();
        }

        let submits = backend.calls
            .iter()
            .filter_map(|call| match call {
                Call::Submit(slot, image) => Some((*slot, *image)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(submits, [(0, 0), (1, 1), (0, 2), (1, 0)]);
    }

    #[test]
    fn out_of_date_acquire_skips_the_frame() {
        let mut frame_loop = FrameLoop::new(2);
        let mut backend = StubBackend::new(2);
        backend.acquire_outcomes.push(AcquireOutcome::OutOfDate);

        let outcome = frame_loop.draw_frame(&mut backend, &block(0.0)).unwrap();

        assert_eq!(outcome, FrameOutcome::SwapchainStale);
        assert_eq!(backend.calls, vec![Call::Wait(0), Call::Acquire(0)]);
        assert_eq!(frame_loop.state(), FrameState::Idle);
        assert_eq!(frame_loop.frame_index(), 0);
    }

    #[test]
    fn suboptimal_results_still_present_but_report_stale() {
        let mut frame_loop = FrameLoop::new(1);
        let mut backend = StubBackend::new(2);
        backend.acquire_outcomes.push(AcquireOutcome::Acquired { image_index: 1, suboptimal: true });

        let outcome = frame_loop.draw_frame(&mut backend, &block(0.0)).unwrap();
        assert_eq!(outcome, FrameOutcome::SwapchainStale);
        assert_eq!(backend.calls.last(), Some(&Call::Present(0, 1)));

        backend.present_outcome = PresentOutcome::Stale;
        let outcome = frame_loop.draw_frame(&mut backend, &block(0.0)).unwrap();
        assert_eq!(outcome, FrameOutcome::SwapchainStale);
    }

    #[test]
    fn device_errors_return_the_loop_to_idle() {
        let mut frame_loop = FrameLoop::new(2);
        let mut backend = StubBackend::new(2);
        backend.fail_submit = Some(GraphicsDeviceError::DeviceLost);

        let err = frame_loop.draw_frame(&mut backend, &block(0.0)).unwrap_err();

        assert_eq!(
            err.downcast_ref::<GraphicsDeviceError>(),
            Some(&GraphicsDeviceError::DeviceLost),
        );
        assert_eq!(frame_loop.state(), FrameState::Idle);
        assert!(!backend.calls.iter().any(|call| matches!(call, Call::Present(..))));
    }

    #[test]
    fn each_frame_uploads_the_camera_state_from_before_its_acquire() {
        let mut frame_loop = FrameLoop::new(2);
        let mut backend = StubBackend::new(3);
        let mut camera = Camera::new(4.0);
        let mut expected = Vec::new();

        for step in 0..3 {
            // Input handled between frames
            camera.orbit(0.1 * step as f32, 0.0);
            let uniform = UniformBlock { mvp: camera.get_view_proj_mat(1.0) };
            expected.push(uniform);
            frame_loop.draw_frame(&mut backend, &uniform).unwrap();
        }

        assert_eq!(backend.uploads(), expected);
        assert_ne!(expected[0], expected[2]);
    }
}
