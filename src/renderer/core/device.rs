use std::ffi::{c_char, CStr};
use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::eyre::{OptionExt, WrapErr};
use color_eyre::Result;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use gpu_allocator::MemoryLocation;
use crate::renderer::core::instance::RenderInstance;
use crate::renderer::core::queue::{Queue, QueueFamily};
use crate::renderer::core::target::Surface;
use crate::renderer::core::transfer::TransferContext;
use crate::renderer::resources::buffer::Buffer;
use crate::renderer::resources::image::Image;
use crate::scene::material::TextureLoader;

/// Main structure for the renderer that can create resources
pub struct RenderDevice {
    pub logical: Arc<ash::Device>,
    pub physical: vk::PhysicalDevice,

    // For now, require the graphics queue to support presentation
    pub graphics_queue: Arc<Queue>,
    pub command_pool: vk::CommandPool,

    memory_allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,
    transfer_context: ManuallyDrop<TransferContext>,
}

impl RenderDevice {
    pub fn new(
        instance: &RenderInstance,
        surface: &Surface,
    ) -> Result<Self> {
        let (physical_device, graphics_queue_family) = Self::select_physical_device(
            &instance.instance,
            surface,
        )?;

        let (logical_device, graphics_queue) = Self::create_logical_device(
            &instance.instance,
            physical_device,
            graphics_queue_family,
        )?;
        let logical_device = Arc::new(logical_device);
        let graphics_queue = Arc::new(graphics_queue);

        let memory_allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.instance.clone(),
            device: (*logical_device).clone(),
            physical_device,
            debug_settings: gpu_allocator::AllocatorDebugSettings {
                log_memory_information: true,
                log_leaks_on_shutdown: true,
                store_stack_traces: false,
                log_allocations: false,
                log_frees: false,
                log_stack_traces: false,
            },
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let memory_allocator = match memory_allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { logical_device.destroy_device(None) };
                return Err(e.into());
            }
        };

        let command_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(graphics_queue.family.index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = match unsafe { logical_device.create_command_pool(&command_pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                drop(memory_allocator);
                unsafe { logical_device.destroy_device(None) };
                return Err(e.into());
            }
        };

        let transfer_context = match TransferContext::new(graphics_queue.clone(), logical_device.clone()) {
            Ok(transfer_context) => transfer_context,
            Err(e) => {
                drop(memory_allocator);
                unsafe {
                    logical_device.destroy_command_pool(command_pool, None);
                    logical_device.destroy_device(None);
                }
                return Err(e);
            }
        };

        Ok(Self {
            logical: logical_device,
            physical: physical_device,

            graphics_queue,
            command_pool,

            memory_allocator: ManuallyDrop::new(Arc::new(Mutex::new(memory_allocator))),
            transfer_context: ManuallyDrop::new(transfer_context),
        })
    }

    pub fn immediate_submit<F>(
        &self,
        func: F,
    ) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer, &ash::Device) -> Result<()>,
    {
        self.transfer_context.immediate_submit(func)
    }

    pub fn create_buffer(
        &self,
        size: u64,
        usage: vk::BufferUsageFlags,
        name: &str,
        mem_loc: MemoryLocation,
    ) -> Result<Buffer> {
        Buffer::new(
            size,
            usage,
            name,
            mem_loc,
            (*self.memory_allocator).clone(),
            self.logical.clone(),
        )
    }

    /// Creates a GPU-only buffer and fills it with `data` through a staging buffer
    pub fn create_buffer_with_data<T: Copy>(
        &self,
        data: &[T],
        usage: vk::BufferUsageFlags,
        name: &str,
    ) -> Result<Buffer> {
        let size = size_of_val(data) as u64;

        let mut staging_buffer = self.create_buffer(
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            &format!("{name} staging buffer"),
            MemoryLocation::CpuToGpu,
        )?;
        staging_buffer.write(data, 0)?;

        let buffer = self.create_buffer(
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            name,
            MemoryLocation::GpuOnly,
        )?;

        self.immediate_submit(|cmd, device| {
            let region = vk::BufferCopy::default().size(size);
            unsafe {
                device.cmd_copy_buffer(cmd, staging_buffer.buffer, buffer.buffer, &[region]);
            }
            Ok(())
        })?;

        Ok(buffer)
    }

    pub fn create_depth_image(&self, extent: vk::Extent2D) -> Result<Image> {
        Image::new_depth_image(
            extent.width,
            extent.height,
            (*self.memory_allocator).clone(),
            self.logical.clone(),
        )
    }

    pub fn create_color_image(&self, data: &[u8], width: u32, height: u32) -> Result<Image> {
        Image::new_color_image(
            data,
            width,
            height,
            (*self.memory_allocator).clone(),
            self.logical.clone(),
            &self.transfer_context,
        )
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.logical.device_wait_idle()? };
        Ok(())
    }

    fn select_physical_device(
        instance: &ash::Instance,
        surface: &Surface,
    ) -> Result<(vk::PhysicalDevice, QueueFamily)> {
        let req_device_exts = Self::get_required_device_extensions();
        let physical_devices = unsafe { instance.enumerate_physical_devices()? };

        let (device, family) = physical_devices
            .into_iter()
            // Filter out devices that do not contain the required device extensions
            .filter(|device| {
                let supported_extensions = unsafe {
                    instance
                        .enumerate_device_extension_properties(*device)
                        .unwrap_or_default()
                };
                req_device_exts.iter().all(|req_ext| {
                    supported_extensions
                        .iter()
                        .filter_map(|sup_ext| sup_ext.extension_name_as_c_str().ok())
                        .any(|sup_ext| sup_ext == *req_ext)
                })
            })
            // Filter out devices without a queue family that can both draw and present
            .filter_map(|device| {
                let props = unsafe {
                    instance.get_physical_device_queue_family_properties(device)
                };
                props
                    .iter()
                    .enumerate()
                    .map(|(i, q)| {
                        let supports_present = unsafe {
                            surface.loader.get_physical_device_surface_support(
                                device,
                                i as u32,
                                surface.handle,
                            ).unwrap_or(false)
                        };
                        QueueFamily::new(i as u32, *q, supports_present)
                    })
                    .find(|family| family.supports_graphics() && family.supports_present())
                    .map(|family| (device, family))
            })
            .min_by_key(|(device, _)| {
                let props = unsafe { instance.get_physical_device_properties(*device) };
                match props.device_type {
                    vk::PhysicalDeviceType::DISCRETE_GPU => 0,
                    vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
                    vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
                    vk::PhysicalDeviceType::CPU => 3,
                    vk::PhysicalDeviceType::OTHER => 4,
                    _ => 5,
                }
            })
            .ok_or_eyre("No suitable physical device found")?;

        let props = unsafe { instance.get_physical_device_properties(device) };
        if let Ok(name) = props.device_name_as_c_str() {
            log::info!("Using physical device {:?}", name);
        }

        Ok((device, family))
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: QueueFamily,
    ) -> Result<(ash::Device, Queue)> {
        let queue_priorities = [1.0];
        let queue_create_infos = [
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_queue_family.index)
                .queue_priorities(&queue_priorities),
        ];

        let enabled_extension_names = Self::get_required_device_extensions()
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<*const c_char>>();

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&enabled_extension_names);

        let device = unsafe {
            instance
                .create_device(physical_device, &device_create_info, None)
                .wrap_err("Failed to create logical device")?
        };

        let graphics_queue = unsafe {
            let queue = device.get_device_queue(graphics_queue_family.index, 0);
            Queue::new(graphics_queue_family, queue)
        };

        Ok((device, graphics_queue))
    }

    fn get_required_device_extensions() -> Vec<&'static CStr> {
        vec![
            ash::khr::swapchain::NAME,

            #[cfg(target_os = "macos")]
            ash::khr::portability_subset::NAME,
        ]
    }
}

impl TextureLoader for RenderDevice {
    type Texture = Image;

    fn load_texture(&self, path: &Path) -> Result<Image> {
        let pixels = image::open(path)
            .wrap_err_with(|| format!("Failed to open texture {:?}", path))?
            .to_rgba8();
        let (width, height) = pixels.dimensions();
        log::debug!("Uploading texture {:?} ({}x{})", path, width, height);
        self.create_color_image(pixels.as_raw(), width, height)
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        unsafe {
            // The allocator has to release its memory blocks while the device is still alive
            ManuallyDrop::drop(&mut self.transfer_context);
            ManuallyDrop::drop(&mut self.memory_allocator);
            self.logical.destroy_command_pool(self.command_pool, None);
            self.logical.destroy_device(None);
        }
    }
}
