//! "Core" refers to high-level objects that own the Vulkan instance, device and presentation
//! state. They create the "Resources" objects.

pub mod device;
pub mod instance;
pub mod queue;
pub mod swapchain;
pub mod target;
pub mod transfer;
