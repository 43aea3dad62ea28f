use ash::vk;
use thiserror::Error;

/// Failures reported by the GPU while a frame is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GraphicsDeviceError {
    /// The swapchain no longer matches the surface and has to be rebuilt
    #[error("Swapchain is out of date")]
    SwapchainOutOfDate,

    #[error("Graphics device was lost")]
    DeviceLost,

    #[error("Graphics device ran out of memory: {0}")]
    OutOfMemory(vk::Result),

    #[error("Vulkan call failed: {0}")]
    Vulkan(vk::Result),
}

impl From<vk::Result> for GraphicsDeviceError {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_DATE_KHR => Self::SwapchainOutOfDate,
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            vk::Result::ERROR_OUT_OF_HOST_MEMORY
            | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            | vk::Result::ERROR_OUT_OF_POOL_MEMORY => Self::OutOfMemory(result),
            other => Self::Vulkan(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_vulkan_results_to_kinds() {
        assert_eq!(
            GraphicsDeviceError::from(vk::Result::ERROR_OUT_OF_DATE_KHR),
            GraphicsDeviceError::SwapchainOutOfDate,
        );
        assert_eq!(
            GraphicsDeviceError::from(vk::Result::ERROR_DEVICE_LOST),
            GraphicsDeviceError::DeviceLost,
        );
        assert_eq!(
            GraphicsDeviceError::from(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            GraphicsDeviceError::OutOfMemory(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
        );
        assert_eq!(
            GraphicsDeviceError::from(vk::Result::ERROR_SURFACE_LOST_KHR),
            GraphicsDeviceError::Vulkan(vk::Result::ERROR_SURFACE_LOST_KHR),
        );
    }

    #[test]
    fn converts_into_report_and_back() {
        let report: color_eyre::Report = GraphicsDeviceError::DeviceLost.into();
        assert_eq!(
            report.downcast_ref::<GraphicsDeviceError>(),
            Some(&GraphicsDeviceError::DeviceLost),
        );
    }
}
