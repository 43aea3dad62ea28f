use ash::vk;

pub struct Queue {
    pub family: QueueFamily,
    pub handle: vk::Queue,
}

impl Queue {
    pub fn new(
        family: QueueFamily,
        handle: vk::Queue,
    ) -> Self {
        Self {
            family,
            handle,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct QueueFamily {
    pub index: u32,
    pub properties: vk::QueueFamilyProperties,
    supports_present: bool,
}

impl QueueFamily {
    pub fn new(
        index: u32,
        properties: vk::QueueFamilyProperties,
        supports_present: bool,
    ) -> Self {
        Self {
            index,
            properties,
            supports_present,
        }
    }

    pub fn supports_present(&self) -> bool {
        self.supports_present
    }

    pub fn supports_graphics(&self) -> bool {
        self.properties.queue_flags.contains(vk::QueueFlags::GRAPHICS)
    }
}

impl PartialEq for QueueFamily {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for QueueFamily {}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, supports_present: bool) -> QueueFamily {
        let properties = vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        };
        QueueFamily::new(0, properties, supports_present)
    }

    #[test]
    fn graphics_support_follows_the_queue_flags() {
        assert!(family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, false).supports_graphics());
        assert!(!family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, true).supports_graphics());
    }

    #[test]
    fn present_support_is_reported_as_given() {
        assert!(family(vk::QueueFlags::GRAPHICS, true).supports_present());
        assert!(!family(vk::QueueFlags::GRAPHICS, false).supports_present());
    }
}
