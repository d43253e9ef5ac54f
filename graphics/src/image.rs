//! Render target descriptor passed between window systems and scenes.

use ash::vk;

/// A presentable image together with the synchronization attached to it.
///
/// `semaphore` is signalled when the image is ready for the current consumer.
/// `fence`, when not null, must be signalled by the last submission that
/// touches the image so the window system knows when it can reuse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VulkanImage {
    pub index: u32,
    pub image: vk::Image,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub semaphore: vk::Semaphore,
    pub fence: vk::Fence,
}

impl VulkanImage {
    /// A descriptor for `image` with no synchronization attached.
    pub fn new(index: u32, image: vk::Image, format: vk::Format, extent: vk::Extent2D) -> Self {
        Self {
            index,
            image,
            format,
            extent,
            semaphore: vk::Semaphore::null(),
            fence: vk::Fence::null(),
        }
    }

    pub fn copy_with_semaphore(&self, semaphore: vk::Semaphore) -> Self {
        Self { semaphore, ..*self }
    }

    pub fn copy_with_fence(&self, fence: vk::Fence) -> Self {
        Self { fence, ..*self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_copy_with_semaphore_keeps_image() {
        let image = VulkanImage::new(
            2,
            vk::Image::from_raw(7),
            vk::Format::B8G8R8A8_SRGB,
            vk::Extent2D {
                width: 64,
                height: 32,
            },
        )
        .copy_with_fence(vk::Fence::from_raw(3));

        let chained = image.copy_with_semaphore(vk::Semaphore::from_raw(9));
        assert_eq!(chained.index, 2);
        assert_eq!(chained.image, image.image);
        assert_eq!(chained.fence, image.fence);
        assert_eq!(chained.semaphore.as_raw(), 9);
        assert!(image.semaphore.is_null());
    }
}
