//! Vulkan synchronization primitives (fences, semaphores).

use ash::vk;

use crate::error::GraphicsError;

pub fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore, GraphicsError> {
    let info = vk::SemaphoreCreateInfo::default();
    unsafe { device.create_semaphore(&info, None) }.map_err(|e| {
        GraphicsError::ResourceCreationFailed(format!("Failed to create semaphore: {:?}", e))
    })
}

/// Create a fence, optionally already signalled so the first wait passes.
pub fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence, GraphicsError> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };
    let info = vk::FenceCreateInfo::default().flags(flags);
    unsafe { device.create_fence(&info, None) }.map_err(|e| {
        GraphicsError::ResourceCreationFailed(format!("Failed to create fence: {:?}", e))
    })
}

/// Wait for `fence` without a timeout and reset it for the next submission.
pub fn wait_and_reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<(), GraphicsError> {
    unsafe {
        device
            .wait_for_fences(&[fence], true, u64::MAX)
            .map_err(|e| GraphicsError::vk("Failed to wait for fence", e))?;
        device
            .reset_fences(&[fence])
            .map_err(|e| GraphicsError::vk("Failed to reset fence", e))
    }
}

/// Submit an empty batch to `queue` that waits on `wait_semaphore` (unless
/// null) and signals `fence`. Re-arms a frame slot whose work never got
/// submitted.
pub fn signal_fence(
    device: &ash::Device,
    queue: vk::Queue,
    wait_semaphore: vk::Semaphore,
    fence: vk::Fence,
) -> Result<(), GraphicsError> {
    let wait_semaphores = [wait_semaphore];
    let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
    let wait_count = usize::from(wait_semaphore != vk::Semaphore::null());
    let submit_info = vk::SubmitInfo::default()
        .wait_semaphores(&wait_semaphores[..wait_count])
        .wait_dst_stage_mask(&wait_stages[..wait_count]);
    // SAFETY: the fence is unsignalled and owned by the caller; the batch
    // references no command buffers.
    unsafe { device.queue_submit(queue, &[submit_info], fence) }
        .map_err(|e| GraphicsError::vk("Failed to submit fence signal", e))
}
