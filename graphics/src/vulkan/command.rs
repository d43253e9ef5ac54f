//! Vulkan command pool and buffer management.

use ash::vk;

use crate::error::GraphicsError;

/// Create a command pool for graphics operations.
pub fn create_command_pool(
    device: &ash::Device,
    queue_family_index: u32,
) -> Result<vk::CommandPool, GraphicsError> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family_index)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    let pool = unsafe { device.create_command_pool(&pool_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create command pool: {:?}", e))
    })?;

    Ok(pool)
}

/// Allocate `count` primary command buffers from `pool`.
pub fn allocate_command_buffers(
    device: &ash::Device,
    pool: vk::CommandPool,
    count: u32,
) -> Result<Vec<vk::CommandBuffer>, GraphicsError> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count);

    unsafe { device.allocate_command_buffers(&alloc_info) }.map_err(|e| {
        GraphicsError::ResourceCreationFailed(format!(
            "Failed to allocate command buffers: {:?}",
            e
        ))
    })
}

/// Record commands with `record`, submit them to `queue` and wait for the
/// queue to go idle.
pub fn one_time_submit(
    device: &ash::Device,
    pool: vk::CommandPool,
    queue: vk::Queue,
    record: impl FnOnce(vk::CommandBuffer),
) -> Result<(), GraphicsError> {
    let command_buffers = allocate_command_buffers(device, pool, 1)?;
    let cmd = command_buffers[0];

    let result = (|| {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { device.begin_command_buffer(cmd, &begin_info) }
            .map_err(|e| GraphicsError::vk("Failed to begin command buffer", e))?;

        record(cmd);

        unsafe { device.end_command_buffer(cmd) }
            .map_err(|e| GraphicsError::vk("Failed to end command buffer", e))?;

        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe { device.queue_submit(queue, &[submit_info], vk::Fence::null()) }
            .map_err(|e| GraphicsError::vk("Failed to submit commands", e))?;
        unsafe { device.queue_wait_idle(queue) }
            .map_err(|e| GraphicsError::vk("Failed to wait for queue", e))
    })();

    unsafe { device.free_command_buffers(pool, &command_buffers) };
    result
}
