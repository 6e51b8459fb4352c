use std::sync::Arc;

use anyhow::Context;
use ash::vk;

pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    graphics_index: u32,
) -> anyhow::Result<Arc<ash::Device>> {
    let queue_priorities = [1.0f32];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(graphics_index)
        .queue_priorities(&queue_priorities)];

    let device_create_info =
        vk::DeviceCreateInfo::default().queue_create_infos(&queue_create_infos);

    let device = Arc::new(unsafe {
        instance
            .create_device(physical_device, &device_create_info, None)
            .context("failed to create logical device.")?
    });
    log::trace!("Created logical device");

    Ok(device)
}
