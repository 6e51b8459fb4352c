use std::ffi::CStr;

use anyhow::Context;
use ash::vk;

/// Picks the first device exposing a graphics queue, preferring discrete GPUs.
pub fn pick_physical_device(instance: &ash::Instance) -> anyhow::Result<(vk::PhysicalDevice, u32)> {
    let devices = unsafe {
        instance
            .enumerate_physical_devices()
            .context("failed to enumerate physical devices")?
    };

    let mut candidates: Vec<_> = devices
        .into_iter()
        .filter_map(|device| find_graphics_queue(instance, device).map(|index| (device, index)))
        .collect();
    candidates.sort_by_key(|(device, _)| {
        let props = unsafe { instance.get_physical_device_properties(*device) };
        props.device_type != vk::PhysicalDeviceType::DISCRETE_GPU
    });
    let (device, graphics_index) = candidates
        .into_iter()
        .next()
        .context("No suitable physical device.")?;

    let props = unsafe { instance.get_physical_device_properties(device) };
    log::debug!("Selected physical device: {:?}", unsafe {
        CStr::from_ptr(props.device_name.as_ptr())
    });

    Ok((device, graphics_index))
}

fn find_graphics_queue(instance: &ash::Instance, device: vk::PhysicalDevice) -> Option<u32> {
    let props = unsafe { instance.get_physical_device_queue_family_properties(device) };
    props
        .iter()
        .position(|f| f.queue_count > 0 && f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
}
