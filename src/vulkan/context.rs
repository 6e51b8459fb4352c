use std::sync::Arc;

use anyhow::Context;
use ash::{ext::debug_utils, vk};

use super::{
    debug::setup_debug_messenger, device::create_logical_device, device_context::DeviceContext,
    instance::create_instance, physical::pick_physical_device,
};

/// Instance, physical device and logical device for offscreen use.
pub struct VulkanContext {
    device_context: DeviceContext,
    physical_device: vk::PhysicalDevice,
    debug_messenger: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    instance: ash::Instance,
    _entry: ash::Entry,
}

impl VulkanContext {
    pub fn new() -> anyhow::Result<Self> {
        let entry = ash::Entry::linked();
        let (instance, validation) = create_instance(&entry).context("failed to create instance")?;
        let debug_messenger = if validation {
            setup_debug_messenger(&entry, &instance)
        } else {
            None
        };

        let built = pick_physical_device(&instance).and_then(|(physical_device, graphics_index)| {
            let device = create_logical_device(&instance, physical_device, graphics_index)?;
            Ok((physical_device, device))
        });
        let (physical_device, device) = match built {
            Ok(parts) => parts,
            Err(e) => {
                unsafe {
                    if let Some((utils, messenger)) = &debug_messenger {
                        utils.destroy_debug_utils_messenger(*messenger, None);
                    }
                    instance.destroy_instance(None);
                }
                return Err(e);
            }
        };

        let debug_utils = validation
            .then(|| Arc::new(debug_utils::Device::new(&instance, &device)));

        Ok(Self {
            device_context: DeviceContext {
                device,
                debug_utils,
            },
            physical_device,
            debug_messenger,
            instance,
            _entry: entry,
        })
    }

    pub fn device_context(&self) -> &DeviceContext {
        &self.device_context
    }

    pub fn device(&self) -> &ash::Device {
        &self.device_context.device
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        log::trace!("Destroying Vulkan Context");
        unsafe {
            if let Err(e) = self.device_context.device.device_wait_idle() {
                log::warn!("device_wait_idle failed: {e:?}");
            }
            log::trace!("  Destroying Device");
            self.device_context.device.destroy_device(None);
            if let Some((debug_utils, messenger)) = &self.debug_messenger {
                log::trace!("  Destroying debug messenger");
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }
            log::trace!("  Destroying Instance");
            self.instance.destroy_instance(None);
        }
        log::trace!("Vulkan Context Destroyed");
    }
}
