use std::ffi::CString;

use anyhow::Context;
use ash::{ext::debug_utils, vk};

use super::debug::{messenger_create_info, validation_available, validation_layer_names};

/// Creates an instance with no surface extensions. Returns whether validation was enabled.
pub fn create_instance(entry: &ash::Entry) -> anyhow::Result<(ash::Instance, bool)> {
    let app_name = CString::new("arbor-vertex")?;
    let engine_name = CString::new("Arbor")?;

    let app_info = vk::ApplicationInfo::default()
        .api_version(vk::API_VERSION_1_3)
        .application_name(app_name.as_c_str())
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(engine_name.as_c_str())
        .engine_version(vk::make_api_version(0, 0, 1, 0));

    let validation = validation_available(entry)?;

    let mut extension_names = Vec::new();
    if validation {
        extension_names.push(debug_utils::NAME.as_ptr());
    }
    if cfg!(any(target_os = "macos", target_os = "ios")) {
        extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());
    }

    let create_flags = if cfg!(any(target_os = "macos", target_os = "ios")) {
        vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
    } else {
        vk::InstanceCreateFlags::default()
    };

    let (_layer_names, layer_names_ptrs) = validation_layer_names();
    let mut debug_create_info = messenger_create_info();
    let mut instance_create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .flags(create_flags);
    if validation {
        instance_create_info = instance_create_info
            .enabled_layer_names(&layer_names_ptrs)
            .push_next(&mut debug_create_info);
    }

    let instance = unsafe {
        entry
            .create_instance(&instance_create_info, None)
            .context("failed to create ash::Instance")?
    };
    log::trace!("Created instance (validation: {validation})");
    Ok((instance, validation))
}
