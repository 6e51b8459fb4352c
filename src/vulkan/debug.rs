use std::ffi::{CStr, CString, c_char, c_void};

use anyhow::Context;
use ash::{Entry, ext::debug_utils, vk};

#[cfg(debug_assertions)]
pub const ENABLE_VALIDATION_LAYERS: bool = true;
#[cfg(not(debug_assertions))]
pub const ENABLE_VALIDATION_LAYERS: bool = false;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

unsafe extern "system" fn validation_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _: *mut c_void,
) -> vk::Bool32 {
    use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;

    let message = unsafe { CStr::from_ptr((*p_callback_data).p_message) }.to_string_lossy();
    match severity {
        Severity::VERBOSE => log::trace!(target: "vulkan", "{kind:?} - {message}"),
        Severity::INFO => log::debug!(target: "vulkan", "{kind:?} - {message}"),
        Severity::WARNING => log::warn!(target: "vulkan", "{kind:?} - {message}"),
        _ => log::error!(target: "vulkan", "{kind:?} - {message}"),
    }
    vk::FALSE
}

/// Validation is only requested when it is compiled in and the loader has the layer.
pub fn validation_available(entry: &Entry) -> anyhow::Result<bool> {
    if !ENABLE_VALIDATION_LAYERS {
        return Ok(false);
    }
    let layers = unsafe {
        entry
            .enumerate_instance_layer_properties()
            .context("failed to enumerate Vulkan instance layer properties")?
    };
    let found = layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER));
    if !found {
        log::warn!("{} not available; continuing without validation", VALIDATION_LAYER.to_string_lossy());
    }
    Ok(found)
}

pub fn validation_layer_names() -> (Vec<CString>, Vec<*const c_char>) {
    let names = vec![VALIDATION_LAYER.to_owned()];
    let ptrs = names.iter().map(|n| n.as_ptr()).collect();
    (names, ptrs)
}

pub fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(validation_callback))
}

pub fn setup_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = debug_utils::Instance::new(entry, instance);
    match unsafe { debug_utils.create_debug_utils_messenger(&messenger_create_info(), None) } {
        Ok(messenger) => Some((debug_utils, messenger)),
        Err(e) => {
            log::warn!("failed to create debug utils messenger: {e:?}");
            None
        }
    }
}
