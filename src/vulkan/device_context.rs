use std::{ffi::CString, sync::Arc};

use anyhow::Context;
use ash::vk;

#[derive(Clone)]
pub struct DeviceContext {
    pub device: Arc<ash::Device>,
    pub debug_utils: Option<Arc<ash::ext::debug_utils::Device>>,
}

impl DeviceContext {
    /// Attaches a debug name to `handle`. A no-op unless validation is enabled.
    pub fn name_object<T>(&self, handle: T, debug_name: impl AsRef<str>) -> anyhow::Result<()>
    where
        T: vk::Handle,
    {
        let Some(debug) = &self.debug_utils else {
            return Ok(());
        };

        let cname = CString::new(debug_name.as_ref())
            .with_context(|| format!("debug name {:?} contains a null byte", debug_name.as_ref()))?;

        let name_info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(handle)
            .object_name(&cname);

        unsafe {
            debug
                .set_debug_utils_object_name(&name_info)
                .map_err(|e| anyhow::anyhow!("failed to set debug name: {:?}", e))
        }
    }
}
