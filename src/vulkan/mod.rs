mod backend;
mod context;
mod debug;
mod device;
mod device_context;
mod instance;
mod physical;

pub use backend::VulkanDevice;
pub use context::VulkanContext;
pub use device_context::DeviceContext;
