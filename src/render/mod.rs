mod context;
pub mod deferred;
pub mod history;
pub mod shader;
pub mod stats;
mod thread;

pub use context::RenderContext;
pub use deferred::{DeferredQueue, Deleter};
pub use shader::{AttrFormat, AttrType, Attribute, Shader};
pub use stats::{StatSnapshot, Statistic, Statistics};
pub use thread::render_thread;
