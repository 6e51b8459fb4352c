//! GPU-resident growable vertex buffers.
//!
//! A [`VertexSlice`] is a cheap window into a shared [`VertexArray`]. All
//! native work goes through a [`RenderContext`] owned by one thread; binding
//! state is saved and restored around every nested scope, and arrays dropped on
//! any thread are deleted on the owning thread through a [`Deleter`].

pub mod buffer;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod messages;
pub mod render;
#[cfg(feature = "vulkan")]
pub mod vulkan;

pub use buffer::{VertexArray, VertexSlice};
pub use config::{Backend, EngineConfig};
pub use device::{BindingPoint, Device, Handle, HeadlessDevice};
pub use engine::Engine;
pub use error::{BufferError, Result};
pub use messages::RenderJob;
pub use render::{
    AttrFormat, AttrType, Attribute, Deleter, RenderContext, Shader, Statistic, Statistics,
};
