use crate::device::BindingPoint;
use crate::render::shader::AttrType;

pub type Result<T> = std::result::Result<T, BufferError>;

#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("invalid vertex layout: attribute `{name}` has unsupported type {ty:?}")]
    InvalidLayout { name: String, ty: AttrType },

    #[error("invalid vertex layout: format has no attributes")]
    EmptyLayout,

    #[error("capacity {cap} of {stride}-byte vertices exceeds addressable storage")]
    CapacityOverflow { cap: usize, stride: usize },

    #[error("invalid argument: length {len} exceeds capacity {cap}")]
    InvalidArgument { len: usize, cap: usize },

    #[error("length mismatch: got {got} floats, expected {expected}")]
    LengthMismatch { got: usize, expected: usize },

    #[error("index out of range: [{i}, {j}) with capacity {cap}")]
    IndexOutOfRange { i: usize, j: usize, cap: usize },

    #[error("leave without matching enter on {0:?}")]
    UnbalancedScope(BindingPoint),

    #[error("vertex array is not bound on {0:?}")]
    NotBound(BindingPoint),

    #[error("vertex array was already deleted")]
    Deleted,

    #[error(transparent)]
    Device(#[from] anyhow::Error),
}
