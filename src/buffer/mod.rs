mod capacity;
mod resource;
mod slice;

pub use capacity::{DOUBLING_LIMIT, MIN_CAPACITY, grown_capacity};
pub use resource::VertexArray;
pub use slice::VertexSlice;
