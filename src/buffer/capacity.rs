/// Smallest number of vertices a vertex array is created with.
pub const MIN_CAPACITY: usize = 4;

/// Below this many vertices growth doubles; above it grows by a quarter.
pub const DOUBLING_LIMIT: usize = 1024;

/// Capacity to allocate when `remaining` vertices of room cannot hold `requested`.
pub fn grown_capacity(remaining: usize, requested: usize) -> usize {
    let grown = if remaining < DOUBLING_LIMIT {
        remaining.saturating_mul(2)
    } else {
        remaining.saturating_add(remaining / 4)
    };
    grown.max(requested)
}
