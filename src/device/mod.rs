mod headless;

use slotmap::{Key, KeyData};

pub use headless::HeadlessDevice;

/// Native object name as handed out by a [`Device`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Handle(u64);

impl Handle {
    pub const NONE: Handle = Handle(0);

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    // Occupied slotmap keys always carry an odd version, so their ffi value is never 0.
    pub(crate) fn from_key<K: Key>(key: K) -> Self {
        Self(key.data().as_ffi())
    }

    pub(crate) fn to_key<K: Key>(self) -> K {
        KeyData::from_ffi(self.0).into()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BindingPoint {
    VertexArray,
    ArrayBuffer,
}

impl BindingPoint {
    pub const COUNT: usize = 2;

    pub fn index(self) -> usize {
        match self {
            BindingPoint::VertexArray => 0,
            BindingPoint::ArrayBuffer => 1,
        }
    }
}

/// The native calls the vertex buffer layer is built on.
///
/// Every method must be called from the thread that owns the rendering
/// context. Storage operations (`allocate`, `write`, `read`) act on the buffer
/// bound to [`BindingPoint::ArrayBuffer`]; `attrib_pointer` and
/// `draw_triangles` act on the bound vertex array.
pub trait Device {
    fn create_vertex_array(&mut self) -> anyhow::Result<Handle>;

    fn create_buffer(&mut self) -> anyhow::Result<Handle>;

    fn bound(&self, point: BindingPoint) -> Handle;

    fn bind(&mut self, point: BindingPoint, handle: Handle) -> anyhow::Result<()>;

    /// Replaces the bound buffer's storage with `size` zeroed bytes.
    fn allocate(&mut self, size: usize) -> anyhow::Result<()>;

    fn write(&mut self, offset: usize, data: &[u8]) -> anyhow::Result<()>;

    fn read(&mut self, offset: usize, out: &mut [u8]) -> anyhow::Result<()>;

    /// `None` when the program does not expose the attribute.
    fn attrib_location(&self, program: Handle, name: &str) -> Option<u32>;

    /// Sources `components` floats per vertex for `location` from the bound
    /// array buffer, recorded into the bound vertex array.
    fn attrib_pointer(
        &mut self,
        location: u32,
        components: u32,
        stride: usize,
        offset: usize,
    ) -> anyhow::Result<()>;

    fn draw_triangles(&mut self, first: usize, count: usize) -> anyhow::Result<()>;

    fn delete_vertex_array(&mut self, handle: Handle);

    fn delete_buffer(&mut self, handle: Handle);

    fn is_vertex_array(&self, handle: Handle) -> bool;

    fn is_buffer(&self, handle: Handle) -> bool;
}
