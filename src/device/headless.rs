use anyhow::Context;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use super::{BindingPoint, Device, Handle};

new_key_type! { struct VertexArrayKey; }
new_key_type! { struct BufferKey; }
new_key_type! { struct ProgramKey; }

#[derive(Clone, Copy, Debug)]
struct AttribPointer {
    location: u32,
    components: u32,
    stride: usize,
    offset: usize,
    buffer: Handle,
}

#[derive(Default)]
struct VertexArrayState {
    attributes: SmallVec<[AttribPointer; 4]>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DrawCall {
    pub vertex_array: Handle,
    pub first: usize,
    pub count: usize,
}

/// CPU implementation of [`Device`] that keeps buffer contents in host memory.
///
/// Follows the binding rules of a real driver: storage calls fail without a
/// bound array buffer, draws fail without a bound vertex array or when the
/// drawn range reads past the end of an attribute's source buffer.
#[derive(Default)]
pub struct HeadlessDevice {
    vertex_arrays: SlotMap<VertexArrayKey, VertexArrayState>,
    buffers: SlotMap<BufferKey, Vec<u8>>,
    programs: SlotMap<ProgramKey, Vec<String>>,
    bound_vertex_array: Handle,
    bound_array_buffer: Handle,
    draws: Vec<DrawCall>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a program whose attribute locations follow the order of `attributes`.
    pub fn register_program<S: AsRef<str>>(&mut self, attributes: &[S]) -> Handle {
        let names = attributes.iter().map(|a| a.as_ref().to_owned()).collect();
        Handle::from_key(self.programs.insert(names))
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    fn bound_storage(&mut self) -> anyhow::Result<&mut Vec<u8>> {
        let handle = self.bound_array_buffer;
        anyhow::ensure!(!handle.is_none(), "no array buffer bound");
        self.buffers
            .get_mut(handle.to_key::<BufferKey>())
            .with_context(|| format!("bound array buffer {handle:?} does not exist"))
    }

    fn bound_vertex_array(&mut self) -> anyhow::Result<&mut VertexArrayState> {
        let handle = self.bound_vertex_array;
        anyhow::ensure!(!handle.is_none(), "no vertex array bound");
        self.vertex_arrays
            .get_mut(handle.to_key::<VertexArrayKey>())
            .with_context(|| format!("bound vertex array {handle:?} does not exist"))
    }
}

impl Device for HeadlessDevice {
    fn create_vertex_array(&mut self) -> anyhow::Result<Handle> {
        Ok(Handle::from_key(
            self.vertex_arrays.insert(VertexArrayState::default()),
        ))
    }

    fn create_buffer(&mut self) -> anyhow::Result<Handle> {
        Ok(Handle::from_key(self.buffers.insert(Vec::new())))
    }

    fn bound(&self, point: BindingPoint) -> Handle {
        match point {
            BindingPoint::VertexArray => self.bound_vertex_array,
            BindingPoint::ArrayBuffer => self.bound_array_buffer,
        }
    }

    fn bind(&mut self, point: BindingPoint, handle: Handle) -> anyhow::Result<()> {
        match point {
            BindingPoint::VertexArray => {
                anyhow::ensure!(
                    handle.is_none() || self.is_vertex_array(handle),
                    "cannot bind unknown vertex array {handle:?}"
                );
                self.bound_vertex_array = handle;
            }
            BindingPoint::ArrayBuffer => {
                anyhow::ensure!(
                    handle.is_none() || self.is_buffer(handle),
                    "cannot bind unknown buffer {handle:?}"
                );
                self.bound_array_buffer = handle;
            }
        }
        Ok(())
    }

    fn allocate(&mut self, size: usize) -> anyhow::Result<()> {
        let storage = self.bound_storage()?;
        storage.clear();
        storage.resize(size, 0);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> anyhow::Result<()> {
        let storage = self.bound_storage()?;
        let end = offset + data.len();
        anyhow::ensure!(
            end <= storage.len(),
            "write of {} bytes at {offset} overflows buffer of {} bytes",
            data.len(),
            storage.len()
        );
        storage[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn read(&mut self, offset: usize, out: &mut [u8]) -> anyhow::Result<()> {
        let storage = self.bound_storage()?;
        let end = offset + out.len();
        anyhow::ensure!(
            end <= storage.len(),
            "read of {} bytes at {offset} overflows buffer of {} bytes",
            out.len(),
            storage.len()
        );
        out.copy_from_slice(&storage[offset..end]);
        Ok(())
    }

    fn attrib_location(&self, program: Handle, name: &str) -> Option<u32> {
        self.programs
            .get(program.to_key::<ProgramKey>())?
            .iter()
            .position(|n| n == name)
            .map(|p| p as u32)
    }

    fn attrib_pointer(
        &mut self,
        location: u32,
        components: u32,
        stride: usize,
        offset: usize,
    ) -> anyhow::Result<()> {
        anyhow::ensure!((1..=4).contains(&components), "invalid component count {components}");
        let buffer = self.bound_array_buffer;
        anyhow::ensure!(!buffer.is_none(), "attribute pointer without bound array buffer");
        let vao = self.bound_vertex_array()?;
        vao.attributes.retain(|a| a.location != location);
        vao.attributes.push(AttribPointer {
            location,
            components,
            stride,
            offset,
            buffer,
        });
        Ok(())
    }

    fn draw_triangles(&mut self, first: usize, count: usize) -> anyhow::Result<()> {
        let vertex_array = self.bound_vertex_array;
        let attributes = self.bound_vertex_array()?.attributes.clone();
        if count > 0 {
            for attr in &attributes {
                let len = self
                    .buffers
                    .get(attr.buffer.to_key::<BufferKey>())
                    .map(Vec::len)
                    .with_context(|| format!("attribute {} sources a deleted buffer", attr.location))?;
                let last = (first + count - 1) * attr.stride + attr.offset + attr.components as usize * 4;
                anyhow::ensure!(
                    last <= len,
                    "draw [{first}, {}) reads past end of buffer for attribute {}",
                    first + count,
                    attr.location
                );
            }
        }
        self.draws.push(DrawCall {
            vertex_array,
            first,
            count,
        });
        Ok(())
    }

    fn delete_vertex_array(&mut self, handle: Handle) {
        if self.vertex_arrays.remove(handle.to_key::<VertexArrayKey>()).is_some()
            && self.bound_vertex_array == handle
        {
            self.bound_vertex_array = Handle::NONE;
        }
    }

    fn delete_buffer(&mut self, handle: Handle) {
        if self.buffers.remove(handle.to_key::<BufferKey>()).is_some()
            && self.bound_array_buffer == handle
        {
            self.bound_array_buffer = Handle::NONE;
        }
    }

    fn is_vertex_array(&self, handle: Handle) -> bool {
        self.vertex_arrays.contains_key(handle.to_key::<VertexArrayKey>())
    }

    fn is_buffer(&self, handle: Handle) -> bool {
        self.buffers.contains_key(handle.to_key::<BufferKey>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound_buffer(device: &mut HeadlessDevice, size: usize) -> Handle {
        let buffer = device.create_buffer().unwrap();
        device.bind(BindingPoint::ArrayBuffer, buffer).unwrap();
        device.allocate(size).unwrap();
        buffer
    }

    #[test]
    fn allocate_zero_fills() {
        let mut device = HeadlessDevice::new();
        bound_buffer(&mut device, 16);
        let mut out = [0xffu8; 16];
        device.read(0, &mut out).unwrap();
        assert_eq!(out, [0u8; 16]);
    }

    #[test]
    fn write_without_binding_fails() {
        let mut device = HeadlessDevice::new();
        device.create_buffer().unwrap();
        assert!(device.write(0, &[1, 2, 3]).is_err());
    }

    #[test]
    fn write_past_end_fails() {
        let mut device = HeadlessDevice::new();
        bound_buffer(&mut device, 8);
        assert!(device.write(4, &[0u8; 8]).is_err());
        device.write(4, &[7u8; 4]).unwrap();
    }

    #[test]
    fn deleting_bound_objects_resets_binding() {
        let mut device = HeadlessDevice::new();
        let buffer = bound_buffer(&mut device, 4);
        device.delete_buffer(buffer);
        assert!(!device.is_buffer(buffer));
        assert_eq!(device.bound(BindingPoint::ArrayBuffer), Handle::NONE);
        assert!(device.bind(BindingPoint::ArrayBuffer, buffer).is_err());
    }

    #[test]
    fn attrib_locations_follow_registration_order() {
        let mut device = HeadlessDevice::new();
        let program = device.register_program(&["in_position", "in_color"]);
        assert_eq!(device.attrib_location(program, "in_color"), Some(1));
        assert_eq!(device.attrib_location(program, "in_uv"), None);
        assert_eq!(device.attrib_location(Handle::NONE, "in_color"), None);
    }

    #[test]
    fn draw_checks_source_buffer_bounds() {
        let mut device = HeadlessDevice::new();
        let vao = device.create_vertex_array().unwrap();
        device.bind(BindingPoint::VertexArray, vao).unwrap();
        bound_buffer(&mut device, 4 * 2 * 3);
        device.attrib_pointer(0, 2, 8, 0).unwrap();

        device.draw_triangles(0, 3).unwrap();
        assert!(device.draw_triangles(1, 3).is_err());
        assert_eq!(
            device.draws(),
            &[DrawCall {
                vertex_array: vao,
                first: 0,
                count: 3
            }]
        );
    }

    #[test]
    fn draw_without_vertex_array_fails() {
        let mut device = HeadlessDevice::new();
        assert!(device.draw_triangles(0, 3).is_err());
    }
}
