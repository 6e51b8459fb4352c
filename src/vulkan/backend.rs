use anyhow::Context;
use ash::vk;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use vk_mem::{Alloc, AllocatorCreateInfo};

use crate::device::{BindingPoint, Device, Handle};

use super::VulkanContext;

new_key_type! { struct VertexArrayKey; }
new_key_type! { struct BufferKey; }
new_key_type! { struct ProgramKey; }

#[derive(Clone, Copy, Debug)]
struct VertexInput {
    location: u32,
    components: u32,
    stride: usize,
    offset: usize,
    buffer: Handle,
}

#[derive(Default)]
struct VertexArrayState {
    inputs: SmallVec<[VertexInput; 4]>,
}

struct Storage {
    buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    size: usize,
}

#[derive(Default)]
struct BufferState {
    storage: Option<Storage>,
}

/// [`Device`] backed by host-visible Vulkan vertex buffers.
///
/// Vertex arrays only record attribute layouts. No graphics pipeline is
/// created, so draws are validated and then refused.
pub struct VulkanDevice {
    vertex_arrays: SlotMap<VertexArrayKey, VertexArrayState>,
    buffers: SlotMap<BufferKey, BufferState>,
    programs: SlotMap<ProgramKey, Vec<(String, u32)>>,
    bound_vertex_array: Handle,
    bound_array_buffer: Handle,
    // Dropped before the context so the device outlives the allocator.
    allocator: vk_mem::Allocator,
    context: VulkanContext,
}

impl VulkanDevice {
    pub fn new() -> anyhow::Result<Self> {
        let context = VulkanContext::new()?;
        let aci = AllocatorCreateInfo::new(context.instance(), context.device(), context.physical_device());
        let allocator =
            unsafe { vk_mem::Allocator::new(aci).context("failed to create allocator")? };

        Ok(Self {
            vertex_arrays: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            bound_vertex_array: Handle::NONE,
            bound_array_buffer: Handle::NONE,
            allocator,
            context,
        })
    }

    /// Registers a program by its attribute names and shader input locations.
    pub fn register_program(&mut self, locations: &[(&str, u32)]) -> Handle {
        let locations = locations
            .iter()
            .map(|(name, location)| ((*name).to_owned(), *location))
            .collect();
        Handle::from_key(self.programs.insert(locations))
    }

    fn bound_buffer(&mut self) -> anyhow::Result<&mut BufferState> {
        let handle = self.bound_array_buffer;
        anyhow::ensure!(!handle.is_none(), "no array buffer bound");
        self.buffers
            .get_mut(handle.to_key::<BufferKey>())
            .with_context(|| format!("bound array buffer {handle:?} does not exist"))
    }

    fn destroy_storage(allocator: &vk_mem::Allocator, storage: Storage) {
        let Storage {
            buffer,
            mut allocation,
            ..
        } = storage;
        unsafe { allocator.destroy_buffer(buffer, &mut allocation) };
    }
}

fn bound_storage(
    buffers: &mut SlotMap<BufferKey, BufferState>,
    handle: Handle,
    offset: usize,
    len: usize,
) -> anyhow::Result<&mut Storage> {
    anyhow::ensure!(!handle.is_none(), "no array buffer bound");
    let storage = buffers
        .get_mut(handle.to_key::<BufferKey>())
        .with_context(|| format!("bound array buffer {handle:?} does not exist"))?
        .storage
        .as_mut()
        .context("bound array buffer has no storage")?;
    anyhow::ensure!(
        offset + len <= storage.size,
        "range {}..{} outside buffer of {} bytes",
        offset,
        offset + len,
        storage.size
    );
    Ok(storage)
}

fn float_format(components: u32) -> anyhow::Result<vk::Format> {
    Ok(match components {
        1 => vk::Format::R32_SFLOAT,
        2 => vk::Format::R32G32_SFLOAT,
        3 => vk::Format::R32G32B32_SFLOAT,
        4 => vk::Format::R32G32B32A32_SFLOAT,
        n => anyhow::bail!("no vertex format for {n} components"),
    })
}

impl Device for VulkanDevice {
    fn create_vertex_array(&mut self) -> anyhow::Result<Handle> {
        Ok(Handle::from_key(self.vertex_arrays.insert(VertexArrayState::default())))
    }

    fn create_buffer(&mut self) -> anyhow::Result<Handle> {
        Ok(Handle::from_key(self.buffers.insert(BufferState::default())))
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
        let handle = self.bound_array_buffer;
        if let Some(old) = self.bound_buffer()?.storage.take() {
            Self::destroy_storage(&self.allocator, old);
        }
        if size == 0 {
            return Ok(());
        }

        let bci = vk::BufferCreateInfo::default()
            .size(size as vk::DeviceSize)
            .usage(
                vk::BufferUsageFlags::VERTEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_SRC
                    | vk::BufferUsageFlags::TRANSFER_DST,
            )
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let aci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Auto,
            flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
            required_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
            ..Default::default()
        };
        let (buffer, mut allocation) = unsafe { self.allocator.create_buffer(&bci, &aci) }
            .context("failed to create vertex buffer")?;

        let zeroed = unsafe {
            self.allocator
                .map_memory(&mut allocation)
                .map(|ptr| std::ptr::write_bytes(ptr, 0, size))
        };
        match zeroed {
            Ok(()) => unsafe { self.allocator.unmap_memory(&mut allocation) },
            Err(e) => {
                Self::destroy_storage(&self.allocator, Storage { buffer, allocation, size });
                return Err(e).context("failed to map vertex buffer");
            }
        }

        if let Err(e) = self
            .context
            .device_context()
            .name_object(buffer, format!("vertex buffer {:#x}", handle.raw()))
        {
            log::warn!("{e:?}");
        }

        self.bound_buffer()?.storage = Some(Storage {
            buffer,
            allocation,
            size,
        });
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> anyhow::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let allocator = &self.allocator;
        let storage = bound_storage(&mut self.buffers, self.bound_array_buffer, offset, data.len())?;
        unsafe {
            let ptr = allocator
                .map_memory(&mut storage.allocation)
                .context("failed to map vertex buffer")?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset), data.len());
            allocator.unmap_memory(&mut storage.allocation);
        }
        Ok(())
    }

    fn read(&mut self, offset: usize, out: &mut [u8]) -> anyhow::Result<()> {
        if out.is_empty() {
            return Ok(());
        }
        let allocator = &self.allocator;
        let storage = bound_storage(&mut self.buffers, self.bound_array_buffer, offset, out.len())?;
        unsafe {
            let ptr = allocator
                .map_memory(&mut storage.allocation)
                .context("failed to map vertex buffer")?;
            std::ptr::copy_nonoverlapping(ptr.add(offset), out.as_mut_ptr(), out.len());
            allocator.unmap_memory(&mut storage.allocation);
        }
        Ok(())
    }

    fn attrib_location(&self, program: Handle, name: &str) -> Option<u32> {
        self.programs
            .get(program.to_key::<ProgramKey>())?
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, location)| *location)
    }

    fn attrib_pointer(
        &mut self,
        location: u32,
        components: u32,
        stride: usize,
        offset: usize,
    ) -> anyhow::Result<()> {
        float_format(components)?;
        let buffer = self.bound_array_buffer;
        anyhow::ensure!(!buffer.is_none(), "no array buffer bound");
        let handle = self.bound_vertex_array;
        anyhow::ensure!(!handle.is_none(), "no vertex array bound");
        let state = self
            .vertex_arrays
            .get_mut(handle.to_key::<VertexArrayKey>())
            .with_context(|| format!("bound vertex array {handle:?} does not exist"))?;

        let input = VertexInput {
            location,
            components,
            stride,
            offset,
            buffer,
        };
        match state.inputs.iter_mut().find(|i| i.location == location) {
            Some(existing) => *existing = input,
            None => state.inputs.push(input),
        }
        Ok(())
    }

    fn draw_triangles(&mut self, first: usize, count: usize) -> anyhow::Result<()> {
        let handle = self.bound_vertex_array;
        anyhow::ensure!(!handle.is_none(), "no vertex array bound");
        let state = self
            .vertex_arrays
            .get(handle.to_key::<VertexArrayKey>())
            .with_context(|| format!("bound vertex array {handle:?} does not exist"))?;

        if count > 0 {
            for input in &state.inputs {
                let storage = self
                    .buffers
                    .get(input.buffer.to_key::<BufferKey>())
                    .and_then(|b| b.storage.as_ref())
                    .with_context(|| format!("attribute {} sources a deleted buffer", input.location))?;
                let end = input.offset
                    + (first + count - 1) * input.stride
                    + input.components as usize * 4;
                anyhow::ensure!(
                    end <= storage.size,
                    "attribute {} reads past its buffer ({} > {} bytes)",
                    input.location,
                    end,
                    storage.size
                );
            }
        }
        anyhow::bail!("the Vulkan backend has no graphics pipeline to draw vertex array {handle:?} with")
    }

    fn delete_vertex_array(&mut self, handle: Handle) {
        if self
            .vertex_arrays
            .remove(handle.to_key::<VertexArrayKey>())
            .is_some()
            && self.bound_vertex_array == handle
        {
            self.bound_vertex_array = Handle::NONE;
        }
    }

    fn delete_buffer(&mut self, handle: Handle) {
        let Some(state) = self.buffers.remove(handle.to_key::<BufferKey>()) else {
            return;
        };
        if let Some(storage) = state.storage {
            Self::destroy_storage(&self.allocator, storage);
        }
        if self.bound_array_buffer == handle {
            self.bound_array_buffer = Handle::NONE;
        }
    }

    fn is_vertex_array(&self, handle: Handle) -> bool {
        !handle.is_none() && self.vertex_arrays.contains_key(handle.to_key::<VertexArrayKey>())
    }

    fn is_buffer(&self, handle: Handle) -> bool {
        !handle.is_none() && self.buffers.contains_key(handle.to_key::<BufferKey>())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.context.device().device_wait_idle() } {
            log::warn!("device_wait_idle failed: {e:?}");
        }
        let leaked = self.buffers.len();
        if leaked > 0 {
            log::debug!("Destroying {leaked} vertex buffers still alive at shutdown");
        }
        for (_, state) in self.buffers.drain() {
            if let Some(storage) = state.storage {
                Self::destroy_storage(&self.allocator, storage);
            }
        }
    }
}
