use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use smallvec::SmallVec;

use crate::{
    buffer::capacity::MIN_CAPACITY,
    device::{BindingPoint, Device, Handle},
    error::{BufferError, Result},
    render::{
        RenderContext,
        deferred::Deleter,
        shader::{AttrFormat, Shader},
        stats::Statistic,
    },
};

/// A vertex array object together with the buffer backing it.
///
/// The storage is laid out for one shader's vertex format and must not be
/// drawn with another program. Native objects are released exactly once:
/// either explicitly through [`VertexArray::release`] on the owning thread, or
/// when the last reference drops, in which case deletion is queued for the
/// owning thread.
#[derive(Debug)]
pub struct VertexArray {
    vao: Handle,
    vbo: Handle,
    cap: usize,
    stride: usize,
    offsets: SmallVec<[usize; 4]>,
    shader: Shader,
    deleter: Deleter,
    released: AtomicBool,
}

impl VertexArray {
    pub fn new(ctx: &mut RenderContext, shader: &Shader, cap: usize) -> Result<Arc<Self>> {
        let format = shader.vertex_format();

        let mut offsets = SmallVec::with_capacity(format.len());
        let mut offset = 0;
        for attr in format {
            if !attr.ty.is_vertex_vector() {
                return Err(BufferError::InvalidLayout {
                    name: attr.name.clone(),
                    ty: attr.ty,
                });
            }
            offsets.push(offset);
            offset += attr.ty.size();
        }

        if offsets.is_empty() {
            return Err(BufferError::EmptyLayout);
        }

        let cap = cap.max(MIN_CAPACITY);
        let size = cap
            .checked_mul(offset)
            .filter(|&size| size <= isize::MAX as usize)
            .ok_or(BufferError::CapacityOverflow { cap, stride: offset })?;

        let vao = ctx.device_mut().create_vertex_array()?;
        let vbo = ctx
            .device_mut()
            .create_buffer()
            .inspect_err(|_| ctx.device_mut().delete_vertex_array(vao))?;

        // From here on a failed setup drops `va`, which queues the handles for deletion.
        let va = Self {
            vao,
            vbo,
            cap,
            stride: offset,
            offsets,
            shader: shader.clone(),
            deleter: ctx.deleter(),
            released: AtomicBool::new(false),
        };

        va.begin(ctx)?;
        let setup = va.setup_storage(ctx, size);
        va.end(ctx)?;
        setup?;

        log::trace!(
            "created vertex array {:?}/{:?}: {} vertices of {} bytes",
            vao,
            vbo,
            cap,
            va.stride
        );
        Ok(Arc::new(va))
    }

    fn setup_storage(&self, ctx: &mut RenderContext, size: usize) -> Result<()> {
        let device = ctx.device_mut();
        device.allocate(size)?;

        for (attr, &offset) in self.shader.vertex_format().iter().zip(&self.offsets) {
            let Some(location) = device.attrib_location(self.shader.handle(), &attr.name) else {
                log::warn!(
                    "program {:?} has no active attribute `{}`; skipping",
                    self.shader.handle(),
                    attr.name
                );
                continue;
            };
            device.attrib_pointer(location, attr.ty.components(), self.stride, offset)?;
        }
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Bytes per vertex.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Floats per vertex.
    pub fn components(&self) -> usize {
        self.stride / 4
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn format(&self) -> &AttrFormat {
        self.shader.vertex_format()
    }

    pub fn shader(&self) -> &Shader {
        &self.shader
    }

    pub fn vertex_array_handle(&self) -> Handle {
        self.vao
    }

    pub fn buffer_handle(&self) -> Handle {
        self.vbo
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn check_live(&self) -> Result<()> {
        if self.is_released() {
            return Err(BufferError::Deleted);
        }
        Ok(())
    }

    fn check_range(&self, i: usize, j: usize) -> Result<()> {
        if j < i || j > self.cap {
            return Err(BufferError::IndexOutOfRange { i, j, cap: self.cap });
        }
        Ok(())
    }

    fn check_bound(&self, ctx: &RenderContext, point: BindingPoint) -> Result<()> {
        let ours = match point {
            BindingPoint::VertexArray => self.vao,
            BindingPoint::ArrayBuffer => self.vbo,
        };
        if ctx.device().bound(point) != ours {
            return Err(BufferError::NotBound(point));
        }
        Ok(())
    }

    pub(crate) fn is_bound(&self, ctx: &RenderContext) -> bool {
        self.check_bound(ctx, BindingPoint::VertexArray).is_ok()
            && self.check_bound(ctx, BindingPoint::ArrayBuffer).is_ok()
    }

    /// Writes `data` into vertices `[i, j)`. The array must be entered.
    pub fn upload(&self, ctx: &mut RenderContext, i: usize, j: usize, data: &[f32]) -> Result<()> {
        self.check_live()?;
        self.check_range(i, j)?;
        let expected = (j - i) * self.components();
        if data.len() != expected {
            return Err(BufferError::LengthMismatch {
                got: data.len(),
                expected,
            });
        }
        if i == j {
            return Ok(());
        }
        self.check_bound(ctx, BindingPoint::ArrayBuffer)?;

        ctx.stats().add(Statistic::VertexUpload, (j - i) as i64);
        ctx.device_mut()
            .write(i * self.stride, bytemuck::cast_slice(data))?;
        Ok(())
    }

    /// Reads vertices `[i, j)`. The array must be entered.
    pub fn download(&self, ctx: &mut RenderContext, i: usize, j: usize) -> Result<Vec<f32>> {
        self.check_live()?;
        self.check_range(i, j)?;
        if i == j {
            return Ok(Vec::new());
        }
        self.check_bound(ctx, BindingPoint::ArrayBuffer)?;

        let mut data = vec![0f32; (j - i) * self.components()];
        ctx.stats().add(Statistic::VertexDownload, (j - i) as i64);
        ctx.device_mut()
            .read(i * self.stride, bytemuck::cast_slice_mut(data.as_mut_slice()))?;
        Ok(data)
    }

    /// Draws vertices `[i, j)` as a triangle list. Needs at least [`VertexArray::begin_draw`].
    pub fn draw(&self, ctx: &mut RenderContext, i: usize, j: usize) -> Result<()> {
        self.check_live()?;
        self.check_range(i, j)?;
        self.check_bound(ctx, BindingPoint::VertexArray)?;

        ctx.stats().add(Statistic::VerticesDrawn, (j - i) as i64);
        ctx.stats().increment(Statistic::DrawCalls);
        ctx.device_mut().draw_triangles(i, j - i)?;
        Ok(())
    }

    pub fn begin(&self, ctx: &mut RenderContext) -> Result<()> {
        self.check_live()?;
        ctx.push_binding(BindingPoint::VertexArray, self.vao)?;
        if let Err(e) = ctx.push_binding(BindingPoint::ArrayBuffer, self.vbo) {
            ctx.pop_binding(BindingPoint::VertexArray)?;
            return Err(e);
        }
        Ok(())
    }

    pub fn begin_draw(&self, ctx: &mut RenderContext) -> Result<()> {
        self.check_live()?;
        ctx.push_binding(BindingPoint::VertexArray, self.vao)
    }

    pub fn end(&self, ctx: &mut RenderContext) -> Result<()> {
        ctx.pop_binding(BindingPoint::ArrayBuffer)?;
        ctx.pop_binding(BindingPoint::VertexArray)?;
        Ok(())
    }

    pub fn end_draw(&self, ctx: &mut RenderContext) -> Result<()> {
        ctx.pop_binding(BindingPoint::VertexArray)?;
        Ok(())
    }

    /// Deletes the native objects now. Returns `false` if they were already released.
    pub fn release(&self, device: &mut dyn Device) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        log::trace!("deleting vertex array {:?}/{:?}", self.vao, self.vbo);
        device.delete_vertex_array(self.vao);
        device.delete_buffer(self.vbo);
        true
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let (vao, vbo) = (self.vao, self.vbo);
        self.deleter.call_non_block(move |device| {
            log::trace!("deleting vertex array {vao:?}/{vbo:?} (deferred)");
            device.delete_vertex_array(vao);
            device.delete_buffer(vbo);
        });
    }
}
