use std::{ops::Range, sync::Arc};

use crate::{
    buffer::{capacity::grown_capacity, resource::VertexArray},
    device::{BindingPoint, Handle},
    error::{BufferError, Result},
    render::{
        RenderContext,
        shader::{AttrFormat, Shader},
    },
};

/// A window `[i, j)` into a shared [`VertexArray`].
///
/// Slices taken from one another alias the same storage: writes through one
/// are visible through every other slice covering the same vertices. Growing
/// beyond the array's capacity moves the grown slice onto a new array and
/// leaves every other slice on the old one.
///
/// Data access requires the slice to be entered with [`VertexSlice::begin`]
/// (or [`VertexSlice::begin_draw`] for drawing only) and left again with the
/// matching `end`.
#[derive(Clone, Debug)]
pub struct VertexSlice {
    va: Arc<VertexArray>,
    i: usize,
    j: usize,
}

impl VertexSlice {
    /// Allocates a vertex array for `shader` holding at least `cap` vertices
    /// and returns a slice over its first `len`.
    pub fn new(ctx: &mut RenderContext, shader: &Shader, len: usize, cap: usize) -> Result<Self> {
        if len > cap {
            return Err(BufferError::InvalidArgument { len, cap });
        }
        Ok(Self {
            va: VertexArray::new(ctx, shader, cap)?,
            i: 0,
            j: len,
        })
    }

    pub fn vertex_format(&self) -> &AttrFormat {
        self.va.format()
    }

    pub fn shader(&self) -> &Shader {
        self.va.shader()
    }

    /// Floats occupied by one vertex.
    pub fn stride(&self) -> usize {
        self.va.components()
    }

    pub fn byte_stride(&self) -> usize {
        self.va.stride()
    }

    pub fn len(&self) -> usize {
        self.j - self.i
    }

    pub fn is_empty(&self) -> bool {
        self.i == self.j
    }

    /// Room from this slice's start to the end of the underlying array.
    pub fn capacity(&self) -> usize {
        self.va.capacity() - self.i
    }

    /// Vertex range within the underlying array.
    pub fn range(&self) -> Range<usize> {
        self.i..self.j
    }

    pub fn vertex_array(&self) -> &Arc<VertexArray> {
        &self.va
    }

    pub fn vertex_array_handle(&self) -> Handle {
        self.va.vertex_array_handle()
    }

    pub fn buffer_handle(&self) -> Handle {
        self.va.buffer_handle()
    }

    pub fn shares_storage(&self, other: &VertexSlice) -> bool {
        Arc::ptr_eq(&self.va, &other.va)
    }

    /// Sub-slice `[i, j)` relative to this slice, sharing its storage.
    pub fn slice(&self, i: usize, j: usize) -> Result<Self> {
        if j < i || j > self.capacity() {
            return Err(BufferError::IndexOutOfRange {
                i,
                j,
                cap: self.capacity(),
            });
        }
        Ok(Self {
            va: self.va.clone(),
            i: self.i + i,
            j: self.i + j,
        })
    }

    /// Returns this slice resized to `len` vertices.
    ///
    /// Reuses the array while `len` fits in [`VertexSlice::capacity`].
    /// Otherwise allocates a larger array and copies the current contents
    /// into the front of it. Binds what it needs internally, so the caller's
    /// scopes are left exactly as they were.
    pub fn grow(&self, ctx: &mut RenderContext, len: usize) -> Result<Self> {
        if self.va.is_released() {
            return Err(BufferError::Deleted);
        }
        let remaining = self.capacity();
        if len <= remaining {
            return Ok(Self {
                va: self.va.clone(),
                i: self.i,
                j: self.i + len,
            });
        }

        let new_cap = grown_capacity(remaining, len);
        log::debug!(
            "growing vertex slice {:?}: capacity {} -> {} for length {}",
            self.va.vertex_array_handle(),
            remaining,
            new_cap,
            len
        );

        let contents = self.with_bound(ctx, |ctx| self.vertex_data(ctx))?;

        let grown = Self {
            va: VertexArray::new(ctx, self.va.shader(), new_cap)?,
            i: 0,
            j: len,
        };
        let prefix = grown.slice(0, self.len())?;
        prefix.with_bound(ctx, |ctx| prefix.set_vertex_data(ctx, &contents))?;
        Ok(grown)
    }

    /// Resizes in place while entered, re-entering the resulting storage.
    pub fn set_len(&mut self, ctx: &mut RenderContext, len: usize) -> Result<()> {
        if len <= self.capacity() {
            self.j = self.i + len;
            return Ok(());
        }
        if !self.va.is_bound(ctx) {
            return Err(BufferError::NotBound(BindingPoint::ArrayBuffer));
        }

        self.end(ctx)?;
        let grown = self.grow(ctx, len);
        if let Ok(grown) = &grown {
            *self = grown.clone();
        }
        self.begin(ctx)?;
        grown.map(|_| ())
    }

    /// Replaces the slice's contents. `data` holds [`VertexSlice::stride`]
    /// floats per vertex, attributes in format order.
    pub fn set_vertex_data(&self, ctx: &mut RenderContext, data: &[f32]) -> Result<()> {
        let expected = self.len() * self.stride();
        if data.len() != expected {
            return Err(BufferError::LengthMismatch {
                got: data.len(),
                expected,
            });
        }
        self.va.upload(ctx, self.i, self.j, data)
    }

    pub fn vertex_data(&self, ctx: &mut RenderContext) -> Result<Vec<f32>> {
        self.va.download(ctx, self.i, self.j)
    }

    pub fn draw(&self, ctx: &mut RenderContext) -> Result<()> {
        self.va.draw(ctx, self.i, self.j)
    }

    /// Binds the vertex array and its buffer, remembering the previous bindings.
    pub fn begin(&self, ctx: &mut RenderContext) -> Result<()> {
        self.va.begin(ctx)
    }

    /// Binds only the vertex array; enough for drawing.
    pub fn begin_draw(&self, ctx: &mut RenderContext) -> Result<()> {
        self.va.begin_draw(ctx)
    }

    pub fn end(&self, ctx: &mut RenderContext) -> Result<()> {
        self.va.end(ctx)
    }

    pub fn end_draw(&self, ctx: &mut RenderContext) -> Result<()> {
        self.va.end_draw(ctx)
    }

    /// Runs `f` between [`VertexSlice::begin`] and [`VertexSlice::end`]. The
    /// slice is left even when `f` fails.
    pub fn with_bound<R>(
        &self,
        ctx: &mut RenderContext,
        f: impl FnOnce(&mut RenderContext) -> Result<R>,
    ) -> Result<R> {
        self.begin(ctx)?;
        let result = f(ctx);
        let ended = self.end(ctx);
        let value = result?;
        ended?;
        Ok(value)
    }

    pub fn with_bound_draw<R>(
        &self,
        ctx: &mut RenderContext,
        f: impl FnOnce(&mut RenderContext) -> Result<R>,
    ) -> Result<R> {
        self.begin_draw(ctx)?;
        let result = f(ctx);
        let ended = self.end_draw(ctx);
        let value = result?;
        ended?;
        Ok(value)
    }

    /// Deletes the underlying array now, for every slice sharing it.
    pub fn delete(&self, ctx: &mut RenderContext) -> bool {
        self.va.release(ctx.device_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device::HeadlessDevice,
        render::{
            shader::{AttrType, Attribute},
            stats::Statistic,
        },
    };

    fn setup() -> (RenderContext, Shader) {
        let mut device = HeadlessDevice::new();
        let program = device.register_program(&["in_position", "in_alpha"]);
        let format = AttrFormat::new([
            Attribute::new("in_position", AttrType::Vec2),
            Attribute::new("in_alpha", AttrType::Float),
        ]);
        (RenderContext::new(Box::new(device)), Shader::new(program, format))
    }

    fn ramp(vertices: usize, stride: usize, start: f32) -> Vec<f32> {
        (0..vertices * stride).map(|k| start + k as f32).collect()
    }

    #[test]
    fn new_reports_length_and_capacity() {
        let (mut ctx, shader) = setup();
        for (len, cap) in [(0, 0), (0, 4), (3, 3), (7, 100), (5, 2000)] {
            let vs = VertexSlice::new(&mut ctx, &shader, len, cap).unwrap();
            assert_eq!(vs.len(), len);
            assert!(vs.capacity() >= cap);
            assert_eq!(vs.stride(), 3);
            assert_eq!(vs.byte_stride(), 12);
        }
    }

    #[test]
    fn new_rejects_length_over_capacity() {
        let (mut ctx, shader) = setup();
        assert!(matches!(
            VertexSlice::new(&mut ctx, &shader, 5, 4),
            Err(BufferError::InvalidArgument { len: 5, cap: 4 })
        ));
        assert_eq!(ctx.stats().get(Statistic::VaoBinds), 0);
    }

    #[test]
    fn round_trip() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 6, 6).unwrap();
        let data = ramp(6, 3, 1.0);
        vs.begin(&mut ctx).unwrap();
        vs.set_vertex_data(&mut ctx, &data).unwrap();
        assert_eq!(vs.vertex_data(&mut ctx).unwrap(), data);
        vs.end(&mut ctx).unwrap();
    }

    #[test]
    fn set_vertex_data_rejects_partial_vertices() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 2, 4).unwrap();
        vs.begin(&mut ctx).unwrap();
        assert!(matches!(
            vs.set_vertex_data(&mut ctx, &[0.0; 5]),
            Err(BufferError::LengthMismatch { got: 5, expected: 6 })
        ));
        assert!(matches!(
            vs.set_vertex_data(&mut ctx, &[0.0; 9]),
            Err(BufferError::LengthMismatch { got: 9, expected: 6 })
        ));
        vs.end(&mut ctx).unwrap();
        assert_eq!(ctx.stats().get(Statistic::VertexUpload), 0);
    }

    #[test]
    fn sub_slices_alias_parent() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 8, 8).unwrap();
        let sub = vs.slice(2, 5).unwrap();
        assert!(sub.shares_storage(&vs));
        assert_eq!(sub.range(), 2..5);

        vs.begin(&mut ctx).unwrap();
        let data = ramp(3, 3, 100.0);
        sub.set_vertex_data(&mut ctx, &data).unwrap();
        let all = vs.vertex_data(&mut ctx).unwrap();
        assert_eq!(&all[2 * 3..5 * 3], data.as_slice());
        assert!(all[..6].iter().all(|v| *v == 0.0));
        vs.end(&mut ctx).unwrap();
    }

    #[test]
    fn nested_sub_slices_are_relative() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 10, 10).unwrap();
        let inner = vs.slice(4, 10).unwrap().slice(1, 3).unwrap();
        assert_eq!(inner.range(), 5..7);
        assert_eq!(inner.capacity(), 5);
    }

    #[test]
    fn slice_bounds() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 2, 8).unwrap();
        // beyond len but within capacity is allowed
        assert_eq!(vs.slice(0, 8).unwrap().len(), 8);
        assert!(matches!(
            vs.slice(0, 9),
            Err(BufferError::IndexOutOfRange { i: 0, j: 9, cap: 8 })
        ));
        assert!(matches!(
            vs.slice(3, 2),
            Err(BufferError::IndexOutOfRange { .. })
        ));

        let tail = vs.slice(6, 8).unwrap();
        assert_eq!(tail.capacity(), 2);
        assert!(tail.slice(0, 3).is_err());
    }

    #[test]
    fn grow_within_capacity_reuses_storage() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 2, 8).unwrap();
        let longer = vs.grow(&mut ctx, 6).unwrap();
        assert!(longer.shares_storage(&vs));
        assert_eq!(longer.len(), 6);
        assert_eq!(ctx.stats().get(Statistic::VertexDownload), 0);
    }

    #[test]
    fn grow_preserves_content_and_doubles() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 0, 4).unwrap();
        let vs = vs.grow(&mut ctx, 4).unwrap();
        let data = ramp(4, 3, 0.5);
        vs.with_bound(&mut ctx, |ctx| vs.set_vertex_data(ctx, &data))
            .unwrap();

        let grown = vs.grow(&mut ctx, 5).unwrap();
        assert!(!grown.shares_storage(&vs));
        assert_eq!(grown.capacity(), 8);
        assert_eq!(grown.len(), 5);

        let contents = grown.with_bound(&mut ctx, |ctx| grown.vertex_data(ctx)).unwrap();
        assert_eq!(&contents[..data.len()], data.as_slice());
        assert!(contents[data.len()..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn grow_past_doubling_limit_adds_a_quarter() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 0, 2000).unwrap();
        let grown = vs.grow(&mut ctx, 2500).unwrap();
        assert_eq!(grown.capacity(), 2500);
    }

    #[test]
    fn oversized_requests_fail_without_touching_bindings() {
        let (mut ctx, shader) = setup();
        assert!(matches!(
            VertexSlice::new(&mut ctx, &shader, 0, usize::MAX / 8),
            Err(BufferError::CapacityOverflow { .. })
        ));

        let vs = VertexSlice::new(&mut ctx, &shader, 2, 4).unwrap();
        vs.begin(&mut ctx).unwrap();
        assert!(matches!(
            vs.grow(&mut ctx, usize::MAX / 8),
            Err(BufferError::CapacityOverflow { .. })
        ));
        assert_eq!(ctx.binding_depth(BindingPoint::VertexArray), 1);
        assert_eq!(ctx.device().bound(BindingPoint::ArrayBuffer), vs.buffer_handle());
        vs.end(&mut ctx).unwrap();
        assert_eq!(ctx.binding_depth(BindingPoint::ArrayBuffer), 0);
    }

    #[test]
    fn grow_from_tail_slice_uses_remaining_capacity() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 10, 10).unwrap();
        let tail = vs.slice(7, 10).unwrap();
        let data = ramp(3, 3, 7.0);
        tail.with_bound(&mut ctx, |ctx| tail.set_vertex_data(ctx, &data))
            .unwrap();

        let grown = tail.grow(&mut ctx, 4).unwrap();
        assert_eq!(grown.capacity(), 6);
        assert_eq!(grown.range(), 0..4);
        let contents = grown.with_bound(&mut ctx, |ctx| grown.vertex_data(ctx)).unwrap();
        assert_eq!(&contents[..9], data.as_slice());
    }

    #[test]
    fn grow_leaves_other_slices_on_old_storage() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 4, 4).unwrap();
        let other = vs.slice(0, 4).unwrap();
        let grown = vs.grow(&mut ctx, 9).unwrap();

        grown
            .with_bound(&mut ctx, |ctx| grown.set_vertex_data(ctx, &ramp(9, 3, 1.0)))
            .unwrap();
        let old = other.with_bound(&mut ctx, |ctx| other.vertex_data(ctx)).unwrap();
        assert!(old.iter().all(|v| *v == 0.0));
        assert!(other.shares_storage(&vs));
    }

    #[test]
    fn grow_keeps_caller_scope_intact() {
        let (mut ctx, shader) = setup();
        let outer = VertexSlice::new(&mut ctx, &shader, 1, 4).unwrap();
        let vs = VertexSlice::new(&mut ctx, &shader, 4, 4).unwrap();

        outer.begin(&mut ctx).unwrap();
        let grown = vs.grow(&mut ctx, 16).unwrap();
        assert_eq!(ctx.device().bound(BindingPoint::VertexArray), outer.vertex_array_handle());
        assert_eq!(ctx.device().bound(BindingPoint::ArrayBuffer), outer.buffer_handle());
        assert_eq!(ctx.binding_depth(BindingPoint::VertexArray), 1);
        outer.end(&mut ctx).unwrap();
        assert_eq!(grown.len(), 16);
    }

    #[test]
    fn set_len_regrows_while_entered() {
        let (mut ctx, shader) = setup();
        let mut vs = VertexSlice::new(&mut ctx, &shader, 2, 4).unwrap();
        let data = ramp(2, 3, 1.0);

        vs.begin(&mut ctx).unwrap();
        vs.set_vertex_data(&mut ctx, &data).unwrap();
        vs.set_len(&mut ctx, 3).unwrap();
        assert_eq!(vs.len(), 3);
        vs.set_len(&mut ctx, 20).unwrap();
        assert_eq!(vs.len(), 20);
        assert!(vs.capacity() >= 20);

        // still entered, now on the new storage
        assert_eq!(ctx.device().bound(BindingPoint::ArrayBuffer), vs.buffer_handle());
        let contents = vs.vertex_data(&mut ctx).unwrap();
        assert_eq!(&contents[..6], data.as_slice());
        vs.end(&mut ctx).unwrap();
        assert_eq!(ctx.device().bound(BindingPoint::ArrayBuffer), Handle::NONE);
    }

    #[test]
    fn set_len_growth_requires_being_entered() {
        let (mut ctx, shader) = setup();
        let mut vs = VertexSlice::new(&mut ctx, &shader, 2, 4).unwrap();
        assert!(matches!(
            vs.set_len(&mut ctx, 10),
            Err(BufferError::NotBound(_))
        ));
        assert_eq!(vs.len(), 2);
    }

    #[test]
    fn draw_only_binding_is_enough_to_draw() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 6, 6).unwrap();
        vs.with_bound_draw(&mut ctx, |ctx| vs.draw(ctx)).unwrap();
        assert_eq!(ctx.device().bound(BindingPoint::VertexArray), Handle::NONE);
        assert!(matches!(vs.draw(&mut ctx), Err(BufferError::NotBound(BindingPoint::VertexArray))));
        // data access still needs the buffer binding
        vs.begin_draw(&mut ctx).unwrap();
        assert!(matches!(vs.vertex_data(&mut ctx), Err(BufferError::NotBound(_))));
        vs.end_draw(&mut ctx).unwrap();
    }

    #[test]
    fn with_bound_leaves_on_error() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 2, 4).unwrap();
        let result = vs.with_bound(&mut ctx, |ctx| vs.set_vertex_data(ctx, &[1.0]));
        assert!(matches!(result, Err(BufferError::LengthMismatch { .. })));
        assert_eq!(ctx.binding_depth(BindingPoint::VertexArray), 0);
        assert_eq!(ctx.binding_depth(BindingPoint::ArrayBuffer), 0);
    }

    #[test]
    fn delete_affects_every_sharing_slice() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 4, 4).unwrap();
        let sub = vs.slice(1, 2).unwrap();
        let vao = vs.vertex_array_handle();

        assert!(sub.delete(&mut ctx));
        assert!(!vs.delete(&mut ctx));
        assert!(!ctx.device().is_vertex_array(vao));
        assert!(matches!(vs.begin(&mut ctx), Err(BufferError::Deleted)));
        assert!(matches!(vs.grow(&mut ctx, 100), Err(BufferError::Deleted)));
    }

    #[test]
    fn last_dropped_slice_queues_deletion() {
        let (mut ctx, shader) = setup();
        let vs = VertexSlice::new(&mut ctx, &shader, 4, 4).unwrap();
        let sub = vs.slice(0, 2).unwrap();
        let vbo = vs.buffer_handle();

        drop(vs);
        assert_eq!(ctx.flush_deferred(), 0);
        drop(sub);
        assert_eq!(ctx.flush_deferred(), 1);
        assert!(!ctx.device().is_buffer(vbo));
    }
}
