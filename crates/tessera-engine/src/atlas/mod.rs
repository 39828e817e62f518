//! Texture atlas: one texture, one quad arena, one indexed draw per batch.
//!
//! The atlas owns the GPU buffer names for its arena. Mutations go through the
//! arena and only mark it dirty; the next draw with a ready texture uploads
//! what changed and issues a single `draw_elements`.

mod config;

pub use config::{AtlasConfig, UploadMode};

use crate::arena::{IndexMode, QuadArena, INDICES_PER_QUAD};
use crate::error::ArenaError;
use crate::geometry::{QuadValue, QuadView, QuadViewMut, VertexFormat};
use crate::gpu::{
    AttributeType, BufferId, BufferTarget, BufferUsage, DrawCtx, DrawMode, GpuCommands, IndexType,
    VertexAttribute,
};
use crate::texture::TextureHandle;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct AtlasBuffers {
    vertex: BufferId,
    index: BufferId,
}

#[derive(Debug)]
pub struct TextureAtlas<F: VertexFormat> {
    arena: QuadArena<F>,
    texture: Option<TextureHandle>,
    config: AtlasConfig,
    buffers: Option<AtlasBuffers>,
    /// Length of the last whole-buffer upload; 0 before the first.
    uploaded_len: usize,
}

impl<F: VertexFormat> TextureAtlas<F> {
    pub fn new(texture: Option<TextureHandle>, config: AtlasConfig) -> Result<Self, ArenaError> {
        let arena = QuadArena::new(config.initial_capacity, config.index_mode)?;
        log::trace!(
            "TextureAtlas<{}>: capacity {} ({:?}, {:?})",
            F::NAME,
            config.initial_capacity,
            config.index_mode,
            config.upload_mode
        );
        Ok(Self { arena, texture, config, buffers: None, uploaded_len: 0 })
    }

    /// Atlas with default settings and room for `capacity` quads.
    pub fn with_capacity(texture: Option<TextureHandle>, capacity: usize) -> Result<Self, ArenaError> {
        Self::new(texture, AtlasConfig { initial_capacity: capacity, ..AtlasConfig::default() })
    }

    // ── accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    #[inline]
    pub fn texture(&self) -> Option<&TextureHandle> {
        self.texture.as_ref()
    }

    pub fn set_texture(&mut self, texture: Option<TextureHandle>) {
        self.texture = texture;
    }

    #[inline]
    pub fn arena(&self) -> &QuadArena<F> {
        &self.arena
    }

    /// Direct arena access. Changes made here are uploaded like any other.
    #[inline]
    pub fn arena_mut(&mut self) -> &mut QuadArena<F> {
        &mut self.arena
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.arena.count()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Quad data changed since the last upload.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.arena.is_dirty()
    }

    /// GPU buffers have been created.
    #[inline]
    pub fn has_buffers(&self) -> bool {
        self.buffers.is_some()
    }

    pub fn quad(&self, index: usize) -> Result<QuadView<'_, F>, ArenaError> {
        self.arena.quad(index)
    }

    pub fn quad_mut(&mut self, index: usize) -> Result<QuadViewMut<'_, F>, ArenaError> {
        self.arena.quad_mut(index)
    }

    // ── mutation ──────────────────────────────────────────────────────────

    pub fn insert_quad_at(&mut self, index: usize, quad: &QuadValue<F>) -> Result<(), ArenaError> {
        self.arena.insert_quad_at(index, quad)
    }

    pub fn insert_quads_at(&mut self, index: usize, quads: &[QuadValue<F>]) -> Result<(), ArenaError> {
        self.arena.insert_quads_at(index, quads)
    }

    /// Appends `quad` after the last live quad.
    pub fn push_quad(&mut self, quad: &QuadValue<F>) -> Result<(), ArenaError> {
        self.arena.insert_quad_at(self.arena.count(), quad)
    }

    pub fn remove_quad_at(&mut self, index: usize) -> Result<QuadValue<F>, ArenaError> {
        self.arena.remove_quad_at(index)
    }

    pub fn remove_quads_at(&mut self, index: usize, amount: usize) -> Result<(), ArenaError> {
        self.arena.remove_quads_at(index, amount)
    }

    pub fn remove_all_quads(&mut self) {
        self.arena.remove_all_quads();
    }

    pub fn update_quad(&mut self, index: usize, quad: &QuadValue<F>) -> Result<(), ArenaError> {
        self.arena.update_quad(index, quad)
    }

    pub fn move_quads(&mut self, old_index: usize, amount: usize, new_index: usize) -> Result<(), ArenaError> {
        self.arena.move_quads(old_index, amount, new_index)
    }

    pub fn fill_with_empty_quads_from(&mut self, index: usize, amount: usize) -> Result<(), ArenaError> {
        self.arena.fill_with_empty_quads_from(index, amount)
    }

    pub fn increase_total_quads_with(&mut self, amount: usize) -> Result<(), ArenaError> {
        self.arena.increase_total_quads_with(amount)
    }

    pub fn grow(&mut self, new_capacity: usize) -> Result<(), ArenaError> {
        self.arena.grow(new_capacity)
    }

    // ── GPU ───────────────────────────────────────────────────────────────

    /// Creates the vertex and index buffers and uploads the indices.
    ///
    /// Runs once; later calls do nothing.
    pub fn setup_buffers(&mut self, gpu: &mut dyn GpuCommands) {
        if self.buffers.is_some() {
            return;
        }

        let vertex = gpu.create_buffer();
        let index = gpu.create_buffer();
        gpu.bind_buffer(BufferTarget::ElementArray, index);
        gpu.buffer_data(
            BufferTarget::ElementArray,
            bytemuck::cast_slice(self.arena.indices()),
            BufferUsage::Static,
        );
        self.arena.take_indices_dirty();

        log::debug!(
            "TextureAtlas<{}>: buffers created (vertex {:?}, index {:?})",
            F::NAME,
            vertex,
            index
        );
        self.buffers = Some(AtlasBuffers { vertex, index });
    }

    /// Draws every live quad.
    pub fn draw_quads(&mut self, ctx: &mut DrawCtx<'_>) -> Result<(), ArenaError> {
        self.draw_number_of_quads(ctx, self.arena.count(), 0)
    }

    /// Draws quads `[start, start + n)` in one indexed draw.
    ///
    /// - `n == 0`: nothing happens.
    /// - the range reaches past capacity: `IndexOutOfRange`, nothing happens.
    /// - no texture, or texture not loaded yet: nothing happens.
    ///
    /// Otherwise pending quad changes are uploaded first. Slots past `count`
    /// but within capacity are drawn as whatever they hold (zeroed by default).
    pub fn draw_number_of_quads(
        &mut self,
        ctx: &mut DrawCtx<'_>,
        n: usize,
        start: usize,
    ) -> Result<(), ArenaError> {
        if n == 0 {
            return Ok(());
        }
        let capacity = self.arena.capacity();
        if start.checked_add(n).is_none_or(|end| end > capacity) {
            return Err(ArenaError::IndexOutOfRange { index: start.saturating_add(n), len: capacity });
        }

        let Some(texture) = self.texture.clone().filter(TextureHandle::is_loaded) else {
            log::trace!("TextureAtlas<{}>: texture not ready; draw skipped", F::NAME);
            return Ok(());
        };

        self.setup_buffers(ctx.gpu);
        let Some(buffers) = self.buffers else { return Ok(()) };

        ctx.gpu.bind_texture(&texture);
        if self.arena.take_indices_dirty() {
            ctx.gpu.bind_buffer(BufferTarget::ElementArray, buffers.index);
            ctx.gpu.buffer_data(
                BufferTarget::ElementArray,
                bytemuck::cast_slice(self.arena.indices()),
                BufferUsage::Static,
            );
        }

        ctx.gpu.bind_buffer(BufferTarget::Array, buffers.vertex);
        self.upload_vertices(ctx.gpu);

        ctx.gpu.bind_buffer(BufferTarget::ElementArray, buffers.index);
        set_attribute_pointers::<F>(ctx.gpu);

        let mode = match self.arena.index_mode() {
            IndexMode::TriangleList => DrawMode::Triangles,
            IndexMode::TriangleStrip => DrawMode::TriangleStrip,
        };
        let index_type = IndexType::U16;
        ctx.gpu.draw_elements(
            mode,
            n * INDICES_PER_QUAD,
            index_type,
            start * INDICES_PER_QUAD * index_type.size_in_bytes(),
        );

        ctx.stats.draw_calls += 1;
        ctx.stats.quads_drawn += n as u64;
        Ok(())
    }

    /// Sends changed vertex bytes to the bound array buffer.
    ///
    /// The first upload and any upload after growth send the whole arena, since
    /// the GPU buffer does not have the new size yet.
    fn upload_vertices(&mut self, gpu: &mut dyn GpuCommands) {
        let dirty = self.arena.take_dirty();
        let bytes = self.arena.as_bytes();
        let resized = self.uploaded_len != bytes.len();

        match (dirty, self.config.upload_mode) {
            (_, _) if resized => {
                log::trace!("TextureAtlas<{}>: full upload, {} bytes", F::NAME, bytes.len());
                gpu.buffer_data(BufferTarget::Array, bytes, BufferUsage::Dynamic);
                self.uploaded_len = bytes.len();
            }
            (Some(_), UploadMode::WholeBuffer) => {
                log::trace!("TextureAtlas<{}>: whole-buffer upload, {} bytes", F::NAME, bytes.len());
                gpu.buffer_data(BufferTarget::Array, bytes, BufferUsage::Dynamic);
            }
            (Some(range), UploadMode::DirtyRange) => {
                log::trace!("TextureAtlas<{}>: partial upload {range:?}", F::NAME);
                gpu.buffer_sub_data(BufferTarget::Array, range.start, &bytes[range]);
            }
            (None, _) => {}
        }
    }
}

/// Slots 0..=2: position, normalized color, texture coordinates, interleaved.
fn set_attribute_pointers<F: VertexFormat>(gpu: &mut dyn GpuCommands) {
    let stride = F::STRIDE as u32;
    let attributes = [
        VertexAttribute {
            components: F::POSITION_COMPONENTS as u8,
            ty: AttributeType::Float,
            normalized: false,
            stride,
            offset: 0,
        },
        VertexAttribute {
            components: 4,
            ty: AttributeType::UnsignedByte,
            normalized: true,
            stride,
            offset: F::COLOR_OFFSET as u32,
        },
        VertexAttribute {
            components: 2,
            ty: AttributeType::Float,
            normalized: false,
            stride,
            offset: F::TEX_COORDS_OFFSET as u32,
        },
    ];
    for (slot, attribute) in (0u32..).zip(attributes) {
        gpu.enable_vertex_attribute(slot);
        gpu.set_vertex_attribute_pointer(slot, attribute);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Color4B, Tex2F, V2fC4bT2f, V3fC4bT2f, Vertex2F};
    use crate::gpu::{GpuCommand, RecordingGpu, RenderStats};
    use crate::texture::ImageData;

    fn loaded_texture() -> TextureHandle {
        TextureHandle::from_image("white", ImageData::solid(2, 2, [255; 4]))
    }

    fn sprite(i: usize) -> QuadValue<V2fC4bT2f> {
        let x = i as f32 * 10.0;
        QuadValue::<V2fC4bT2f>::sprite(
            Vertex2F::new(x, 0.0),
            Vertex2F::new(x + 8.0, 8.0),
            Tex2F::new(0.0, 0.0),
            Tex2F::new(1.0, 1.0),
            Color4B::WHITE,
        )
    }

    fn atlas_with(n: usize, config: AtlasConfig) -> TextureAtlas<V2fC4bT2f> {
        let mut atlas = TextureAtlas::new(Some(loaded_texture()), config).unwrap();
        for i in 0..n {
            atlas.push_quad(&sprite(i)).unwrap();
        }
        atlas
    }

    fn draw(atlas: &mut TextureAtlas<V2fC4bT2f>, gpu: &mut RecordingGpu, stats: &mut RenderStats) {
        let mut ctx = DrawCtx::new(gpu, stats);
        atlas.draw_quads(&mut ctx).unwrap();
    }

    // ── configuration ──────────────────────────────────────────────────────

    #[test]
    fn default_config() {
        let atlas = TextureAtlas::<V2fC4bT2f>::new(None, AtlasConfig::default()).unwrap();
        assert_eq!(atlas.capacity(), 29);
        assert_eq!(atlas.arena().index_mode(), IndexMode::TriangleList);
        assert_eq!(atlas.config().upload_mode, UploadMode::WholeBuffer);
        assert!(!atlas.has_buffers());
    }

    // ── draw preconditions ────────────────────────────────────────────────

    #[test]
    fn zero_quads_issue_no_commands() {
        let mut atlas = atlas_with(3, AtlasConfig::default());
        let mut gpu = RecordingGpu::new();
        let mut stats = RenderStats::default();
        let mut ctx = DrawCtx::new(&mut gpu, &mut stats);
        atlas.draw_number_of_quads(&mut ctx, 0, 0).unwrap();
        atlas.draw_number_of_quads(&mut ctx, 0, 1_000).unwrap();
        assert!(gpu.commands().is_empty());
        assert_eq!(stats, RenderStats::default());
    }

    #[test]
    fn draw_past_capacity_is_rejected() {
        let mut atlas = atlas_with(3, AtlasConfig { initial_capacity: 4, ..AtlasConfig::default() });
        let mut gpu = RecordingGpu::new();
        let mut stats = RenderStats::default();
        let mut ctx = DrawCtx::new(&mut gpu, &mut stats);

        let err = atlas.draw_number_of_quads(&mut ctx, 2, 3).unwrap_err();
        assert_eq!(err, ArenaError::IndexOutOfRange { index: 5, len: 4 });
        assert!(atlas.draw_number_of_quads(&mut ctx, 1, usize::MAX).is_err());
        assert!(gpu.commands().is_empty());
    }

    #[test]
    fn pending_texture_skips_draw() {
        let pending = TextureHandle::pending("later.png");
        let mut atlas = TextureAtlas::<V2fC4bT2f>::new(Some(pending.clone()), AtlasConfig::default()).unwrap();
        atlas.push_quad(&sprite(0)).unwrap();

        let mut gpu = RecordingGpu::new();
        let mut stats = RenderStats::default();
        draw(&mut atlas, &mut gpu, &mut stats);
        assert!(gpu.commands().is_empty());
        assert!(atlas.is_dirty(), "skipped draw must keep changes pending");

        pending.resolve(Ok(ImageData::solid(1, 1, [255; 4])));
        draw(&mut atlas, &mut gpu, &mut stats);
        assert_eq!(gpu.count(GpuCommand::is_draw), 1);
        assert!(!atlas.is_dirty());
    }

    #[test]
    fn no_texture_skips_draw() {
        let mut atlas = TextureAtlas::<V2fC4bT2f>::new(None, AtlasConfig::default()).unwrap();
        atlas.push_quad(&sprite(0)).unwrap();
        let mut gpu = RecordingGpu::new();
        let mut stats = RenderStats::default();
        draw(&mut atlas, &mut gpu, &mut stats);
        assert!(gpu.commands().is_empty());
    }

    // ── command stream ────────────────────────────────────────────────────

    #[test]
    fn first_draw_command_sequence() {
        let mut atlas = atlas_with(2, AtlasConfig { initial_capacity: 4, ..AtlasConfig::default() });
        let texture = atlas.texture().unwrap().clone();
        let mut gpu = RecordingGpu::new();
        let mut stats = RenderStats::default();
        draw(&mut atlas, &mut gpu, &mut stats);

        let vbo = BufferId::from_raw(1);
        let ibo = BufferId::from_raw(2);
        let attr = |components, ty, normalized, offset| VertexAttribute {
            components,
            ty,
            normalized,
            stride: 20,
            offset,
        };
        assert_eq!(
            gpu.commands(),
            &[
                GpuCommand::CreateBuffer(vbo),
                GpuCommand::CreateBuffer(ibo),
                GpuCommand::BindBuffer { target: BufferTarget::ElementArray, buffer: ibo },
                GpuCommand::BufferData { target: BufferTarget::ElementArray, len: 4 * 6 * 2, usage: BufferUsage::Static },
                GpuCommand::BindTexture(texture.id()),
                GpuCommand::BindBuffer { target: BufferTarget::Array, buffer: vbo },
                GpuCommand::BufferData { target: BufferTarget::Array, len: 4 * 80, usage: BufferUsage::Dynamic },
                GpuCommand::BindBuffer { target: BufferTarget::ElementArray, buffer: ibo },
                GpuCommand::EnableVertexAttribute(0),
                GpuCommand::VertexAttributePointer { slot: 0, attribute: attr(2, AttributeType::Float, false, 0) },
                GpuCommand::EnableVertexAttribute(1),
                GpuCommand::VertexAttributePointer { slot: 1, attribute: attr(4, AttributeType::UnsignedByte, true, 8) },
                GpuCommand::EnableVertexAttribute(2),
                GpuCommand::VertexAttributePointer { slot: 2, attribute: attr(2, AttributeType::Float, false, 12) },
                GpuCommand::DrawElements { mode: DrawMode::Triangles, count: 12, index_type: IndexType::U16, offset: 0 },
            ]
        );
        assert_eq!(gpu.buffer_contents(vbo), Some(atlas.arena().as_bytes()));
        assert_eq!(gpu.buffer_contents(ibo), Some(bytemuck::cast_slice(atlas.arena().indices())));
        assert_eq!(stats, RenderStats { draw_calls: 1, quads_drawn: 2 });
    }

    #[test]
    fn sub_range_draw_offsets_indices() {
        let mut atlas = atlas_with(5, AtlasConfig::default());
        let mut gpu = RecordingGpu::new();
        let mut stats = RenderStats::default();
        let mut ctx = DrawCtx::new(&mut gpu, &mut stats);
        atlas.draw_number_of_quads(&mut ctx, 2, 3).unwrap();

        assert_eq!(
            gpu.commands().last(),
            Some(&GpuCommand::DrawElements {
                mode: DrawMode::Triangles,
                count: 12,
                index_type: IndexType::U16,
                offset: 3 * 6 * 2,
            })
        );
    }

    #[test]
    fn strip_mode_draws_strips() {
        let config = AtlasConfig { index_mode: IndexMode::TriangleStrip, ..AtlasConfig::default() };
        let mut atlas = atlas_with(1, config);
        let mut gpu = RecordingGpu::new();
        let mut stats = RenderStats::default();
        draw(&mut atlas, &mut gpu, &mut stats);
        assert!(matches!(
            gpu.commands().last(),
            Some(GpuCommand::DrawElements { mode: DrawMode::TriangleStrip, count: 6, .. })
        ));
    }

    #[test]
    fn three_dimensional_layout() {
        let mut atlas = TextureAtlas::<V3fC4bT2f>::new(Some(loaded_texture()), AtlasConfig::default()).unwrap();
        atlas.insert_quad_at(0, &QuadValue::default()).unwrap();
        let mut gpu = RecordingGpu::new();
        let mut stats = RenderStats::default();
        atlas.draw_quads(&mut DrawCtx::new(&mut gpu, &mut stats)).unwrap();

        let pointers: Vec<_> = gpu
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCommand::VertexAttributePointer { attribute, .. } => Some((attribute.components, attribute.offset, attribute.stride)),
                _ => None,
            })
            .collect();
        assert_eq!(pointers, vec![(3, 0, 24), (4, 12, 24), (2, 16, 24)]);
    }

    // ── uploads ───────────────────────────────────────────────────────────

    #[test]
    fn clean_atlas_does_not_reupload() {
        let mut atlas = atlas_with(2, AtlasConfig::default());
        let mut gpu = RecordingGpu::new();
        let mut stats = RenderStats::default();
        draw(&mut atlas, &mut gpu, &mut stats);
        gpu.clear();

        draw(&mut atlas, &mut gpu, &mut stats);
        assert_eq!(gpu.count(GpuCommand::is_upload), 0);
        assert_eq!(gpu.count(GpuCommand::is_draw), 1);
        assert_eq!(gpu.count(|c| matches!(c, GpuCommand::CreateBuffer(_))), 0);
    }

    #[test]
    fn whole_buffer_mode_resends_everything() {
        let mut atlas = atlas_with(3, AtlasConfig::default());
        let mut gpu = RecordingGpu::new();
        let mut stats = RenderStats::default();
        draw(&mut atlas, &mut gpu, &mut stats);
        gpu.clear();

        atlas.update_quad(1, &sprite(7)).unwrap();
        draw(&mut atlas, &mut gpu, &mut stats);
        assert_eq!(
            gpu.count(|c| matches!(c, GpuCommand::BufferData { target: BufferTarget::Array, len, .. } if *len == 29 * 80)),
            1
        );
        assert_eq!(gpu.bound_contents(BufferTarget::Array), Some(atlas.arena().as_bytes()));
    }

    #[test]
    fn dirty_range_mode_sends_only_changes() {
        let config = AtlasConfig { upload_mode: UploadMode::DirtyRange, ..AtlasConfig::default() };
        let mut atlas = atlas_with(3, config);
        let mut gpu = RecordingGpu::new();
        let mut stats = RenderStats::default();
        draw(&mut atlas, &mut gpu, &mut stats);
        gpu.clear();

        atlas.update_quad(1, &sprite(7)).unwrap();
        draw(&mut atlas, &mut gpu, &mut stats);
        assert!(gpu.commands().contains(&GpuCommand::BufferSubData {
            target: BufferTarget::Array,
            offset: 80,
            len: 80,
        }));
        assert_eq!(gpu.bound_contents(BufferTarget::Array), Some(atlas.arena().as_bytes()));
    }

    #[test]
    fn growth_reuploads_indices_and_vertices() {
        let config = AtlasConfig { initial_capacity: 2, upload_mode: UploadMode::DirtyRange, ..AtlasConfig::default() };
        let mut atlas = atlas_with(2, config);
        let mut gpu = RecordingGpu::new();
        let mut stats = RenderStats::default();
        draw(&mut atlas, &mut gpu, &mut stats);
        gpu.clear();

        atlas.push_quad(&sprite(2)).unwrap();
        assert_eq!(atlas.capacity(), 4);
        draw(&mut atlas, &mut gpu, &mut stats);

        assert!(gpu.commands().contains(&GpuCommand::BufferData {
            target: BufferTarget::ElementArray,
            len: 4 * 6 * 2,
            usage: BufferUsage::Static,
        }));
        assert!(gpu.commands().contains(&GpuCommand::BufferData {
            target: BufferTarget::Array,
            len: 4 * 80,
            usage: BufferUsage::Dynamic,
        }));
        assert_eq!(gpu.count(|c| matches!(c, GpuCommand::BufferSubData { .. })), 0);
    }

    #[test]
    fn setup_buffers_is_idempotent() {
        let mut atlas = atlas_with(1, AtlasConfig::default());
        let mut gpu = RecordingGpu::new();
        atlas.setup_buffers(&mut gpu);
        atlas.setup_buffers(&mut gpu);
        assert_eq!(gpu.count(|c| matches!(c, GpuCommand::CreateBuffer(_))), 2);
        assert!(atlas.has_buffers());
    }
}
