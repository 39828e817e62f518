//! GPU command interface consumed by the atlas.
//!
//! The atlas speaks a small, GL-shaped command set: bind a buffer to a target,
//! fill it, describe the vertex attributes, draw indexed triangles. Backends:
//! - [`RecordingGpu`] keeps every call in memory (tests, debugging)
//! - [`WgpuBackend`] maps the calls onto wgpu and replays draws in a render pass
//!
//! Convention:
//! - Vertex positions are logical pixels (top-left origin, +Y down).
//! - Index buffers hold `u16` indices.

mod ctx;
mod device;
mod recording;
mod wgpu_backend;

pub use ctx::{DrawCtx, RenderStats, RenderTarget, Viewport};
pub use device::{HeadlessGpu, HeadlessInit};
pub use recording::{GpuCommand, RecordingGpu};
pub use wgpu_backend::WgpuBackend;

use crate::texture::TextureHandle;

/// Backend-assigned buffer name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u32);

impl BufferId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Binding point a buffer is attached to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex data.
    Array,
    /// Index data.
    ElementArray,
}

/// Expected update frequency of a buffer's contents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Static,
    Dynamic,
}

/// Component type of a vertex attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Float,
    UnsignedByte,
}

/// Primitive assembly for indexed draws.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Triangles,
    TriangleStrip,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
}

impl IndexType {
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            IndexType::U16 => 2,
        }
    }
}

/// Layout of one interleaved vertex attribute inside the bound vertex buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub components: u8,
    pub ty: AttributeType,
    /// Integer components map to `[0, 1]` when set.
    pub normalized: bool,
    pub stride: u32,
    pub offset: u32,
}

/// GL-style command sink.
///
/// Calls are infallible from the caller's point of view; backends log and
/// ignore commands they cannot honor (e.g. `buffer_data` with nothing bound).
pub trait GpuCommands {
    fn create_buffer(&mut self) -> BufferId;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId);
    /// Replaces the whole contents of the buffer bound to `target`.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    /// Overwrites `data.len()` bytes at `offset` in the buffer bound to `target`.
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);
    fn bind_texture(&mut self, texture: &TextureHandle);
    fn enable_vertex_attribute(&mut self, slot: u32);
    fn set_vertex_attribute_pointer(&mut self, slot: u32, attribute: VertexAttribute);
    /// Draws `count` indices starting `offset` bytes into the bound index buffer.
    fn draw_elements(&mut self, mode: DrawMode, count: usize, index_type: IndexType, offset: usize);
}
