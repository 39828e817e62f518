use std::collections::HashMap;

use super::{
    AttributeType, BufferId, BufferTarget, BufferUsage, DrawMode, GpuCommands, IndexType,
    VertexAttribute,
};
use crate::texture::{TextureHandle, TextureId};

/// One recorded [`GpuCommands`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuCommand {
    CreateBuffer(BufferId),
    BindBuffer { target: BufferTarget, buffer: BufferId },
    BufferData { target: BufferTarget, len: usize, usage: BufferUsage },
    BufferSubData { target: BufferTarget, offset: usize, len: usize },
    BindTexture(TextureId),
    EnableVertexAttribute(u32),
    VertexAttributePointer { slot: u32, attribute: VertexAttribute },
    DrawElements { mode: DrawMode, count: usize, index_type: IndexType, offset: usize },
}

/// In-memory backend.
///
/// Records every call in order and keeps a CPU copy of each buffer so tests
/// can check exactly what would reach the GPU.
#[derive(Debug, Default)]
pub struct RecordingGpu {
    commands: Vec<GpuCommand>,
    buffers: HashMap<BufferId, Vec<u8>>,
    bound: HashMap<BufferTarget, BufferId>,
    next_buffer: u32,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn count(&self, pred: impl Fn(&GpuCommand) -> bool) -> usize {
        self.commands.iter().filter(|cmd| pred(cmd)).count()
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Contents of the buffer currently bound to `target`.
    pub fn bound_contents(&self, target: BufferTarget) -> Option<&[u8]> {
        self.bound.get(&target).and_then(|id| self.buffer_contents(*id))
    }

    /// Forgets recorded commands; buffers and bindings are kept.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    fn bound_buffer_mut(&mut self, target: BufferTarget) -> Option<&mut Vec<u8>> {
        let id = self.bound.get(&target)?;
        self.buffers.get_mut(id)
    }
}

impl GpuCommands for RecordingGpu {
    fn create_buffer(&mut self) -> BufferId {
        self.next_buffer += 1;
        let id = BufferId::from_raw(self.next_buffer);
        self.buffers.insert(id, Vec::new());
        self.commands.push(GpuCommand::CreateBuffer(id));
        id
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId) {
        self.bound.insert(target, buffer);
        self.commands.push(GpuCommand::BindBuffer { target, buffer });
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        match self.bound_buffer_mut(target) {
            Some(buf) => {
                buf.clear();
                buf.extend_from_slice(data);
            }
            None => log::warn!("RecordingGpu: buffer_data with no buffer bound to {target:?}"),
        }
        self.commands.push(GpuCommand::BufferData { target, len: data.len(), usage });
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        match self.bound_buffer_mut(target) {
            Some(buf) if offset + data.len() <= buf.len() => {
                buf[offset..offset + data.len()].copy_from_slice(data);
            }
            Some(buf) => log::warn!(
                "RecordingGpu: buffer_sub_data {}..{} outside {} byte buffer",
                offset,
                offset + data.len(),
                buf.len()
            ),
            None => log::warn!("RecordingGpu: buffer_sub_data with no buffer bound to {target:?}"),
        }
        self.commands.push(GpuCommand::BufferSubData { target, offset, len: data.len() });
    }

    fn bind_texture(&mut self, texture: &TextureHandle) {
        self.commands.push(GpuCommand::BindTexture(texture.id()));
    }

    fn enable_vertex_attribute(&mut self, slot: u32) {
        self.commands.push(GpuCommand::EnableVertexAttribute(slot));
    }

    fn set_vertex_attribute_pointer(&mut self, slot: u32, attribute: VertexAttribute) {
        self.commands.push(GpuCommand::VertexAttributePointer { slot, attribute });
    }

    fn draw_elements(&mut self, mode: DrawMode, count: usize, index_type: IndexType, offset: usize) {
        self.commands.push(GpuCommand::DrawElements { mode, count, index_type, offset });
    }
}

impl GpuCommand {
    #[inline]
    pub fn is_draw(&self) -> bool {
        matches!(self, GpuCommand::DrawElements { .. })
    }

    #[inline]
    pub fn is_upload(&self) -> bool {
        matches!(self, GpuCommand::BufferData { .. } | GpuCommand::BufferSubData { .. })
    }
}
