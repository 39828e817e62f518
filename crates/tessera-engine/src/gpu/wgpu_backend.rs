use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use super::{
    AttributeType, BufferId, BufferTarget, BufferUsage, DrawMode, GpuCommands, IndexType,
    RenderTarget, VertexAttribute, Viewport,
};
use crate::texture::{TextureHandle, TextureId};

const ATTRIBUTE_SLOTS: usize = 3;
const WRITE_ALIGN: usize = wgpu::COPY_BUFFER_ALIGNMENT as usize;

/// wgpu implementation of [`GpuCommands`].
///
/// Buffer and texture commands take effect immediately through the queue.
/// `draw_elements` only records the draw; [`encode`](Self::encode) replays every
/// recorded draw, in order, in one render pass over the target.
///
/// Queue writes land before any command buffer submitted after them, so a
/// buffer rewritten between two draws of the same frame shows its last
/// contents in both. Such writes are logged and counted by
/// [`late_writes`](Self::late_writes); call `encode` between the draws to keep
/// both states.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,

    shader: Option<wgpu::ShaderModule>,
    texture_bgl: Option<wgpu::BindGroupLayout>,
    pipeline_layout: Option<wgpu::PipelineLayout>,
    sampler: Option<wgpu::Sampler>,
    viewport_ubo: Option<wgpu::Buffer>,
    viewport_bind_group: Option<wgpu::BindGroup>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    buffers: Vec<GpuBuffer>,
    bound_vertex: Option<BufferId>,
    bound_index: Option<BufferId>,
    textures: HashMap<TextureId, GpuTexture>,
    bound_texture: Option<TextureId>,
    enabled: [bool; ATTRIBUTE_SLOTS],
    attributes: [Option<VertexAttribute>; ATTRIBUTE_SLOTS],

    pending: Vec<PendingDraw>,
    late_writes: usize,
}

#[derive(Default)]
struct GpuBuffer {
    /// CPU copy, so unaligned sub-range writes can be widened to 4 bytes.
    shadow: Vec<u8>,
    buffer: Option<wgpu::Buffer>,
    capacity: usize,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    attributes: [VertexAttribute; ATTRIBUTE_SLOTS],
    mode: DrawMode,
    format: wgpu::TextureFormat,
}

#[derive(Debug, Copy, Clone)]
struct PendingDraw {
    key: PipelineKey,
    vertex: BufferId,
    index: BufferId,
    texture: TextureId,
    first_index: u32,
    index_count: u32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ViewportUniform {
    viewport: [f32; 2],
    _pad: [f32; 2], // 16-byte alignment
}

impl WgpuBackend {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, target_format: wgpu::TextureFormat) -> Self {
        Self {
            device: device.clone(),
            queue: queue.clone(),
            target_format,
            shader: None,
            texture_bgl: None,
            pipeline_layout: None,
            sampler: None,
            viewport_ubo: None,
            viewport_bind_group: None,
            pipelines: HashMap::new(),
            buffers: Vec::new(),
            bound_vertex: None,
            bound_index: None,
            textures: HashMap::new(),
            bound_texture: None,
            enabled: [false; ATTRIBUTE_SLOTS],
            attributes: [None; ATTRIBUTE_SLOTS],
            pending: Vec::new(),
            late_writes: 0,
        }
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    /// Switches the color target format. Pipelines for other formats stay cached.
    pub fn set_target_format(&mut self, format: wgpu::TextureFormat) {
        self.target_format = format;
    }

    /// Draws recorded since the last [`encode`](Self::encode).
    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    /// Uploads since the last [`encode`](Self::encode) into a buffer that a
    /// recorded draw already reads.
    pub fn late_writes(&self) -> usize {
        self.late_writes
    }

    /// Number of textures resident on the GPU.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Drops the GPU copy of a texture; the next bind uploads it again.
    pub fn evict_texture(&mut self, id: TextureId) -> bool {
        if self.bound_texture == Some(id) {
            self.bound_texture = None;
        }
        self.textures.remove(&id).is_some()
    }

    /// Replays recorded draws into `target` and clears the recording.
    ///
    /// Returns the number of draws encoded. Draws whose buffers or texture
    /// have disappeared are skipped.
    pub fn encode(&mut self, target: &mut RenderTarget<'_>, viewport: Viewport) -> usize {
        self.late_writes = 0;
        if self.pending.is_empty() {
            return 0;
        }
        if !viewport.is_valid() {
            log::warn!("WgpuBackend: invalid viewport {viewport:?}; dropping {} draws", self.pending.len());
            self.pending.clear();
            return 0;
        }

        self.ensure_shared();
        let draws = std::mem::take(&mut self.pending);
        for draw in &draws {
            self.ensure_pipeline(draw.key);
        }
        self.write_viewport_uniform(viewport);

        let Some(viewport_bind_group) = self.viewport_bind_group.as_ref() else { return 0 };

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tessera sprite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        rpass.set_bind_group(0, viewport_bind_group, &[]);

        let mut encoded = 0;
        for draw in &draws {
            let Some(pipeline) = self.pipelines.get(&draw.key) else { continue };
            let Some(texture) = self.textures.get(&draw.texture) else { continue };
            let Some(vbo) = self.gpu_buffer(draw.vertex) else { continue };
            let Some(ibo) = self.gpu_buffer(draw.index) else { continue };

            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(1, &texture.bind_group, &[]);
            rpass.set_vertex_buffer(0, vbo.slice(..));
            rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint16);
            rpass.draw_indexed(draw.first_index..draw.first_index + draw.index_count, 0, 0..1);
            encoded += 1;
        }
        drop(rpass);

        log::trace!("WgpuBackend: encoded {encoded}/{} draws", draws.len());
        encoded
    }

    fn gpu_buffer(&self, id: BufferId) -> Option<&wgpu::Buffer> {
        self.buffers.get(id.raw() as usize)?.buffer.as_ref()
    }

    fn bound(&self, target: BufferTarget) -> Option<BufferId> {
        match target {
            BufferTarget::Array => self.bound_vertex,
            BufferTarget::ElementArray => self.bound_index,
        }
    }

    fn note_write(&mut self, target: BufferTarget) {
        let Some(id) = self.bound(target) else { return };
        let readers = self.pending.iter().filter(|d| d.vertex == id || d.index == id).count();
        if readers > 0 {
            self.late_writes += 1;
            log::warn!(
                "WgpuBackend: {id:?} rewritten while {readers} recorded draw(s) read it; \
                 they will all see the new contents"
            );
        }
    }

    fn bound_slot(&mut self, target: BufferTarget) -> Option<&mut GpuBuffer> {
        let id = self.bound(target)?;
        self.buffers.get_mut(id.raw() as usize)
    }

    /// Writes `shadow[start..end]` widened to the copy alignment, reallocating
    /// the GPU buffer first when it is too small.
    fn flush_span(&mut self, target: BufferTarget, start: usize, end: usize) {
        let device = self.device.clone();
        let queue = self.queue.clone();
        let Some(slot) = self.bound_slot(target) else { return };

        let padded_len = slot.shadow.len().next_multiple_of(WRITE_ALIGN);
        if padded_len == 0 {
            return;
        }

        let (start, end) = if slot.buffer.is_none() || padded_len > slot.capacity {
            let capacity = padded_len.next_power_of_two().max(256);
            slot.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("tessera buffer"),
                size: capacity as u64,
                usage: wgpu::BufferUsages::VERTEX
                    | wgpu::BufferUsages::INDEX
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            slot.capacity = capacity;
            log::debug!("WgpuBackend: allocated {capacity} byte {target:?} buffer");
            (0, padded_len)
        } else {
            (start - start % WRITE_ALIGN, end.next_multiple_of(WRITE_ALIGN).min(padded_len))
        };

        let Some(buffer) = slot.buffer.as_ref() else { return };
        if end <= slot.shadow.len() {
            queue.write_buffer(buffer, start as u64, &slot.shadow[start..end]);
        } else {
            let mut tail = slot.shadow[start..].to_vec();
            tail.resize(end - start, 0);
            queue.write_buffer(buffer, start as u64, &tail);
        }
    }

    fn upload_texture(&mut self, handle: &TextureHandle) -> bool {
        let Some(image) = handle.image() else { return false };
        if image.width == 0 || image.height == 0 {
            log::warn!("WgpuBackend: {} has zero size; not uploaded", handle.key());
            return false;
        }
        let expected = image.width as usize * image.height as usize * 4;
        if image.rgba.len() != expected {
            log::warn!(
                "WgpuBackend: {} has {} bytes, expected {expected}; not uploaded",
                handle.key(),
                image.rgba.len()
            );
            return false;
        }

        self.ensure_shared();
        let (Some(bgl), Some(sampler)) = (self.texture_bgl.as_ref(), self.sampler.as_ref()) else {
            return false;
        };

        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tessera sprite texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(image.width * 4),
                rows_per_image: Some(image.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tessera sprite texture bind group"),
            layout: bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        log::debug!("WgpuBackend: uploaded {} ({}x{})", handle.key(), image.width, image.height);
        self.textures.insert(handle.id(), GpuTexture { _texture: texture, bind_group });
        true
    }

    /// Pipeline key for the current attribute state, if the shader can consume it.
    fn current_key(&self, mode: DrawMode) -> Option<PipelineKey> {
        let mut attributes = [None; ATTRIBUTE_SLOTS];
        for (slot, attr) in attributes.iter_mut().enumerate() {
            if self.enabled[slot] {
                *attr = self.attributes[slot];
            }
        }
        let [Some(position), Some(color), Some(uv)] = attributes else { return None };

        let position_ok = position.ty == AttributeType::Float && matches!(position.components, 2 | 3);
        let color_ok = color.ty == AttributeType::UnsignedByte && color.components == 4 && color.normalized;
        let uv_ok = uv.ty == AttributeType::Float && uv.components == 2;
        let stride_ok = position.stride == color.stride && color.stride == uv.stride;
        if !(position_ok && color_ok && uv_ok && stride_ok) {
            return None;
        }

        Some(PipelineKey {
            attributes: [position, color, uv],
            mode,
            format: self.target_format,
        })
    }

    // ── lazy-init helpers ──────────────────────────────────────────────────

    fn ensure_shared(&mut self) {
        if self.pipeline_layout.is_some() && self.viewport_bind_group.is_some() {
            return;
        }

        let shader = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tessera sprite shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/sprite.wgsl").into()),
        });

        let viewport_bgl = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tessera viewport bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ViewportUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let texture_bgl = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tessera texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tessera sprite pipeline layout"),
            bind_group_layouts: &[&viewport_bgl, &texture_bgl],
            immediate_size: 0,
        });

        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("tessera sprite sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let viewport_ubo = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tessera viewport ubo"),
            size: std::mem::size_of::<ViewportUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let viewport_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tessera viewport bind group"),
            layout: &viewport_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_ubo.as_entire_binding(),
            }],
        });

        self.shader = Some(shader);
        self.texture_bgl = Some(texture_bgl);
        self.pipeline_layout = Some(pipeline_layout);
        self.sampler = Some(sampler);
        self.viewport_ubo = Some(viewport_ubo);
        self.viewport_bind_group = Some(viewport_bind_group);
        self.pipelines.clear();
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        let (Some(shader), Some(layout)) = (self.shader.as_ref(), self.pipeline_layout.as_ref()) else {
            return;
        };

        let [position, color, uv] = key.attributes;
        let position_format = if position.components == 3 {
            wgpu::VertexFormat::Float32x3
        } else {
            wgpu::VertexFormat::Float32x2
        };
        let entry_point = if position.components == 3 { "vs_main_3d" } else { "vs_main_2d" };
        let attributes = [
            wgpu::VertexAttribute {
                format: position_format,
                offset: u64::from(position.offset),
                shader_location: 0,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Unorm8x4,
                offset: u64::from(color.offset),
                shader_location: 1,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: u64::from(uv.offset),
                shader_location: 2,
            },
        ];
        let (topology, strip_index_format) = match key.mode {
            DrawMode::Triangles => (wgpu::PrimitiveTopology::TriangleList, None),
            DrawMode::TriangleStrip => {
                (wgpu::PrimitiveTopology::TriangleStrip, Some(wgpu::IndexFormat::Uint16))
            }
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("tessera sprite pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: u64::from(position.stride),
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: Some(premul_alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!("WgpuBackend: built pipeline for {key:?}");
        self.pipelines.insert(key, pipeline);
    }

    fn write_viewport_uniform(&mut self, viewport: Viewport) {
        let Some(ubo) = self.viewport_ubo.as_ref() else { return };
        let u = ViewportUniform {
            viewport: [viewport.width.max(1.0), viewport.height.max(1.0)],
            _pad: [0.0; 2],
        };
        self.queue.write_buffer(ubo, 0, bytemuck::bytes_of(&u));
    }
}

impl GpuCommands for WgpuBackend {
    fn create_buffer(&mut self) -> BufferId {
        self.buffers.push(GpuBuffer::default());
        BufferId::from_raw((self.buffers.len() - 1) as u32)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId) {
        if buffer.raw() as usize >= self.buffers.len() {
            log::warn!("WgpuBackend: bind of unknown buffer {buffer:?}");
            return;
        }
        match target {
            BufferTarget::Array => self.bound_vertex = Some(buffer),
            BufferTarget::ElementArray => self.bound_index = Some(buffer),
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], _usage: BufferUsage) {
        self.note_write(target);
        let Some(slot) = self.bound_slot(target) else {
            log::warn!("WgpuBackend: buffer_data with no buffer bound to {target:?}");
            return;
        };
        slot.shadow.clear();
        slot.shadow.extend_from_slice(data);
        self.flush_span(target, 0, data.len());
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        let Some(slot) = self.bound_slot(target) else {
            log::warn!("WgpuBackend: buffer_sub_data with no buffer bound to {target:?}");
            return;
        };
        let end = offset + data.len();
        if end > slot.shadow.len() {
            log::warn!(
                "WgpuBackend: buffer_sub_data {offset}..{end} outside {} byte buffer",
                slot.shadow.len()
            );
            return;
        }
        slot.shadow[offset..end].copy_from_slice(data);
        self.note_write(target);
        self.flush_span(target, offset, end);
    }

    fn bind_texture(&mut self, texture: &TextureHandle) {
        let id = texture.id();
        if self.textures.contains_key(&id) || self.upload_texture(texture) {
            self.bound_texture = Some(id);
        } else {
            log::trace!("WgpuBackend: {} not ready; unbinding", texture.key());
            self.bound_texture = None;
        }
    }

    fn enable_vertex_attribute(&mut self, slot: u32) {
        match self.enabled.get_mut(slot as usize) {
            Some(enabled) => *enabled = true,
            None => log::warn!("WgpuBackend: attribute slot {slot} unsupported"),
        }
    }

    fn set_vertex_attribute_pointer(&mut self, slot: u32, attribute: VertexAttribute) {
        match self.attributes.get_mut(slot as usize) {
            Some(attr) => *attr = Some(attribute),
            None => log::warn!("WgpuBackend: attribute slot {slot} unsupported"),
        }
    }

    fn draw_elements(&mut self, mode: DrawMode, count: usize, index_type: IndexType, offset: usize) {
        if count == 0 {
            return;
        }
        let (Some(vertex), Some(index), Some(texture)) =
            (self.bound_vertex, self.bound_index, self.bound_texture)
        else {
            log::warn!("WgpuBackend: draw_elements without vertex/index buffer or texture bound");
            return;
        };
        let Some(key) = self.current_key(mode) else {
            log::warn!("WgpuBackend: vertex attributes do not match the sprite shader; draw skipped");
            return;
        };

        let index_size = index_type.size_in_bytes();
        let index_bytes = self.buffers.get(index.raw() as usize).map_or(0, |b| b.shadow.len());
        if offset % index_size != 0 || offset + count * index_size > index_bytes {
            log::warn!(
                "WgpuBackend: draw of {count} indices at byte {offset} exceeds {index_bytes} byte index buffer"
            );
            return;
        }

        self.pending.push(PendingDraw {
            key,
            vertex,
            index,
            texture,
            first_index: (offset / index_size) as u32,
            index_count: count as u32,
        });
    }
}

fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}
