use anyhow::{Context, Result};

use super::{RenderTarget, Viewport};

/// Initialization parameters for an offscreen GPU context.
#[derive(Debug, Clone)]
pub struct HeadlessInit {
    /// Render target size in pixels; also the logical viewport.
    pub width: u32,
    pub height: u32,

    /// Color format of the render target.
    pub format: wgpu::TextureFormat,

    /// Accept a software adapter. Useful on CI machines without a GPU.
    pub force_fallback_adapter: bool,

    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,
}

impl Default for HeadlessInit {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            format: wgpu::TextureFormat::Rgba8Unorm,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
        }
    }
}

/// Device, queue and an offscreen color target.
///
/// Stands in for a windowed surface when rendering without a display: tools,
/// thumbnails, tests.
pub struct HeadlessGpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

impl HeadlessGpu {
    /// Creates the device and target. Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(init: HeadlessInit) -> Result<Self> {
        anyhow::ensure!(init.width > 0 && init.height > 0, "render target has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: init.force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("tessera headless device"),
                required_features: init.required_features,
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tessera headless target"),
            size: wgpu::Extent3d {
                width: init.width,
                height: init.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: init.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());

        log::info!(
            "headless gpu: {} ({:?}), {}x{} {:?}",
            adapter.get_info().name,
            adapter.get_info().backend,
            init.width,
            init.height,
            init.format
        );

        Ok(Self {
            device,
            queue,
            target,
            view,
            format: init.format,
            width: init.width,
            height: init.height,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// One logical pixel per target pixel.
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width as f32, self.height as f32)
    }

    pub fn create_encoder(&self) -> wgpu::CommandEncoder {
        self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tessera headless encoder"),
        })
    }

    pub fn target<'a>(&'a self, encoder: &'a mut wgpu::CommandEncoder) -> RenderTarget<'a> {
        RenderTarget::new(encoder, &self.view)
    }

    /// Records a pass that clears the target to `color`.
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder, color: wgpu::Color) {
        let _ = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tessera clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Copies the target back to the CPU as tightly packed rows of 4-byte texels.
    pub fn read_pixels(&self) -> Result<Vec<u8>> {
        anyhow::ensure!(
            self.format.block_copy_size(None) == Some(4),
            "read_pixels needs a 4-byte texel format, target is {:?}",
            self.format
        );

        let unpadded_row = self.width * 4;
        let padded_row = unpadded_row.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tessera readback"),
            size: u64::from(padded_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.create_encoder();
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d { width: self.width, height: self.height, depth_or_array_layers: 1 },
        );
        self.submit(encoder);

        // Map first, then poll; the callback only fires from poll.
        let slice = readback.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
            .context("device poll failed during readback")?;
        pollster::block_on(rx)
            .context("readback callback dropped")?
            .context("failed to map readback buffer")?;

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_row * self.height) as usize);
        for row in mapped.chunks_exact(padded_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_row as usize]);
        }
        drop(mapped);
        readback.unmap();
        Ok(pixels)
    }
}
