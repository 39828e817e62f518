use super::GpuCommands;

/// Per-frame draw counters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: u64,
    pub quads_drawn: u64,
}

impl RenderStats {
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// What a draw needs: a command sink and the counters to bump.
pub struct DrawCtx<'a> {
    pub gpu: &'a mut dyn GpuCommands,
    pub stats: &'a mut RenderStats,
}

impl<'a> DrawCtx<'a> {
    #[inline]
    pub fn new(gpu: &'a mut dyn GpuCommands, stats: &'a mut RenderStats) -> Self {
        Self { gpu, stats }
    }
}

/// Viewport size in logical pixels.
///
/// The sprite shader maps `[0, width] × [0, height]` onto NDC with this.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

/// Target for drawing (encoder + color view).
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(encoder: &'a mut wgpu::CommandEncoder, color_view: &'a wgpu::TextureView) -> Self {
        Self { encoder, color_view }
    }
}
