use crate::arena::IndexMode;

/// How a dirty atlas sends vertex data to the GPU.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum UploadMode {
    /// Re-send the whole arena on every change.
    #[default]
    WholeBuffer,
    /// Send only the coalesced byte range that changed.
    DirtyRange,
}

/// Construction parameters for a [`TextureAtlas`](super::TextureAtlas).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Quad slots allocated up front.
    pub initial_capacity: usize,

    pub index_mode: IndexMode,

    pub upload_mode: UploadMode,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 29,
            index_mode: IndexMode::TriangleList,
            upload_mode: UploadMode::WholeBuffer,
        }
    }
}
