//! Texture handles, image loading and the deduplicating texture cache.

mod cache;
mod handle;
mod loader;

pub use cache::TextureCache;
pub use handle::{ImageData, LoadState, TextureHandle, TextureId};
pub use loader::{FileImageLoader, ImageLoader};
