//! Tessera engine crate.
//!
//! Packed quad storage and texture-atlas batching for 2D sprite rendering:
//! - `geometry`: vertex layouts and typed views over raw vertex bytes
//! - `arena`: growable quad storage with index generation and dirty tracking
//! - `atlas`: one texture + one arena, drawn with a single indexed call
//! - `texture`: shared texture handles and the deduplicating texture cache
//! - `gpu`: the command interface the atlas draws through, plus backends

pub mod arena;
pub mod atlas;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod logging;
pub mod texture;

pub use arena::{IndexMode, QuadArena};
pub use atlas::{AtlasConfig, TextureAtlas, UploadMode};
pub use error::{ArenaError, LoadError};
pub use texture::{TextureCache, TextureHandle};
