//! Quad geometry over packed byte buffers.
//!
//! Vertex data is never stored as Rust structs on the GPU path. Every vertex
//! lives in a little-endian byte buffer at `index * stride + field_offset`, and
//! the types here are typed windows onto those bytes:
//!
//! - [`GeometryView`] / [`GeometryViewMut`]: one vertex
//! - [`Quad`]: four vertices (standalone, or bound into a buffer)
//! - [`Triangle`]: three vertices
//!
//! Plain values ([`VertexData`], [`QuadValue`]) are detached copies used for
//! passing geometry around without aliasing a buffer.

mod format;
mod quad;
mod types;
mod view;

pub use format::{V2fC4bT2f, V3fC4bT2f, VertexFormat};
pub use quad::{Corner, Quad, QuadValue, QuadView, QuadViewMut, Triangle};
pub use types::{Color4B, Tex2F, Vertex2F, Vertex3F};
pub use view::{GeometryView, GeometryViewMut, VertexData};
