use std::marker::PhantomData;

use super::format::{read_f32, write_f32};
use super::{Color4B, Tex2F, VertexFormat};

/// One vertex: position + color + texture coordinate.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct VertexData<F: VertexFormat> {
    pub position: F::Position,
    pub color: Color4B,
    pub tex_coords: Tex2F,
}

impl<F: VertexFormat> VertexData<F> {
    #[inline]
    pub fn new(position: F::Position, color: Color4B, tex_coords: Tex2F) -> Self {
        Self { position, color, tex_coords }
    }
}

/// Read-only typed accessor for the vertex at `offset` in a shared byte buffer.
///
/// The offset is checked once on construction; accessors then touch only the
/// bytes of their own field.
#[derive(Debug, Copy, Clone)]
pub struct GeometryView<'a, F: VertexFormat> {
    buffer: &'a [u8],
    offset: usize,
    _format: PhantomData<F>,
}

impl<'a, F: VertexFormat> GeometryView<'a, F> {
    /// # Panics
    /// Panics if `buffer` does not hold a full vertex at `offset`.
    pub fn new(buffer: &'a [u8], offset: usize) -> Self {
        check_bounds::<F>(buffer.len(), offset);
        Self { buffer, offset, _format: PhantomData }
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn position(&self) -> F::Position {
        F::read_position(self.buffer, self.offset)
    }

    #[inline]
    pub fn color(&self) -> Color4B {
        read_color::<F>(self.buffer, self.offset)
    }

    #[inline]
    pub fn tex_coords(&self) -> Tex2F {
        read_tex_coords::<F>(self.buffer, self.offset)
    }

    #[inline]
    pub fn get(&self) -> VertexData<F> {
        VertexData::new(self.position(), self.color(), self.tex_coords())
    }
}

/// Mutable typed accessor for the vertex at `offset` in a shared byte buffer.
///
/// Writes land in the buffer immediately; there is no staging copy.
#[derive(Debug)]
pub struct GeometryViewMut<'a, F: VertexFormat> {
    buffer: &'a mut [u8],
    offset: usize,
    _format: PhantomData<F>,
}

impl<'a, F: VertexFormat> GeometryViewMut<'a, F> {
    /// # Panics
    /// Panics if `buffer` does not hold a full vertex at `offset`.
    pub fn new(buffer: &'a mut [u8], offset: usize) -> Self {
        check_bounds::<F>(buffer.len(), offset);
        Self { buffer, offset, _format: PhantomData }
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn position(&self) -> F::Position {
        F::read_position(&*self.buffer, self.offset)
    }

    #[inline]
    pub fn set_position(&mut self, position: F::Position) {
        F::write_position(self.buffer, self.offset, position);
    }

    #[inline]
    pub fn color(&self) -> Color4B {
        read_color::<F>(&*self.buffer, self.offset)
    }

    #[inline]
    pub fn set_color(&mut self, color: Color4B) {
        let at = self.offset + F::COLOR_OFFSET;
        self.buffer[at..at + 4].copy_from_slice(&color.to_array());
    }

    #[inline]
    pub fn tex_coords(&self) -> Tex2F {
        read_tex_coords::<F>(&*self.buffer, self.offset)
    }

    #[inline]
    pub fn set_tex_coords(&mut self, tex_coords: Tex2F) {
        let at = self.offset + F::TEX_COORDS_OFFSET;
        write_f32(self.buffer, at, tex_coords.u);
        write_f32(self.buffer, at + 4, tex_coords.v);
    }

    #[inline]
    pub fn get(&self) -> VertexData<F> {
        VertexData::new(self.position(), self.color(), self.tex_coords())
    }

    #[inline]
    pub fn set(&mut self, vertex: VertexData<F>) {
        self.set_position(vertex.position);
        self.set_color(vertex.color);
        self.set_tex_coords(vertex.tex_coords);
    }

    /// Reborrows as a read-only view.
    #[inline]
    pub fn as_view(&self) -> GeometryView<'_, F> {
        GeometryView { buffer: &*self.buffer, offset: self.offset, _format: PhantomData }
    }
}

#[inline]
fn check_bounds<F: VertexFormat>(len: usize, offset: usize) {
    assert!(
        offset.checked_add(F::STRIDE).is_some_and(|end| end <= len),
        "{} vertex at offset {offset} does not fit in a {len}-byte buffer",
        F::NAME,
    );
}

#[inline]
fn read_color<F: VertexFormat>(buffer: &[u8], offset: usize) -> Color4B {
    let at = offset + F::COLOR_OFFSET;
    Color4B::new(buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3])
}

#[inline]
fn read_tex_coords<F: VertexFormat>(buffer: &[u8], offset: usize) -> Tex2F {
    let at = offset + F::TEX_COORDS_OFFSET;
    Tex2F::new(read_f32(buffer, at), read_f32(buffer, at + 4))
}
