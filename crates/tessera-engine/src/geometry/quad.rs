use std::marker::PhantomData;

use super::{
    Color4B, GeometryView, GeometryViewMut, Tex2F, V2fC4bT2f, V3fC4bT2f, Vertex2F, Vertex3F,
    VertexData, VertexFormat,
};

/// Quad corner, in storage order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft = 0,
    BottomLeft = 1,
    TopRight = 2,
    BottomRight = 3,
}

impl Corner {
    pub const ALL: [Corner; 4] =
        [Corner::TopLeft, Corner::BottomLeft, Corner::TopRight, Corner::BottomRight];

    /// Vertex index of this corner inside its quad.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Detached quad value. Holds no reference to any buffer.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct QuadValue<F: VertexFormat> {
    pub tl: VertexData<F>,
    pub bl: VertexData<F>,
    pub tr: VertexData<F>,
    pub br: VertexData<F>,
}

impl<F: VertexFormat> QuadValue<F> {
    #[inline]
    pub fn corner(&self, corner: Corner) -> VertexData<F> {
        match corner {
            Corner::TopLeft => self.tl,
            Corner::BottomLeft => self.bl,
            Corner::TopRight => self.tr,
            Corner::BottomRight => self.br,
        }
    }

    #[inline]
    pub fn set_corner(&mut self, corner: Corner, vertex: VertexData<F>) {
        match corner {
            Corner::TopLeft => self.tl = vertex,
            Corner::BottomLeft => self.bl = vertex,
            Corner::TopRight => self.tr = vertex,
            Corner::BottomRight => self.br = vertex,
        }
    }

    /// Returns the same quad with every corner tinted `color`.
    #[must_use]
    pub fn with_color(mut self, color: Color4B) -> Self {
        self.tl.color = color;
        self.bl.color = color;
        self.tr.color = color;
        self.br.color = color;
        self
    }
}

impl QuadValue<V2fC4bT2f> {
    /// Axis-aligned sprite spanning `min..max` (top-left origin, +Y down),
    /// textured with `uv_min..uv_max`.
    pub fn sprite(min: Vertex2F, max: Vertex2F, uv_min: Tex2F, uv_max: Tex2F, color: Color4B) -> Self {
        let v = |x, y, u, w| VertexData::new(Vertex2F::new(x, y), color, Tex2F::new(u, w));
        Self {
            tl: v(min.x, min.y, uv_min.u, uv_min.v),
            bl: v(min.x, max.y, uv_min.u, uv_max.v),
            tr: v(max.x, min.y, uv_max.u, uv_min.v),
            br: v(max.x, max.y, uv_max.u, uv_max.v),
        }
    }
}

impl QuadValue<V3fC4bT2f> {
    /// Like the 2D `sprite`, with every corner at depth `z`.
    pub fn sprite(
        min: Vertex2F,
        max: Vertex2F,
        z: f32,
        uv_min: Tex2F,
        uv_max: Tex2F,
        color: Color4B,
    ) -> Self {
        let v = |x, y, u, w| VertexData::new(Vertex3F::new(x, y, z), color, Tex2F::new(u, w));
        Self {
            tl: v(min.x, min.y, uv_min.u, uv_min.v),
            bl: v(min.x, max.y, uv_min.u, uv_max.v),
            tr: v(max.x, min.y, uv_max.u, uv_min.v),
            br: v(max.x, max.y, uv_max.u, uv_max.v),
        }
    }
}

/// Four vertices stored contiguously at `F::STRIDE`.
///
/// `B` decides ownership:
/// - `Vec<u8>`: standalone quad owning its bytes (`Quad::new`)
/// - `&[u8]` / `&mut [u8]`: view bound into someone else's buffer, e.g. an
///   arena slot (see [`QuadView`] / [`QuadViewMut`])
///
/// Corner `c` starts at byte `c * F::STRIDE`.
#[derive(Debug, Clone)]
pub struct Quad<F: VertexFormat, B = Vec<u8>> {
    bytes: B,
    _format: PhantomData<F>,
}

/// Read-only quad bound into a shared buffer.
pub type QuadView<'a, F> = Quad<F, &'a [u8]>;

/// Mutable quad bound into a shared buffer.
pub type QuadViewMut<'a, F> = Quad<F, &'a mut [u8]>;

impl<F: VertexFormat> Quad<F> {
    /// Allocates a zeroed standalone quad.
    pub fn new() -> Self {
        Self { bytes: vec![0; F::QUAD_BYTES], _format: PhantomData }
    }

    pub fn from_value(value: &QuadValue<F>) -> Self {
        let mut quad = Self::new();
        quad.set(value);
        quad
    }
}

impl<F: VertexFormat> Default for Quad<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, F: VertexFormat> Quad<F, &'a [u8]> {
    /// Binds a read-only quad at `offset` in `buffer`.
    ///
    /// # Panics
    /// Panics if the buffer is too short.
    pub fn bind(buffer: &'a [u8], offset: usize) -> Self {
        Self { bytes: &buffer[offset..offset + F::QUAD_BYTES], _format: PhantomData }
    }
}

impl<'a, F: VertexFormat> Quad<F, &'a mut [u8]> {
    /// Binds a mutable quad at `offset` in `buffer`.
    ///
    /// # Panics
    /// Panics if the buffer is too short.
    pub fn bind_mut(buffer: &'a mut [u8], offset: usize) -> Self {
        Self { bytes: &mut buffer[offset..offset + F::QUAD_BYTES], _format: PhantomData }
    }
}

impl<F: VertexFormat, B: AsRef<[u8]>> Quad<F, B> {
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.bytes.as_ref().len()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }

    #[inline]
    pub fn corner(&self, corner: Corner) -> GeometryView<'_, F> {
        GeometryView::new(self.bytes.as_ref(), corner.index() * F::STRIDE)
    }

    pub fn top_left(&self) -> VertexData<F> {
        self.corner(Corner::TopLeft).get()
    }

    pub fn bottom_left(&self) -> VertexData<F> {
        self.corner(Corner::BottomLeft).get()
    }

    pub fn top_right(&self) -> VertexData<F> {
        self.corner(Corner::TopRight).get()
    }

    pub fn bottom_right(&self) -> VertexData<F> {
        self.corner(Corner::BottomRight).get()
    }

    /// Copies the quad out into a detached value.
    pub fn copy(&self) -> QuadValue<F> {
        QuadValue {
            tl: self.top_left(),
            bl: self.bottom_left(),
            tr: self.top_right(),
            br: self.bottom_right(),
        }
    }
}

impl<F: VertexFormat, B: AsRef<[u8]> + AsMut<[u8]>> Quad<F, B> {
    #[inline]
    pub fn corner_mut(&mut self, corner: Corner) -> GeometryViewMut<'_, F> {
        GeometryViewMut::new(self.bytes.as_mut(), corner.index() * F::STRIDE)
    }

    pub fn set_top_left(&mut self, v: VertexData<F>) {
        self.corner_mut(Corner::TopLeft).set(v);
    }

    pub fn set_bottom_left(&mut self, v: VertexData<F>) {
        self.corner_mut(Corner::BottomLeft).set(v);
    }

    pub fn set_top_right(&mut self, v: VertexData<F>) {
        self.corner_mut(Corner::TopRight).set(v);
    }

    pub fn set_bottom_right(&mut self, v: VertexData<F>) {
        self.corner_mut(Corner::BottomRight).set(v);
    }

    /// Overwrites all four corners.
    pub fn set(&mut self, value: &QuadValue<F>) {
        for corner in Corner::ALL {
            self.corner_mut(corner).set(value.corner(corner));
        }
    }
}

/// Three vertices stored contiguously at `F::STRIDE`.
#[derive(Debug, Clone)]
pub struct Triangle<F: VertexFormat, B = Vec<u8>> {
    bytes: B,
    _format: PhantomData<F>,
}

impl<F: VertexFormat> Triangle<F> {
    pub const BYTES: usize = F::STRIDE * 3;

    pub fn new() -> Self {
        Self { bytes: vec![0; Self::BYTES], _format: PhantomData }
    }

    pub fn from_vertices(vertices: [VertexData<F>; 3]) -> Self {
        let mut tri = Self::new();
        for (i, v) in vertices.into_iter().enumerate() {
            tri.vertex_mut(i).set(v);
        }
        tri
    }
}

impl<F: VertexFormat> Default for Triangle<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, F: VertexFormat> Triangle<F, &'a mut [u8]> {
    /// # Panics
    /// Panics if the buffer is too short.
    pub fn bind_mut(buffer: &'a mut [u8], offset: usize) -> Self {
        Self { bytes: &mut buffer[offset..offset + F::STRIDE * 3], _format: PhantomData }
    }
}

impl<F: VertexFormat, B: AsRef<[u8]>> Triangle<F, B> {
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.bytes.as_ref().len()
    }

    /// # Panics
    /// Panics if `index > 2`.
    #[inline]
    pub fn vertex(&self, index: usize) -> GeometryView<'_, F> {
        assert!(index < 3, "triangle vertex index {index} out of range");
        GeometryView::new(self.bytes.as_ref(), index * F::STRIDE)
    }

    pub fn a(&self) -> VertexData<F> {
        self.vertex(0).get()
    }

    pub fn b(&self) -> VertexData<F> {
        self.vertex(1).get()
    }

    pub fn c(&self) -> VertexData<F> {
        self.vertex(2).get()
    }

    pub fn copy(&self) -> [VertexData<F>; 3] {
        [self.a(), self.b(), self.c()]
    }
}

impl<F: VertexFormat, B: AsRef<[u8]> + AsMut<[u8]>> Triangle<F, B> {
    /// # Panics
    /// Panics if `index > 2`.
    #[inline]
    pub fn vertex_mut(&mut self, index: usize) -> GeometryViewMut<'_, F> {
        assert!(index < 3, "triangle vertex index {index} out of range");
        GeometryViewMut::new(self.bytes.as_mut(), index * F::STRIDE)
    }

    pub fn set_a(&mut self, v: VertexData<F>) {
        self.vertex_mut(0).set(v);
    }

    pub fn set_b(&mut self, v: VertexData<F>) {
        self.vertex_mut(1).set(v);
    }

    pub fn set_c(&mut self, v: VertexData<F>) {
        self.vertex_mut(2).set(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_sprite() -> QuadValue<V3fC4bT2f> {
        QuadValue::<V3fC4bT2f>::sprite(
            Vertex2F::new(0.0, 0.0),
            Vertex2F::new(10.0, 10.0),
            0.0,
            Tex2F::new(0.0, 0.0),
            Tex2F::new(1.0, 1.0),
            Color4B::WHITE,
        )
    }

    // ── sizes ─────────────────────────────────────────────────────────────

    #[test]
    fn quad_sizes() {
        assert_eq!(Quad::<V3fC4bT2f>::new().size_in_bytes(), 96);
        assert_eq!(Quad::<V2fC4bT2f>::new().size_in_bytes(), 80);
        assert_eq!(Quad::from_value(&white_sprite()).size_in_bytes(), 96);
    }

    #[test]
    fn triangle_size() {
        assert_eq!(Triangle::<V2fC4bT2f>::new().size_in_bytes(), 60);
        assert_eq!(Triangle::<V2fC4bT2f>::BYTES, 60);
    }

    // ── corners ───────────────────────────────────────────────────────────

    #[test]
    fn sprite_corners_follow_screen_axes() {
        let q = white_sprite();
        assert_eq!(q.tl.position, Vertex3F::new(0.0, 0.0, 0.0));
        assert_eq!(q.bl.position, Vertex3F::new(0.0, 10.0, 0.0));
        assert_eq!(q.tr.position, Vertex3F::new(10.0, 0.0, 0.0));
        assert_eq!(q.br.position, Vertex3F::new(10.0, 10.0, 0.0));
        assert_eq!(q.br.tex_coords, Tex2F::new(1.0, 1.0));
    }

    #[test]
    fn corners_are_stored_in_order() {
        let quad = Quad::from_value(&white_sprite());
        let stride = V3fC4bT2f::STRIDE;
        // x of the top-right corner (third vertex).
        let x = f32::from_le_bytes([
            quad.as_bytes()[2 * stride],
            quad.as_bytes()[2 * stride + 1],
            quad.as_bytes()[2 * stride + 2],
            quad.as_bytes()[2 * stride + 3],
        ]);
        assert_eq!(x, 10.0);
    }

    #[test]
    fn corner_setters_round_trip() {
        let mut quad = Quad::<V2fC4bT2f>::new();
        let v = VertexData::new(Vertex2F::new(5.0, 6.0), Color4B::new(1, 2, 3, 4), Tex2F::new(0.5, 0.5));
        quad.set_bottom_right(v);
        assert_eq!(quad.bottom_right(), v);
        assert_eq!(quad.top_left(), VertexData::default());
    }

    // ── copy / binding ────────────────────────────────────────────────────

    #[test]
    fn copy_is_detached_from_buffer() {
        let mut quad = Quad::from_value(&white_sprite());
        let snapshot = quad.copy();
        quad.set_top_left(VertexData::default());
        assert_eq!(snapshot, white_sprite());
        assert_ne!(quad.copy(), snapshot);
    }

    #[test]
    fn bound_quad_writes_into_host_buffer() {
        let mut host = vec![0u8; V2fC4bT2f::QUAD_BYTES * 2];
        let value = QuadValue::<V2fC4bT2f>::sprite(
            Vertex2F::new(1.0, 2.0),
            Vertex2F::new(3.0, 4.0),
            Tex2F::new(0.0, 0.0),
            Tex2F::new(1.0, 1.0),
            Color4B::BLACK,
        );
        QuadViewMut::<V2fC4bT2f>::bind_mut(&mut host, V2fC4bT2f::QUAD_BYTES).set(&value);

        assert!(host[..V2fC4bT2f::QUAD_BYTES].iter().all(|&b| b == 0));
        assert_eq!(QuadView::<V2fC4bT2f>::bind(&host, V2fC4bT2f::QUAD_BYTES).copy(), value);
    }

    #[test]
    fn with_color_tints_every_corner() {
        let q = white_sprite().with_color(Color4B::new(9, 9, 9, 9));
        for c in Corner::ALL {
            assert_eq!(q.corner(c).color, Color4B::new(9, 9, 9, 9));
        }
    }

    #[test]
    fn triangle_vertices_round_trip() {
        let v = |x: f32| VertexData::<V2fC4bT2f>::new(Vertex2F::new(x, x), Color4B::WHITE, Tex2F::default());
        let tri = Triangle::from_vertices([v(1.0), v(2.0), v(3.0)]);
        assert_eq!(tri.copy(), [v(1.0), v(2.0), v(3.0)]);
    }
}
