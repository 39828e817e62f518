/// 2D vertex position.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vertex2F {
    pub x: f32,
    pub y: f32,
}

impl Vertex2F {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 3D vertex position. `z` is carried through to the GPU untouched.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vertex3F {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vertex3F {
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<Vertex2F> for Vertex3F {
    #[inline]
    fn from(v: Vertex2F) -> Self {
        Self::new(v.x, v.y, 0.0)
    }
}

/// Straight-alpha RGBA color, one byte per channel.
///
/// This is the exact on-GPU representation; the shader receives it normalized.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Color4B {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color4B {
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Converts `[0, 1]` float channels to bytes.
    ///
    /// Channels are clamped first, so negative values become 0 and values
    /// above 1 become 255. NaN maps to 0.
    #[inline]
    pub fn from_f32(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::new(unit_to_byte(r), unit_to_byte(g), unit_to_byte(b), unit_to_byte(a))
    }

    #[inline]
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub const fn from_array(c: [u8; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}

#[inline]
fn unit_to_byte(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Texture coordinate in normalized `[0, 1]` texture space.
///
/// Values outside that range are stored unchanged; wrapping is up to the sampler.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Tex2F {
    pub u: f32,
    pub v: f32,
}

impl Tex2F {
    #[inline]
    pub const fn new(u: f32, v: f32) -> Self {
        Self { u, v }
    }
}
