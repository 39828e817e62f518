use std::fmt::Debug;

use super::{Vertex2F, Vertex3F};

mod sealed {
    pub trait Sealed {}
}

/// Binary layout of one vertex: position floats, 4 color bytes, 2 texcoord floats.
///
/// Field offsets within a vertex:
///
/// | field      | offset                 | bytes              |
/// |------------|------------------------|--------------------|
/// | position   | 0                      | `POSITION_BYTES`   |
/// | color      | `POSITION_BYTES`       | 4                  |
/// | tex coords | `POSITION_BYTES + 4`   | 8                  |
///
/// All floats are little-endian IEEE-754. The trait is sealed; the crate
/// supports exactly [`V2fC4bT2f`] and [`V3fC4bT2f`].
pub trait VertexFormat:
    sealed::Sealed + Debug + Copy + Clone + Default + PartialEq + Eq + 'static
{
    type Position: Debug + Copy + Default + PartialEq;

    /// Short layout name used in logs.
    const NAME: &'static str;
    const POSITION_COMPONENTS: usize;
    const POSITION_BYTES: usize = Self::POSITION_COMPONENTS * 4;
    const COLOR_OFFSET: usize = Self::POSITION_BYTES;
    const TEX_COORDS_OFFSET: usize = Self::POSITION_BYTES + 4;
    /// Bytes per vertex.
    const STRIDE: usize = Self::POSITION_BYTES + 4 + 8;
    /// Bytes per quad (4 vertices).
    const QUAD_BYTES: usize = Self::STRIDE * 4;

    /// Reads a position from `bytes[offset..offset + POSITION_BYTES]`.
    fn read_position(bytes: &[u8], offset: usize) -> Self::Position;

    /// Writes a position into `bytes[offset..offset + POSITION_BYTES]`.
    fn write_position(bytes: &mut [u8], offset: usize, position: Self::Position);
}

/// 2D position + color + texcoord, 20 bytes per vertex.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct V2fC4bT2f;

/// 3D position + color + texcoord, 24 bytes per vertex.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct V3fC4bT2f;

impl sealed::Sealed for V2fC4bT2f {}
impl sealed::Sealed for V3fC4bT2f {}

impl VertexFormat for V2fC4bT2f {
    type Position = Vertex2F;

    const NAME: &'static str = "V2F_C4B_T2F";
    const POSITION_COMPONENTS: usize = 2;

    #[inline]
    fn read_position(bytes: &[u8], offset: usize) -> Vertex2F {
        Vertex2F::new(read_f32(bytes, offset), read_f32(bytes, offset + 4))
    }

    #[inline]
    fn write_position(bytes: &mut [u8], offset: usize, p: Vertex2F) {
        write_f32(bytes, offset, p.x);
        write_f32(bytes, offset + 4, p.y);
    }
}

impl VertexFormat for V3fC4bT2f {
    type Position = Vertex3F;

    const NAME: &'static str = "V3F_C4B_T2F";
    const POSITION_COMPONENTS: usize = 3;

    #[inline]
    fn read_position(bytes: &[u8], offset: usize) -> Vertex3F {
        Vertex3F::new(
            read_f32(bytes, offset),
            read_f32(bytes, offset + 4),
            read_f32(bytes, offset + 8),
        )
    }

    #[inline]
    fn write_position(bytes: &mut [u8], offset: usize, p: Vertex3F) {
        write_f32(bytes, offset, p.x);
        write_f32(bytes, offset + 4, p.y);
        write_f32(bytes, offset + 8, p.z);
    }
}

#[inline]
pub(crate) fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(raw)
}

#[inline]
pub(crate) fn write_f32(bytes: &mut [u8], offset: usize, v: f32) {
    bytes[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_match_wire_layout() {
        assert_eq!(V3fC4bT2f::STRIDE, 24);
        assert_eq!(V2fC4bT2f::STRIDE, 20);
        assert_eq!(V3fC4bT2f::QUAD_BYTES, 96);
        assert_eq!(V2fC4bT2f::QUAD_BYTES, 80);
    }

    #[test]
    fn field_offsets_follow_position_size() {
        assert_eq!(V3fC4bT2f::COLOR_OFFSET, 12);
        assert_eq!(V3fC4bT2f::TEX_COORDS_OFFSET, 16);
        assert_eq!(V2fC4bT2f::COLOR_OFFSET, 8);
        assert_eq!(V2fC4bT2f::TEX_COORDS_OFFSET, 12);
    }

    #[test]
    fn floats_are_little_endian() {
        let mut bytes = [0u8; 4];
        write_f32(&mut bytes, 0, 1.0);
        assert_eq!(bytes, [0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn position_write_stays_in_its_bytes() {
        let mut bytes = [0xAAu8; 16];
        V2fC4bT2f::write_position(&mut bytes, 4, Vertex2F::new(1.0, 2.0));
        assert_eq!(&bytes[..4], &[0xAA; 4]);
        assert_eq!(&bytes[12..], &[0xAA; 4]);
        assert_eq!(V2fC4bT2f::read_position(&bytes, 4), Vertex2F::new(1.0, 2.0));
    }
}
