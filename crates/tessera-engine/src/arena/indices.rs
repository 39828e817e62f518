/// Largest quad count addressable with 16-bit vertex indices (4 vertices per quad).
pub const MAX_QUADS: usize = (u16::MAX as usize + 1) / 4;

/// Indices emitted per quad, in either mode.
pub const INDICES_PER_QUAD: usize = 6;

/// How the index buffer joins the four corners of each quad.
///
/// Corners are stored top-left, bottom-left, top-right, bottom-right.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum IndexMode {
    /// Two independent triangles per quad: `4q, 4q+1, 4q+2, 4q+1, 4q+3, 4q+2`.
    #[default]
    TriangleList,
    /// One strip over all quads, joined by degenerate triangles:
    /// `4q, 4q, 4q+2, 4q+1, 4q+3, 4q+3`.
    TriangleStrip,
}

/// Fills `out` with the index pattern for `quads` quads.
pub(crate) fn fill_indices(mode: IndexMode, quads: usize, out: &mut Vec<u16>) {
    debug_assert!(quads <= MAX_QUADS);
    out.clear();
    for q in 0..quads {
        let base = (q * 4) as u16;
        let pattern = match mode {
            IndexMode::TriangleList => [base, base + 1, base + 2, base + 1, base + 3, base + 2],
            IndexMode::TriangleStrip => [base, base, base + 2, base + 1, base + 3, base + 3],
        };
        out.extend_from_slice(&pattern);
    }
}
