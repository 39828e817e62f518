//! Growable, ordered quad storage over one packed byte buffer.
//!
//! Quad `i` always occupies bytes `[i * QUAD_BYTES, (i + 1) * QUAD_BYTES)`.
//! Inserts and removals shift the trailing quads with `copy_within` so the
//! buffer stays contiguous and can be uploaded to the GPU as-is. Draw order is
//! array order.
//!
//! Every mutation records the touched byte range. The range is coalesced until
//! someone calls [`QuadArena::take_dirty`] (normally the owning atlas, right
//! before it uploads).
//!
//! Views returned by [`QuadArena::quad`] / [`QuadArena::quad_mut`] borrow the
//! arena, so they cannot survive a growth: re-fetch them afterwards.

mod indices;

use std::ops::Range;

use crate::error::ArenaError;
use crate::geometry::{QuadValue, QuadView, QuadViewMut, VertexFormat};

pub use indices::{IndexMode, INDICES_PER_QUAD, MAX_QUADS};

/// Smallest capacity an implicit growth produces.
const MIN_GROWTH: usize = 4;

pub struct QuadArena<F: VertexFormat> {
    bytes: Vec<u8>,
    count: usize,
    capacity: usize,
    indices: Vec<u16>,
    index_mode: IndexMode,
    dirty: Option<Range<usize>>, // bytes
    indices_dirty: bool,
    _format: std::marker::PhantomData<F>,
}

impl<F: VertexFormat> std::fmt::Debug for QuadArena<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadArena")
            .field("format", &F::NAME)
            .field("count", &self.count)
            .field("capacity", &self.capacity)
            .field("index_mode", &self.index_mode)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl<F: VertexFormat> QuadArena<F> {
    /// Bytes per quad slot.
    pub const QUAD_BYTES: usize = F::QUAD_BYTES;

    /// Creates an empty arena with `capacity` zeroed slots.
    pub fn new(capacity: usize, index_mode: IndexMode) -> Result<Self, ArenaError> {
        check_capacity(capacity)?;
        let bytes = alloc_zeroed(capacity * F::QUAD_BYTES)?;
        let mut indices = Vec::new();
        indices
            .try_reserve_exact(capacity * INDICES_PER_QUAD)
            .map_err(|_| ArenaError::AllocationFailure { bytes: capacity * INDICES_PER_QUAD * 2 })?;
        indices::fill_indices(index_mode, capacity, &mut indices);

        Ok(Self {
            bytes,
            count: 0,
            capacity,
            indices,
            index_mode,
            dirty: None,
            indices_dirty: false,
            _format: std::marker::PhantomData,
        })
    }

    // ── accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn index_mode(&self) -> IndexMode {
        self.index_mode
    }

    /// The whole backing store, `capacity * QUAD_BYTES` long.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The index buffer, `6 * capacity` long.
    #[inline]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn quad(&self, index: usize) -> Result<QuadView<'_, F>, ArenaError> {
        self.check_index(index)?;
        Ok(QuadView::bind(&self.bytes, index * F::QUAD_BYTES))
    }

    /// Mutable view of slot `index`. The slot is marked dirty up front.
    pub fn quad_mut(&mut self, index: usize) -> Result<QuadViewMut<'_, F>, ArenaError> {
        self.check_index(index)?;
        self.mark_dirty(index..index + 1);
        Ok(QuadViewMut::bind_mut(&mut self.bytes, index * F::QUAD_BYTES))
    }

    /// Iterates the live quads in draw order.
    pub fn iter(&self) -> impl Iterator<Item = QuadView<'_, F>> + '_ {
        self.bytes[..self.count * F::QUAD_BYTES]
            .chunks_exact(F::QUAD_BYTES)
            .map(|chunk| QuadView::bind(chunk, 0))
    }

    /// Copies the live quads out as detached values.
    pub fn to_values(&self) -> Vec<QuadValue<F>> {
        self.iter().map(|q| q.copy()).collect()
    }

    // ── dirty tracking ────────────────────────────────────────────────────

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    /// Byte range modified since the last [`take_dirty`](Self::take_dirty).
    #[inline]
    pub fn dirty_range(&self) -> Option<Range<usize>> {
        self.dirty.clone()
    }

    /// Returns and clears the modified byte range.
    #[inline]
    pub fn take_dirty(&mut self) -> Option<Range<usize>> {
        self.dirty.take()
    }

    /// Returns and clears the "index buffer was rebuilt" flag.
    #[inline]
    pub fn take_indices_dirty(&mut self) -> bool {
        std::mem::take(&mut self.indices_dirty)
    }

    fn mark_dirty(&mut self, quads: Range<usize>) {
        if quads.is_empty() {
            return;
        }
        let bytes = quads.start * F::QUAD_BYTES..quads.end * F::QUAD_BYTES;
        self.dirty = Some(match self.dirty.take() {
            Some(prev) => prev.start.min(bytes.start)..prev.end.max(bytes.end),
            None => bytes,
        });
    }

    // ── mutation ──────────────────────────────────────────────────────────

    /// Inserts `quad` at `index`, shifting `[index, count)` one slot forward.
    ///
    /// Grows the arena when full. Requires `index <= count`.
    pub fn insert_quad_at(&mut self, index: usize, quad: &QuadValue<F>) -> Result<(), ArenaError> {
        self.insert_quads_at(index, std::slice::from_ref(quad))
    }

    /// Inserts `quads` in order starting at `index`.
    pub fn insert_quads_at(&mut self, index: usize, quads: &[QuadValue<F>]) -> Result<(), ArenaError> {
        if index > self.count {
            return Err(ArenaError::IndexOutOfRange { index, len: self.count });
        }
        if quads.is_empty() {
            return Ok(());
        }

        let required = self.count + quads.len();
        if required > self.capacity {
            self.grow(growth_target(self.capacity, required))?;
        }

        let qb = F::QUAD_BYTES;
        let start = index * qb;
        self.bytes
            .copy_within(start..self.count * qb, start + quads.len() * qb);
        for (i, quad) in quads.iter().enumerate() {
            QuadViewMut::<F>::bind_mut(&mut self.bytes, start + i * qb).set(quad);
        }

        self.count = required;
        self.mark_dirty(index..self.count);
        Ok(())
    }

    /// Removes the quad at `index`, shifting `(index, count)` one slot back.
    ///
    /// Capacity is unchanged. Requires `index < count`.
    pub fn remove_quad_at(&mut self, index: usize) -> Result<QuadValue<F>, ArenaError> {
        let removed = self.quad(index)?.copy();
        self.remove_quads_at(index, 1)?;
        Ok(removed)
    }

    /// Removes `amount` quads starting at `index`.
    pub fn remove_quads_at(&mut self, index: usize, amount: usize) -> Result<(), ArenaError> {
        let end = index.saturating_add(amount);
        if end > self.count || (amount == 0 && index >= self.count) {
            return Err(ArenaError::IndexOutOfRange { index: end.max(index), len: self.count });
        }
        if amount == 0 {
            return Ok(());
        }

        let qb = F::QUAD_BYTES;
        let old_count = self.count;
        self.bytes.copy_within(end * qb..old_count * qb, index * qb);
        // Vacated tail slots are zeroed so stale geometry never reaches the GPU.
        self.bytes[(old_count - amount) * qb..old_count * qb].fill(0);

        self.count -= amount;
        self.mark_dirty(index..old_count);
        Ok(())
    }

    /// Drops every quad. Capacity is kept; the occupied slots are zeroed like
    /// the tail vacated by [`remove_quads_at`](Self::remove_quads_at).
    pub fn remove_all_quads(&mut self) {
        let old_count = self.count;
        self.bytes[..old_count * F::QUAD_BYTES].fill(0);
        self.count = 0;
        self.mark_dirty(0..old_count);
    }

    /// Overwrites slot `index`. Requires `index < count`.
    pub fn update_quad(&mut self, index: usize, quad: &QuadValue<F>) -> Result<(), ArenaError> {
        self.quad_mut(index)?.set(quad);
        Ok(())
    }

    /// Moves `amount` quads from `old_index` so that they start at `new_index`.
    ///
    /// Quads in between shift to close the gap. Both ranges must be within
    /// `0..count`.
    pub fn move_quads(&mut self, old_index: usize, amount: usize, new_index: usize) -> Result<(), ArenaError> {
        for start in [old_index, new_index] {
            let end = start.saturating_add(amount);
            if end > self.count {
                return Err(ArenaError::IndexOutOfRange { index: end, len: self.count });
            }
        }
        if amount == 0 || old_index == new_index {
            return Ok(());
        }

        let qb = F::QUAD_BYTES;
        let shift = amount * qb;
        if new_index > old_index {
            self.bytes[old_index * qb..(new_index + amount) * qb].rotate_left(shift);
            self.mark_dirty(old_index..new_index + amount);
        } else {
            self.bytes[new_index * qb..(old_index + amount) * qb].rotate_right(shift);
            self.mark_dirty(new_index..old_index + amount);
        }
        Ok(())
    }

    /// Zeroes `amount` slots starting at `index` without changing `count`.
    ///
    /// May touch slots past `count`, up to `capacity`.
    pub fn fill_with_empty_quads_from(&mut self, index: usize, amount: usize) -> Result<(), ArenaError> {
        let end = index.saturating_add(amount);
        if end > self.capacity {
            return Err(ArenaError::IndexOutOfRange { index: end, len: self.capacity });
        }
        self.bytes[index * F::QUAD_BYTES..end * F::QUAD_BYTES].fill(0);
        self.mark_dirty(index..end);
        Ok(())
    }

    /// Extends `count` over `amount` already-allocated slots.
    pub fn increase_total_quads_with(&mut self, amount: usize) -> Result<(), ArenaError> {
        let new_count = self.count.saturating_add(amount);
        if new_count > self.capacity {
            return Err(ArenaError::IndexOutOfRange { index: new_count, len: self.capacity });
        }
        let old = self.count;
        self.count = new_count;
        self.mark_dirty(old..new_count);
        Ok(())
    }

    /// Reallocates to `new_capacity` slots.
    ///
    /// The first `count` quads are copied byte for byte; new slots are zeroed.
    /// The index buffer is rebuilt for the full new capacity. Capacity never
    /// shrinks here: `new_capacity` must exceed the current one.
    pub fn grow(&mut self, new_capacity: usize) -> Result<(), ArenaError> {
        if new_capacity <= self.capacity {
            return Err(ArenaError::CapacityNotIncreased {
                current: self.capacity,
                requested: new_capacity,
            });
        }
        check_capacity(new_capacity)?;

        let qb = F::QUAD_BYTES;
        let new_len = new_capacity * qb;
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(new_len)
            .map_err(|_| ArenaError::AllocationFailure { bytes: new_len })?;
        bytes.extend_from_slice(&self.bytes[..self.count * qb]);
        bytes.resize(new_len, 0);

        let mut indices = Vec::new();
        indices
            .try_reserve_exact(new_capacity * INDICES_PER_QUAD)
            .map_err(|_| ArenaError::AllocationFailure { bytes: new_capacity * INDICES_PER_QUAD * 2 })?;
        indices::fill_indices(self.index_mode, new_capacity, &mut indices);

        log::debug!(
            "QuadArena<{}>: grow {} -> {} quads ({} bytes)",
            F::NAME,
            self.capacity,
            new_capacity,
            new_len
        );

        self.bytes = bytes;
        self.indices = indices;
        self.capacity = new_capacity;
        self.indices_dirty = true;
        self.mark_dirty(0..new_capacity);
        Ok(())
    }

    #[inline]
    fn check_index(&self, index: usize) -> Result<(), ArenaError> {
        if index < self.count {
            Ok(())
        } else {
            Err(ArenaError::IndexOutOfRange { index, len: self.count })
        }
    }
}

/// Doubles until `required` fits, clamped to the index limit.
fn growth_target(capacity: usize, required: usize) -> usize {
    let mut target = capacity.max(MIN_GROWTH / 2) * 2;
    while target < required {
        target *= 2;
    }
    target.min(MAX_QUADS).max(required)
}

fn check_capacity(capacity: usize) -> Result<(), ArenaError> {
    if capacity > MAX_QUADS {
        return Err(ArenaError::IndexRangeExceeded { requested: capacity, max: MAX_QUADS });
    }
    Ok(())
}

fn alloc_zeroed(len: usize) -> Result<Vec<u8>, ArenaError> {
    let mut bytes = Vec::new();
    bytes
        .try_reserve_exact(len)
        .map_err(|_| ArenaError::AllocationFailure { bytes: len })?;
    bytes.resize(len, 0);
    Ok(bytes)
}
