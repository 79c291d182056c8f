//! The heap: series allocation, growth, and lifecycle
//!
//! Every series is born **manual**: the creator must free it, promote it to
//! **managed** (collector-owned) before the next recycle, or lean on trap
//! cleanup, which frees everything added to the manual list after the trap's
//! snapshot. Two guard stacks (series and values) protect transient roots
//! across evaluator calls; guards release in strict LIFO order.
//!
//! Head insertions and removals use the buffer bias rather than moving
//! data. The bias is bounded: once it exceeds [`MAX_BIAS`] elements the
//! buffer is compacted back to bias 0.

use thiserror::Error;

use crate::cell::Cell;
use crate::flags::{NodeFlags, NodeInfo};
use crate::node::{Buffer, Content, Node, NodeId, CELL_WIDTH, MAX_BIAS};
use crate::pool::{pow2_capacity, NodePool, PoolStats};

/// Default allocation ballast before a recycle is requested (bytes).
pub const DEFAULT_BALLAST: usize = 3 * 1024 * 1024;

/// Low-level memory faults. The runtime wraps these into error contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Trouble {
    #[error("out of memory")]
    OutOfMemory,
    #[error("series is locked for modification")]
    LockedSeries,
    #[error("series is fixed-size")]
    FixedSize,
}

/// The allocator, manual tracker, and guard stacks, packaged as one value
/// so an engine instance owns all of its memory state.
pub struct Heap {
    pool: NodePool,
    manuals: Vec<NodeId>,
    guarded_series: Vec<NodeId>,
    guarded_values: Vec<Cell>,
    ballast: usize,
    ballast_threshold: usize,
    gc_disabled: u32,
}

impl Default for Heap {
    fn default() -> Heap {
        Heap::new()
    }
}

impl Heap {
    pub fn new() -> Heap {
        Heap {
            pool: NodePool::new(),
            manuals: Vec::new(),
            guarded_series: Vec::new(),
            guarded_values: Vec::new(),
            ballast: 0,
            ballast_threshold: DEFAULT_BALLAST,
            gc_disabled: 0,
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.pool.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.pool.get_mut(id)
    }

    pub(crate) fn pool(&self) -> &NodePool {
        &self.pool
    }

    pub(crate) fn pool_mut(&mut self) -> &mut NodePool {
        &mut self.pool
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    // --- creation ---------------------------------------------------------

    /// Allocate a general series. `width` 1 makes a byte series; 32 makes a
    /// cell array. The new series is manual.
    pub fn make_series(&mut self, width: u8, capacity: usize, flags: NodeFlags) -> Result<NodeId, Trouble> {
        debug_assert!(width == 1 || width == CELL_WIDTH, "unsupported element width");
        let id = self.pool.alloc(width);
        let node = self.pool.get_mut(id);
        node.flags = flags;
        if width == CELL_WIDTH {
            node.flags |= NodeFlags::ARRAY;
            if capacity == 0 {
                node.content = Content::Embedded {
                    cell: Cell::end(),
                    len: 0,
                };
            } else {
                node.flags |= NodeFlags::DYNAMIC | NodeFlags::POW2_ALLOC;
                let cap = pow2_capacity(capacity + 1);
                let mut data: Vec<Cell> = Vec::new();
                data.try_reserve(cap).map_err(|_| Trouble::OutOfMemory)?;
                data.push(Cell::end());
                node.content = Content::Cells(Buffer { data, bias: 0, len: 0 });
                let bytes = cap * CELL_WIDTH as usize;
                self.pool.note_buffer_bytes(bytes as isize);
                self.ballast += bytes;
            }
        } else {
            node.flags |= NodeFlags::DYNAMIC | NodeFlags::POW2_ALLOC;
            let cap = pow2_capacity(capacity);
            let mut data: Vec<u8> = Vec::new();
            data.try_reserve(cap).map_err(|_| Trouble::OutOfMemory)?;
            node.content = Content::Bytes(Buffer { data, bias: 0, len: 0 });
            self.pool.note_buffer_bytes(cap as isize);
            self.ballast += cap;
        }
        self.manuals.push(id);
        Ok(id)
    }

    /// Allocate a cell array. Manual, end-terminated.
    pub fn make_array(&mut self, capacity: usize, flags: NodeFlags) -> Result<NodeId, Trouble> {
        self.make_series(CELL_WIDTH, capacity, flags)
    }

    /// Allocate a length-1 array embedding `cell` in the node itself — the
    /// single-cell storage used for body holders and similar one-value
    /// arrays. No out-of-line buffer is allocated.
    pub fn make_singular(&mut self, cell: Cell, flags: NodeFlags) -> NodeId {
        let id = self.pool.alloc(CELL_WIDTH);
        let node = self.pool.get_mut(id);
        node.flags = flags | NodeFlags::ARRAY;
        node.content = Content::Embedded { cell, len: 1 };
        self.manuals.push(id);
        id
    }

    /// Allocate a text series holding `text`. Manual.
    pub fn make_text(&mut self, text: &str) -> Result<NodeId, Trouble> {
        let id = self.make_series(1, text.len(), NodeFlags::UTF8_TEXT)?;
        self.append_bytes(id, text.as_bytes())?;
        Ok(id)
    }

    /// Allocate a binary series holding `bytes`. Manual.
    pub fn make_binary(&mut self, bytes: &[u8]) -> Result<NodeId, Trouble> {
        let id = self.make_series(1, bytes.len(), NodeFlags::empty())?;
        self.append_bytes(id, bytes)?;
        Ok(id)
    }

    // --- lifecycle --------------------------------------------------------

    /// Promote a manual series to collector ownership. Shallow: contained
    /// references are not promoted; constructors building hierarchies mark
    /// as they build.
    pub fn manage(&mut self, id: NodeId) {
        let node = self.pool.get_mut(id);
        if node.info.contains(NodeInfo::MANAGED) {
            return;
        }
        node.info |= NodeInfo::MANAGED;
        self.drop_manual(id);
    }

    pub fn is_managed(&self, id: NodeId) -> bool {
        self.pool.get(id).is_managed()
    }

    /// Free a manual series. Freeing a managed series is a programmer
    /// error (the collector owns it).
    pub fn free_series(&mut self, id: NodeId) {
        debug_assert!(
            !self.pool.get(id).is_managed(),
            "free_series on a managed series"
        );
        self.drop_manual(id);
        self.release_node(id);
    }

    /// Release a node's buffer and return it to the pool, with no ownership
    /// checks. The sweep phase and free_series share this.
    pub(crate) fn release_node(&mut self, id: NodeId) {
        let node = self.pool.get_mut(id);
        let freed_bytes = match &node.content {
            Content::Cells(buf) => buf.data.capacity() * CELL_WIDTH as usize,
            Content::Bytes(buf) => buf.data.capacity(),
            _ => 0,
        };
        if freed_bytes > 0 {
            self.pool.note_buffer_bytes(-(freed_bytes as isize));
        }
        self.pool.free(id);
    }

    fn drop_manual(&mut self, id: NodeId) {
        // Series usually die young; scan from the tail.
        if let Some(pos) = self.manuals.iter().rposition(|&m| m == id) {
            self.manuals.remove(pos);
        }
    }

    pub fn manual_count(&self) -> usize {
        self.manuals.len()
    }

    pub(crate) fn manuals(&self) -> &[NodeId] {
        &self.manuals
    }

    /// Free every manual series created after a trap snapshot, restoring
    /// the list to `len` entries. Newest first, so nested allocations drop
    /// before their parents.
    pub fn truncate_manuals(&mut self, len: usize) {
        while self.manuals.len() > len {
            let id = self.manuals.pop().expect("manual list underflow");
            self.release_node(id);
        }
    }

    // --- guards -----------------------------------------------------------

    /// Protect a series from collection across evaluator calls. Guards nest
    /// LIFO only.
    pub fn guard_series(&mut self, id: NodeId) {
        self.guarded_series.push(id);
    }

    /// Release the most recent series guard, which must be `id`.
    pub fn drop_series_guard(&mut self, id: NodeId) {
        let top = self.guarded_series.pop().expect("series guard stack underflow");
        assert_eq!(top, id, "series guards must release in LIFO order");
    }

    /// Protect a value cell's referents across evaluator calls.
    pub fn guard_value(&mut self, cell: Cell) {
        self.guarded_values.push(cell);
    }

    pub fn drop_value_guard(&mut self) {
        self.guarded_values.pop().expect("value guard stack underflow");
    }

    pub fn series_guard_depth(&self) -> usize {
        self.guarded_series.len()
    }

    pub fn value_guard_depth(&self) -> usize {
        self.guarded_values.len()
    }

    /// Unwind both guard stacks to snapshot depths (trap recovery).
    pub fn truncate_guards(&mut self, series_depth: usize, value_depth: usize) {
        debug_assert!(series_depth <= self.guarded_series.len());
        debug_assert!(value_depth <= self.guarded_values.len());
        self.guarded_series.truncate(series_depth);
        self.guarded_values.truncate(value_depth);
    }

    pub(crate) fn guarded_series_ids(&self) -> &[NodeId] {
        &self.guarded_series
    }

    pub(crate) fn guarded_value_cells(&self) -> &[Cell] {
        &self.guarded_values
    }

    // --- collection control ----------------------------------------------

    pub fn gc_disable(&mut self) {
        self.gc_disabled += 1;
    }

    pub fn gc_enable(&mut self) {
        debug_assert!(self.gc_disabled > 0, "unbalanced gc_enable");
        self.gc_disabled = self.gc_disabled.saturating_sub(1);
    }

    pub fn gc_disabled_depth(&self) -> u32 {
        self.gc_disabled
    }

    pub fn set_gc_disabled_depth(&mut self, depth: u32) {
        self.gc_disabled = depth;
    }

    /// Has allocation since the last recycle crossed the ballast line?
    /// Checked at evaluator safe points, never mid-allocation.
    pub fn ballast_exceeded(&self) -> bool {
        self.ballast >= self.ballast_threshold
    }

    pub fn set_ballast_threshold(&mut self, bytes: usize) {
        self.ballast_threshold = bytes;
    }

    pub(crate) fn reset_ballast(&mut self) {
        self.ballast = 0;
    }

    // --- access checks ----------------------------------------------------

    /// Fail if the series may not be structurally mutated right now.
    pub fn ensure_mutable(&self, id: NodeId) -> Result<(), Trouble> {
        let node = self.pool.get(id);
        if node
            .info
            .intersects(NodeInfo::FROZEN | NodeInfo::PROTECTED | NodeInfo::HOLD)
        {
            return Err(Trouble::LockedSeries);
        }
        Ok(())
    }

    /// Take the stack-scoped read lock for an enumeration in progress.
    pub fn hold(&mut self, id: NodeId) {
        self.pool.get_mut(id).info |= NodeInfo::HOLD;
    }

    pub fn unhold(&mut self, id: NodeId) {
        self.pool.get_mut(id).info -= NodeInfo::HOLD;
    }

    /// Permanent, transitive read-only state.
    pub fn freeze(&mut self, id: NodeId) {
        self.pool.get_mut(id).info |= NodeInfo::FROZEN;
    }

    pub fn protect(&mut self, id: NodeId) {
        self.pool.get_mut(id).info |= NodeInfo::PROTECTED;
    }

    pub fn unprotect(&mut self, id: NodeId) {
        self.pool.get_mut(id).info -= NodeInfo::PROTECTED;
    }

    // --- array operations -------------------------------------------------

    pub fn array_len(&self, id: NodeId) -> usize {
        self.pool.get(id).len()
    }

    /// Convert embedded content to a dynamic buffer so it can grow.
    fn ensure_dynamic(&mut self, id: NodeId, extra: usize) -> Result<(), Trouble> {
        let node = self.pool.get_mut(id);
        if let Content::Embedded { cell, len } = node.content {
            let cap = pow2_capacity(len as usize + extra + 1);
            let mut data: Vec<Cell> = Vec::new();
            data.try_reserve(cap).map_err(|_| Trouble::OutOfMemory)?;
            if len > 0 {
                data.push(cell);
            }
            data.push(Cell::end());
            node.flags |= NodeFlags::DYNAMIC | NodeFlags::POW2_ALLOC;
            node.content = Content::Cells(Buffer {
                data,
                bias: 0,
                len: len as u32,
            });
            let bytes = cap * CELL_WIDTH as usize;
            self.pool.note_buffer_bytes(bytes as isize);
            self.ballast += bytes;
        }
        Ok(())
    }

    fn cells_mut(&mut self, id: NodeId) -> &mut Buffer<Cell> {
        match &mut self.pool.get_mut(id).content {
            Content::Cells(buf) => buf,
            _ => panic!("cell buffer access on a non-dynamic array"),
        }
    }

    /// Append one cell at the tail, re-terminating.
    pub fn push_cell(&mut self, id: NodeId, cell: Cell) -> Result<(), Trouble> {
        self.ensure_mutable(id)?;
        self.check_growable(id)?;
        // The single-cell fast path: an empty embedded node absorbs one
        // value without allocating a buffer.
        if let Content::Embedded { len: 0, .. } = self.pool.get(id).content {
            self.pool.get_mut(id).content = Content::Embedded { cell, len: 1 };
            return Ok(());
        }
        self.ensure_dynamic(id, 1)?;
        let buf = self.cells_mut(id);
        let slot = (buf.bias + buf.len) as usize;
        debug_assert!(buf.data[slot].is_end(), "array lost its terminator");
        buf.data[slot] = cell;
        buf.data.push(Cell::end());
        buf.len += 1;
        self.ballast += CELL_WIDTH as usize;
        Ok(())
    }

    /// Grow the tail by `n` void cells and re-terminate.
    pub fn expand_tail(&mut self, id: NodeId, n: usize) -> Result<(), Trouble> {
        self.ensure_mutable(id)?;
        self.check_growable(id)?;
        if n == 0 {
            return Ok(());
        }
        self.ensure_dynamic(id, n)?;
        let buf = self.cells_mut(id);
        let term = (buf.bias + buf.len) as usize;
        debug_assert!(buf.data[term].is_end());
        buf.data
            .try_reserve(n)
            .map_err(|_| Trouble::OutOfMemory)?;
        buf.data[term] = Cell::void();
        for _ in 1..n {
            buf.data.push(Cell::void());
        }
        buf.data.push(Cell::end());
        buf.len += n as u32;
        self.ballast += n * CELL_WIDTH as usize;
        Ok(())
    }

    /// Insert `n` void cells before the head. Consumes bias budget before
    /// falling back to a memmove.
    pub fn expand_head(&mut self, id: NodeId, n: usize) -> Result<(), Trouble> {
        self.ensure_mutable(id)?;
        self.check_growable(id)?;
        self.ensure_dynamic(id, n)?;
        let buf = self.cells_mut(id);
        if buf.bias as usize >= n {
            buf.bias -= n as u32;
            buf.len += n as u32;
            let head = buf.bias as usize;
            for slot in &mut buf.data[head..head + n] {
                *slot = Cell::void();
            }
        } else {
            buf.data
                .try_reserve(n)
                .map_err(|_| Trouble::OutOfMemory)?;
            let head = buf.bias as usize;
            buf.data.splice(head..head, std::iter::repeat_n(Cell::void(), n));
            buf.len += n as u32;
        }
        self.ballast += n * CELL_WIDTH as usize;
        Ok(())
    }

    /// Remove `n` cells from the head by advancing the bias; compacts when
    /// the bias budget is exhausted.
    pub fn take_head(&mut self, id: NodeId, n: usize) -> Result<(), Trouble> {
        self.ensure_mutable(id)?;
        let node = self.pool.get_mut(id);
        match &mut node.content {
            Content::Embedded { len, .. } => {
                debug_assert!(n <= *len as usize, "take_head past tail");
                *len -= n as u8;
                Ok(())
            }
            Content::Cells(buf) => {
                debug_assert!(n <= buf.len as usize, "take_head past tail");
                buf.bias += n as u32;
                buf.len -= n as u32;
                if buf.bias > MAX_BIAS {
                    buf.compact();
                }
                Ok(())
            }
            _ => panic!("take_head on a non-array series"),
        }
    }

    /// Remove one cell at `index`, closing the gap and re-terminating.
    pub fn remove_cell(&mut self, id: NodeId, index: usize) -> Result<(), Trouble> {
        self.ensure_mutable(id)?;
        if index == 0 {
            return self.take_head(id, 1);
        }
        let buf = self.cells_mut(id);
        debug_assert!(index < buf.len as usize);
        buf.data.remove(buf.bias as usize + index);
        buf.len -= 1;
        Ok(())
    }

    /// Overwrite the cell at `index` (which must be within the length).
    pub fn poke_cell(&mut self, id: NodeId, index: usize, cell: Cell) -> Result<(), Trouble> {
        let node = self.pool.get(id);
        if node
            .info
            .intersects(NodeInfo::FROZEN | NodeInfo::PROTECTED)
        {
            return Err(Trouble::LockedSeries);
        }
        let node = self.pool.get_mut(id);
        match &mut node.content {
            Content::Embedded { cell: slot, len } => {
                debug_assert!(index < *len as usize, "poke past tail");
                slot.assign(&cell);
            }
            Content::Cells(buf) => {
                debug_assert!(index < buf.len as usize, "poke past tail");
                let slot = buf.bias as usize + index;
                buf.data[slot].assign(&cell);
            }
            _ => panic!("poke on a non-array series"),
        }
        Ok(())
    }

    /// Raw slot write that replaces flags too (bind caches, keylist setup).
    pub fn overwrite_cell(&mut self, id: NodeId, index: usize, cell: Cell) {
        let node = self.pool.get_mut(id);
        match &mut node.content {
            Content::Embedded { cell: slot, len } => {
                debug_assert!(index < *len as usize);
                *slot = cell;
            }
            Content::Cells(buf) => {
                debug_assert!(index < buf.len as usize);
                let slot = buf.bias as usize + index;
                buf.data[slot] = cell;
            }
            _ => panic!("overwrite on a non-array series"),
        }
    }

    fn check_growable(&self, id: NodeId) -> Result<(), Trouble> {
        if self.pool.get(id).flags.contains(NodeFlags::FIXED_SIZE) {
            return Err(Trouble::FixedSize);
        }
        Ok(())
    }

    /// Current bias of a dynamic series (0 for embedded content).
    pub fn bias_of(&self, id: NodeId) -> u32 {
        match &self.pool.get(id).content {
            Content::Cells(buf) => buf.bias,
            Content::Bytes(buf) => buf.bias,
            _ => 0,
        }
    }

    // --- byte operations --------------------------------------------------

    pub fn append_bytes(&mut self, id: NodeId, bytes: &[u8]) -> Result<(), Trouble> {
        self.ensure_mutable(id)?;
        self.check_growable(id)?;
        let node = self.pool.get_mut(id);
        match &mut node.content {
            Content::Bytes(buf) => {
                buf.data
                    .try_reserve(bytes.len())
                    .map_err(|_| Trouble::OutOfMemory)?;
                buf.data.extend_from_slice(bytes);
                buf.len += bytes.len() as u32;
                self.ballast += bytes.len();
                Ok(())
            }
            _ => panic!("append_bytes on a non-byte series"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap_with_array(cells: &[i64]) -> (Heap, NodeId) {
        let mut heap = Heap::new();
        let id = heap.make_array(cells.len(), NodeFlags::empty()).unwrap();
        for &n in cells {
            heap.push_cell(id, Cell::integer(n)).unwrap();
        }
        (heap, id)
    }

    fn ints(heap: &Heap, id: NodeId) -> Vec<i64> {
        let node = heap.node(id);
        (0..node.len())
            .map(|i| node.at(i).as_integer().unwrap())
            .collect()
    }

    #[test]
    fn arrays_stay_terminated() {
        let (mut heap, id) = heap_with_array(&[1, 2, 3]);
        assert!(heap.node(id).at(3).is_end());

        heap.expand_tail(id, 2).unwrap();
        assert_eq!(heap.array_len(id), 5);
        assert!(heap.node(id).at(5).is_end());

        heap.remove_cell(id, 1).unwrap();
        assert_eq!(ints(&heap, id), vec![1, 3]);
        assert!(heap.node(id).at(4).is_end());
        heap.free_series(id);
    }

    #[test]
    fn head_operations_ride_the_bias() {
        let (mut heap, id) = heap_with_array(&[10, 20, 30]);
        heap.take_head(id, 1).unwrap();
        assert_eq!(ints(&heap, id), vec![20, 30]);
        assert_eq!(heap.bias_of(id), 1);

        // Head insertion reclaims the bias without moving data.
        heap.expand_head(id, 1).unwrap();
        assert_eq!(heap.bias_of(id), 0);
        assert_eq!(heap.array_len(id), 3);
        assert!(heap.node(id).at(0).is_void());
        heap.free_series(id);
    }

    #[test]
    fn bias_is_bounded() {
        let mut heap = Heap::new();
        let id = heap.make_array(MAX_BIAS as usize + 8, NodeFlags::empty()).unwrap();
        for i in 0..(MAX_BIAS as i64 + 8) {
            heap.push_cell(id, Cell::integer(i)).unwrap();
        }
        for _ in 0..(MAX_BIAS as usize + 1) {
            heap.take_head(id, 1).unwrap();
        }
        assert!(heap.bias_of(id) <= MAX_BIAS, "bias must reset after compaction");
        assert_eq!(heap.array_len(id), 7);
        heap.free_series(id);
    }

    #[test]
    fn singular_node_absorbs_one_cell_without_buffer() {
        let mut heap = Heap::new();
        let id = heap.make_array(0, NodeFlags::empty()).unwrap();
        let before = heap.stats().buffer_bytes;
        heap.push_cell(id, Cell::integer(9)).unwrap();
        assert_eq!(heap.stats().buffer_bytes, before, "embedded push allocates nothing");
        assert_eq!(heap.array_len(id), 1);
        assert!(heap.node(id).at(1).is_end());

        // Second push converts to a dynamic buffer.
        heap.push_cell(id, Cell::integer(10)).unwrap();
        assert_eq!(ints(&heap, id), vec![9, 10]);
        assert!(heap.stats().buffer_bytes > before);
        heap.free_series(id);
    }

    #[test]
    fn manual_lifecycle() {
        let mut heap = Heap::new();
        let a = heap.make_array(4, NodeFlags::empty()).unwrap();
        let b = heap.make_array(4, NodeFlags::empty()).unwrap();
        assert_eq!(heap.manual_count(), 2);

        heap.manage(a);
        assert_eq!(heap.manual_count(), 1);
        assert!(heap.is_managed(a));

        heap.free_series(b);
        assert_eq!(heap.manual_count(), 0);
    }

    #[test]
    fn truncate_manuals_frees_newest_first() {
        let mut heap = Heap::new();
        let keep = heap.make_array(2, NodeFlags::empty()).unwrap();
        let snapshot = heap.manual_count();
        let _x = heap.make_array(2, NodeFlags::empty()).unwrap();
        let _y = heap.make_array(2, NodeFlags::empty()).unwrap();
        heap.truncate_manuals(snapshot);
        assert_eq!(heap.manual_count(), 1);
        assert_eq!(heap.array_len(keep), 0);
        assert_eq!(heap.stats().live, 1);
    }

    #[test]
    fn guards_are_lifo() {
        let mut heap = Heap::new();
        let a = heap.make_array(1, NodeFlags::empty()).unwrap();
        let b = heap.make_array(1, NodeFlags::empty()).unwrap();
        heap.guard_series(a);
        heap.guard_series(b);
        heap.drop_series_guard(b);
        heap.drop_series_guard(a);
    }

    #[test]
    #[should_panic(expected = "LIFO")]
    fn mismatched_guard_pop_asserts() {
        let mut heap = Heap::new();
        let a = heap.make_array(1, NodeFlags::empty()).unwrap();
        let b = heap.make_array(1, NodeFlags::empty()).unwrap();
        heap.guard_series(a);
        heap.guard_series(b);
        heap.drop_series_guard(a);
    }

    #[test]
    fn locked_series_refuse_mutation() {
        let (mut heap, id) = heap_with_array(&[1]);
        heap.freeze(id);
        assert_eq!(heap.push_cell(id, Cell::integer(2)), Err(Trouble::LockedSeries));

        let (mut heap, id) = heap_with_array(&[1]);
        heap.hold(id);
        assert_eq!(heap.expand_tail(id, 1), Err(Trouble::LockedSeries));
        heap.unhold(id);
        assert!(heap.expand_tail(id, 1).is_ok());
    }

    #[test]
    fn text_series_round_trip() {
        let mut heap = Heap::new();
        let id = heap.make_text("hello").unwrap();
        assert_eq!(heap.node(id).as_str(), "hello");
        heap.append_bytes(id, b" world").unwrap();
        assert_eq!(heap.node(id).as_str(), "hello world");
    }
}
