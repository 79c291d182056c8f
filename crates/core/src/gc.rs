//! Mark-and-sweep collection
//!
//! Stop-the-world, precise, two phases over the node pool:
//!
//! - **Mark**: depth-first from the roots using an explicit work stack (no
//!   host recursion, so arbitrarily deep structures survive). Arrays fan
//!   out per-cell by kind; `link`/`misc` fan out per-role; byte series hold
//!   no further references.
//! - **Sweep**: every pool slot is visited; a node with the managed bit and
//!   without the mark bit is freed (buffer released, node back on the
//!   freelist). Marks are cleared on survivors.
//!
//! Roots supplied by the engine: the data stack, every evaluator frame's
//! cells and node references, and the global root cells. Roots owned by the
//! heap itself: both guard stacks and the manual-series list (manual nodes
//! are unconditionally live).
//!
//! Callers run this only at evaluator safe points; the ballast counter that
//! requests a recycle is checked there, never mid-allocation.

use tracing::debug;

use crate::cell::{Cell, Payload};
use crate::flags::NodeInfo;
use crate::node::{Content, Link, Misc, NodeId};
use crate::series::Heap;

/// Outcome of one recycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecycleStats {
    pub freed: usize,
    pub kept: usize,
    pub bytes_freed: usize,
}

/// Append every node a cell references to `out`.
pub fn cell_refs(cell: &Cell, out: &mut Vec<NodeId>) {
    match cell.payload {
        Payload::Word { binding, .. } => {
            if let Some(id) = binding {
                out.push(id);
            }
        }
        Payload::List { node, specifier, .. } => {
            out.push(node);
            if let Some(id) = specifier {
                out.push(id);
            }
        }
        Payload::Text { node, .. } | Payload::Binary { node, .. } => out.push(node),
        Payload::Context { varlist, .. } => out.push(varlist),
        Payload::Function { paramlist, body } => {
            out.push(paramlist);
            out.push(body);
        }
        Payload::Map { pairlist } => out.push(pairlist),
        _ => {}
    }
}

impl Heap {
    /// Run a full mark-and-sweep. `cell_roots` and `node_roots` are the
    /// engine-side root set; guards and manuals are added here.
    pub fn recycle(&mut self, cell_roots: &[Cell], node_roots: &[NodeId]) -> RecycleStats {
        debug_assert_eq!(self.gc_disabled_depth(), 0, "recycle while disabled");

        let bytes_before = self.stats().buffer_bytes;

        // Seed the work stack.
        let mut work: Vec<NodeId> = Vec::new();
        work.extend_from_slice(node_roots);
        work.extend_from_slice(self.guarded_series_ids());
        work.extend_from_slice(self.manuals());
        for cell in cell_roots.iter().chain(self.guarded_value_cells()) {
            cell_refs(cell, &mut work);
        }

        // Mark phase: explicit DFS.
        while let Some(id) = work.pop() {
            let node = self.node_mut(id);
            if node.info.contains(NodeInfo::MARKED) {
                continue;
            }
            node.info |= NodeInfo::MARKED;

            let node = self.node(id);
            match &node.content {
                Content::Embedded { cell, len } => {
                    if *len > 0 {
                        cell_refs(cell, &mut work);
                    }
                }
                Content::Cells(buf) => {
                    for cell in buf.live() {
                        cell_refs(cell, &mut work);
                    }
                }
                Content::Bytes(_) | Content::Free { .. } => {}
            }
            match node.link {
                Link::Keylist(id) | Link::Underlying(id) | Link::Exemplar(id) => work.push(id),
                Link::FileLine { .. } | Link::None => {}
            }
            if let Misc::Meta(id) = node.misc {
                work.push(id);
            }
        }

        // Sweep phase: walk every pool slot.
        let mut stats = RecycleStats::default();
        for id in self.pool().live_ids() {
            let node = self.node_mut(id);
            if node.info.contains(NodeInfo::MARKED) {
                node.info -= NodeInfo::MARKED;
                stats.kept += 1;
            } else if node.info.contains(NodeInfo::MANAGED) {
                self.release_node(id);
                stats.freed += 1;
            } else {
                // Unmarked manual node outside the manual list cannot
                // happen; unmarked manuals were seeded as roots.
                stats.kept += 1;
            }
        }

        stats.bytes_freed = bytes_before.saturating_sub(self.stats().buffer_bytes);
        self.reset_ballast();
        debug!(
            freed = stats.freed,
            kept = stats.kept,
            bytes_freed = stats.bytes_freed,
            "recycle"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Cell, ListKind};
    use crate::flags::NodeFlags;

    #[test]
    fn unreachable_managed_series_are_swept() {
        let mut heap = Heap::new();
        let live = heap.make_array(2, NodeFlags::empty()).unwrap();
        let dead = heap.make_array(2, NodeFlags::empty()).unwrap();
        heap.manage(live);
        heap.manage(dead);

        let root = Cell::list(ListKind::Block, live, 0);
        let stats = heap.recycle(&[root], &[]);
        assert_eq!(stats.freed, 1);
        assert_eq!(stats.kept, 1);
        assert_eq!(heap.stats().live, 1);
    }

    #[test]
    fn live_set_is_transitive_closure_of_roots() {
        let mut heap = Heap::new();
        let inner = heap.make_array(1, NodeFlags::empty()).unwrap();
        let outer = heap.make_array(1, NodeFlags::empty()).unwrap();
        heap.push_cell(outer, Cell::list(ListKind::Block, inner, 0)).unwrap();
        let stray = heap.make_array(1, NodeFlags::empty()).unwrap();
        heap.manage(inner);
        heap.manage(outer);
        heap.manage(stray);

        let root = Cell::list(ListKind::Block, outer, 0);
        let stats = heap.recycle(&[root], &[]);
        assert_eq!(stats.freed, 1, "only the stray dies");
        assert_eq!(heap.stats().live, 2);

        // A second recycle with the same root frees nothing further.
        let stats = heap.recycle(&[root], &[]);
        assert_eq!(stats.freed, 0);
    }

    #[test]
    fn cycles_do_not_hang_the_marker() {
        let mut heap = Heap::new();
        let a = heap.make_array(1, NodeFlags::empty()).unwrap();
        let b = heap.make_array(1, NodeFlags::empty()).unwrap();
        heap.push_cell(a, Cell::list(ListKind::Block, b, 0)).unwrap();
        heap.push_cell(b, Cell::list(ListKind::Block, a, 0)).unwrap();
        heap.manage(a);
        heap.manage(b);

        let stats = heap.recycle(&[Cell::list(ListKind::Block, a, 0)], &[]);
        assert_eq!(stats.freed, 0);

        // Drop the root: the whole cycle goes at once.
        let stats = heap.recycle(&[], &[]);
        assert_eq!(stats.freed, 2);
    }

    #[test]
    fn guards_and_manuals_are_roots() {
        let mut heap = Heap::new();
        let guarded = heap.make_array(1, NodeFlags::empty()).unwrap();
        heap.manage(guarded);
        heap.guard_series(guarded);

        let manual = heap.make_array(1, NodeFlags::empty()).unwrap();

        let stats = heap.recycle(&[], &[]);
        assert_eq!(stats.freed, 0, "guarded and manual series both survive");

        heap.drop_series_guard(guarded);
        let stats = heap.recycle(&[], &[]);
        assert_eq!(stats.freed, 1, "dropping the guard exposes the series");
        assert_eq!(heap.array_len(manual), 0);
    }

    #[test]
    fn value_guard_protects_referents() {
        let mut heap = Heap::new();
        let series = heap.make_array(1, NodeFlags::empty()).unwrap();
        heap.manage(series);
        heap.guard_value(Cell::list(ListKind::Block, series, 0));

        assert_eq!(heap.recycle(&[], &[]).freed, 0);
        heap.drop_value_guard();
        assert_eq!(heap.recycle(&[], &[]).freed, 1);
    }

    #[test]
    fn keylist_link_is_traced() {
        let mut heap = Heap::new();
        let keylist = heap.make_array(2, NodeFlags::KEYLIST).unwrap();
        let varlist = heap.make_array(2, NodeFlags::VARLIST).unwrap();
        heap.node_mut(varlist).link = crate::node::Link::Keylist(keylist);
        heap.manage(keylist);
        heap.manage(varlist);

        let stats = heap.recycle(&[], &[varlist]);
        assert_eq!(stats.freed, 0, "keylist reached through the varlist link");
    }
}
