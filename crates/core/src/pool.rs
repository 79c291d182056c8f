//! The node pool
//!
//! All series nodes are the same size, so one pool serves every series in
//! the system. Free slots form a singly-linked list threaded through the
//! node's content slot; alloc and free are O(1). Handing a node out resets
//! its header so the width-0 invariant cleanly separates free from live
//! during enumeration (the sweep phase relies on this).

use crate::node::{Content, Node, NodeId};

/// Point-in-time allocator statistics, for diagnostics and the REPL's
/// `stats` output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub live: usize,
    pub free: usize,
    /// Bytes held by out-of-line buffers, maintained by the series layer.
    pub buffer_bytes: usize,
    pub peak_live: usize,
}

/// Uniform node allocator.
#[derive(Default)]
pub struct NodePool {
    slots: Vec<Node>,
    free_head: Option<NodeId>,
    stats: PoolStats,
}

impl NodePool {
    pub fn new() -> NodePool {
        NodePool::default()
    }

    /// Draw a node. The slot is handed out with a scrubbed header and the
    /// given element width already stamped (width 0 is reserved for freed
    /// nodes); the series layer fills in flags and content.
    pub fn alloc(&mut self, width: u8) -> NodeId {
        debug_assert!(width != 0, "width 0 is the freed-node sentinel");
        let id = match self.free_head {
            Some(id) => {
                let next = match self.slots[id.index()].content {
                    Content::Free { next_free } => next_free,
                    _ => unreachable!("freelist entry with live content"),
                };
                self.free_head = next;
                self.stats.free -= 1;
                self.slots[id.index()] = Node::freed(None);
                id
            }
            None => {
                let id = NodeId::from_index(self.slots.len());
                self.slots.push(Node::freed(None));
                id
            }
        };
        self.slots[id.index()].set_width(width);
        self.stats.live += 1;
        self.stats.peak_live = self.stats.peak_live.max(self.stats.live);
        id
    }

    /// Return a node to the freelist. The caller has already released any
    /// buffer; the slot is scrubbed so enumeration sees width 0.
    pub fn free(&mut self, id: NodeId) {
        debug_assert!(!self.slots[id.index()].is_free(), "double free of node");
        self.slots[id.index()] = Node::freed(self.free_head);
        self.free_head = Some(id);
        self.stats.live -= 1;
        self.stats.free += 1;
    }

    pub fn get(&self, id: NodeId) -> &Node {
        let node = &self.slots[id.index()];
        debug_assert!(!node.is_free(), "access to freed node");
        node
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        let node = &mut self.slots[id.index()];
        debug_assert!(!node.is_free(), "access to freed node");
        node
    }

    /// Visit every slot, live or free; the GC sweep distinguishes them by
    /// width.
    pub fn enumerate(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId::from_index(i), node))
    }

    /// Ids of all live nodes. Collected up front so callers may mutate the
    /// pool while walking.
    pub fn live_ids(&self) -> Vec<NodeId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.is_free())
            .map(|(i, _)| NodeId::from_index(i))
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub(crate) fn note_buffer_bytes(&mut self, delta: isize) {
        self.stats.buffer_bytes = (self.stats.buffer_bytes as isize + delta).max(0) as usize;
    }
}

/// Round a requested capacity up to a power of two, the pool's preferred
/// allocation grain. Callers record the rounding with `NodeFlags::POW2_ALLOC`.
pub fn pow2_capacity(requested: usize) -> usize {
    requested.next_power_of_two().max(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_free_recycles_slots() {
        let mut pool = NodePool::new();
        let a = pool.alloc(1);
        let b = pool.alloc(1);
        assert_ne!(a, b);
        assert_eq!(pool.stats().live, 2);

        pool.free(a);
        assert_eq!(pool.stats().live, 1);
        assert_eq!(pool.stats().free, 1);

        // The freed slot is reused before the vector grows.
        let c = pool.alloc(32);
        assert_eq!(c, a);
        assert_eq!(pool.stats().free, 0);
        assert_eq!(pool.get(c).width(), 32);
    }

    #[test]
    fn enumeration_sees_freed_nodes_as_width_zero() {
        let mut pool = NodePool::new();
        let a = pool.alloc(32);
        let _b = pool.alloc(32);
        pool.free(a);

        let widths: Vec<u8> = pool.enumerate().map(|(_, n)| n.width()).collect();
        assert_eq!(widths, vec![0, 32]);
        assert_eq!(pool.live_ids().len(), 1);
    }

    #[test]
    fn pow2_rounding() {
        assert_eq!(pow2_capacity(0), 4);
        assert_eq!(pow2_capacity(3), 4);
        assert_eq!(pow2_capacity(5), 8);
        assert_eq!(pow2_capacity(64), 64);
        assert_eq!(pow2_capacity(65), 128);
    }

    #[test]
    fn peak_tracks_high_water() {
        let mut pool = NodePool::new();
        let ids: Vec<_> = (0..5).map(|_| pool.alloc(1)).collect();
        for id in ids {
            pool.free(id);
        }
        assert_eq!(pool.stats().live, 0);
        assert_eq!(pool.stats().peak_live, 5);
    }
}
