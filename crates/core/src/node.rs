//! Series nodes
//!
//! Every series — block, text, binary, paramlist, varlist, pairlist — is a
//! uniform [`Node`] drawn from the pool. A node either embeds a single cell
//! (length 0/1 arrays, e.g. function body holders) or owns an out-of-line
//! [`Buffer`] with biased head/tail queuing. Two side slots, `link` and
//! `misc`, carry role-dependent references.
//!
//! ```text
//! ┌─────────┬──────────────────────────────┬────────┬────────┐
//! │ flags   │ content: Embedded(cell)      │ link   │ misc   │
//! │ info    │        | Cells{data,bias,len}│        │        │
//! │ width   │        | Bytes{data,bias,len}│        │        │
//! └─────────┴──────────────────────────────┴────────┴────────┘
//! ```
//!
//! Freed nodes have width 0 and sit on the pool freelist; enumeration uses
//! that invariant to tell live from free.

use std::collections::HashMap;
use std::num::NonZeroU32;

use crate::cell::Cell;
use crate::flags::{NodeFlags, NodeInfo};
use crate::symbol::Sym;

/// Handle to a pooled node. `Option<NodeId>` costs nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> NodeId {
        NodeId(NonZeroU32::new(index as u32 + 1).expect("node pool overflow"))
    }

    pub(crate) fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

/// Element bytes of a cell-width series.
pub const CELL_WIDTH: u8 = 32;

/// Maximum head bias before a compaction resets it to zero.
pub const MAX_BIAS: u32 = 4096;

/// Out-of-line series data. Live elements occupy `data[bias .. bias+len]`;
/// arrays additionally keep a terminator at `data[bias+len]`. `rest` —
/// spare capacity past the live range — is whatever the backing vector has
/// room for.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer<T> {
    pub data: Vec<T>,
    pub bias: u32,
    pub len: u32,
}

impl<T: Clone + Default> Buffer<T> {
    pub fn with_capacity(capacity: usize) -> Buffer<T> {
        Buffer {
            data: Vec::with_capacity(capacity),
            bias: 0,
            len: 0,
        }
    }

    pub fn head(&self) -> usize {
        self.bias as usize
    }

    pub fn live(&self) -> &[T] {
        &self.data[self.bias as usize..(self.bias + self.len) as usize]
    }

    pub fn live_mut(&mut self) -> &mut [T] {
        &mut self.data[self.bias as usize..(self.bias + self.len) as usize]
    }

    /// Slide live data back to the start of the allocation, zeroing bias.
    pub fn compact(&mut self) {
        if self.bias == 0 {
            return;
        }
        self.data.drain(..self.bias as usize);
        self.bias = 0;
    }
}

/// Hashable projection of a cell, for map pairlist indexes. Only kinds with
/// stable content equality participate; others fall back to a linear scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Integer(i64),
    Char(char),
    Logic(bool),
    /// Canon symbol of any word kind.
    Word(Sym),
    /// Owned copy of text content at hash time.
    Text(Box<str>),
}

/// Node content; the `Free` arm only appears on freelist entries.
#[derive(Debug)]
pub enum Content {
    Free { next_free: Option<NodeId> },
    /// Single-cell storage for length 0/1 arrays; the node self-terminates
    /// (reads past the embedded length yield an end sentinel).
    Embedded { cell: Cell, len: u8 },
    Cells(Buffer<Cell>),
    Bytes(Buffer<u8>),
}

/// Role-dependent primary side slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Link {
    None,
    /// Varlist → its keylist.
    Keylist(NodeId),
    /// Facade/paramlist → the underlying function's paramlist.
    Underlying(NodeId),
    /// Body holder → specialization exemplar frame.
    Exemplar(NodeId),
    /// Source array provenance.
    FileLine { file: Sym, line: u32 },
}

/// Role-dependent secondary side slot.
#[derive(Debug)]
pub enum Misc {
    None,
    /// Paramlist → documentation/meta context.
    Meta(NodeId),
    /// Body holder → index into the engine's dispatcher table.
    Dispatcher(u32),
    /// Pairlist → hash index over keys (1-based pair positions).
    Hashlist(HashMap<MapKey, u32>),
}

/// A pooled series node.
#[derive(Debug)]
pub struct Node {
    pub flags: NodeFlags,
    pub info: NodeInfo,
    width: u8,
    pub content: Content,
    pub link: Link,
    pub misc: Misc,
}

impl Node {
    pub(crate) fn freed(next_free: Option<NodeId>) -> Node {
        Node {
            flags: NodeFlags::empty(),
            info: NodeInfo::empty(),
            width: 0,
            content: Content::Free { next_free },
            link: Link::None,
            misc: Misc::None,
        }
    }

    pub(crate) fn set_width(&mut self, width: u8) {
        self.width = width;
    }

    /// Element width in bytes; 0 identifies a freed node.
    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn is_free(&self) -> bool {
        self.width == 0
    }

    pub fn is_array(&self) -> bool {
        self.flags.contains(NodeFlags::ARRAY)
    }

    pub fn is_managed(&self) -> bool {
        self.info.contains(NodeInfo::MANAGED)
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        match &self.content {
            Content::Free { .. } => 0,
            Content::Embedded { len, .. } => *len as usize,
            Content::Cells(buf) => buf.len as usize,
            Content::Bytes(buf) => buf.len as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read an array slot; positions at or past the length answer the end
    /// sentinel (physical for dynamic arrays, synthesized for embedded
    /// content).
    pub fn at(&self, index: usize) -> Cell {
        debug_assert!(self.is_array(), "cell access on a non-array series");
        match &self.content {
            Content::Embedded { cell, len } => {
                if index < *len as usize {
                    *cell
                } else {
                    Cell::end()
                }
            }
            Content::Cells(buf) => {
                if index < buf.len as usize {
                    buf.data[buf.bias as usize + index]
                } else {
                    Cell::end()
                }
            }
            _ => Cell::end(),
        }
    }

    /// Bytes of a text/binary series.
    pub fn bytes(&self) -> &[u8] {
        match &self.content {
            Content::Bytes(buf) => buf.live(),
            _ => &[],
        }
    }

    /// UTF-8 view of a text series.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.bytes()).expect("text series holds valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::NodeFlags;

    fn array_node(cells: Vec<Cell>) -> Node {
        let len = cells.len() as u32;
        let mut data = cells;
        data.push(Cell::end());
        Node {
            flags: NodeFlags::ARRAY | NodeFlags::DYNAMIC,
            info: NodeInfo::empty(),
            width: CELL_WIDTH,
            content: Content::Cells(Buffer { data, bias: 0, len }),
            link: Link::None,
            misc: Misc::None,
        }
    }

    #[test]
    fn freed_nodes_have_width_zero() {
        let node = Node::freed(None);
        assert!(node.is_free());
        assert_eq!(node.width(), 0);
    }

    #[test]
    fn at_returns_end_past_length() {
        let node = array_node(vec![Cell::integer(1), Cell::integer(2)]);
        assert_eq!(node.at(0).as_integer(), Some(1));
        assert_eq!(node.at(1).as_integer(), Some(2));
        assert!(node.at(2).is_end());
        assert!(node.at(99).is_end());
    }

    #[test]
    fn embedded_content_self_terminates() {
        let node = Node {
            flags: NodeFlags::ARRAY,
            info: NodeInfo::empty(),
            width: CELL_WIDTH,
            content: Content::Embedded {
                cell: Cell::integer(42),
                len: 1,
            },
            link: Link::None,
            misc: Misc::None,
        };
        assert_eq!(node.len(), 1);
        assert_eq!(node.at(0).as_integer(), Some(42));
        assert!(node.at(1).is_end());
    }

    #[test]
    fn buffer_compact_resets_bias() {
        let mut buf = Buffer {
            data: vec![0u8, 1, 2, 3, 4],
            bias: 2,
            len: 3,
        };
        assert_eq!(buf.live(), &[2, 3, 4]);
        buf.compact();
        assert_eq!(buf.bias, 0);
        assert_eq!(buf.live(), &[2, 3, 4]);
    }
}
