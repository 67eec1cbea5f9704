//! Register file
//!
//! Three fixed-size rings (integers, strings, node handles). Offsets count
//! back from the most recently claimed slot and wrap, so every offset is
//! valid. Evicting a node is the caller's business: the ring only hands the
//! old handle back.

use std::fmt::Write;

use arbor_dom::NodeId;

/// Slots per ring
pub const REG_COUNT: usize = 8;
const REG_MASK: usize = REG_COUNT - 1;

/// One typed ring buffer
#[derive(Debug, Clone)]
pub struct Ring<T> {
    slots: [T; REG_COUNT],
    cursor: usize,
}

impl<T: Default> Default for Ring<T> {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| T::default()),
            cursor: 0,
        }
    }
}

impl<T: Default> Ring<T> {
    #[inline]
    fn index(&self, offset: usize) -> usize {
        self.cursor.wrapping_sub(offset).wrapping_sub(1) & REG_MASK
    }

    /// Value at `offset` (0 = newest)
    #[inline]
    pub fn get(&self, offset: usize) -> &T {
        &self.slots[self.index(offset)]
    }

    /// Store a value at `offset`, returning the previous one
    pub fn replace(&mut self, offset: usize, value: T) -> T {
        let idx = self.index(offset);
        std::mem::replace(&mut self.slots[idx], value)
    }

    /// Claim a fresh head slot, returning what it held
    ///
    /// The new head is left empty.
    pub fn advance(&mut self) -> T {
        let idx = self.cursor & REG_MASK;
        self.cursor = (idx + 1) & REG_MASK;
        std::mem::take(&mut self.slots[idx])
    }

    /// Raw slots in storage order
    pub fn slots(&self) -> &[T; REG_COUNT] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [T; REG_COUNT] {
        &mut self.slots
    }
}

/// The three rings of one run
#[derive(Debug, Clone, Default)]
pub struct Registers {
    pub ints: Ring<i32>,
    pub strings: Ring<Option<String>>,
    pub nodes: Ring<Option<NodeId>>,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every node handle currently held, in storage order
    pub fn held_nodes(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.nodes
            .slots()
            .iter()
            .enumerate()
            .filter_map(|(slot, n)| n.map(|n| (slot, n)))
    }

    /// Short operand dump for diagnostics, newest first
    pub fn snapshot(&self) -> String {
        let mut out = String::new();
        for offset in 0..4 {
            match self.nodes.get(offset) {
                Some(node) => {
                    let _ = write!(out, "n{}={} ", offset, node);
                }
                None => {
                    let _ = write!(out, "n{}=- ", offset);
                }
            }
        }
        for offset in 0..3 {
            let _ = write!(out, "s{}=", offset);
            match self.strings.get(offset) {
                Some(s) => {
                    let preview: String = s.chars().take(20).collect();
                    let _ = write!(out, "{:?} ", preview);
                }
                None => out.push_str("- "),
            }
        }
        for offset in 0..2 {
            let _ = write!(out, "i{}={} ", offset, self.ints.get(offset));
        }
        out.truncate(out.trim_end().len());
        out
    }
}
