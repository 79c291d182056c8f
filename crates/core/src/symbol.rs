//! Symbol interning
//!
//! Word spellings are interned engine-wide. Each distinct spelling gets a
//! stable [`Sym`]; spellings that differ only by case share a canon entry,
//! so word comparison and keylist matching are canon-id compares.
//!
//! Canon entries additionally carry a scratch binding index used by bulk
//! binding walks: the walk records the target context slot per symbol, then
//! zeroes the slots before returning. Safe points assert the table is empty.

use std::collections::HashMap;
use std::num::NonZeroU32;

/// Interned symbol id. `Option<Sym>` is pointer-width thanks to the niche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sym(NonZeroU32);

impl Sym {
    fn from_index(index: usize) -> Sym {
        Sym(NonZeroU32::new(index as u32 + 1).expect("symbol index overflow"))
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

struct SymbolEntry {
    spelling: Box<str>,
    canon: Sym,
    /// Scratch slot for bulk binds; 0 means unset.
    bind_index: u32,
}

/// Engine-wide interning table.
#[derive(Default)]
pub struct SymbolTable {
    by_spelling: HashMap<Box<str>, Sym>,
    entries: Vec<SymbolEntry>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Intern a spelling, returning its symbol. Case-variant spellings are
    /// distinct symbols sharing one canon.
    pub fn intern(&mut self, spelling: &str) -> Sym {
        if let Some(&sym) = self.by_spelling.get(spelling) {
            return sym;
        }
        let lowered = spelling.to_lowercase();
        let canon = if lowered == spelling {
            // This entry will be its own canon.
            Sym::from_index(self.entries.len())
        } else {
            self.intern(&lowered)
        };
        let sym = Sym::from_index(self.entries.len());
        self.entries.push(SymbolEntry {
            spelling: spelling.into(),
            canon,
            bind_index: 0,
        });
        self.by_spelling.insert(spelling.into(), sym);
        sym
    }

    /// The exact spelling this symbol was interned with.
    pub fn spelling(&self, sym: Sym) -> &str {
        &self.entries[sym.index()].spelling
    }

    /// Canon (case-folded) symbol for comparisons.
    pub fn canon(&self, sym: Sym) -> Sym {
        self.entries[sym.index()].canon
    }

    /// Case-insensitive word equality.
    pub fn same_word(&self, a: Sym, b: Sym) -> bool {
        self.canon(a) == self.canon(b)
    }

    /// Record a 1-based context slot for this symbol's canon during a bulk
    /// binding walk.
    pub fn set_bind_index(&mut self, sym: Sym, index: u32) {
        let canon = self.canon(sym);
        self.entries[canon.index()].bind_index = index;
    }

    /// Read the slot recorded for this symbol's canon (0 if unset).
    pub fn bind_index(&self, sym: Sym) -> u32 {
        let canon = self.canon(sym);
        self.entries[canon.index()].bind_index
    }

    /// Clear one scratch slot after a walk.
    pub fn clear_bind_index(&mut self, sym: Sym) {
        let canon = self.canon(sym);
        self.entries[canon.index()].bind_index = 0;
    }

    /// Debug check that no walk left slots behind.
    pub fn assert_bind_table_empty(&self) {
        debug_assert!(
            self.entries.iter().all(|e| e.bind_index == 0),
            "binding scratch table not cleared after walk"
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_stable() {
        let mut table = SymbolTable::new();
        let a = table.intern("append");
        let b = table.intern("append");
        assert_eq!(a, b);
        assert_eq!(table.spelling(a), "append");
    }

    #[test]
    fn case_variants_share_canon() {
        let mut table = SymbolTable::new();
        let lower = table.intern("foo");
        let upper = table.intern("FOO");
        let mixed = table.intern("Foo");
        assert_ne!(lower, upper);
        assert_eq!(table.canon(upper), lower);
        assert!(table.same_word(upper, mixed));
        assert!(table.same_word(lower, upper));
        let bar = table.intern("bar");
        assert!(!table.same_word(lower, bar));
    }

    #[test]
    fn bind_slots_follow_canon() {
        let mut table = SymbolTable::new();
        let lower = table.intern("x");
        let upper = table.intern("X");
        table.set_bind_index(upper, 3);
        assert_eq!(table.bind_index(lower), 3);
        table.clear_bind_index(lower);
        assert_eq!(table.bind_index(upper), 0);
        table.assert_bind_table_empty();
    }
}
