//! Per-[`Document`](crate::document::Document) string interning.
//!
//! Tag names, attribute names and class tokens are compared constantly by
//! the indices and the selector matcher. Interning them once per document and
//! comparing by pointer turns every such comparison into a single `usize`
//! check instead of a byte-wise scan.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// An interned string handle.
///
/// Two [`Atom`]s produced by the same [`StringPool`] are equal if and only if
/// they were interned from equal strings; equality is checked by pointer, not
/// by content, so it is only meaningful to compare atoms drawn from the same
/// pool (i.e. the same document).
#[derive(Clone, Eq)]
pub struct Atom(Rc<str>);

impl Atom {
    /// Borrow the interned string's contents.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::hash::Hash for Atom {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Hash by content so atoms can be used as map keys even when callers
        // hold atoms interned from *different* pools (e.g. a selector's
        // literal strings, interned into a throwaway pool, looked up against
        // a document's index maps).
        self.0.hash(state);
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({:?})", self.0)
    }
}

impl std::borrow::Borrow<str> for Atom {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A deduplicating store of interned strings, owned by a single
/// [`Document`](crate::document::Document).
#[derive(Default)]
pub struct StringPool {
    entries: RefCell<HashSet<Rc<str>>>,
}

impl StringPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `value`, returning the existing atom if an equal string was
    /// interned before, or a freshly allocated one otherwise.
    #[must_use]
    pub fn intern(&self, value: &str) -> Atom {
        let mut entries = self.entries.borrow_mut();
        if let Some(existing) = entries.get(value) {
            return Atom(Rc::clone(existing));
        }
        let rc: Rc<str> = Rc::from(value);
        let _ = entries.insert(Rc::clone(&rc));
        Atom(rc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_text_twice_returns_pointer_equal_atoms() {
        let pool = StringPool::new();
        let a = pool.intern("div");
        let b = pool.intern("div");
        assert!(Rc::ptr_eq(&a.0, &b.0));
        assert_eq!(a, b);
    }

    #[test]
    fn atoms_from_different_pools_are_not_pointer_equal_but_hash_the_same() {
        let pool_a = StringPool::new();
        let pool_b = StringPool::new();
        let a = pool_a.intern("div");
        let b = pool_b.intern("div");
        assert_ne!(a, b);

        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher_a = DefaultHasher::new();
        a.hash(&mut hasher_a);
        let mut hasher_b = DefaultHasher::new();
        b.hash(&mut hasher_b);
        assert_eq!(hasher_a.finish(), hasher_b.finish());
    }

    #[test]
    fn distinct_text_interns_to_distinct_atoms() {
        let pool = StringPool::new();
        assert_ne!(pool.intern("div"), pool.intern("span"));
    }
}
