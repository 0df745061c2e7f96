//! Per-document compiled-selector cache.
//!
//! [§ 4.5 / § A.1 Selector cache](https://dom.spec.whatwg.org/#parse-a-selector)
//!
//! Parsing a selector string is the expensive part of every query; an LRU
//! cache keyed by the source string means a selector used repeatedly
//! (`querySelectorAll` called in a loop, a `matches()` check run per
//! candidate) is only tokenized and parsed once. The cache attaches to a
//! [`DocumentShared`]'s type-erased `ext` slot rather than living as a typed
//! field there, keeping the one-way `dom-core` → `dom-selectors` layering
//! intact.

use std::any::Any;
use std::num::NonZeroUsize;
use std::rc::Rc;

use dom_core::document::DocumentShared;
use lru::LruCache;

use crate::ast::SelectorList;
use crate::parser::{parse_selector_list, ParseError};

/// The default number of distinct selector strings a document's cache
/// retains before evicting the least recently used entry.
///
/// [§ A.1](https://dom.spec.whatwg.org/#parse-a-selector)
pub const DEFAULT_SELECTOR_CACHE_CAPACITY: usize = 256;

/// An LRU cache from selector source text to its parsed, reference-counted
/// AST.
pub struct SelectorCache {
    entries: std::cell::RefCell<LruCache<String, Rc<SelectorList>>>,
}

impl SelectorCache {
    /// Build a cache holding at most `capacity` distinct selector strings.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: std::cell::RefCell::new(LruCache::new(capacity)),
        }
    }

    /// Return `source`'s parsed selector list, parsing and caching it on a
    /// miss.
    ///
    /// # Errors
    ///
    /// Propagates [`ParseError`] from the parser; a failed parse is not
    /// cached.
    pub fn get_or_parse(&self, source: &str) -> Result<Rc<SelectorList>, ParseError> {
        if let Some(existing) = self.entries.borrow_mut().get(source) {
            return Ok(Rc::clone(existing));
        }
        let parsed = Rc::new(parse_selector_list(source)?);
        let _ = self.entries.borrow_mut().put(source.to_owned(), Rc::clone(&parsed));
        Ok(parsed)
    }
}

impl Default for SelectorCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SELECTOR_CACHE_CAPACITY)
    }
}

/// Return (attaching on first use) the [`SelectorCache`] living in
/// `document`'s extension slot.
fn cache_for(document: &DocumentShared) -> Rc<SelectorCache> {
    {
        let ext = document.ext.borrow();
        if let Some(existing) = ext.as_ref().and_then(|boxed| boxed.downcast_ref::<Rc<SelectorCache>>()) {
            return Rc::clone(existing);
        }
    }
    let cache = Rc::new(SelectorCache::default());
    let boxed: Box<dyn Any> = Box::new(Rc::clone(&cache));
    *document.ext.borrow_mut() = Some(boxed);
    cache
}

/// Parse `source` against `document`'s cache, reusing a prior parse of the
/// same source string if one is still cached.
///
/// # Errors
///
/// Propagates [`ParseError`] from the parser.
pub fn parse_cached(document: &DocumentShared, source: &str) -> Result<Rc<SelectorList>, ParseError> {
    cache_for(document).get_or_parse(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_core::document::Document;

    #[test]
    fn repeated_parse_returns_the_same_ast_instance() {
        let doc = Document::new();
        let first = parse_cached(doc.shared(), "div.active").unwrap();
        let second = parse_cached(doc.shared(), "div.active").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn invalid_selector_is_not_cached_as_a_success() {
        let doc = Document::new();
        assert!(parse_cached(doc.shared(), "").is_err());
        assert!(parse_cached(doc.shared(), "div").is_ok());
    }
}
