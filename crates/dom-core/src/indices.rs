//! Id / tag-name / class-token index maps.
//!
//! [§ 3.6 Index maps](https://dom.spec.whatwg.org/#concept-id)
//!
//! Each map is a multi-map from an interned key to the elements currently
//! carrying it, kept roughly in sync by the mutation engine as attributes and
//! subtrees change. Entries are allowed to go stale (an element detached
//! without the map being told): every lookup filters out dead weak
//! references and, for `id_map`, re-derives document order rather than
//! trusting insertion order, per `spec_full.md` §C.2.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::node::{NodeRef, WeakNodeRef};
use crate::string_pool::Atom;

/// A multi-map from an interned key to the (possibly stale) elements
/// carrying it.
#[derive(Default)]
struct KeyedIndex {
    entries: HashMap<Atom, Vec<WeakNodeRef>>,
}

impl KeyedIndex {
    fn insert(&mut self, key: Atom, node: &NodeRef) {
        self.entries
            .entry(key)
            .or_default()
            .push(std::rc::Rc::downgrade(node));
    }

    fn remove(&mut self, key: &Atom, node: &NodeRef) {
        if let Some(list) = self.entries.get_mut(key) {
            list.retain(|weak| {
                weak.upgrade()
                    .is_some_and(|existing| !std::rc::Rc::ptr_eq(&existing, node))
            });
        }
    }

    fn live_candidates(&self, key: &str) -> Vec<NodeRef> {
        self.entries
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(std::rc::Weak::upgrade)
            .collect()
    }
}

/// The three index maps a [`Document`](crate::document::Document) maintains.
///
/// [§ 3.6](https://dom.spec.whatwg.org/#concept-id)
#[derive(Default)]
pub struct Indices {
    id_map: KeyedIndex,
    tag_map: KeyedIndex,
    class_map: KeyedIndex,
}

impl Indices {
    /// Create empty index maps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `node` as carrying id `id`.
    pub fn insert_id(&mut self, id: Atom, node: &NodeRef) {
        self.id_map.insert(id, node);
    }

    /// Forget that `node` carries id `id`.
    pub fn remove_id(&mut self, id: &Atom, node: &NodeRef) {
        self.id_map.remove(id, node);
    }

    /// Record `node` as carrying tag name `tag`.
    pub fn insert_tag(&mut self, tag: Atom, node: &NodeRef) {
        self.tag_map.insert(tag, node);
    }

    /// Forget that `node` carries tag name `tag`.
    pub fn remove_tag(&mut self, tag: &Atom, node: &NodeRef) {
        self.tag_map.remove(tag, node);
    }

    /// Record `node` as carrying class token `class`.
    pub fn insert_class(&mut self, class: Atom, node: &NodeRef) {
        self.class_map.insert(class, node);
    }

    /// Forget that `node` carries class token `class`.
    pub fn remove_class(&mut self, class: &Atom, node: &NodeRef) {
        self.class_map.remove(class, node);
    }

    /// Find the element with `id` that sorts first in document order, if
    /// any element still carries it.
    ///
    /// [§ 3.6 / § 8 P3](https://dom.spec.whatwg.org/#dom-nonelementparentnode-getelementbyid)
    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<NodeRef> {
        let mut candidates = self.id_map.live_candidates(id);
        if candidates.len() > 1 {
            dom_common::warning::warn_once(
                "indices",
                &format!("id \"{id}\" is carried by more than one element; resolving by document order"),
            );
        }
        candidates.sort_by(|a, b| compare_document_order(a, b));
        candidates.into_iter().next()
    }

    /// All currently-live elements carrying tag name `tag`.
    #[must_use]
    pub fn get_by_tag(&self, tag: &str) -> Vec<NodeRef> {
        self.tag_map.live_candidates(tag)
    }

    /// All currently-live elements carrying class token `class`.
    #[must_use]
    pub fn get_by_class(&self, class: &str) -> Vec<NodeRef> {
        self.class_map.live_candidates(class)
    }
}

/// Compare two nodes by tree (preorder, depth-first) document order.
///
/// Both nodes must be reachable from the same root; nodes from unrelated
/// trees compare equal (callers only use this to order elements that are
/// known to share a document).
///
/// [§ 4.6 fast paths](https://dom.spec.whatwg.org/#dom-parentnode-queryselector)
/// — exposed so callers outside this module (the selector engine's
/// id/tag/class index fast paths) can sort index hits into document order
/// without re-deriving tree-order comparison themselves.
#[must_use]
pub fn compare_document_order(a: &NodeRef, b: &NodeRef) -> Ordering {
    if std::rc::Rc::ptr_eq(a, b) {
        return Ordering::Equal;
    }
    let ancestors_a = ancestor_chain(a);
    let ancestors_b = ancestor_chain(b);
    let common_len = ancestors_a
        .iter()
        .zip(ancestors_b.iter())
        .take_while(|(x, y)| std::rc::Rc::ptr_eq(x, y))
        .count();

    let next_a = ancestors_a.get(common_len);
    let next_b = ancestors_b.get(common_len);
    match (next_a, next_b) {
        (Some(x), Some(y)) => sibling_order(x, y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// The chain of nodes from the tree root down to (and including) `node`.
fn ancestor_chain(node: &NodeRef) -> Vec<NodeRef> {
    let mut chain = vec![NodeRef::clone(node)];
    let mut current = NodeRef::clone(node);
    while let Some(parent) = current.parent() {
        chain.push(NodeRef::clone(&parent));
        current = parent;
    }
    chain.reverse();
    chain
}

/// Order two distinct siblings by walking forward from `a` through
/// `next_sibling` links.
fn sibling_order(a: &NodeRef, b: &NodeRef) -> Ordering {
    let mut cursor = a.next_sibling();
    while let Some(node) = cursor {
        if std::rc::Rc::ptr_eq(&node, b) {
            return Ordering::Less;
        }
        cursor = node.next_sibling();
    }
    Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::element;
    use crate::mutation::append_child;

    #[test]
    fn get_by_id_picks_the_document_order_winner_among_duplicates() {
        let doc = Document::new();
        let root = doc.create_element("div", None);
        append_child(&doc.root(), &root).unwrap();
        let first = doc.create_element("span", None);
        let second = doc.create_element("span", None);
        append_child(&root, &first).unwrap();
        append_child(&root, &second).unwrap();

        element::set_attribute(&second, "id", "dup").unwrap();
        element::set_attribute(&first, "id", "dup").unwrap();

        let found = doc.get_element_by_id("dup").unwrap();
        assert!(std::rc::Rc::ptr_eq(&found, &first));
    }

    #[test]
    fn a_removed_elements_id_no_longer_resolves() {
        let doc = Document::new();
        let root = doc.create_element("div", None);
        append_child(&doc.root(), &root).unwrap();
        let child = doc.create_element("span", None);
        element::set_attribute(&child, "id", "gone").unwrap();
        append_child(&root, &child).unwrap();

        crate::mutation::remove_child(&root, &child).unwrap();

        assert!(doc.get_element_by_id("gone").is_none());
    }

    #[test]
    fn get_by_tag_and_class_return_every_live_carrier() {
        let doc = Document::new();
        let root = doc.create_element("div", None);
        append_child(&doc.root(), &root).unwrap();
        let a = doc.create_element("li", None);
        element::set_attribute(&a, "class", "item").unwrap();
        let b = doc.create_element("li", None);
        element::set_attribute(&b, "class", "item").unwrap();
        append_child(&root, &a).unwrap();
        append_child(&root, &b).unwrap();

        assert_eq!(doc.shared().indices().borrow().get_by_tag("li").len(), 2);
        assert_eq!(doc.shared().indices().borrow().get_by_class("item").len(), 2);
    }
}
