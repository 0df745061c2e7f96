//! `NodeIterator` and `TreeWalker`.
//!
//! [§ 4.9 NodeIterator](https://dom.spec.whatwg.org/#interface-nodeiterator)
//! [§ 4.10 TreeWalker](https://dom.spec.whatwg.org/#interface-treewalker)
//!
//! Both traverse a `root`'s subtree in document order, filtered by a
//! `what_to_show` bitmask and an optional predicate. `NodeIterator` also
//! registers with its document so that removing its `reference_node` from
//! the tree repositions it instead of leaving it dangling, per
//! [§ 6.1](https://dom.spec.whatwg.org/#nodeiterator-pre-removing-steps).

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use bitflags::bitflags;

use crate::node::{Node, NodeRef, NodeType};

bitflags! {
    /// Which node types a traversal object should show.
    ///
    /// [§ 4.9 NodeFilter.SHOW_*](https://dom.spec.whatwg.org/#interface-nodefilter)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WhatToShow: u32 {
        /// Show element nodes.
        const ELEMENT = 1 << 0;
        /// Show attribute nodes (only reachable by walking to `ownerElement`).
        const ATTRIBUTE = 1 << 1;
        /// Show text nodes.
        const TEXT = 1 << 2;
        /// Show CDATA section nodes.
        const CDATA_SECTION = 1 << 3;
        /// Show processing instruction nodes.
        const PROCESSING_INSTRUCTION = 1 << 6;
        /// Show comment nodes.
        const COMMENT = 1 << 7;
        /// Show document nodes.
        const DOCUMENT = 1 << 8;
        /// Show doctype nodes.
        const DOCUMENT_TYPE = 1 << 9;
        /// Show document fragment nodes.
        const DOCUMENT_FRAGMENT = 1 << 10;
        /// Show every node type.
        const ALL = u32::MAX;
    }
}

impl WhatToShow {
    fn accepts(self, node_type: NodeType) -> bool {
        let bit = match node_type {
            NodeType::Element => Self::ELEMENT,
            NodeType::Attr => Self::ATTRIBUTE,
            NodeType::Text => Self::TEXT,
            NodeType::CdataSection => Self::CDATA_SECTION,
            NodeType::ProcessingInstruction => Self::PROCESSING_INSTRUCTION,
            NodeType::Comment => Self::COMMENT,
            NodeType::Document => Self::DOCUMENT,
            NodeType::DocumentType => Self::DOCUMENT_TYPE,
            NodeType::DocumentFragment => Self::DOCUMENT_FRAGMENT,
        };
        self.contains(bit)
    }
}

/// Whether a filter predicate accepts, skips, or rejects (and skips its
/// subtree) a candidate node.
///
/// [§ 4.9](https://dom.spec.whatwg.org/#interface-nodefilter)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// Accept the node.
    Accept,
    /// Skip the node but still visit its descendants (`NodeIterator`) or
    /// children (`TreeWalker`).
    Skip,
    /// Reject the node and skip its subtree entirely (`TreeWalker` only;
    /// `NodeIterator` treats this the same as `Skip`).
    Reject,
}

/// A user-supplied acceptance predicate, run after the `what_to_show` mask.
pub type NodeFilterFn = Rc<dyn Fn(&NodeRef) -> FilterResult>;

fn node_matches(node: &NodeRef, what_to_show: WhatToShow, filter: Option<&NodeFilterFn>) -> FilterResult {
    if !what_to_show.accepts(node.node_type()) {
        return FilterResult::Skip;
    }
    match filter {
        Some(filter) => filter(node),
        None => FilterResult::Accept,
    }
}

/// Registration kept by a document so a live `NodeIterator` can be told
/// about removals ahead of time.
///
/// [§ 6.1](https://dom.spec.whatwg.org/#nodeiterator-pre-removing-steps)
pub struct TraversalRegistration {
    pub(crate) iterator: Weak<NodeIteratorShared>,
}

/// The shared, mutable state behind a [`NodeIterator`].
pub struct NodeIteratorShared {
    root: NodeRef,
    what_to_show: WhatToShow,
    filter: Option<NodeFilterFn>,
    reference: RefCell<NodeRef>,
    pointer_before_reference: Cell<bool>,
}

/// A forward/backward cursor over a subtree in document order.
///
/// [§ 4.9](https://dom.spec.whatwg.org/#interface-nodeiterator)
#[derive(Clone)]
pub struct NodeIterator {
    shared: Rc<NodeIteratorShared>,
}

impl NodeIterator {
    /// Create an iterator rooted at `root`, registering it with `root`'s
    /// owner document (if any) for pre-removal repositioning.
    #[must_use]
    pub fn new(root: &NodeRef, what_to_show: WhatToShow, filter: Option<NodeFilterFn>) -> Self {
        let shared = Rc::new(NodeIteratorShared {
            root: NodeRef::clone(root),
            what_to_show,
            filter,
            reference: RefCell::new(NodeRef::clone(root)),
            pointer_before_reference: Cell::new(true),
        });
        if let Some(owner) = root.owner_document() {
            owner.traversals.borrow_mut().push(TraversalRegistration {
                iterator: Rc::downgrade(&shared),
            });
        }
        Self { shared }
    }

    /// The subtree root this iterator traverses.
    #[must_use]
    pub fn root(&self) -> NodeRef {
        NodeRef::clone(&self.shared.root)
    }

    /// Advance to and return the next matching node, or `None` if the
    /// traversal has reached the end.
    ///
    /// [§ 4.9](https://dom.spec.whatwg.org/#dom-nodeiterator-nextnode)
    pub fn next_node(&self) -> Option<NodeRef> {
        let mut candidate = NodeRef::clone(&self.shared.reference.borrow());
        let mut before = self.shared.pointer_before_reference.get();
        loop {
            if before {
                before = false;
            } else {
                match next_in_tree_order(&candidate, &self.shared.root) {
                    Some(next) => candidate = next,
                    None => return None,
                }
            }
            if node_matches(&candidate, self.shared.what_to_show, self.shared.filter.as_ref())
                == FilterResult::Accept
            {
                *self.shared.reference.borrow_mut() = NodeRef::clone(&candidate);
                self.shared.pointer_before_reference.set(false);
                return Some(candidate);
            }
        }
    }

    /// Move to and return the previous matching node, or `None` if the
    /// traversal has reached the start.
    ///
    /// [§ 4.9](https://dom.spec.whatwg.org/#dom-nodeiterator-previousnode)
    pub fn previous_node(&self) -> Option<NodeRef> {
        let mut candidate = NodeRef::clone(&self.shared.reference.borrow());
        let mut after = !self.shared.pointer_before_reference.get();
        loop {
            if after {
                after = false;
            } else {
                match previous_in_tree_order(&candidate, &self.shared.root) {
                    Some(previous) => candidate = previous,
                    None => return None,
                }
            }
            if node_matches(&candidate, self.shared.what_to_show, self.shared.filter.as_ref())
                == FilterResult::Accept
            {
                *self.shared.reference.borrow_mut() = NodeRef::clone(&candidate);
                self.shared.pointer_before_reference.set(true);
                return Some(candidate);
            }
        }
    }
}

fn next_in_tree_order(node: &NodeRef, root: &NodeRef) -> Option<NodeRef> {
    if let Some(child) = node.first_child() {
        return Some(child);
    }
    let mut current = NodeRef::clone(node);
    loop {
        if Rc::ptr_eq(&current, root) {
            return None;
        }
        if let Some(sibling) = current.next_sibling() {
            return Some(sibling);
        }
        current = current.parent()?;
    }
}

fn previous_in_tree_order(node: &NodeRef, root: &NodeRef) -> Option<NodeRef> {
    if Rc::ptr_eq(node, root) {
        return None;
    }
    if let Some(sibling) = node.previous_sibling() {
        let mut deepest = sibling;
        while let Some(child) = deepest.last_child() {
            deepest = child;
        }
        return Some(deepest);
    }
    node.parent()
}

/// Apply the "pre-removing steps" to every live [`NodeIterator`] registered
/// on `node`'s document, just before `node` is detached from the tree.
///
/// [§ 6.1](https://dom.spec.whatwg.org/#nodeiterator-pre-removing-steps)
pub(crate) fn notify_pre_remove(node: &NodeRef) {
    let Some(owner) = node.owner_document() else {
        return;
    };
    let mut registrations = owner.traversals.borrow_mut();
    registrations.retain(|registration| registration.iterator.strong_count() > 0);
    for registration in registrations.iter() {
        if let Some(shared) = registration.iterator.upgrade() {
            reposition_for_removal(&shared, node);
        }
    }
}

fn reposition_for_removal(shared: &NodeIteratorShared, removed: &NodeRef) {
    let reference = shared.reference.borrow().clone();
    if !is_inclusive_ancestor(removed, &reference) {
        return;
    }
    if shared.pointer_before_reference.get() {
        if let Some(next) = next_sibling_outside(removed) {
            *shared.reference.borrow_mut() = next;
            return;
        }
        if let Some(parent) = removed.parent() {
            *shared.reference.borrow_mut() = parent;
            shared.pointer_before_reference.set(false);
        }
        return;
    }
    if let Some(previous) = previous_sibling_or_parent(removed) {
        *shared.reference.borrow_mut() = previous;
    }
}

fn is_inclusive_ancestor(ancestor: &NodeRef, node: &NodeRef) -> bool {
    let mut current = Some(NodeRef::clone(node));
    while let Some(candidate) = current {
        if Rc::ptr_eq(&candidate, ancestor) {
            return true;
        }
        current = candidate.parent();
    }
    false
}

fn next_sibling_outside(node: &NodeRef) -> Option<NodeRef> {
    let mut current = NodeRef::clone(node);
    loop {
        if let Some(sibling) = current.next_sibling() {
            return Some(sibling);
        }
        current = current.parent()?;
    }
}

fn previous_sibling_or_parent(node: &NodeRef) -> Option<NodeRef> {
    node.previous_sibling().or_else(|| node.parent())
}

/// A cursor over a subtree that can move along parent/child/sibling axes,
/// skipping nodes the filter rejects.
///
/// [§ 4.10](https://dom.spec.whatwg.org/#interface-treewalker)
pub struct TreeWalker {
    root: NodeRef,
    what_to_show: WhatToShow,
    filter: Option<NodeFilterFn>,
    current: RefCell<NodeRef>,
}

impl TreeWalker {
    /// Create a walker rooted at `root`, initially positioned on `root`.
    #[must_use]
    pub fn new(root: &NodeRef, what_to_show: WhatToShow, filter: Option<NodeFilterFn>) -> Self {
        Self {
            root: NodeRef::clone(root),
            what_to_show,
            filter,
            current: RefCell::new(NodeRef::clone(root)),
        }
    }

    /// This walker's current node.
    #[must_use]
    pub fn current_node(&self) -> NodeRef {
        self.current.borrow().clone()
    }

    /// Set the current node directly, without applying the filter.
    ///
    /// [§ 4.10](https://dom.spec.whatwg.org/#dom-treewalker-currentnode)
    pub fn set_current_node(&self, node: NodeRef) {
        *self.current.borrow_mut() = node;
    }

    fn accept(&self, node: &NodeRef) -> FilterResult {
        node_matches(node, self.what_to_show, self.filter.as_ref())
    }

    /// Move to the first matching child of the current node.
    ///
    /// [§ 4.10](https://dom.spec.whatwg.org/#dom-treewalker-firstchild)
    pub fn first_child(&self) -> Option<NodeRef> {
        self.traverse_children(true)
    }

    /// Move to the last matching child of the current node.
    ///
    /// [§ 4.10](https://dom.spec.whatwg.org/#dom-treewalker-lastchild)
    pub fn last_child(&self) -> Option<NodeRef> {
        self.traverse_children(false)
    }

    fn traverse_children(&self, forward: bool) -> Option<NodeRef> {
        let parent = self.current.borrow().clone();
        let mut candidate = if forward { parent.first_child() } else { parent.last_child() };
        while let Some(node) = candidate {
            match self.accept(&node) {
                FilterResult::Accept => {
                    *self.current.borrow_mut() = NodeRef::clone(&node);
                    return Some(node);
                }
                FilterResult::Skip => {
                    let descended = if forward { node.first_child() } else { node.last_child() };
                    if let Some(descended) = descended {
                        candidate = Some(descended);
                        continue;
                    }
                    candidate = if forward { node.next_sibling() } else { node.previous_sibling() };
                }
                FilterResult::Reject => {
                    candidate = if forward { node.next_sibling() } else { node.previous_sibling() };
                }
            }
        }
        None
    }

    /// Move to the next matching sibling of the current node.
    ///
    /// [§ 4.10](https://dom.spec.whatwg.org/#dom-treewalker-nextsibling)
    pub fn next_sibling(&self) -> Option<NodeRef> {
        self.traverse_siblings(true)
    }

    /// Move to the previous matching sibling of the current node.
    ///
    /// [§ 4.10](https://dom.spec.whatwg.org/#dom-treewalker-previoussibling)
    pub fn previous_sibling(&self) -> Option<NodeRef> {
        self.traverse_siblings(false)
    }

    fn traverse_siblings(&self, forward: bool) -> Option<NodeRef> {
        let mut node = self.current.borrow().clone();
        if Rc::ptr_eq(&node, &self.root) {
            return None;
        }
        loop {
            let mut sibling = if forward { node.next_sibling() } else { node.previous_sibling() };
            while let Some(candidate) = sibling {
                match self.accept(&candidate) {
                    FilterResult::Accept => {
                        *self.current.borrow_mut() = NodeRef::clone(&candidate);
                        return Some(candidate);
                    }
                    FilterResult::Skip => {
                        let descended = if forward { candidate.first_child() } else { candidate.last_child() };
                        if let Some(descended) = descended {
                            node = candidate;
                            sibling = Some(descended);
                            continue;
                        }
                        sibling = if forward { candidate.next_sibling() } else { candidate.previous_sibling() };
                    }
                    FilterResult::Reject => {
                        sibling = if forward { candidate.next_sibling() } else { candidate.previous_sibling() };
                    }
                }
            }
            match node.parent() {
                Some(parent) if !Rc::ptr_eq(&parent, &self.root) && self.accept(&parent) != FilterResult::Reject => {
                    node = parent;
                }
                _ => return None,
            }
        }
    }

    /// Move to the next matching node in document order within `root`'s
    /// subtree, descending into children unless the current node was
    /// rejected.
    ///
    /// [§ 4.10](https://dom.spec.whatwg.org/#dom-treewalker-nextnode)
    pub fn next_node(&self) -> Option<NodeRef> {
        let mut node = self.current.borrow().clone();
        let mut descend = true;
        loop {
            let candidate = step_forward(&node, &self.root, descend)?;
            match self.accept(&candidate) {
                FilterResult::Accept => {
                    *self.current.borrow_mut() = NodeRef::clone(&candidate);
                    return Some(candidate);
                }
                FilterResult::Skip => {
                    node = candidate;
                    descend = true;
                }
                FilterResult::Reject => {
                    node = candidate;
                    descend = false;
                }
            }
        }
    }

    /// Move to the previous matching node in document order within `root`'s
    /// subtree.
    ///
    /// [§ 4.10](https://dom.spec.whatwg.org/#dom-treewalker-previousnode)
    pub fn previous_node(&self) -> Option<NodeRef> {
        let mut node = self.current.borrow().clone();
        let mut descend = true;
        loop {
            let candidate = step_backward(&node, &self.root, descend)?;
            match self.accept(&candidate) {
                FilterResult::Accept => {
                    *self.current.borrow_mut() = NodeRef::clone(&candidate);
                    return Some(candidate);
                }
                FilterResult::Skip => {
                    node = candidate;
                    descend = true;
                }
                FilterResult::Reject => {
                    node = candidate;
                    descend = false;
                }
            }
        }
    }

    /// Move to the current node's closest matching ancestor (or the root's
    /// parent chain if unfiltered).
    ///
    /// [§ 4.10](https://dom.spec.whatwg.org/#dom-treewalker-parentnode)
    pub fn parent_node(&self) -> Option<NodeRef> {
        let mut node = self.current.borrow().clone();
        if Rc::ptr_eq(&node, &self.root) {
            return None;
        }
        while let Some(parent) = node.parent() {
            if Rc::ptr_eq(&parent, &self.root) {
                return None;
            }
            if self.accept(&parent) == FilterResult::Accept {
                *self.current.borrow_mut() = NodeRef::clone(&parent);
                return Some(parent);
            }
            node = parent;
        }
        None
    }
}

/// Step one node forward in document order, bounded by `root`. When
/// `descend` is false the current node's children are skipped entirely (used
/// after a [`FilterResult::Reject`]).
fn step_forward(node: &NodeRef, root: &NodeRef, descend: bool) -> Option<NodeRef> {
    if descend {
        if let Some(child) = node.first_child() {
            return Some(child);
        }
    }
    let mut current = NodeRef::clone(node);
    loop {
        if Rc::ptr_eq(&current, root) {
            return None;
        }
        if let Some(sibling) = current.next_sibling() {
            return Some(sibling);
        }
        current = current.parent()?;
    }
}

/// Step one node backward in document order, bounded by `root`. When
/// `descend` is false a previous sibling's own subtree is not descended into
/// (used after a [`FilterResult::Reject`]).
fn step_backward(node: &NodeRef, root: &NodeRef, descend: bool) -> Option<NodeRef> {
    if Rc::ptr_eq(node, root) {
        return None;
    }
    if let Some(sibling) = node.previous_sibling() {
        if !descend {
            return Some(sibling);
        }
        let mut deepest = sibling;
        while let Some(child) = deepest.last_child() {
            deepest = child;
        }
        return Some(deepest);
    }
    node.parent()
}

/// Helpers for inspecting [`Node`] identity used by traversal arithmetic.
impl Node {
    /// Whether `self` and `other` are the exact same node.
    #[must_use]
    pub fn is_same_node(&self, other: &NodeRef) -> bool {
        std::ptr::eq(self, other.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::mutation::append_child;

    fn build_tree() -> (Document, NodeRef) {
        let doc = Document::new();
        let root = doc.create_element("root", None);
        append_child(&doc.root(), &root).unwrap();
        let a = doc.create_element("a", None);
        let b = doc.create_element("b", None);
        append_child(&root, &a).unwrap();
        append_child(&root, &b).unwrap();
        let a1 = doc.create_element("a1", None);
        append_child(&a, &a1).unwrap();
        (doc, root)
    }

    #[test]
    fn tree_walker_next_node_visits_in_document_order() {
        let (_doc, root) = build_tree();
        let walker = TreeWalker::new(&root, WhatToShow::ELEMENT, None);
        let first = walker.next_node().unwrap();
        assert_eq!(first.as_element().unwrap().tag.as_str(), "a");
        let second = walker.next_node().unwrap();
        assert_eq!(second.as_element().unwrap().tag.as_str(), "a1");
        let third = walker.next_node().unwrap();
        assert_eq!(third.as_element().unwrap().tag.as_str(), "b");
        assert!(walker.next_node().is_none());
    }

    #[test]
    fn tree_walker_previous_node_reverses_next_node() {
        let (_doc, root) = build_tree();
        let walker = TreeWalker::new(&root, WhatToShow::ELEMENT, None);
        while walker.next_node().is_some() {}
        assert_eq!(walker.current_node().as_element().unwrap().tag.as_str(), "b");
        let back = walker.previous_node().unwrap();
        assert_eq!(back.as_element().unwrap().tag.as_str(), "a1");
    }

    #[test]
    fn tree_walker_set_current_node_repositions_without_filtering() {
        let (_doc, root) = build_tree();
        let walker = TreeWalker::new(&root, WhatToShow::ELEMENT, None);
        let a = root.children().next().unwrap();
        walker.set_current_node(NodeRef::clone(&a));
        assert!(walker.current_node().is_same_node(&a));
    }
}
