//! Tree mutation: insertion, removal, replacement.
//!
//! [§ 4.3 Mutation algorithms](https://dom.spec.whatwg.org/#mutation-algorithms)
//!
//! Every mutating entry point validates the whole operation before touching
//! any link (pre-insertion validity), then performs the link rewiring in one
//! pass, then updates indices, bumps the generation counter and queues
//! mutation records — per `spec_full.md`'s "§ 7 two-phase commit" framing:
//! validate-then-apply, never partially apply an invalid mutation.

use std::rc::Rc;

use dom_common::{DomError, DomResult};

use crate::document::DocumentShared;
use crate::node::{ElementData, Node, NodeRef, NodeType};
use crate::observer::{queue_record, MutationRecord};

/// Validate that `node` could be inserted as a child of `parent` before
/// `reference` (or appended, if `reference` is `None`).
///
/// [§ 4.2.1](https://dom.spec.whatwg.org/#concept-node-ensure-pre-insertion-validity)
fn ensure_pre_insertion_validity(
    parent: &NodeRef,
    node: &NodeRef,
    reference: Option<&NodeRef>,
) -> DomResult<()> {
    match parent.node_type() {
        NodeType::Document | NodeType::DocumentFragment | NodeType::Element => {}
        _ => {
            return Err(DomError::HierarchyRequest(
                "parent must be a document, document fragment or element".to_owned(),
            ))
        }
    }

    if is_inclusive_ancestor(node, parent) {
        return Err(DomError::HierarchyRequest(
            "node is an inclusive ancestor of parent".to_owned(),
        ));
    }

    if let Some(reference) = reference {
        match reference.parent() {
            Some(actual_parent) if Rc::ptr_eq(&actual_parent, parent) => {}
            _ => {
                return Err(DomError::NotFound(
                    "reference child is not a child of parent".to_owned(),
                ))
            }
        }
    }

    match node.node_type() {
        NodeType::DocumentFragment | NodeType::Element | NodeType::Text
        | NodeType::ProcessingInstruction | NodeType::Comment | NodeType::CdataSection
        | NodeType::DocumentType => {}
        NodeType::Document => {
            return Err(DomError::HierarchyRequest(
                "a document node cannot be inserted into a tree".to_owned(),
            ))
        }
        NodeType::Attr => {
            return Err(DomError::HierarchyRequest(
                "an attribute node cannot be inserted into a tree".to_owned(),
            ))
        }
    }

    if parent.node_type() == NodeType::Document {
        match node.node_type() {
            NodeType::Element => {
                if parent.children().any(|child| child.node_type() == NodeType::Element) {
                    return Err(DomError::HierarchyRequest(
                        "a document may only have one document element".to_owned(),
                    ));
                }
                if let Some(doctype) = parent.children().find(|child| child.node_type() == NodeType::DocumentType) {
                    let after_doctype = match reference {
                        None => true,
                        Some(reference) => strictly_follows(&doctype, reference),
                    };
                    if !after_doctype {
                        return Err(DomError::HierarchyRequest(
                            "the document element must follow any doctype".to_owned(),
                        ));
                    }
                }
            }
            NodeType::Text => {
                return Err(DomError::HierarchyRequest(
                    "a document may not have a text node child".to_owned(),
                ))
            }
            NodeType::DocumentType => {
                if parent.children().any(|child| child.node_type() == NodeType::DocumentType) {
                    return Err(DomError::HierarchyRequest(
                        "a document may only have one doctype".to_owned(),
                    ));
                }
                if let Some(element) = parent.children().find(|child| child.node_type() == NodeType::Element) {
                    let before_element = match reference {
                        Some(reference) => follows(reference, &element),
                        None => false,
                    };
                    if !before_element {
                        return Err(DomError::HierarchyRequest(
                            "a doctype must precede the document element".to_owned(),
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// Whether `later` occurs at or after `earlier` among their shared siblings
/// (i.e. walking forward from `earlier` reaches `later`).
fn follows(earlier: &NodeRef, later: &NodeRef) -> bool {
    let mut current = Some(NodeRef::clone(earlier));
    while let Some(node) = current {
        if Rc::ptr_eq(&node, later) {
            return true;
        }
        current = node.next_sibling();
    }
    false
}

/// Whether `later` occurs strictly after `earlier` among their shared
/// siblings.
fn strictly_follows(earlier: &NodeRef, later: &NodeRef) -> bool {
    !Rc::ptr_eq(earlier, later) && follows(earlier, later)
}

/// Whether `ancestor` is `node` itself or one of its ancestors.
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

/// Detach `node` from its current parent and siblings, if any.
fn unlink(node: &NodeRef) {
    let parent = node.parent();
    let previous = node.previous_sibling();
    let next = node.next_sibling();

    match (&previous, &next) {
        (Some(previous), Some(next)) => {
            previous.next_sibling.set(Some(NodeRef::clone(next)));
            next.previous_sibling.set(Some(Rc::downgrade(previous)));
        }
        (Some(previous), None) => {
            previous.next_sibling.set(None);
            if let Some(parent) = &parent {
                parent.last_child.set(Some(Rc::downgrade(previous)));
            }
        }
        (None, Some(next)) => {
            next.previous_sibling.set(None);
            if let Some(parent) = &parent {
                parent.first_child.set(Some(NodeRef::clone(next)));
            }
        }
        (None, None) => {
            if let Some(parent) = &parent {
                parent.first_child.set(None);
                parent.last_child.set(None);
            }
        }
    }

    node.parent.set(None);
    node.previous_sibling.set(None);
    node.next_sibling.set(None);
}

/// Splice `node` into `parent`'s children, directly before `reference`, or
/// at the end if `reference` is `None`. Caller must have already validated
/// and unlinked `node`.
fn link_before(parent: &NodeRef, node: &NodeRef, reference: Option<&NodeRef>) {
    node.parent.set(Some(Rc::downgrade(parent)));

    match reference {
        Some(reference) => {
            let previous = reference.previous_sibling();
            node.previous_sibling.set(previous.as_ref().map(Rc::downgrade));
            node.next_sibling.set(Some(NodeRef::clone(reference)));
            match &previous {
                Some(previous) => previous.next_sibling.set(Some(NodeRef::clone(node))),
                None => parent.first_child.set(Some(NodeRef::clone(node))),
            }
            reference.previous_sibling.set(Some(Rc::downgrade(node)));
        }
        None => {
            let last = parent.last_child();
            node.previous_sibling.set(last.as_ref().map(Rc::downgrade));
            node.next_sibling.set(None);
            match &last {
                Some(last) => last.next_sibling.set(Some(NodeRef::clone(node))),
                None => parent.first_child.set(Some(NodeRef::clone(node))),
            }
            parent.last_child.set(Some(Rc::downgrade(node)));
        }
    }
}

/// Insert `node` as a child of `parent`, directly before `reference` (or at
/// the end, if `None`), after validating the operation and (for document
/// fragments) flattening its children into individual inserts.
///
/// [§ 4.2.1 Insert](https://dom.spec.whatwg.org/#concept-node-insert)
pub fn insert_before(
    parent: &NodeRef,
    node: &NodeRef,
    reference: Option<&NodeRef>,
) -> DomResult<NodeRef> {
    ensure_pre_insertion_validity(parent, node, reference)?;

    let owner = parent.owner_document();
    let parent_attached = owner.as_ref().is_some_and(|owner| is_attached(owner, parent));

    if node.node_type() == NodeType::DocumentFragment {
        let children: Vec<NodeRef> = node.children().collect();
        for child in &children {
            detach_for_move(child);
        }
        for child in &children {
            link_before(parent, child, reference);
            if let Some(owner) = &owner {
                child.owner_document.set(Some(Rc::downgrade(owner)));
                if parent_attached {
                    index_subtree_inserted(owner, child);
                }
            }
        }
        if let Some(owner) = &owner {
            owner.bump_generation();
            if let (Some(first), Some(last)) = (children.first(), children.last()) {
                queue_record(
                    owner,
                    MutationRecord::child_list(
                        parent,
                        children.clone(),
                        Vec::new(),
                        first.previous_sibling(),
                        last.next_sibling(),
                    ),
                );
            }
        }
        return Ok(NodeRef::clone(node));
    }

    detach_for_move(node);
    link_before(parent, node, reference);
    if let Some(owner) = &owner {
        node.owner_document.set(Some(Rc::downgrade(owner)));
        if parent_attached {
            index_subtree_inserted(owner, node);
        }
        owner.bump_generation();
        queue_record(
            owner,
            MutationRecord::child_list(
                parent,
                vec![NodeRef::clone(node)],
                Vec::new(),
                node.previous_sibling(),
                node.next_sibling(),
            ),
        );
    }
    Ok(NodeRef::clone(node))
}

/// If `node` already has a parent, detach it there first: reposition live
/// traversals, drop it from its current owner's indices (if attached), unlink
/// it, and queue a `childList` record against its old parent.
///
/// [§ 4.2.1 Insert, step 2](https://dom.spec.whatwg.org/#concept-node-insert)
/// — inserting a node that is already in a tree implicitly removes it from
/// its old position first, with the same bookkeeping `remove_child` does.
fn detach_for_move(node: &NodeRef) {
    let Some(old_parent) = node.parent() else {
        return;
    };
    crate::traversal::notify_pre_remove(node);
    if let Some(old_owner) = node.owner_document() {
        if is_attached(&old_owner, &old_parent) {
            index_subtree_removed(&old_owner, node);
        }
        let previous_sibling = node.previous_sibling();
        let next_sibling = node.next_sibling();
        unlink(node);
        old_owner.bump_generation();
        queue_record(
            &old_owner,
            MutationRecord::child_list(
                &old_parent,
                Vec::new(),
                vec![NodeRef::clone(node)],
                previous_sibling,
                next_sibling,
            ),
        );
    } else {
        unlink(node);
    }
}

/// Whether `node` is reachable from `owner`'s document root, i.e. genuinely
/// part of the live document tree rather than a detached subtree under
/// construction that merely carries `owner` as its prospective owner
/// document.
///
/// [§ 3.6 / § 8 P3](https://dom.spec.whatwg.org/#concept-id) — the id/tag/class
/// indices only ever describe elements attached to the document tree.
fn is_attached(owner: &Rc<DocumentShared>, node: &NodeRef) -> bool {
    let root = owner.root();
    let mut current = NodeRef::clone(node);
    loop {
        if Rc::ptr_eq(&current, &root) {
            return true;
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// Append `node` as `parent`'s last child.
///
/// [§ 4.2.1](https://dom.spec.whatwg.org/#dom-node-appendchild)
pub fn append_child(parent: &NodeRef, node: &NodeRef) -> DomResult<NodeRef> {
    insert_before(parent, node, None)
}

/// Remove `node` from `parent`'s children.
///
/// [§ 4.2.4 Remove](https://dom.spec.whatwg.org/#concept-node-remove)
pub fn remove_child(parent: &NodeRef, node: &NodeRef) -> DomResult<NodeRef> {
    match node.parent() {
        Some(actual_parent) if Rc::ptr_eq(&actual_parent, parent) => {}
        _ => {
            return Err(DomError::NotFound(
                "node is not a child of parent".to_owned(),
            ))
        }
    }

    crate::traversal::notify_pre_remove(node);

    let owner = parent.owner_document();
    if let Some(owner) = &owner {
        if is_attached(owner, parent) {
            index_subtree_removed(owner, node);
        }
    }
    let previous_sibling = node.previous_sibling();
    let next_sibling = node.next_sibling();
    unlink(node);
    if let Some(owner) = &owner {
        owner.bump_generation();
        queue_record(
            owner,
            MutationRecord::child_list(
                parent,
                Vec::new(),
                vec![NodeRef::clone(node)],
                previous_sibling,
                next_sibling,
            ),
        );
    }
    Ok(NodeRef::clone(node))
}

/// Replace `old_child` (a child of `parent`) with `node`.
///
/// [§ 4.2.3 Replace](https://dom.spec.whatwg.org/#concept-node-replace)
pub fn replace_child(parent: &NodeRef, node: &NodeRef, old_child: &NodeRef) -> DomResult<NodeRef> {
    match old_child.parent() {
        Some(actual_parent) if Rc::ptr_eq(&actual_parent, parent) => {}
        _ => {
            return Err(DomError::NotFound(
                "old_child is not a child of parent".to_owned(),
            ))
        }
    }
    let reference = old_child.next_sibling();
    if let Some(reference) = &reference {
        if Rc::ptr_eq(reference, node) {
            // inserting directly before its own successor is a no-op move
            remove_child(parent, old_child)?;
            return Ok(NodeRef::clone(old_child));
        }
    }
    remove_child(parent, old_child)?;
    insert_before(parent, node, reference.as_ref())?;
    Ok(NodeRef::clone(old_child))
}

/// Index `node` and its descendant elements as newly present in `owner`.
fn index_subtree_inserted(owner: &Rc<DocumentShared>, node: &NodeRef) {
    for_each_element_in_subtree(node, |element, data| {
        index_element(owner, element, data, true);
    });
}

/// Remove `node` and its descendant elements from `owner`'s indices.
fn index_subtree_removed(owner: &Rc<DocumentShared>, node: &NodeRef) {
    for_each_element_in_subtree(node, |element, data| {
        index_element(owner, element, data, false);
    });
}

fn index_element(owner: &Rc<DocumentShared>, element: &NodeRef, data: &ElementData, insert: bool) {
    let mut indices = owner.indices.borrow_mut();
    if let Some(id) = data.attributes.borrow().get(None, "id") {
        let id_atom = owner.intern(id);
        if insert {
            indices.insert_id(id_atom, element);
        } else {
            indices.remove_id(&id_atom, element);
        }
    }
    if insert {
        indices.insert_tag(data.tag.clone(), element);
    } else {
        indices.remove_tag(&data.tag, element);
    }
    if let Some(class) = data.attributes.borrow().get(None, "class") {
        for token in class.split_ascii_whitespace() {
            let atom = owner.intern(token);
            if insert {
                indices.insert_class(atom, element);
            } else {
                indices.remove_class(&atom, element);
            }
        }
    }
}

fn for_each_element_in_subtree(root: &NodeRef, mut visit: impl FnMut(&NodeRef, &ElementData)) {
    let mut stack = vec![NodeRef::clone(root)];
    while let Some(node) = stack.pop() {
        if let Some(element) = node.as_element() {
            visit(&node, element);
        }
        let mut child = node.first_child();
        while let Some(next) = child {
            let following = next.next_sibling();
            stack.push(next);
            child = following;
        }
    }
}

impl Node {
    /// Iterate over this node's direct children, left to right.
    pub fn children(&self) -> impl Iterator<Item = NodeRef> + '_ {
        let mut next = self.first_child();
        std::iter::from_fn(move || {
            let current = next.take();
            next = current.as_deref().and_then(Node::next_sibling);
            current
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn append_then_remove_round_trips_through_document_children() {
        let doc = Document::new();
        let html = doc.create_element("html", None);
        append_child(&doc.root(), &html).unwrap();
        assert!(Rc::ptr_eq(&doc.root().first_child().unwrap(), &html));

        remove_child(&doc.root(), &html).unwrap();
        assert!(!doc.root().has_child_nodes());
    }

    #[test]
    fn insert_before_places_node_ahead_of_reference() {
        let doc = Document::new();
        let parent = doc.create_element("ul", None);
        append_child(&doc.root(), &parent).unwrap();
        let second = doc.create_element("li", None);
        append_child(&parent, &second).unwrap();
        let first = doc.create_element("li", None);
        insert_before(&parent, &first, Some(&second)).unwrap();

        let children: Vec<NodeRef> = parent.children().collect();
        assert!(Rc::ptr_eq(&children[0], &first));
        assert!(Rc::ptr_eq(&children[1], &second));
    }

    #[test]
    fn replace_child_swaps_position_and_returns_the_old_child() {
        let doc = Document::new();
        let parent = doc.create_element("div", None);
        append_child(&doc.root(), &parent).unwrap();
        let old = doc.create_text_node("old");
        let new = doc.create_text_node("new");
        append_child(&parent, &old).unwrap();

        let returned = replace_child(&parent, &new, &old).unwrap();
        assert!(Rc::ptr_eq(&returned, &old));
        assert!(Rc::ptr_eq(&parent.first_child().unwrap(), &new));
        assert!(old.parent().is_none());
    }

    #[test]
    fn a_document_may_not_gain_a_second_element_child() {
        let doc = Document::new();
        let first = doc.create_element("html", None);
        let second = doc.create_element("html", None);
        append_child(&doc.root(), &first).unwrap();
        let error = append_child(&doc.root(), &second).unwrap_err();
        assert!(matches!(error, DomError::HierarchyRequest(_)));
    }

    #[test]
    fn a_document_may_not_gain_a_second_doctype() {
        let doc = Document::new();
        let first = doc.create_document_type("html", "", "");
        let second = doc.create_document_type("html", "", "");
        append_child(&doc.root(), &first).unwrap();
        let error = append_child(&doc.root(), &second).unwrap_err();
        assert!(matches!(error, DomError::HierarchyRequest(_)));
    }

    #[test]
    fn a_doctype_inserted_after_the_document_element_is_rejected() {
        let doc = Document::new();
        let element = doc.create_element("html", None);
        append_child(&doc.root(), &element).unwrap();
        let doctype = doc.create_document_type("html", "", "");
        let error = append_child(&doc.root(), &doctype).unwrap_err();
        assert!(matches!(error, DomError::HierarchyRequest(_)));
    }

    #[test]
    fn a_doctype_inserted_before_the_document_element_is_accepted() {
        let doc = Document::new();
        let element = doc.create_element("html", None);
        append_child(&doc.root(), &element).unwrap();
        let doctype = doc.create_document_type("html", "", "");
        insert_before(&doc.root(), &doctype, Some(&element)).unwrap();
        let children: Vec<NodeRef> = doc.root().children().collect();
        assert!(Rc::ptr_eq(&children[0], &doctype));
        assert!(Rc::ptr_eq(&children[1], &element));
    }

    #[test]
    fn an_attribute_node_cannot_be_inserted_into_a_tree() {
        let doc = Document::new();
        let attr = doc.create_attribute("id", None);
        let error = append_child(&doc.root(), &attr).unwrap_err();
        assert!(matches!(error, DomError::HierarchyRequest(_)));
    }

    #[test]
    fn a_node_cannot_be_inserted_into_its_own_descendant() {
        let doc = Document::new();
        let parent = doc.create_element("div", None);
        append_child(&doc.root(), &parent).unwrap();
        let child = doc.create_element("span", None);
        append_child(&parent, &child).unwrap();
        let error = insert_before(&child, &parent, None).unwrap_err();
        assert!(matches!(error, DomError::HierarchyRequest(_)));
    }

    #[test]
    fn building_a_detached_subtree_does_not_pollute_live_indices() {
        let doc = Document::new();
        let detached_parent = doc.create_element("div", None);
        let detached_child = doc.create_element("span", None);
        crate::element::set_attribute(&detached_child, "id", "ghost").unwrap();
        append_child(&detached_parent, &detached_child).unwrap();

        assert!(doc.get_element_by_id("ghost").is_none());
        assert_eq!(doc.shared().indices().borrow().get_by_tag("span").len(), 0);

        append_child(&doc.root(), &detached_parent).unwrap();
        assert!(doc.get_element_by_id("ghost").is_some());
        assert_eq!(doc.shared().indices().borrow().get_by_tag("span").len(), 1);
    }

    #[test]
    fn moving_an_attached_element_does_not_duplicate_its_index_entries() {
        let doc = Document::new();
        let left = doc.create_element("div", None);
        let right = doc.create_element("div", None);
        append_child(&doc.root(), &left).unwrap();
        append_child(&doc.root(), &right).unwrap();

        let moved = doc.create_element("li", None);
        crate::element::set_attribute(&moved, "class", "item").unwrap();
        append_child(&left, &moved).unwrap();

        insert_before(&right, &moved, None).unwrap();

        assert_eq!(doc.shared().indices().borrow().get_by_tag("li").len(), 1);
        assert_eq!(doc.shared().indices().borrow().get_by_class("item").len(), 1);
        assert!(Rc::ptr_eq(&right.first_child().unwrap(), &moved));
    }
}
