//! Node cloning.
//!
//! [§ 4.1 / § 4.3 Cloning a node](https://dom.spec.whatwg.org/#concept-node-clone)
//!
//! A clone is a freestanding node carrying a copy of the source's
//! type-specific data (attributes, character data, doctype identifiers) and
//! the source's owner document, never its parent or siblings. With `deep`
//! set, every child is cloned in turn and appended to the clone, so the
//! whole subtree's shape and order survive the copy.

use std::cell::{Cell, RefCell};

use crate::attr::AttributeMap;
use crate::node::{AttrData, DocumentTypeData, ElementData, Node, NodeData, NodeRef, NodeType, ProcessingInstructionData};

/// Clone `node`. With `deep`, each child is cloned too (recursively) and
/// appended to the clone in document order; otherwise the clone is a
/// childless copy of `node` alone.
///
/// [§ 4.1](https://dom.spec.whatwg.org/#dom-node-clonenode)
/// [§ 8 P8](https://dom.spec.whatwg.org/#concept-node-clone) — the clone is
/// structurally equal to its source but shares no node identity with it.
#[must_use]
pub fn clone_node(node: &NodeRef, deep: bool) -> NodeRef {
    let owner = node.owner_document();
    let clone = Node::new(clone_data(node), owner.as_ref());

    if deep && node.node_type() != NodeType::Attr {
        for child in node.children() {
            let child_clone = clone_node(&child, true);
            crate::mutation::append_child(&clone, &child_clone)
                .unwrap_or_else(|_| unreachable!("a freshly built clone admits any child its source did"));
        }
    }

    clone
}

fn clone_data(node: &NodeRef) -> NodeData {
    match node.data() {
        NodeData::Document => NodeData::Document,
        NodeData::DocumentFragment => NodeData::DocumentFragment,
        NodeData::DocumentType(doctype) => NodeData::DocumentType(DocumentTypeData {
            name: doctype.name.clone(),
            public_id: doctype.public_id.clone(),
            system_id: doctype.system_id.clone(),
        }),
        NodeData::Element(element) => NodeData::Element(ElementData {
            tag: element.tag.clone(),
            namespace: element.namespace.clone(),
            attributes: RefCell::new(clone_attributes(&element.attributes.borrow())),
            class_bloom: Cell::new(element.class_bloom.get()),
        }),
        NodeData::Attr(attr) => NodeData::Attr(AttrData {
            name: attr.name.clone(),
            namespace: attr.namespace.clone(),
            prefix: attr.prefix.clone(),
            value: RefCell::new(attr.value.borrow().clone()),
            owner_element: Cell::new(None),
        }),
        NodeData::Text(value) => NodeData::Text(RefCell::new(value.borrow().clone())),
        NodeData::Comment(value) => NodeData::Comment(RefCell::new(value.borrow().clone())),
        NodeData::CdataSection(value) => NodeData::CdataSection(RefCell::new(value.borrow().clone())),
        NodeData::ProcessingInstruction(pi) => NodeData::ProcessingInstruction(ProcessingInstructionData {
            target: pi.target.clone(),
            data: RefCell::new(pi.data.borrow().clone()),
        }),
    }
}

fn clone_attributes(source: &AttributeMap) -> AttributeMap {
    let mut clone = AttributeMap::new();
    for entry in source.iter() {
        let _ = clone.set(entry.namespace.clone(), entry.name.clone(), entry.value.clone());
    }
    clone
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::element;
    use crate::mutation::append_child;

    #[test]
    fn shallow_clone_copies_attributes_but_not_children() {
        let doc = Document::new();
        let original = doc.create_element("div", None);
        element::set_attribute(&original, "id", "a").unwrap();
        let child = doc.create_text_node("hi");
        append_child(&original, &child).unwrap();

        let clone = clone_node(&original, false);

        assert!(!rc_ptr_eq(&clone, &original));
        assert_eq!(element::get_attribute(&clone, "id"), Some("a".to_owned()));
        assert!(!clone.has_child_nodes());
        assert!(clone.parent().is_none());
    }

    #[test]
    fn deep_clone_copies_the_whole_subtree_in_order() {
        let doc = Document::new();
        let original = doc.create_element("ul", None);
        let first = doc.create_element("li", None);
        element::set_attribute(&first, "class", "first").unwrap();
        let second = doc.create_element("li", None);
        append_child(&original, &first).unwrap();
        append_child(&original, &second).unwrap();

        let clone = clone_node(&original, true);
        let clone_children: Vec<NodeRef> = clone.children().collect();

        assert_eq!(clone_children.len(), 2);
        assert!(!rc_ptr_eq(&clone_children[0], &first));
        assert_eq!(element::get_attribute(&clone_children[0], "class"), Some("first".to_owned()));
    }

    #[test]
    fn clone_shares_the_source_owner_document_until_adopted() {
        let doc = Document::new();
        let original = doc.create_element("span", None);
        let clone = clone_node(&original, false);
        assert!(clone.owner_document().is_some());
    }

    #[test]
    fn a_deep_clones_id_does_not_resolve_until_the_clone_is_attached() {
        let doc = Document::new();
        let original = doc.create_element("div", None);
        append_child(&doc.root(), &original).unwrap();
        let tagged = doc.create_element("span", None);
        element::set_attribute(&tagged, "id", "dup").unwrap();
        append_child(&original, &tagged).unwrap();

        let clone = clone_node(&original, true);
        assert!(rc_ptr_eq(&doc.get_element_by_id("dup").unwrap(), &tagged));

        append_child(&doc.root(), &clone).unwrap();
        assert!(doc.get_element_by_id("dup").is_some());
    }

    fn rc_ptr_eq(a: &NodeRef, b: &NodeRef) -> bool {
        std::rc::Rc::ptr_eq(a, b)
    }
}
