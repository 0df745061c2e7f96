//! The document: node factory, owner of the string pool, index maps,
//! generation counter and registered observers/iterators.
//!
//! [§ 6.1 Document construction](https://dom.spec.whatwg.org/#document)

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use dom_common::{DomError, DomResult};

use crate::collections::LiveCollection;
use crate::indices::Indices;
use crate::node::{AttrData, DocumentTypeData, ElementData, Node, NodeData, NodeRef, NodeType};
use crate::observer::{MutationObserverHandle, MutationRecord};
use crate::string_pool::{Atom, StringPool};
use crate::traversal::{NodeFilterFn, NodeIterator, TraversalRegistration, TreeWalker, WhatToShow};

/// The HTML namespace URI, the one namespace whose elements normalize their
/// tag name to ASCII lowercase at creation.
///
/// [§ 3.2](https://dom.spec.whatwg.org/#html-document) /
/// [infra: namespaces](https://infra.spec.whatwg.org/#namespaces)
pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// State shared by a document's root node and everything that needs to reach
/// it (elements looking up their owner, the mutation engine, registered
/// traversal objects and observers).
///
/// [§ 5 Allocator handle](https://dom.spec.whatwg.org/#document) — this is
/// the "single allocator handle passed at document creation" spec_full.md
/// §A.3 describes; a `Document` is exactly one `Rc<DocumentShared>` plus the
/// convenience methods in this module.
pub struct DocumentShared {
    pub(crate) root: NodeRef,
    pub(crate) pool: StringPool,
    pub(crate) indices: RefCell<Indices>,
    /// Bumped on every tree or attribute mutation; live collections compare
    /// this against the generation they were last refreshed at.
    ///
    /// [§ 4.8](https://dom.spec.whatwg.org/#interface-htmlcollection)
    pub(crate) generation: Cell<u64>,
    pub(crate) traversals: RefCell<Vec<TraversalRegistration>>,
    pub(crate) observers: RefCell<Vec<MutationObserverHandle>>,
    pub(crate) pending_records: RefCell<Vec<MutationRecord>>,
    /// Type-erased extension slot used by the selector subsystem to attach a
    /// per-document compiled-selector cache without `dom-core` depending on
    /// `dom-selectors`.
    pub ext: RefCell<Option<Box<dyn Any>>>,
}

impl DocumentShared {
    /// Intern a string against this document's pool.
    #[must_use]
    pub fn intern(&self, value: &str) -> Atom {
        self.pool.intern(value)
    }

    /// This document's index maps.
    #[must_use]
    pub fn indices(&self) -> &RefCell<Indices> {
        &self.indices
    }

    /// The current mutation generation counter.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Advance the mutation generation counter.
    pub fn bump_generation(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
    }

    /// The document's root node.
    #[must_use]
    pub fn root(&self) -> NodeRef {
        Rc::clone(&self.root)
    }
}

/// An in-memory document: a tree rooted at a [`NodeType::Document`] node,
/// together with the indices, string pool and registrations it owns.
///
/// [§ 6.1](https://dom.spec.whatwg.org/#document)
#[derive(Clone)]
pub struct Document {
    pub(crate) shared: Rc<DocumentShared>,
}

impl Document {
    /// Create a new, empty document.
    ///
    /// [§ 6.1](https://dom.spec.whatwg.org/#document) — realized without an
    /// explicit allocator parameter; see `spec_full.md` §A.3.
    #[must_use]
    pub fn new() -> Self {
        let root = Node::new(NodeData::Document, None);
        let shared = Rc::new(DocumentShared {
            root,
            pool: StringPool::new(),
            indices: RefCell::new(Indices::new()),
            generation: Cell::new(0),
            traversals: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            pending_records: RefCell::new(Vec::new()),
            ext: RefCell::new(None),
        });
        shared.root.owner_document.set(Some(Rc::downgrade(&shared)));
        Self { shared }
    }

    /// The underlying shared state, for crates building on top of this one.
    #[must_use]
    pub fn shared(&self) -> &Rc<DocumentShared> {
        &self.shared
    }

    /// The document's root node.
    #[must_use]
    pub fn root(&self) -> NodeRef {
        self.shared.root()
    }

    /// Create a detached element.
    ///
    /// [§ 3.2](https://dom.spec.whatwg.org/#concept-element-local-name) — in
    /// the HTML namespace, `tag_name` is ASCII-lowercased before interning;
    /// every other namespace (or none) preserves the name's original case.
    ///
    /// [§ 4.2.3 Creating elements](https://dom.spec.whatwg.org/#concept-create-element)
    #[must_use]
    pub fn create_element(&self, tag_name: &str, namespace: Option<&str>) -> NodeRef {
        let tag = if namespace == Some(HTML_NAMESPACE) {
            self.shared.intern(&tag_name.to_ascii_lowercase())
        } else {
            self.shared.intern(tag_name)
        };
        let namespace = namespace.map(|namespace| self.shared.intern(namespace));
        Node::new(
            NodeData::Element(ElementData {
                tag,
                namespace,
                attributes: RefCell::new(crate::attr::AttributeMap::new()),
                class_bloom: Cell::new(0),
            }),
            Some(&self.shared),
        )
    }

    /// Create a detached, ownerless attribute node.
    ///
    /// [§ 4.2.2](https://dom.spec.whatwg.org/#interface-attr)
    #[must_use]
    pub fn create_attribute(&self, name: &str, namespace: Option<&str>) -> NodeRef {
        let name_atom = self.shared.intern(name);
        let namespace = namespace.map(|namespace| self.shared.intern(namespace));
        Node::new(
            NodeData::Attr(AttrData {
                name: name_atom,
                namespace,
                prefix: None,
                value: RefCell::new(String::new()),
                owner_element: Cell::new(None),
            }),
            Some(&self.shared),
        )
    }

    /// Create a detached text node.
    #[must_use]
    pub fn create_text_node(&self, data: &str) -> NodeRef {
        Node::new(
            NodeData::Text(RefCell::new(data.to_owned())),
            Some(&self.shared),
        )
    }

    /// Create a detached comment node.
    #[must_use]
    pub fn create_comment(&self, data: &str) -> NodeRef {
        Node::new(
            NodeData::Comment(RefCell::new(data.to_owned())),
            Some(&self.shared),
        )
    }

    /// Create a detached CDATA section.
    #[must_use]
    pub fn create_cdata_section(&self, data: &str) -> NodeRef {
        Node::new(
            NodeData::CdataSection(RefCell::new(data.to_owned())),
            Some(&self.shared),
        )
    }

    /// Create a detached processing instruction.
    #[must_use]
    pub fn create_processing_instruction(&self, target: &str, data: &str) -> NodeRef {
        let target = self.shared.intern(target);
        Node::new(
            NodeData::ProcessingInstruction(crate::node::ProcessingInstructionData {
                target,
                data: RefCell::new(data.to_owned()),
            }),
            Some(&self.shared),
        )
    }

    /// Create a detached document fragment.
    #[must_use]
    pub fn create_document_fragment(&self) -> NodeRef {
        Node::new(NodeData::DocumentFragment, Some(&self.shared))
    }

    /// Create a detached doctype declaration.
    #[must_use]
    pub fn create_document_type(&self, name: &str, public_id: &str, system_id: &str) -> NodeRef {
        let name = self.shared.intern(name);
        Node::new(
            NodeData::DocumentType(DocumentTypeData {
                name,
                public_id: public_id.to_owned(),
                system_id: system_id.to_owned(),
            }),
            Some(&self.shared),
        )
    }

    /// Find the element with `id` that sorts first in document order.
    ///
    /// [§ 3.6 / § 8 P3](https://dom.spec.whatwg.org/#dom-nonelementparentnode-getelementbyid)
    #[must_use]
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeRef> {
        self.shared.indices.borrow().get_by_id(id)
    }

    /// A live collection of every descendant element with tag name `tag`
    /// (`"*"` matches any), scoped to the document root.
    ///
    /// [§ 4.8](https://dom.spec.whatwg.org/#dom-document-getelementsbytagname)
    #[must_use]
    pub fn get_elements_by_tag_name(&self, tag: &str) -> LiveCollection {
        crate::collections::get_elements_by_tag_name(&self.shared.root, tag)
    }

    /// A live collection of every descendant element carrying all of
    /// `class_names`' space-separated tokens, scoped to the document root.
    ///
    /// [§ 4.8](https://dom.spec.whatwg.org/#dom-document-getelementsbyclassname)
    #[must_use]
    pub fn get_elements_by_class_name(&self, class_names: &str) -> LiveCollection {
        crate::collections::get_elements_by_class_name(&self.shared.root, class_names)
    }

    /// Create a [`NodeIterator`] rooted at `root`.
    ///
    /// [§ 4.9](https://dom.spec.whatwg.org/#dom-document-createnodeiterator)
    #[must_use]
    pub fn create_node_iterator(
        &self,
        root: &NodeRef,
        what_to_show: WhatToShow,
        filter: Option<NodeFilterFn>,
    ) -> NodeIterator {
        NodeIterator::new(root, what_to_show, filter)
    }

    /// Create a [`TreeWalker`] rooted at `root`.
    ///
    /// [§ 4.10](https://dom.spec.whatwg.org/#dom-document-createtreewalker)
    #[must_use]
    pub fn create_tree_walker(
        &self,
        root: &NodeRef,
        what_to_show: WhatToShow,
        filter: Option<NodeFilterFn>,
    ) -> TreeWalker {
        TreeWalker::new(root, what_to_show, filter)
    }

    /// Check that `node` belongs to this document, returning
    /// [`DomError::WrongDocument`] otherwise.
    ///
    /// [§ 4.3 Adoption](https://dom.spec.whatwg.org/#concept-node-adopt)
    pub fn check_owner(&self, node: &NodeRef) -> DomResult<()> {
        match node.owner_document() {
            Some(owner) if Rc::ptr_eq(&owner, &self.shared) => Ok(()),
            _ => Err(DomError::WrongDocument(
                "node does not belong to this document".to_owned(),
            )),
        }
    }

    /// Adopt `node` (and its subtree) into this document, detaching it from
    /// any previous document first.
    ///
    /// [§ 4.3 / § 4.4](https://dom.spec.whatwg.org/#concept-node-adopt)
    pub fn adopt_node(&self, node: &NodeRef) {
        if node.node_type() == NodeType::Document {
            return;
        }
        if let Some(parent) = node.parent() {
            crate::mutation::remove_child(&parent, node).ok();
        }
        set_owner_recursive(node, &self.shared);
    }

    /// This document's `DOMImplementation` facet: factories for doctypes and
    /// documents that are not bound to one particular document until they
    /// are inserted or explicitly requested.
    ///
    /// [§ 3.5](https://dom.spec.whatwg.org/#domimplementation)
    #[must_use]
    pub fn implementation(&self) -> DomImplementation {
        DomImplementation {
            host: Rc::clone(&self.shared),
        }
    }
}

/// A document's `DOMImplementation` facet.
///
/// [§ 3.5](https://dom.spec.whatwg.org/#domimplementation)
pub struct DomImplementation {
    host: Rc<DocumentShared>,
}

impl DomImplementation {
    /// Create a doctype declaration, owned by the document this facet was
    /// obtained from until it is inserted (or adopted) elsewhere.
    ///
    /// [§ 3.5](https://dom.spec.whatwg.org/#dom-domimplementation-createdocumenttype)
    #[must_use]
    pub fn create_document_type(&self, name: &str, public_id: &str, system_id: &str) -> NodeRef {
        let name = self.host.intern(name);
        Node::new(
            NodeData::DocumentType(DocumentTypeData {
                name,
                public_id: public_id.to_owned(),
                system_id: system_id.to_owned(),
            }),
            Some(&self.host),
        )
    }

    /// Create a brand-new, empty document, optionally appending a doctype
    /// and/or a document element of `qualified_name` (empty means none).
    ///
    /// [§ 3.5](https://dom.spec.whatwg.org/#dom-domimplementation-createdocument)
    #[must_use]
    pub fn create_document(
        &self,
        namespace: Option<&str>,
        qualified_name: &str,
        doctype: Option<&NodeRef>,
    ) -> Document {
        let document = Document::new();
        if let Some(doctype) = doctype {
            document.adopt_node(doctype);
            crate::mutation::append_child(&document.root(), doctype)
                .unwrap_or_else(|_| unreachable!("a fresh document accepts a single doctype"));
        }
        if !qualified_name.is_empty() {
            let element = document.create_element(qualified_name, namespace);
            crate::mutation::append_child(&document.root(), &element)
                .unwrap_or_else(|_| unreachable!("a fresh document accepts a single document element"));
        }
        document
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn set_owner_recursive(node: &NodeRef, owner: &Rc<DocumentShared>) {
    let mut stack = vec![NodeRef::clone(node)];
    while let Some(current) = stack.pop() {
        current.owner_document.set(Some(Rc::downgrade(owner)));
        let mut child = current.first_child();
        while let Some(next) = child {
            let following = next.next_sibling();
            stack.push(next);
            child = following;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element;
    use crate::mutation::append_child;

    #[test]
    fn created_nodes_report_the_right_node_type() {
        let doc = Document::new();
        assert_eq!(doc.create_element("div", None).node_type(), NodeType::Element);
        assert_eq!(doc.create_text_node("x").node_type(), NodeType::Text);
        assert_eq!(doc.create_comment("x").node_type(), NodeType::Comment);
        assert_eq!(doc.create_cdata_section("x").node_type(), NodeType::CdataSection);
        assert_eq!(
            doc.create_processing_instruction("xml-stylesheet", "").node_type(),
            NodeType::ProcessingInstruction
        );
        assert_eq!(doc.create_document_fragment().node_type(), NodeType::DocumentFragment);
        assert_eq!(doc.create_document_type("html", "", "").node_type(), NodeType::DocumentType);
    }

    #[test]
    fn html_namespace_elements_lowercase_their_tag_name() {
        let doc = Document::new();
        let element = doc.create_element("DIV", Some(HTML_NAMESPACE));
        assert_eq!(element.as_element().unwrap().tag.as_str(), "div");
    }

    #[test]
    fn non_html_namespace_elements_preserve_tag_case() {
        let doc = Document::new();
        let element = doc.create_element("DIV", Some("http://www.w3.org/2000/svg"));
        assert_eq!(element.as_element().unwrap().tag.as_str(), "DIV");
        let no_namespace = doc.create_element("DIV", None);
        assert_eq!(no_namespace.as_element().unwrap().tag.as_str(), "DIV");
    }

    #[test]
    fn get_element_by_id_prefers_document_order_on_duplicates() {
        let doc = Document::new();
        let root = doc.create_element("div", None);
        append_child(&doc.root(), &root).unwrap();
        let first = doc.create_element("span", None);
        element::set_attribute(&first, "id", "dup").unwrap();
        let second = doc.create_element("span", None);
        element::set_attribute(&second, "id", "dup").unwrap();
        append_child(&root, &first).unwrap();
        append_child(&root, &second).unwrap();

        let found = doc.get_element_by_id("dup").unwrap();
        assert!(Rc::ptr_eq(&found, &first));
    }

    #[test]
    fn check_owner_rejects_a_node_from_another_document() {
        let doc_a = Document::new();
        let doc_b = Document::new();
        let foreign = doc_b.create_element("div", None);
        assert!(matches!(doc_a.check_owner(&foreign), Err(DomError::WrongDocument(_))));
    }

    #[test]
    fn adopt_node_detaches_from_the_previous_document_and_reassigns_owner() {
        let doc_a = Document::new();
        let doc_b = Document::new();
        let node = doc_a.create_element("div", None);
        append_child(&doc_a.root(), &node).unwrap();

        doc_b.adopt_node(&node);

        assert!(node.parent().is_none());
        assert!(Rc::ptr_eq(&node.owner_document().unwrap(), doc_b.shared()));
    }

    #[test]
    fn implementation_create_document_builds_a_doctype_then_document_element() {
        let doc = Document::new();
        let implementation = doc.implementation();
        let doctype = implementation.create_document_type("html", "", "");
        let built = implementation.create_document(None, "html", Some(&doctype));

        let children: Vec<NodeRef> = built.root().children().collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].node_type(), NodeType::DocumentType);
        assert_eq!(children[1].node_type(), NodeType::Element);
    }
}
