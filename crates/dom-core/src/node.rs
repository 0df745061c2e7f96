//! The node graph.
//!
//! [§ 3.1 Node graph](https://dom.spec.whatwg.org/#node-trees)
//!
//! A tree is a set of [`Node`]s linked by **strong-forward, weak-backward**
//! references: a node strongly owns its first child and next sibling, and
//! only weakly refers back to its parent, previous sibling and last child.
//! Every node therefore keeps its whole "forward" subtree (later siblings and
//! descendants) alive, while references that would close a cycle (parent,
//! previous sibling, last child) never contribute to a strong count. No
//! reference cycle can form, so a subtree becomes unreachable, and is freed,
//! the moment the single strong handle that roots it (held by a parent's
//! `first_child` / `next_sibling` cell, or by application code) is dropped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::attr::AttributeMap;
use crate::document::DocumentShared;
use crate::rare_data::RareData;
use crate::string_pool::Atom;

/// A strong handle to a node. Trees are built entirely out of these.
pub type NodeRef = Rc<Node>;
/// A weak handle to a node, used for parent/previous-sibling/last-child
/// back-links so the tree has no reference cycles.
pub type WeakNodeRef = Weak<Node>;

/// WHATWG `Node.nodeType` values.
///
/// [§ 3.1](https://dom.spec.whatwg.org/#dom-node-nodetype)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NodeType {
    /// An [`Element`](ElementData).
    Element = 1,
    /// An [`Attr`](AttrData), when walked directly (e.g. via `ownerElement`).
    Attr = 2,
    /// A text node.
    Text = 3,
    /// A CDATA section.
    CdataSection = 4,
    /// A processing instruction.
    ProcessingInstruction = 7,
    /// A comment.
    Comment = 8,
    /// A [`Document`](crate::document::Document) root node.
    Document = 9,
    /// A doctype declaration.
    DocumentType = 10,
    /// A document fragment.
    DocumentFragment = 11,
}

/// Node-type-specific payload.
///
/// [§ 3.1](https://dom.spec.whatwg.org/#node-trees)
pub enum NodeData {
    /// The single root node of a document tree.
    Document,
    /// A `<!DOCTYPE ...>` declaration.
    DocumentType(DocumentTypeData),
    /// A lightweight, parentless container used to batch-insert children.
    DocumentFragment,
    /// An element with a tag name, optional namespace and attributes.
    Element(ElementData),
    /// A namespaced name/value pair, optionally owned by an element.
    Attr(AttrData),
    /// A run of character data.
    Text(RefCell<String>),
    /// A comment.
    Comment(RefCell<String>),
    /// A CDATA section (XML documents only).
    CdataSection(RefCell<String>),
    /// A processing instruction, `<?target data?>`.
    ProcessingInstruction(ProcessingInstructionData),
}

impl NodeData {
    /// This payload's [`NodeType`] discriminant.
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        match self {
            Self::Document => NodeType::Document,
            Self::DocumentType(_) => NodeType::DocumentType,
            Self::DocumentFragment => NodeType::DocumentFragment,
            Self::Element(_) => NodeType::Element,
            Self::Attr(_) => NodeType::Attr,
            Self::Text(_) => NodeType::Text,
            Self::Comment(_) => NodeType::Comment,
            Self::CdataSection(_) => NodeType::CdataSection,
            Self::ProcessingInstruction(_) => NodeType::ProcessingInstruction,
        }
    }
}

/// Element-specific state.
///
/// [§ 3.2 Elements](https://dom.spec.whatwg.org/#interface-element)
pub struct ElementData {
    /// The element's local tag name: ASCII-lowercased at creation when the
    /// element's namespace is the HTML namespace
    /// ([`crate::document::HTML_NAMESPACE`]), and preserved verbatim
    /// otherwise, per [§ 4.2.3](https://dom.spec.whatwg.org/#concept-create-element).
    pub tag: Atom,
    /// The element's namespace URI, if any.
    pub namespace: Option<Atom>,
    /// Ordered name/value attribute storage.
    ///
    /// [§ 4.2.2 Attribute map](https://dom.spec.whatwg.org/#concept-element-attribute)
    pub attributes: RefCell<AttributeMap>,
    /// 64-bit class-token bloom filter, rebuilt whenever `class` mutates.
    ///
    /// [§ 9 Design notes](https://dom.spec.whatwg.org/#concept-class)
    pub class_bloom: Cell<u64>,
}

/// Attribute node state.
///
/// [§ 3.3 Attr nodes](https://dom.spec.whatwg.org/#interface-attr)
pub struct AttrData {
    /// The attribute's local name.
    pub name: Atom,
    /// The attribute's namespace URI, if any.
    pub namespace: Option<Atom>,
    /// The attribute's namespace prefix, if any.
    pub prefix: Option<Atom>,
    /// The attribute's current value.
    pub value: RefCell<String>,
    /// The element currently owning this attribute, if any.
    ///
    /// [§ 4.2.2](https://dom.spec.whatwg.org/#concept-attribute-owner-element)
    pub owner_element: Cell<Option<WeakNodeRef>>,
}

/// Doctype declaration state.
pub struct DocumentTypeData {
    /// The doctype name (e.g. `html`).
    pub name: Atom,
    /// The public identifier, or an empty string.
    pub public_id: String,
    /// The system identifier, or an empty string.
    pub system_id: String,
}

/// Processing instruction state.
pub struct ProcessingInstructionData {
    /// The instruction's target.
    pub target: Atom,
    /// The instruction's character data.
    pub data: RefCell<String>,
}

/// A single node in a tree.
///
/// [§ 3.1](https://dom.spec.whatwg.org/#node-trees)
pub struct Node {
    pub(crate) parent: Cell<Option<WeakNodeRef>>,
    pub(crate) previous_sibling: Cell<Option<WeakNodeRef>>,
    pub(crate) next_sibling: Cell<Option<NodeRef>>,
    pub(crate) first_child: Cell<Option<NodeRef>>,
    pub(crate) last_child: Cell<Option<WeakNodeRef>>,
    pub(crate) owner_document: Cell<Option<Weak<DocumentShared>>>,
    pub(crate) rare_data: RefCell<Option<Box<RareData>>>,
    data: NodeData,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({:?} @ {:p})", self.data.node_type(), self)
    }
}

impl Node {
    /// Build a freestanding node, not yet linked into any tree.
    #[must_use]
    pub(crate) fn new(data: NodeData, owner: Option<&Rc<DocumentShared>>) -> NodeRef {
        Rc::new(Self {
            parent: Cell::new(None),
            previous_sibling: Cell::new(None),
            next_sibling: Cell::new(None),
            first_child: Cell::new(None),
            last_child: Cell::new(None),
            owner_document: Cell::new(owner.map(Rc::downgrade)),
            rare_data: RefCell::new(None),
            data,
        })
    }

    /// This node's type-specific payload.
    #[must_use]
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    /// This node's [`NodeType`].
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.data.node_type()
    }

    /// Borrow this node as element data, if it is an element.
    #[must_use]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Borrow this node as attribute data, if it is an attribute.
    #[must_use]
    pub fn as_attr(&self) -> Option<&AttrData> {
        match &self.data {
            NodeData::Attr(attr) => Some(attr),
            _ => None,
        }
    }

    /// Borrow this node's character data, if it has any (text, comment or
    /// CDATA section).
    #[must_use]
    pub fn as_character_data(&self) -> Option<&RefCell<String>> {
        match &self.data {
            NodeData::Text(value) | NodeData::Comment(value) | NodeData::CdataSection(value) => {
                Some(value)
            }
            _ => None,
        }
    }

    /// The document that owns this node, if it has not been freed.
    #[must_use]
    pub fn owner_document(&self) -> Option<Rc<DocumentShared>> {
        let owner = self.owner_document.take();
        let result = owner.as_ref().and_then(Weak::upgrade);
        self.owner_document.set(owner);
        result
    }

    /// This node's parent, if any.
    #[must_use]
    pub fn parent(&self) -> Option<NodeRef> {
        let weak = self.parent.take();
        let result = weak.as_ref().and_then(Weak::upgrade);
        self.parent.set(weak);
        result
    }

    /// This node's previous sibling, if any.
    #[must_use]
    pub fn previous_sibling(&self) -> Option<NodeRef> {
        let weak = self.previous_sibling.take();
        let result = weak.as_ref().and_then(Weak::upgrade);
        self.previous_sibling.set(weak);
        result
    }

    /// This node's next sibling, if any.
    #[must_use]
    pub fn next_sibling(&self) -> Option<NodeRef> {
        let rc = self.next_sibling.take();
        let result = rc.clone();
        self.next_sibling.set(rc);
        result
    }

    /// This node's first child, if any.
    #[must_use]
    pub fn first_child(&self) -> Option<NodeRef> {
        let rc = self.first_child.take();
        let result = rc.clone();
        self.first_child.set(rc);
        result
    }

    /// This node's last child, if any.
    #[must_use]
    pub fn last_child(&self) -> Option<NodeRef> {
        let weak = self.last_child.take();
        let result = weak.as_ref().and_then(Weak::upgrade);
        self.last_child.set(weak);
        result
    }

    /// Whether this node currently has any children.
    #[must_use]
    pub fn has_child_nodes(&self) -> bool {
        let rc = self.first_child.take();
        let result = rc.is_some();
        self.first_child.set(rc);
        result
    }

    /// Access (allocating on first use) this node's rarely-populated side
    /// state, used for cached live-collection identity.
    ///
    /// [§ 4.8](https://dom.spec.whatwg.org/#interface-htmlcollection)
    pub(crate) fn rare_data_mut(&self) -> std::cell::RefMut<'_, Option<Box<RareData>>> {
        let mut guard = self.rare_data.borrow_mut();
        if guard.is_none() {
            *guard = Some(Box::default());
        }
        guard
    }
}

/// Extension trait implementing the non-recursive drop helper on
/// `Cell<Option<Rc<T>>>` cells: take the inner `Rc` out only if this cell
/// holds the unique strong reference to it.
///
/// [§ 3.1 / § 9 Design notes](https://dom.spec.whatwg.org/#garbage-collection)
trait CellOptionRcExt<T> {
    /// Take and return the contained `Rc`, but only if its strong count is
    /// exactly 1 (weak references do not block this). Leaves the cell
    /// populated otherwise.
    fn take_if_unique_strong(&self) -> Option<Rc<T>>;
}

impl<T> CellOptionRcExt<T> for Cell<Option<Rc<T>>> {
    fn take_if_unique_strong(&self) -> Option<Rc<T>> {
        let value = self.take();
        match value {
            Some(rc) if Rc::strong_count(&rc) == 1 => Some(rc),
            other => {
                self.set(other);
                None
            }
        }
    }
}

/// Drop a tree without recursing, so that deep or wide trees do not overflow
/// the stack.
///
/// [§ 3.1 / § 9 Design notes](https://dom.spec.whatwg.org/#garbage-collection)
///
/// Only nodes this `Node` uniquely owns (its first child and, transitively,
/// their next siblings) are walked explicitly; anything still referenced
/// elsewhere is left for its own last owner to drop.
impl Drop for Node {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        if let Some(rc) = self.first_child.take_if_unique_strong() {
            non_recursive_drop(rc, &mut stack);
        }
        if let Some(rc) = self.next_sibling.take_if_unique_strong() {
            non_recursive_drop(rc, &mut stack);
        }

        fn non_recursive_drop(mut rc: NodeRef, stack: &mut Vec<NodeRef>) {
            loop {
                if let Some(child) = rc.first_child.take_if_unique_strong() {
                    stack.push(rc);
                    rc = child;
                    continue;
                }
                if let Some(sibling) = rc.next_sibling.take_if_unique_strong() {
                    rc = sibling;
                    continue;
                }
                match stack.pop() {
                    Some(parent) => rc = parent,
                    None => return,
                }
            }
        }
    }
}
