//! In-memory DOM node graph, mutation engine, indices and traversal.
//!
//! [§ 2 System overview](https://dom.spec.whatwg.org/#introduction)
//!
//! This crate owns the "core" of a headless DOM engine: the reference
//! counted node graph (`node`), the ordered attribute map (`attr`), the
//! document that factories nodes and owns the id/tag/class indices
//! (`document`, `indices`), the mutation algorithms that keep tree, indices
//! and observers consistent (`mutation`, `element`), live collections
//! (`collections`) and the `NodeIterator`/`TreeWalker` traversal objects
//! (`traversal`). CSS selector tokenizing, parsing, matching and caching
//! live one layer up, in `dom-selectors`, which depends on this crate's
//! public node/document types but is not itself depended on here.

pub mod attr;
pub mod clone;
pub mod collections;
pub mod document;
pub mod element;
pub mod indices;
pub mod mutation;
pub mod node;
pub mod observer;
mod rare_data;
pub mod string_pool;
pub mod traversal;

pub use clone::clone_node;
pub use document::{Document, DocumentShared, DomImplementation, HTML_NAMESPACE};
pub use node::{
    AttrData, DocumentTypeData, ElementData, Node, NodeData, NodeRef, NodeType,
    ProcessingInstructionData, WeakNodeRef,
};
pub use string_pool::Atom;
