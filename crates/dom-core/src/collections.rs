//! Live and static node collections.
//!
//! [§ 4.8 Live collections](https://dom.spec.whatwg.org/#interface-htmlcollection)
//!
//! `NodeList`/`HTMLCollection` results from a query such as
//! `getElementsByTagName` are *live*: the same object is returned for
//! repeated identical calls on the same root, and its contents re-derive
//! from the tree on demand rather than being snapshotted. A
//! [`Document`](crate::document::Document)'s mutation-generation counter
//! drives that invalidation: a collection recomputes when its cached
//! generation no longer matches the current one.

use std::cell::RefCell;
use std::rc::Rc;

use crate::node::NodeRef;

/// A filter a [`LiveCollection`] re-applies against the root's subtree.
#[derive(Clone)]
pub enum CollectionFilter {
    /// All descendant elements with this tag name (`"*"` matches any).
    TagName(String),
    /// All descendant elements carrying every one of these space-separated
    /// class tokens.
    ClassName(Vec<String>),
    /// The root's direct element children only.
    ///
    /// [§ 4.2](https://dom.spec.whatwg.org/#dom-parentnode-children)
    Children,
}

/// Identifies a cached live collection for identity-preservation purposes.
///
/// [§ 4.8](https://dom.spec.whatwg.org/#interface-htmlcollection)
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum CollectionKey {
    /// Keyed by `getElementsByTagName`'s argument.
    TagName(String),
    /// Keyed by `getElementsByClassName`'s argument.
    ClassName(String),
    /// `Element.children` / `Node.childNodes`'s element-only view.
    Children,
}

/// A static, non-live snapshot of nodes (what `querySelectorAll` and
/// `childNodes` conceptually return as a frozen list).
///
/// [§ 4.8](https://dom.spec.whatwg.org/#interface-nodelist)
#[derive(Clone, Default)]
pub struct NodeListSnapshot {
    items: Vec<NodeRef>,
}

impl NodeListSnapshot {
    /// Wrap a pre-computed list of nodes.
    #[must_use]
    pub fn new(items: Vec<NodeRef>) -> Self {
        Self { items }
    }

    /// The number of nodes in this snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether this snapshot holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The node at `index`, if in range.
    #[must_use]
    pub fn item(&self, index: usize) -> Option<NodeRef> {
        self.items.get(index).cloned()
    }

    /// Iterate over the snapshot's nodes.
    pub fn iter(&self) -> impl Iterator<Item = &NodeRef> {
        self.items.iter()
    }
}

/// `Node.childNodes`: every direct child, of any node type, in order.
///
/// [§ 4.8](https://dom.spec.whatwg.org/#dom-node-childnodes)
///
/// Unlike [`LiveCollection`], this re-derives on every call rather than
/// caching by generation; `childNodes` is read far less hot than
/// `getElementsByTagName`/`getElementsByClassName` and callers that need
/// cheap repeated reads already have [`Node::children`](crate::node::Node::children).
#[must_use]
pub fn child_nodes(node: &NodeRef) -> NodeListSnapshot {
    NodeListSnapshot::new(node.children().collect())
}

/// `Element.children`: a live collection of `node`'s direct element
/// children only, identity-cached on `node`'s rare data.
///
/// [§ 4.2](https://dom.spec.whatwg.org/#dom-parentnode-children)
#[must_use]
pub fn element_children(node: &NodeRef) -> LiveCollection {
    LiveCollection::new(node, CollectionKey::Children, CollectionFilter::Children)
}

/// A live collection of every descendant element of `root` with tag name
/// `tag` (`"*"` matches any). Used by both `Document.getElementsByTagName`
/// and `Element.getElementsByTagName` — only the scoping root differs.
///
/// [§ 4.8](https://dom.spec.whatwg.org/#dom-document-getelementsbytagname)
#[must_use]
pub fn get_elements_by_tag_name(root: &NodeRef, tag: &str) -> LiveCollection {
    LiveCollection::new(root, CollectionKey::TagName(tag.to_owned()), CollectionFilter::TagName(tag.to_owned()))
}

/// A live collection of every descendant element of `root` carrying all of
/// `class_names`' space-separated tokens. Used by both
/// `Document.getElementsByClassName` and `Element.getElementsByClassName`.
///
/// [§ 4.8](https://dom.spec.whatwg.org/#dom-document-getelementsbyclassname)
#[must_use]
pub fn get_elements_by_class_name(root: &NodeRef, class_names: &str) -> LiveCollection {
    let tokens: Vec<String> = class_names.split_ascii_whitespace().map(str::to_owned).collect();
    LiveCollection::new(root, CollectionKey::ClassName(class_names.to_owned()), CollectionFilter::ClassName(tokens))
}

/// The shared, cached state behind a live collection: the root it is scoped
/// to, the filter it re-applies, and the last generation/result it computed.
pub struct LiveCollectionShared {
    root: NodeRef,
    filter: CollectionFilter,
    cache: RefCell<Option<(u64, Vec<NodeRef>)>>,
}

/// A live, order-preserving view over elements in `root`'s subtree matching
/// `filter`, recomputed whenever the owning document's generation counter
/// has advanced since the last read.
///
/// [§ 4.8](https://dom.spec.whatwg.org/#interface-htmlcollection)
#[derive(Clone)]
pub struct LiveCollection {
    shared: Rc<LiveCollectionShared>,
}

impl LiveCollection {
    /// Build (or return the cached identity of) a live collection scoped to
    /// `root`, matching `filter`.
    #[must_use]
    pub fn new(root: &NodeRef, key: CollectionKey, filter: CollectionFilter) -> Self {
        let mut rare = root.rare_data_mut();
        let slot = rare.as_mut().expect("rare_data_mut always populates");
        if let Some(existing) = slot.live_collections.get(&key).and_then(std::rc::Weak::upgrade) {
            return Self { shared: existing };
        }
        let shared = Rc::new(LiveCollectionShared {
            root: NodeRef::clone(root),
            filter,
            cache: RefCell::new(None),
        });
        slot.live_collections.insert(key, Rc::downgrade(&shared));
        Self { shared }
    }

    fn refresh(&self) {
        let generation = self
            .shared
            .root
            .owner_document()
            .map_or(0, |owner| owner.generation());
        let mut cache = self.shared.cache.borrow_mut();
        if matches!(&*cache, Some((cached_gen, _)) if *cached_gen == generation) {
            return;
        }
        let items = collect_matching(&self.shared.root, &self.shared.filter);
        *cache = Some((generation, items));
    }

    /// The collection's current length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.refresh();
        self.shared.cache.borrow().as_ref().map_or(0, |(_, items)| items.len())
    }

    /// Whether the collection currently matches no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element at `index` in the collection's current contents.
    #[must_use]
    pub fn item(&self, index: usize) -> Option<NodeRef> {
        self.refresh();
        self.shared
            .cache
            .borrow()
            .as_ref()
            .and_then(|(_, items)| items.get(index).cloned())
    }

    /// A static snapshot of the collection's current contents.
    #[must_use]
    pub fn to_snapshot(&self) -> NodeListSnapshot {
        self.refresh();
        NodeListSnapshot::new(
            self.shared
                .cache
                .borrow()
                .as_ref()
                .map(|(_, items)| items.clone())
                .unwrap_or_default(),
        )
    }
}

fn collect_matching(root: &NodeRef, filter: &CollectionFilter) -> Vec<NodeRef> {
    if matches!(filter, CollectionFilter::Children) {
        return root.children().filter(|child| child.as_element().is_some()).collect();
    }
    let mut results = Vec::new();
    let mut stack: Vec<NodeRef> = root.children().collect();
    stack.reverse();
    while let Some(node) = stack.pop() {
        if let Some(element) = node.as_element() {
            let matches = match filter {
                CollectionFilter::TagName(tag) => tag == "*" || element.tag.as_str() == tag,
                CollectionFilter::ClassName(tokens) => {
                    // An empty token set (e.g. `""` or all-whitespace input)
                    // matches nothing, not vacuously everything.
                    //
                    // [§ 8 S8](https://dom.spec.whatwg.org/#concept-getelementsbyclassname)
                    if tokens.is_empty() {
                        false
                    } else {
                        let class_value = element.attributes.borrow().get(None, "class").map(str::to_owned);
                        let present: std::collections::HashSet<&str> = class_value
                            .as_deref()
                            .map(str::split_ascii_whitespace)
                            .into_iter()
                            .flatten()
                            .collect();
                        tokens.iter().all(|token| present.contains(token.as_str()))
                    }
                }
                CollectionFilter::Children => unreachable!("handled above"),
            };
            if matches {
                results.push(NodeRef::clone(&node));
            }
        }
        let mut children: Vec<NodeRef> = node.children().collect();
        children.reverse();
        stack.extend(children);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::mutation::append_child;

    #[test]
    fn children_filter_excludes_text_and_grandchildren() {
        let doc = Document::new();
        let root = doc.create_element("ul", None);
        append_child(&doc.root(), &root).unwrap();
        let li1 = doc.create_element("li", None);
        let text = doc.create_text_node("between");
        let li2 = doc.create_element("li", None);
        append_child(&root, &li1).unwrap();
        append_child(&root, &text).unwrap();
        append_child(&root, &li2).unwrap();
        let grandchild = doc.create_element("span", None);
        append_child(&li1, &grandchild).unwrap();

        let children = element_children(&root);
        assert_eq!(children.len(), 2);

        let nodes = child_nodes(&root);
        assert_eq!(nodes.len(), 3);
    }

    #[test]
    fn class_name_filter_requires_every_token() {
        let doc = Document::new();
        let root = doc.create_element("div", None);
        append_child(&doc.root(), &root).unwrap();
        let match_both = doc.create_element("span", None);
        crate::element::set_attribute(&match_both, "class", "a b").unwrap();
        let match_one = doc.create_element("span", None);
        crate::element::set_attribute(&match_one, "class", "a").unwrap();
        append_child(&root, &match_both).unwrap();
        append_child(&root, &match_one).unwrap();

        let collection = LiveCollection::new(
            &root,
            CollectionKey::ClassName("a b".to_owned()),
            CollectionFilter::ClassName(vec!["a".to_owned(), "b".to_owned()]),
        );
        assert_eq!(collection.len(), 1);
        assert!(Rc::ptr_eq(&collection.item(0).unwrap(), &match_both));
    }

    #[test]
    fn an_empty_or_all_whitespace_class_name_matches_nothing() {
        let doc = Document::new();
        let root = doc.create_element("div", None);
        append_child(&doc.root(), &root).unwrap();
        let child = doc.create_element("span", None);
        crate::element::set_attribute(&child, "class", "a").unwrap();
        append_child(&root, &child).unwrap();

        assert!(get_elements_by_class_name(&root, "").is_empty());
        assert!(get_elements_by_class_name(&root, "   ").is_empty());
    }
}
