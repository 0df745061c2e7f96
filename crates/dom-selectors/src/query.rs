//! Public selector-driven query entry points: `querySelector`,
//! `querySelectorAll`, `matches` and `closest`.
//!
//! [§ 4.6 Scope-match a selectors string](https://dom.spec.whatwg.org/#scope-match-a-selectors-string)
//!
//! Each function parses (and, when the node belongs to a document, caches)
//! the selector, then matches it against candidates in tree (pre-)order.
//! `querySelector`/`closest` take a narrow fast path for the single most
//! common case — a bare `#id` selector — by consulting the document's id
//! index instead of walking the subtree; everything else falls back to a
//! plain depth-first traversal.

use std::rc::Rc;

use dom_common::{DomError, DomResult};
use dom_core::collections::NodeListSnapshot;
use dom_core::node::NodeRef;

use crate::ast::{SelectorList, SimpleSelector};
use crate::matcher;
use crate::parser::{parse_selector_list, ParseError};

fn to_dom_error(error: &ParseError) -> DomError {
    DomError::Syntax {
        offset: error.offset,
        message: error.kind.to_string(),
    }
}

/// Parse `selector`, reusing `node`'s owning document's selector cache when
/// `node` belongs to one.
///
/// # Errors
///
/// Returns [`DomError::Syntax`] if `selector` does not parse.
fn parsed_list(node: &NodeRef, selector: &str) -> DomResult<Rc<SelectorList>> {
    match node.owner_document() {
        Some(owner) => crate::cache::parse_cached(&owner, selector).map_err(|error| to_dom_error(&error)),
        None => parse_selector_list(selector)
            .map(Rc::new)
            .map_err(|error| to_dom_error(&error)),
    }
}

/// If `list` is exactly one complex selector consisting of a single
/// compound with no combinators and exactly one simple selector of the kind
/// `extract` recognizes, return what `extract` extracted from it.
///
/// [§ 4.6 Pre-pass 1](https://dom.spec.whatwg.org/#dom-parentnode-queryselector)
fn single_simple_fast_path<'a, T>(
    list: &'a SelectorList,
    extract: impl Fn(&'a SimpleSelector) -> Option<T>,
) -> Option<T> {
    let [complex] = list.selectors.as_slice() else {
        return None;
    };
    if !complex.combinators.is_empty() {
        return None;
    }
    let [simple] = complex.subject.simple_selectors.as_slice() else {
        return None;
    };
    extract(simple)
}

fn single_id_fast_path(list: &SelectorList) -> Option<&str> {
    single_simple_fast_path(list, |simple| match simple {
        SimpleSelector::Id(id) => Some(id.as_str()),
        _ => None,
    })
}

fn single_class_fast_path(list: &SelectorList) -> Option<&str> {
    single_simple_fast_path(list, |simple| match simple {
        SimpleSelector::Class(class) => Some(class.as_str()),
        _ => None,
    })
}

fn single_tag_fast_path(list: &SelectorList) -> Option<&str> {
    single_simple_fast_path(list, |simple| match simple {
        SimpleSelector::Type(tag) => Some(tag.as_str()),
        _ => None,
    })
}

/// Index-backed candidates for a single-class or single-tag fast path,
/// narrowed to `root`'s descendants and sorted into document order.
fn indexed_descendants(
    root: &NodeRef,
    candidates: impl FnOnce(&dom_core::indices::Indices) -> Vec<NodeRef>,
) -> Option<Vec<NodeRef>> {
    let owner = root.owner_document()?;
    let mut matches: Vec<NodeRef> = candidates(&owner.indices().borrow())
        .into_iter()
        .filter(|node| !Rc::ptr_eq(node, root) && is_inclusive_descendant(root, node))
        .collect();
    matches.sort_by(dom_core::indices::compare_document_order);
    Some(matches)
}

fn is_inclusive_descendant(ancestor: &NodeRef, node: &NodeRef) -> bool {
    let mut current = Some(NodeRef::clone(node));
    while let Some(candidate) = current {
        if Rc::ptr_eq(&candidate, ancestor) {
            return true;
        }
        current = candidate.parent();
    }
    false
}

/// Every element in `root`'s subtree (excluding `root` itself), in document
/// (pre)order.
fn descendant_elements_in_order(root: &NodeRef) -> Vec<NodeRef> {
    let mut results = Vec::new();
    let mut stack: Vec<NodeRef> = root.children().collect();
    stack.reverse();
    while let Some(node) = stack.pop() {
        if node.as_element().is_some() {
            results.push(NodeRef::clone(&node));
        }
        let mut children: Vec<NodeRef> = node.children().collect();
        children.reverse();
        stack.extend(children);
    }
    results
}

/// `root.querySelector(selector)`: the first descendant element (in document
/// order) matching `selector`, or `None`.
///
/// [§ 4.6](https://dom.spec.whatwg.org/#dom-parentnode-queryselector)
///
/// # Errors
///
/// Returns [`DomError::Syntax`] if `selector` does not parse.
pub fn query_selector(root: &NodeRef, selector: &str) -> DomResult<Option<NodeRef>> {
    let list = parsed_list(root, selector)?;
    if let Some(id) = single_id_fast_path(&list) {
        let candidate = root
            .owner_document()
            .and_then(|owner| owner.indices().borrow().get_by_id(id));
        return Ok(candidate.filter(|node| !Rc::ptr_eq(node, root) && is_inclusive_descendant(root, node)));
    }
    if let Some(class) = single_class_fast_path(&list) {
        if let Some(mut matches) = indexed_descendants(root, |indices| indices.get_by_class(class)) {
            return Ok(matches.drain(..).next());
        }
    }
    if let Some(tag) = single_tag_fast_path(&list) {
        if let Some(mut matches) = indexed_descendants(root, |indices| indices.get_by_tag(tag)) {
            return Ok(matches.drain(..).next());
        }
    }
    Ok(descendant_elements_in_order(root)
        .into_iter()
        .find(|node| matcher::matches_list(node, &list, Some(root))))
}

/// `root.querySelectorAll(selector)`: every descendant element (in document
/// order) matching `selector`.
///
/// [§ 4.6](https://dom.spec.whatwg.org/#dom-parentnode-queryselectorall)
///
/// # Errors
///
/// Returns [`DomError::Syntax`] if `selector` does not parse.
pub fn query_selector_all(root: &NodeRef, selector: &str) -> DomResult<NodeListSnapshot> {
    let list = parsed_list(root, selector)?;
    if let Some(class) = single_class_fast_path(&list) {
        if let Some(matches) = indexed_descendants(root, |indices| indices.get_by_class(class)) {
            return Ok(NodeListSnapshot::new(matches));
        }
    }
    if let Some(tag) = single_tag_fast_path(&list) {
        if let Some(matches) = indexed_descendants(root, |indices| indices.get_by_tag(tag)) {
            return Ok(NodeListSnapshot::new(matches));
        }
    }
    let matches = descendant_elements_in_order(root)
        .into_iter()
        .filter(|node| matcher::matches_list(node, &list, Some(root)))
        .collect();
    Ok(NodeListSnapshot::new(matches))
}

/// `element.matches(selector)`.
///
/// [§ 4.6](https://dom.spec.whatwg.org/#dom-element-matches)
///
/// # Errors
///
/// Returns [`DomError::Syntax`] if `selector` does not parse.
pub fn matches_selector(element: &NodeRef, selector: &str) -> DomResult<bool> {
    let list = parsed_list(element, selector)?;
    Ok(matcher::matches_list(element, &list, None))
}

/// `element.closest(selector)`: `element` itself or the nearest ancestor (in
/// that order) matching `selector`.
///
/// [§ 4.6](https://dom.spec.whatwg.org/#dom-element-closest)
///
/// # Errors
///
/// Returns [`DomError::Syntax`] if `selector` does not parse.
pub fn closest(element: &NodeRef, selector: &str) -> DomResult<Option<NodeRef>> {
    let list = parsed_list(element, selector)?;
    let mut current = Some(NodeRef::clone(element));
    while let Some(node) = current {
        if node.as_element().is_some() && matcher::matches_list(&node, &list, None) {
            return Ok(Some(node));
        }
        current = node.parent();
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_core::document::Document;
    use dom_core::element::set_attribute;
    use dom_core::mutation::append_child;

    fn build_list(doc: &Document) -> (NodeRef, NodeRef, NodeRef) {
        let list = doc.create_element("ul", None);
        append_child(&doc.root(), &list).unwrap();
        let item_a = doc.create_element("li", None);
        set_attribute(&item_a, "id", "a").unwrap();
        set_attribute(&item_a, "class", "item first").unwrap();
        let item_b = doc.create_element("li", None);
        set_attribute(&item_b, "class", "item").unwrap();
        append_child(&list, &item_a).unwrap();
        append_child(&list, &item_b).unwrap();
        (list, item_a, item_b)
    }

    #[test]
    fn query_selector_finds_by_id_via_fast_path() {
        let doc = Document::new();
        let (list, item_a, _) = build_list(&doc);
        let found = query_selector(&list, "#a").unwrap().unwrap();
        assert!(Rc::ptr_eq(&found, &item_a));
    }

    #[test]
    fn query_selector_all_returns_matches_in_document_order() {
        let doc = Document::new();
        let (list, item_a, item_b) = build_list(&doc);
        let matches = query_selector_all(&list, ".item").unwrap();
        assert_eq!(matches.len(), 2);
        assert!(Rc::ptr_eq(&matches.item(0).unwrap(), &item_a));
        assert!(Rc::ptr_eq(&matches.item(1).unwrap(), &item_b));
    }

    #[test]
    fn matches_and_closest_agree_on_ancestor_selector() {
        let doc = Document::new();
        let (list, item_a, _) = build_list(&doc);
        assert!(matches_selector(&item_a, "li.first").unwrap());
        let closest_list = closest(&item_a, "ul").unwrap().unwrap();
        assert!(Rc::ptr_eq(&closest_list, &list));
    }

    #[test]
    fn invalid_selector_reports_syntax_error() {
        let doc = Document::new();
        let (list, _, _) = build_list(&doc);
        let error = query_selector(&list, "").unwrap_err();
        assert!(matches!(error, DomError::Syntax { .. }));
    }

    #[test]
    fn query_selector_all_finds_by_tag_via_fast_path() {
        let doc = Document::new();
        let (list, item_a, item_b) = build_list(&doc);
        let matches = query_selector_all(&list, "li").unwrap();
        assert_eq!(matches.len(), 2);
        assert!(Rc::ptr_eq(&matches.item(0).unwrap(), &item_a));
        assert!(Rc::ptr_eq(&matches.item(1).unwrap(), &item_b));
    }

    #[test]
    fn query_selector_finds_by_class_via_fast_path() {
        let doc = Document::new();
        let (list, item_a, _) = build_list(&doc);
        let found = query_selector(&list, ".first").unwrap().unwrap();
        assert!(Rc::ptr_eq(&found, &item_a));
    }

    #[test]
    fn class_fast_path_ignores_carriers_outside_the_scope_subtree() {
        let doc = Document::new();
        let (list, _, _) = build_list(&doc);
        let outsider = doc.create_element("li", None);
        set_attribute(&outsider, "class", "item").unwrap();
        append_child(&doc.root(), &outsider).unwrap();

        let matches = query_selector_all(&list, ".item").unwrap();
        assert_eq!(matches.len(), 2);
    }
}
