//! Element attribute reads/writes and their index/observer side effects.
//!
//! [§ 4.2 Attribute map](https://dom.spec.whatwg.org/#interface-element)
//!
//! A bare [`crate::attr::AttributeMap`] write never touches `id_map`,
//! `class_map` or the class bloom filter on its own — those only follow an
//! attribute change when it happens through this module. `set_attribute`,
//! `remove_attribute` and `toggle_attribute` are the only entry points that
//! keep the element's stored attributes, the document's indices and its
//! queued mutation records all consistent with each other.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use dom_common::{DomError, DomResult};
use rustc_hash::FxHasher;

use crate::collections::LiveCollection;
use crate::document::DocumentShared;
use crate::node::{ElementData, NodeRef};
use crate::observer::{queue_record, MutationRecord};

const ID_ATTR: &str = "id";
const CLASS_ATTR: &str = "class";

fn require_element(node: &NodeRef) -> &ElementData {
    node.as_element()
        .unwrap_or_else(|| unreachable!("attribute operation on a non-element node"))
}

fn owner_of(element: &NodeRef) -> Rc<DocumentShared> {
    element
        .owner_document()
        .unwrap_or_else(|| unreachable!("element has no owner document"))
}

/// [§ 4.2](https://dom.spec.whatwg.org/#dom-element-getattribute)
#[must_use]
pub fn get_attribute(element: &NodeRef, name: &str) -> Option<String> {
    get_attribute_ns(element, None, &name.to_ascii_lowercase())
}

/// [§ 4.2](https://dom.spec.whatwg.org/#dom-element-getattributens)
///
/// HTML attribute names are matched case-insensitively against the stored
/// local names, per `spec_full.md` §C.3.
#[must_use]
pub fn get_attribute_ns(element: &NodeRef, namespace: Option<&str>, local_name: &str) -> Option<String> {
    let data = require_element(element);
    data.attributes
        .borrow()
        .iter()
        .find(|entry| {
            entry.namespace.as_deref() == namespace && entry.name.as_str().eq_ignore_ascii_case(local_name)
        })
        .map(|entry| entry.value.clone())
}

/// [§ 4.2](https://dom.spec.whatwg.org/#dom-element-hasattribute)
#[must_use]
pub fn has_attribute(element: &NodeRef, name: &str) -> bool {
    get_attribute(element, name).is_some()
}

/// [§ 4.2](https://dom.spec.whatwg.org/#dom-element-hasattributens)
#[must_use]
pub fn has_attribute_ns(element: &NodeRef, namespace: Option<&str>, local_name: &str) -> bool {
    get_attribute_ns(element, namespace, local_name).is_some()
}

/// The qualified names of this element's attributes, in insertion order.
///
/// [§ 4.2](https://dom.spec.whatwg.org/#dom-element-getattributenames)
#[must_use]
pub fn attribute_names(element: &NodeRef) -> Vec<String> {
    let data = require_element(element);
    data.attributes
        .borrow()
        .iter()
        .map(|entry| entry.name.as_str().to_owned())
        .collect()
}

/// Set `name` (ASCII-lowercased; no namespace) to `value`.
///
/// [§ 4.2](https://dom.spec.whatwg.org/#dom-element-setattribute)
pub fn set_attribute(element: &NodeRef, name: &str, value: &str) -> DomResult<()> {
    set_attribute_ns(element, None, &name.to_ascii_lowercase(), value)
}

/// Set a namespaced attribute. `qualified_name` is stored as given, with no
/// case folding.
///
/// [§ 4.2](https://dom.spec.whatwg.org/#dom-element-setattributens)
pub fn set_attribute_ns(
    element: &NodeRef,
    namespace: Option<&str>,
    qualified_name: &str,
    value: &str,
) -> DomResult<()> {
    if qualified_name.is_empty() {
        return Err(DomError::InvalidCharacter(
            "attribute name must not be empty".to_owned(),
        ));
    }
    let owner = owner_of(element);
    let local_name = qualified_name.rsplit(':').next().unwrap_or(qualified_name).to_owned();
    let name_atom = owner.intern(qualified_name);
    let namespace_atom = namespace.map(|ns| owner.intern(ns));

    let data = require_element(element);
    let old_value = data.attributes.borrow_mut().set(namespace_atom, name_atom, value.to_owned());
    after_attribute_write(&owner, element, data, &local_name, namespace, old_value);
    Ok(())
}

/// [§ 4.2](https://dom.spec.whatwg.org/#dom-element-removeattribute)
pub fn remove_attribute(element: &NodeRef, name: &str) {
    remove_attribute_ns(element, None, &name.to_ascii_lowercase());
}

/// [§ 4.2](https://dom.spec.whatwg.org/#dom-element-removeattributens)
pub fn remove_attribute_ns(element: &NodeRef, namespace: Option<&str>, local_name: &str) {
    let owner = owner_of(element);
    let namespace_atom = namespace.map(|ns| owner.intern(ns));
    let data = require_element(element);
    let old_value = data.attributes.borrow_mut().remove(namespace_atom.as_ref(), local_name);
    if old_value.is_some() {
        after_attribute_write(&owner, element, data, local_name, namespace, old_value);
    }
}

/// Toggle `name`'s presence (no namespace), honoring an explicit `force`
/// if given, and returning the attribute's presence after the call.
///
/// [§ 4.2](https://dom.spec.whatwg.org/#dom-element-toggleattribute)
pub fn toggle_attribute(element: &NodeRef, name: &str, force: Option<bool>) -> DomResult<bool> {
    let lowered = name.to_ascii_lowercase();
    let present = has_attribute(element, &lowered);
    match (force, present) {
        (Some(true), true) => Ok(true),
        (None, true) => {
            remove_attribute(element, &lowered);
            Ok(false)
        }
        (Some(false), _) => {
            if present {
                remove_attribute(element, &lowered);
            }
            Ok(false)
        }
        (Some(true), false) | (None, false) => {
            set_attribute(element, &lowered, "")?;
            Ok(true)
        }
    }
}

fn after_attribute_write(
    owner: &Rc<DocumentShared>,
    element: &NodeRef,
    data: &ElementData,
    local_name: &str,
    namespace: Option<&str>,
    old_value: Option<String>,
) {
    if namespace.is_none() && local_name.eq_ignore_ascii_case(ID_ATTR) {
        let new_value = data.attributes.borrow().get(None, ID_ATTR).map(str::to_owned);
        sync_id(owner, element, old_value.as_deref(), new_value.as_deref());
    }
    if namespace.is_none() && local_name.eq_ignore_ascii_case(CLASS_ATTR) {
        let new_value = data.attributes.borrow().get(None, CLASS_ATTR).map(str::to_owned);
        sync_class(owner, element, data, old_value.as_deref(), new_value.as_deref());
    }
    owner.bump_generation();
    queue_record(
        owner,
        MutationRecord::attribute(element, local_name.to_owned(), namespace.map(str::to_owned), old_value),
    );
}

fn sync_id(owner: &Rc<DocumentShared>, element: &NodeRef, old_value: Option<&str>, new_value: Option<&str>) {
    let mut indices = owner.indices().borrow_mut();
    if let Some(old) = old_value.filter(|value| !value.is_empty()) {
        let atom = owner.intern(old);
        indices.remove_id(&atom, element);
    }
    if let Some(new) = new_value.filter(|value| !value.is_empty()) {
        let atom = owner.intern(new);
        indices.insert_id(atom, element);
    }
}

fn tokens(value: Option<&str>) -> HashSet<&str> {
    value.map(str::split_ascii_whitespace).into_iter().flatten().collect()
}

fn sync_class(
    owner: &Rc<DocumentShared>,
    element: &NodeRef,
    data: &ElementData,
    old_value: Option<&str>,
    new_value: Option<&str>,
) {
    let old_tokens = tokens(old_value);
    let new_tokens = tokens(new_value);
    {
        let mut indices = owner.indices().borrow_mut();
        for removed in old_tokens.difference(&new_tokens) {
            let atom = owner.intern(removed);
            indices.remove_class(&atom, element);
        }
        for added in new_tokens.difference(&old_tokens) {
            let atom = owner.intern(added);
            indices.insert_class(atom, element);
        }
    }
    rebuild_class_bloom(data, &new_tokens);
}

fn rebuild_class_bloom(data: &ElementData, tokens: &HashSet<&str>) {
    let mut bloom = 0u64;
    for token in tokens {
        bloom |= bloom_bits(token);
    }
    data.class_bloom.set(bloom);
}

fn bloom_bits(token: &str) -> u64 {
    let mut hasher = FxHasher::default();
    token.hash(&mut hasher);
    let h1 = hasher.finish();
    let h2 = h1.rotate_left(17) ^ h1.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    (1u64 << (h1 % 64)) | (1u64 << (h2 % 64))
}

/// Whether `token` might be one of `data`'s class tokens. May return a false
/// positive; never a false negative.
///
/// [§ 9 Design notes](https://dom.spec.whatwg.org/#concept-class)
#[must_use]
pub fn class_bloom_may_contain(data: &ElementData, token: &str) -> bool {
    let bits = bloom_bits(token);
    data.class_bloom.get() & bits == bits
}

/// A live collection of every descendant element of `element` with tag name
/// `tag` (`"*"` matches any).
///
/// [§ 4.8](https://dom.spec.whatwg.org/#dom-element-getelementsbytagname)
#[must_use]
pub fn get_elements_by_tag_name(element: &NodeRef, tag: &str) -> LiveCollection {
    crate::collections::get_elements_by_tag_name(element, tag)
}

/// A live collection of every descendant element of `element` carrying all
/// of `class_names`' space-separated tokens.
///
/// [§ 4.8](https://dom.spec.whatwg.org/#dom-element-getelementsbyclassname)
#[must_use]
pub fn get_elements_by_class_name(element: &NodeRef, class_names: &str) -> LiveCollection {
    crate::collections::get_elements_by_class_name(element, class_names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::mutation::append_child;

    #[test]
    fn set_attribute_lowercases_the_name_and_preserves_insertion_position() {
        let doc = Document::new();
        let element = doc.create_element("div", None);
        set_attribute(&element, "Data-Foo", "1").unwrap();
        set_attribute(&element, "data-bar", "2").unwrap();
        set_attribute(&element, "DATA-FOO", "3").unwrap();

        assert_eq!(attribute_names(&element), vec!["data-foo", "data-bar"]);
        assert_eq!(get_attribute(&element, "data-foo"), Some("3".to_owned()));
    }

    #[test]
    fn toggle_attribute_without_force_flips_presence() {
        let doc = Document::new();
        let element = doc.create_element("div", None);
        assert!(toggle_attribute(&element, "hidden", None).unwrap());
        assert!(has_attribute(&element, "hidden"));
        assert!(!toggle_attribute(&element, "hidden", None).unwrap());
        assert!(!has_attribute(&element, "hidden"));
    }

    #[test]
    fn toggle_attribute_with_force_is_idempotent() {
        let doc = Document::new();
        let element = doc.create_element("div", None);
        assert!(toggle_attribute(&element, "hidden", Some(true)).unwrap());
        assert!(toggle_attribute(&element, "hidden", Some(true)).unwrap());
        assert!(has_attribute(&element, "hidden"));
    }

    #[test]
    fn setting_an_empty_qualified_name_is_an_invalid_character_error() {
        let doc = Document::new();
        let element = doc.create_element("div", None);
        let error = set_attribute_ns(&element, None, "", "x").unwrap_err();
        assert!(matches!(error, DomError::InvalidCharacter(_)));
    }

    #[test]
    fn setting_the_id_attribute_makes_get_element_by_id_find_it() {
        let doc = Document::new();
        let root = doc.create_element("div", None);
        append_child(&doc.root(), &root).unwrap();
        set_attribute(&root, "id", "target").unwrap();
        assert!(Rc::ptr_eq(&doc.get_element_by_id("target").unwrap(), &root));

        remove_attribute(&root, "id");
        assert!(doc.get_element_by_id("target").is_none());
    }

    #[test]
    fn class_bloom_reflects_the_current_class_attribute() {
        let doc = Document::new();
        let element = doc.create_element("div", None);
        set_attribute(&element, "class", "alpha beta").unwrap();
        let data = element.as_element().unwrap();
        assert!(class_bloom_may_contain(data, "alpha"));
        assert!(class_bloom_may_contain(data, "beta"));

        set_attribute(&element, "class", "beta").unwrap();
        assert!(class_bloom_may_contain(data, "beta"));
    }

    #[test]
    fn get_elements_by_tag_name_is_scoped_to_the_element_not_the_whole_document() {
        let doc = Document::new();
        let root = doc.create_element("div", None);
        append_child(&doc.root(), &root).unwrap();
        let inside = doc.create_element("span", None);
        append_child(&root, &inside).unwrap();
        let outside = doc.create_element("span", None);
        append_child(&doc.root(), &outside).unwrap();

        let scoped = get_elements_by_tag_name(&root, "span");
        assert_eq!(scoped.len(), 1);
        assert!(Rc::ptr_eq(&scoped.item(0).unwrap(), &inside));
    }
}
