//! Mutation observation.
//!
//! [§ 4.11 MutationObserver](https://dom.spec.whatwg.org/#mutation-observers)
//!
//! Records are queued synchronously as mutations happen and delivered by an
//! explicit [`Document`](crate::document::Document)-driven `take_records`
//! call rather than a microtask queue (this core has no event loop to hook
//! into, per `spec_full.md` §A.3's "no built-in interruption mechanism").

use std::rc::{Rc, Weak};

use crate::document::DocumentShared;
use crate::node::NodeRef;

/// What kinds of mutation an observer wants to hear about.
///
/// [§ 4.11](https://dom.spec.whatwg.org/#dictdef-mutationobserverinit)
#[derive(Debug, Clone, Default)]
pub struct MutationObserverInit {
    /// Observe child insertion/removal.
    pub child_list: bool,
    /// Observe attribute value changes.
    pub attributes: bool,
    /// Observe character data changes.
    pub character_data: bool,
    /// Also observe the above within descendants, not just direct targets.
    pub subtree: bool,
    /// Include the attribute's prior value on delivered `Attribute` records.
    pub attribute_old_value: bool,
    /// Include the character data's prior value on delivered
    /// `CharacterData` records.
    pub character_data_old_value: bool,
    /// Restrict attribute observation to these local names. `None` observes
    /// every attribute.
    pub attribute_filter: Option<Vec<String>>,
}

/// A single recorded mutation.
///
/// [§ 4.11.1 MutationRecord](https://dom.spec.whatwg.org/#mutationrecord)
#[derive(Clone)]
pub struct MutationRecord {
    /// The node the mutation is reported against.
    pub target: NodeRef,
    /// The kind of mutation.
    pub kind: MutationKind,
}

/// The category of a [`MutationRecord`].
#[derive(Clone)]
pub enum MutationKind {
    /// Children were inserted and/or removed under `target`.
    ///
    /// [§ 8 boundary](https://dom.spec.whatwg.org/#mutationrecord) — a
    /// `DocumentFragment` with `k` children spliced in a single call
    /// produces one record with `added_nodes.len() == k`.
    ChildList {
        /// Nodes inserted by this mutation, in document order.
        added_nodes: Vec<NodeRef>,
        /// Nodes removed by this mutation, in document order.
        removed_nodes: Vec<NodeRef>,
        /// The sibling immediately preceding the changed range, captured at
        /// the time of the mutation.
        previous_sibling: Option<NodeRef>,
        /// The sibling immediately following the changed range, captured at
        /// the time of the mutation.
        next_sibling: Option<NodeRef>,
    },
    /// `name`'s value changed on `target` from `old_value`.
    Attribute {
        /// The attribute's local name.
        name: String,
        /// The attribute's namespace, if any.
        namespace: Option<String>,
        /// The attribute's value before this mutation, if it had one.
        old_value: Option<String>,
    },
    /// `target`'s character data changed from `old_value`.
    CharacterData {
        /// The character data's value before this mutation.
        old_value: String,
    },
}

impl MutationRecord {
    /// Build a `childList` record for `target`.
    #[must_use]
    pub fn child_list(
        target: &NodeRef,
        added_nodes: Vec<NodeRef>,
        removed_nodes: Vec<NodeRef>,
        previous_sibling: Option<NodeRef>,
        next_sibling: Option<NodeRef>,
    ) -> Self {
        Self {
            target: NodeRef::clone(target),
            kind: MutationKind::ChildList {
                added_nodes,
                removed_nodes,
                previous_sibling,
                next_sibling,
            },
        }
    }

    /// Build an `attributes` record for `target`.
    #[must_use]
    pub fn attribute(
        target: &NodeRef,
        name: String,
        namespace: Option<String>,
        old_value: Option<String>,
    ) -> Self {
        Self {
            target: NodeRef::clone(target),
            kind: MutationKind::Attribute {
                name,
                namespace,
                old_value,
            },
        }
    }

    /// Build a `characterData` record for `target`.
    #[must_use]
    pub fn character_data(target: &NodeRef, old_value: String) -> Self {
        Self {
            target: NodeRef::clone(target),
            kind: MutationKind::CharacterData { old_value },
        }
    }
}

/// A registered observer: its filter options, the subtree root it watches,
/// and the callback that receives delivered records.
pub struct MutationObserverHandle {
    pub(crate) target: Weak<crate::node::Node>,
    pub(crate) options: MutationObserverInit,
    pub(crate) callback: Rc<dyn Fn(&[MutationRecord])>,
}

/// A handle identifying a registered [`MutationObserverHandle`] for later
/// disconnection.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(pub(crate) usize);

impl DocumentShared {
    /// Register a new mutation observer watching `target`.
    ///
    /// [§ 4.11.2 Observe](https://dom.spec.whatwg.org/#dom-mutationobserver-observe)
    pub fn observe(
        &self,
        target: &NodeRef,
        options: MutationObserverInit,
        callback: Rc<dyn Fn(&[MutationRecord])>,
    ) -> ObserverId {
        let mut observers = self.observers.borrow_mut();
        observers.push(MutationObserverHandle {
            target: Rc::downgrade(target),
            options,
            callback,
        });
        ObserverId(observers.len() - 1)
    }

    /// Stop observing and discard any queued-but-undelivered records for
    /// this observer.
    ///
    /// [§ 4.11.2 Disconnect](https://dom.spec.whatwg.org/#dom-mutationobserver-disconnect)
    pub fn disconnect(&self, id: ObserverId) {
        let mut observers = self.observers.borrow_mut();
        if id.0 < observers.len() {
            observers.remove(id.0);
        }
    }

    /// Synchronously deliver all queued records to every still-interested
    /// observer, then clear the queue.
    ///
    /// [§ 4.11.2 Deliver](https://dom.spec.whatwg.org/#queue-a-mutation-observer-microtask)
    pub fn deliver_records(&self) {
        let records = self.pending_records.borrow_mut().split_off(0);
        if records.is_empty() {
            return;
        }
        for observer in self.observers.borrow().iter() {
            let Some(target) = observer.target.upgrade() else {
                continue;
            };
            let relevant: Vec<MutationRecord> = records
                .iter()
                .filter(|record| is_relevant(&target, record, &observer.options))
                .cloned()
                .map(|record| redact_old_value(record, &observer.options))
                .collect();
            if !relevant.is_empty() {
                (observer.callback)(&relevant);
            }
        }
    }

    /// Take and discard all queued records without delivering them.
    ///
    /// [§ 4.11.2 Take records](https://dom.spec.whatwg.org/#dom-mutationobserver-takerecords)
    #[must_use]
    pub fn take_records(&self) -> Vec<MutationRecord> {
        self.pending_records.borrow_mut().split_off(0)
    }
}

fn is_relevant(target: &NodeRef, record: &MutationRecord, options: &MutationObserverInit) -> bool {
    let kind_allowed = match &record.kind {
        MutationKind::ChildList { .. } => options.child_list,
        MutationKind::Attribute { name, .. } => {
            options.attributes
                && options
                    .attribute_filter
                    .as_ref()
                    .map_or(true, |filter| filter.iter().any(|filtered| filtered == name))
        }
        MutationKind::CharacterData { .. } => options.character_data,
    };
    if !kind_allowed {
        return false;
    }
    if Rc::ptr_eq(target, &record.target) {
        return true;
    }
    options.subtree && is_descendant(target, &record.target)
}

/// Strip a record's prior-value field unless the observer asked for it, per
/// `attribute_old_value`/`character_data_old_value`.
///
/// [§ 4.11](https://dom.spec.whatwg.org/#dictdef-mutationobserverinit)
fn redact_old_value(mut record: MutationRecord, options: &MutationObserverInit) -> MutationRecord {
    match &mut record.kind {
        MutationKind::Attribute { old_value, .. } if !options.attribute_old_value => {
            *old_value = None;
        }
        MutationKind::CharacterData { old_value } if !options.character_data_old_value => {
            old_value.clear();
        }
        _ => {}
    }
    record
}

fn is_descendant(ancestor: &NodeRef, node: &NodeRef) -> bool {
    let mut current = node.parent();
    while let Some(candidate) = current {
        if Rc::ptr_eq(&candidate, ancestor) {
            return true;
        }
        current = candidate.parent();
    }
    false
}

/// Queue `record` for later delivery against `owner`'s registered observers.
pub(crate) fn queue_record(owner: &Rc<DocumentShared>, record: MutationRecord) {
    owner.pending_records.borrow_mut().push(record);
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::document::Document;
    use crate::element;
    use crate::mutation::append_child;

    #[test]
    fn a_subtree_observer_sees_a_grandchild_child_list_mutation() {
        let doc = Document::new();
        let root = doc.create_element("div", None);
        append_child(&doc.root(), &root).unwrap();
        let child = doc.create_element("span", None);
        append_child(&root, &child).unwrap();

        let options = MutationObserverInit {
            child_list: true,
            subtree: true,
            ..MutationObserverInit::default()
        };
        doc.shared()
            .observe(&root, options, Rc::new(|_: &[MutationRecord]| {}));

        let grandchild = doc.create_text_node("leaf");
        append_child(&child, &grandchild).unwrap();

        let records = doc.shared().take_records();
        assert_eq!(records.len(), 1);
        assert!(Rc::ptr_eq(&records[0].target, &child));
        let MutationKind::ChildList { added_nodes, removed_nodes, .. } = &records[0].kind else {
            panic!("expected a childList record");
        };
        assert_eq!(added_nodes.len(), 1);
        assert!(Rc::ptr_eq(&added_nodes[0], &grandchild));
        assert!(removed_nodes.is_empty());
    }

    #[test]
    fn attribute_old_value_is_omitted_unless_requested() {
        let doc = Document::new();
        let root = doc.create_element("div", None);
        append_child(&doc.root(), &root).unwrap();
        element::set_attribute(&root, "class", "before").unwrap();

        let seen: Rc<RefCell<Vec<Option<String>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let options = MutationObserverInit {
            attributes: true,
            ..MutationObserverInit::default()
        };
        doc.shared().observe(
            &root,
            options,
            Rc::new(move |records: &[MutationRecord]| {
                for record in records {
                    if let MutationKind::Attribute { old_value, .. } = &record.kind {
                        sink.borrow_mut().push(old_value.clone());
                    }
                }
            }),
        );

        element::set_attribute(&root, "class", "after").unwrap();
        doc.shared().deliver_records();

        assert_eq!(seen.borrow().as_slice(), [None]);
    }

    #[test]
    fn attribute_filter_restricts_which_names_are_observed() {
        let doc = Document::new();
        let root = doc.create_element("div", None);
        append_child(&doc.root(), &root).unwrap();

        let options = MutationObserverInit {
            attributes: true,
            attribute_filter: Some(vec!["class".to_owned()]),
            ..MutationObserverInit::default()
        };
        doc.shared()
            .observe(&root, options, Rc::new(|_: &[MutationRecord]| {}));

        element::set_attribute(&root, "title", "ignored").unwrap();
        assert!(doc.shared().take_records().is_empty());

        element::set_attribute(&root, "class", "seen").unwrap();
        assert_eq!(doc.shared().take_records().len(), 1);
    }

    #[test]
    fn disconnect_stops_further_delivery() {
        let doc = Document::new();
        let root = doc.create_element("div", None);
        append_child(&doc.root(), &root).unwrap();

        let options = MutationObserverInit {
            attributes: true,
            ..MutationObserverInit::default()
        };
        let id = doc
            .shared()
            .observe(&root, options, Rc::new(|_: &[MutationRecord]| {}));
        doc.shared().disconnect(id);

        element::set_attribute(&root, "class", "x").unwrap();
        assert!(doc.shared().take_records().is_empty());
    }
}
