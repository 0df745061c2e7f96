//! Per-node side storage, allocated lazily.
//!
//! [§ 4.8 Live collections](https://dom.spec.whatwg.org/#interface-htmlcollection)
//!
//! Most nodes never need anything beyond the fields [`Node`](crate::node::Node)
//! carries inline. The exception is identity caching for live collections:
//! repeated calls to `getElementsByTagName` with the same arguments on the
//! same root must return the *same* `HTMLCollection` object, so a small cache
//! lives here instead of bloating every node with it.

use std::collections::HashMap;
use std::rc::Weak;

use crate::collections::{CollectionKey, LiveCollectionShared};

/// Lazily-allocated per-node state.
#[derive(Default)]
pub struct RareData {
    pub(crate) live_collections: HashMap<CollectionKey, Weak<LiveCollectionShared>>,
}
