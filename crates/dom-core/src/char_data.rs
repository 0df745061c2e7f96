//! `CharacterData` operations (Text / Comment / CDATASection).
//!
//! [§ 3.3 CharacterData](https://dom.spec.whatwg.org/#interface-characterdata)
//!
//! Offsets are UTF-16 code units, matching the platform string type the
//! living standard assumes; the in-memory representation stays UTF-8, so
//! every offset is walked through `char::len_utf16` rather than treated as a
//! byte index.

use std::cell::RefCell;

use dom_common::{DomError, DomResult};

use crate::node::NodeRef;
use crate::observer::{queue_record, MutationRecord};

fn require_char_data(node: &NodeRef) -> &RefCell<String> {
    node.as_character_data()
        .unwrap_or_else(|| unreachable!("character data operation on a non-CharacterData node"))
}

/// The UTF-16 length of this node's data.
///
/// [§ 3.3](https://dom.spec.whatwg.org/#dom-characterdata-length)
#[must_use]
pub fn length(node: &NodeRef) -> usize {
    require_char_data(node).borrow().encode_utf16().count()
}

/// Convert a UTF-16 code-unit offset into a byte offset into `s`.
fn utf16_offset_to_byte(s: &str, utf16_offset: usize) -> DomResult<usize> {
    let mut units = 0usize;
    for (byte_offset, ch) in s.char_indices() {
        if units == utf16_offset {
            return Ok(byte_offset);
        }
        units += ch.len_utf16();
    }
    if units == utf16_offset {
        return Ok(s.len());
    }
    Err(DomError::InvalidState(format!(
        "offset {utf16_offset} is out of range for character data of length {units}"
    )))
}

/// [§ 3.3](https://dom.spec.whatwg.org/#dom-characterdata-substringdata)
pub fn substring_data(node: &NodeRef, offset: usize, count: usize) -> DomResult<String> {
    let cell = require_char_data(node);
    let data = cell.borrow();
    let start = utf16_offset_to_byte(&data, offset)?;
    let end = utf16_offset_to_byte(&data, offset.saturating_add(count)).unwrap_or(data.len());
    Ok(data[start..end.max(start)].to_owned())
}

/// [§ 3.3](https://dom.spec.whatwg.org/#dom-characterdata-appenddata)
pub fn append_data(node: &NodeRef, value: &str) {
    let cell = require_char_data(node);
    let old_value = cell.borrow().clone();
    cell.borrow_mut().push_str(value);
    notify_changed(node, old_value);
}

/// [§ 3.3](https://dom.spec.whatwg.org/#dom-characterdata-insertdata)
pub fn insert_data(node: &NodeRef, offset: usize, value: &str) -> DomResult<()> {
    replace_data(node, offset, 0, value)
}

/// [§ 3.3](https://dom.spec.whatwg.org/#dom-characterdata-deletedata)
pub fn delete_data(node: &NodeRef, offset: usize, count: usize) -> DomResult<()> {
    replace_data(node, offset, count, "")
}

/// [§ 3.3](https://dom.spec.whatwg.org/#dom-characterdata-replacedata)
pub fn replace_data(node: &NodeRef, offset: usize, count: usize, value: &str) -> DomResult<()> {
    let cell = require_char_data(node);
    let old_value = cell.borrow().clone();
    let start = utf16_offset_to_byte(&old_value, offset)?;
    let end = utf16_offset_to_byte(&old_value, offset.saturating_add(count)).unwrap_or(old_value.len());
    let mut new_value = String::with_capacity(old_value.len() - (end - start) + value.len());
    new_value.push_str(&old_value[..start]);
    new_value.push_str(value);
    new_value.push_str(&old_value[end..]);
    *cell.borrow_mut() = new_value;
    notify_changed(node, old_value);
    Ok(())
}

fn notify_changed(node: &NodeRef, old_value: String) {
    if let Some(owner) = node.owner_document() {
        owner.bump_generation();
        queue_record(&owner, MutationRecord::character_data(node, old_value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn append_data_extends_and_reports_old_value() {
        let document = Document::new();
        let text = document.create_text_node("hello");
        append_data(&text, " world");
        assert_eq!(text.as_character_data().unwrap().borrow().as_str(), "hello world");
        assert_eq!(length(&text), 11);
    }

    #[test]
    fn replace_data_handles_utf16_offsets_across_astral_characters() {
        let document = Document::new();
        // "a\u{1F600}b" is 1 + 2 + 1 = 4 UTF-16 code units (the emoji is a surrogate pair).
        let text = document.create_text_node("a\u{1F600}b");
        assert_eq!(length(&text), 4);
        replace_data(&text, 3, 1, "c").unwrap();
        assert_eq!(text.as_character_data().unwrap().borrow().as_str(), "a\u{1F600}c");
    }

    #[test]
    fn substring_data_out_of_range_is_an_error() {
        let document = Document::new();
        let text = document.create_text_node("abc");
        assert!(substring_data(&text, 10, 1).is_err());
    }

    #[test]
    fn delete_data_removes_a_middle_span() {
        let document = Document::new();
        let text = document.create_text_node("abcdef");
        delete_data(&text, 2, 2).unwrap();
        assert_eq!(text.as_character_data().unwrap().borrow().as_str(), "abef");
    }
}
