//! Selector matching.
//!
//! [§ 4.6 Selector matcher](https://dom.spec.whatwg.org/#dom-parentnode-queryselector)
//!
//! A complex selector is stored subject-first (see [`crate::ast`]), so
//! matching walks outward from the candidate element: check the subject
//! compound, then satisfy each combinator in turn against a new candidate
//! (the parent for `>`, some ancestor for a descendant combinator, the
//! previous sibling for `+`, some earlier sibling for `~`). Descendant and
//! general-sibling combinators admit more than one candidate, so that step
//! backtracks through every ancestor/sibling in turn rather than committing
//! to the first one found.

use std::rc::Rc;

use dom_core::element::{class_bloom_may_contain, get_attribute};
use dom_core::node::{ElementData, NodeRef, NodeType};

use crate::ast::{
    AttrOperator, AttributeSelector, Combinator, ComplexSelector, CompoundSelector, PseudoClass,
    SelectorList, SimpleSelector,
};

/// Whether `element` satisfies any complex selector in `list`.
///
/// `scope` is the element `:scope` refers to; `None` falls back to the
/// element's document root.
///
/// [§ 4.6](https://dom.spec.whatwg.org/#dom-parentnode-queryselector)
#[must_use]
pub fn matches_list(element: &NodeRef, list: &SelectorList, scope: Option<&NodeRef>) -> bool {
    list.selectors
        .iter()
        .any(|complex| matches_complex(element, complex, scope))
}

/// Whether `element` satisfies `complex`.
#[must_use]
pub fn matches_complex(element: &NodeRef, complex: &ComplexSelector, scope: Option<&NodeRef>) -> bool {
    if !matches_compound(element, &complex.subject, scope) {
        return false;
    }
    matches_chain(element, &complex.combinators, scope)
}

fn matches_chain(node: &NodeRef, combinators: &[(Combinator, CompoundSelector)], scope: Option<&NodeRef>) -> bool {
    let Some(((combinator, compound), rest)) = combinators.split_first() else {
        return true;
    };
    match combinator {
        Combinator::Child => match node.parent() {
            Some(parent) if matches_compound(&parent, compound, scope) => {
                matches_chain(&parent, rest, scope)
            }
            _ => false,
        },
        Combinator::Descendant => {
            let mut current = node.parent();
            while let Some(ancestor) = current {
                if matches_compound(&ancestor, compound, scope) && matches_chain(&ancestor, rest, scope) {
                    return true;
                }
                current = ancestor.parent();
            }
            false
        }
        Combinator::AdjacentSibling => match previous_element_sibling(node) {
            Some(sibling) if matches_compound(&sibling, compound, scope) => {
                matches_chain(&sibling, rest, scope)
            }
            _ => false,
        },
        Combinator::GeneralSibling => {
            let mut current = previous_element_sibling(node);
            while let Some(sibling) = current {
                if matches_compound(&sibling, compound, scope) && matches_chain(&sibling, rest, scope) {
                    return true;
                }
                current = previous_element_sibling(&sibling);
            }
            false
        }
    }
}

fn matches_compound(element: &NodeRef, compound: &CompoundSelector, scope: Option<&NodeRef>) -> bool {
    let Some(data) = element.as_element() else {
        return false;
    };
    compound
        .simple_selectors
        .iter()
        .all(|simple| matches_simple(element, data, simple, scope))
}

fn matches_simple(element: &NodeRef, data: &ElementData, simple: &SimpleSelector, scope: Option<&NodeRef>) -> bool {
    match simple {
        SimpleSelector::Type(name) => data.tag.as_str() == name,
        SimpleSelector::Universal => true,
        SimpleSelector::Id(id) => get_attribute(element, "id").as_deref() == Some(id.as_str()),
        SimpleSelector::Class(class) => {
            class_bloom_may_contain(data, class) && has_class_token(element, class)
        }
        SimpleSelector::Attribute(attr) => matches_attribute(element, attr),
        SimpleSelector::PseudoClass(pseudo) => matches_pseudo_class(element, pseudo, scope),
    }
}

fn has_class_token(element: &NodeRef, class: &str) -> bool {
    get_attribute(element, "class")
        .as_deref()
        .is_some_and(|value| value.split_ascii_whitespace().any(|token| token == class))
}

fn matches_attribute(element: &NodeRef, attr: &AttributeSelector) -> bool {
    let Some(actual) = get_attribute(element, &attr.name) else {
        return false;
    };
    if attr.operator == AttrOperator::Exists {
        return true;
    }
    let Some(expected) = &attr.value else {
        return false;
    };
    let (actual, expected) = if attr.case_insensitive {
        (actual.to_ascii_lowercase(), expected.to_ascii_lowercase())
    } else {
        (actual, expected.clone())
    };
    match attr.operator {
        AttrOperator::Exists => unreachable!("handled above"),
        AttrOperator::Equals => actual == expected,
        AttrOperator::Includes => actual.split_ascii_whitespace().any(|token| token == expected),
        AttrOperator::DashMatch => actual == expected || actual.starts_with(&format!("{expected}-")),
        AttrOperator::PrefixMatch => !expected.is_empty() && actual.starts_with(&expected),
        AttrOperator::SuffixMatch => !expected.is_empty() && actual.ends_with(&expected),
        AttrOperator::SubstringMatch => !expected.is_empty() && actual.contains(&expected),
    }
}

fn matches_pseudo_class(element: &NodeRef, pseudo: &PseudoClass, scope: Option<&NodeRef>) -> bool {
    match pseudo {
        PseudoClass::Root => element.parent().is_some_and(|parent| parent.node_type() == NodeType::Document),
        PseudoClass::Empty => !element.has_child_nodes(),
        PseudoClass::FirstChild => previous_element_sibling(element).is_none(),
        PseudoClass::LastChild => next_element_sibling(element).is_none(),
        PseudoClass::OnlyChild => {
            previous_element_sibling(element).is_none() && next_element_sibling(element).is_none()
        }
        PseudoClass::FirstOfType => previous_sibling_of_same_type(element).is_none(),
        PseudoClass::LastOfType => next_sibling_of_same_type(element).is_none(),
        PseudoClass::OnlyOfType => {
            previous_sibling_of_same_type(element).is_none() && next_sibling_of_same_type(element).is_none()
        }
        PseudoClass::NthChild(an_b) => an_b.matches(sibling_position(element, false, false)),
        PseudoClass::NthLastChild(an_b) => an_b.matches(sibling_position(element, false, true)),
        PseudoClass::NthOfType(an_b) => an_b.matches(sibling_position(element, true, false)),
        PseudoClass::NthLastOfType(an_b) => an_b.matches(sibling_position(element, true, true)),
        PseudoClass::Lang(tag) => matches_lang(element, tag),
        PseudoClass::Scope => matches_scope(element, scope),
        PseudoClass::Not(list) => !matches_list(element, list, scope),
        PseudoClass::Is(list) | PseudoClass::Where(list) => matches_list(element, list, scope),
        PseudoClass::Has(list) => matches_has(element, list),
    }
}

fn previous_element_sibling(node: &NodeRef) -> Option<NodeRef> {
    let mut current = node.previous_sibling();
    while let Some(candidate) = current {
        if candidate.as_element().is_some() {
            return Some(candidate);
        }
        current = candidate.previous_sibling();
    }
    None
}

fn next_element_sibling(node: &NodeRef) -> Option<NodeRef> {
    let mut current = node.next_sibling();
    while let Some(candidate) = current {
        if candidate.as_element().is_some() {
            return Some(candidate);
        }
        current = candidate.next_sibling();
    }
    None
}

fn same_type(a: &NodeRef, b: &NodeRef) -> bool {
    match (a.as_element(), b.as_element()) {
        (Some(a), Some(b)) => a.tag == b.tag,
        _ => false,
    }
}

fn previous_sibling_of_same_type(node: &NodeRef) -> Option<NodeRef> {
    let mut current = previous_element_sibling(node);
    while let Some(candidate) = current {
        if same_type(&candidate, node) {
            return Some(candidate);
        }
        current = previous_element_sibling(&candidate);
    }
    None
}

fn next_sibling_of_same_type(node: &NodeRef) -> Option<NodeRef> {
    let mut current = next_element_sibling(node);
    while let Some(candidate) = current {
        if same_type(&candidate, node) {
            return Some(candidate);
        }
        current = next_element_sibling(&candidate);
    }
    None
}

/// 1-based position of `element` among its element siblings, optionally
/// restricted to same-tag siblings and/or counted from the end.
///
/// [§ 4.7](https://www.w3.org/TR/selectors-4/#the-nth-child-pseudo)
fn sibling_position(element: &NodeRef, of_type: bool, from_end: bool) -> i64 {
    let Some(parent) = element.parent() else {
        return 1;
    };
    let siblings: Vec<NodeRef> = parent
        .children()
        .filter(|child| {
            child.as_element().is_some() && (!of_type || same_type(child, element))
        })
        .collect();
    let Some(index) = siblings.iter().position(|child| Rc::ptr_eq(child, element)) else {
        return 1;
    };
    if from_end {
        (siblings.len() - index) as i64
    } else {
        (index + 1) as i64
    }
}

/// [§ 6.6.2 :lang()](https://www.w3.org/TR/selectors-4/#the-lang-pseudo) —
/// matched per [RFC 4647](https://www.rfc-editor.org/rfc/rfc4647) basic
/// filtering: the element's (inherited) language tag matches if it equals
/// `range` or starts with `range` followed by `-`, compared ASCII
/// case-insensitively.
fn matches_lang(element: &NodeRef, range: &str) -> bool {
    let mut current = Some(NodeRef::clone(element));
    while let Some(node) = current {
        if let Some(lang) = get_attribute(&node, "lang") {
            if lang.is_empty() {
                return false;
            }
            return lang.eq_ignore_ascii_case(range)
                || lang.to_ascii_lowercase().starts_with(&format!("{}-", range.to_ascii_lowercase()));
        }
        current = node.parent();
    }
    false
}

fn matches_scope(element: &NodeRef, scope: Option<&NodeRef>) -> bool {
    match scope {
        Some(scope) => Rc::ptr_eq(element, scope),
        None => element
            .owner_document()
            .is_some_and(|owner| owner.root().children().any(|child| Rc::ptr_eq(&child, element))),
    }
}

/// Whether any element in `host`'s subtree (`host` itself excluded) matches
/// `list`, with `host` as that match's `:scope`.
///
/// [§ 6.6.5 :has()](https://www.w3.org/TR/selectors-4/#has-pseudo) — only
/// plain (non-leading-combinator) relative selectors are supported, since
/// this engine's selector grammar has no bare-combinator production.
fn matches_has(host: &NodeRef, list: &SelectorList) -> bool {
    let mut stack: Vec<NodeRef> = host.children().collect();
    while let Some(node) = stack.pop() {
        if node.as_element().is_some() && matches_list(&node, list, Some(host)) {
            return true;
        }
        stack.extend(node.children());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_core::document::Document;
    use dom_core::element::set_attribute;
    use dom_core::mutation::append_child;

    use crate::ast::AnPlusB;
    use crate::parser::parse_selector_list;

    fn build_list(div: &NodeRef, doc: &Document) -> NodeRef {
        let ul = doc.create_element("ul", None);
        append_child(div, &ul).unwrap();
        ul
    }

    #[test]
    fn type_and_class_and_id_match() {
        let doc = Document::new();
        let div = doc.create_element("div", None);
        append_child(&doc.root(), &div).unwrap();
        set_attribute(&div, "id", "main").unwrap();
        set_attribute(&div, "class", "active panel").unwrap();

        let list = parse_selector_list("div#main.active").unwrap();
        assert!(matches_list(&div, &list, None));
        let wrong = parse_selector_list("div#other").unwrap();
        assert!(!matches_list(&div, &wrong, None));
    }

    #[test]
    fn descendant_and_child_combinators() {
        let doc = Document::new();
        let div = doc.create_element("div", None);
        append_child(&doc.root(), &div).unwrap();
        let ul = build_list(&div, &doc);
        let li = doc.create_element("li", None);
        append_child(&ul, &li).unwrap();

        assert!(matches_list(&li, &parse_selector_list("div li").unwrap(), None));
        assert!(matches_list(&li, &parse_selector_list("ul > li").unwrap(), None));
        assert!(!matches_list(&li, &parse_selector_list("div > li").unwrap(), None));
    }

    #[test]
    fn nth_child_an_plus_b() {
        let doc = Document::new();
        let ul = doc.create_element("ul", None);
        append_child(&doc.root(), &ul).unwrap();
        let mut items = Vec::new();
        for _ in 0..5 {
            let li = doc.create_element("li", None);
            append_child(&ul, &li).unwrap();
            items.push(li);
        }

        let odd = PseudoClass::NthChild(AnPlusB { a: 2, b: 1 });
        assert!(matches_pseudo_class(&items[0], &odd, None));
        assert!(!matches_pseudo_class(&items[1], &odd, None));
        assert!(matches_pseudo_class(&items[2], &odd, None));
    }

    #[test]
    fn not_and_has() {
        let doc = Document::new();
        let div = doc.create_element("div", None);
        append_child(&doc.root(), &div).unwrap();
        let span = doc.create_element("span", None);
        set_attribute(&span, "class", "marker").unwrap();
        append_child(&div, &span).unwrap();
        let empty_div = doc.create_element("div", None);
        append_child(&doc.root(), &empty_div).unwrap();

        assert!(matches_list(&div, &parse_selector_list("div:has(.marker)").unwrap(), None));
        assert!(!matches_list(&empty_div, &parse_selector_list("div:has(.marker)").unwrap(), None));
        assert!(matches_list(&empty_div, &parse_selector_list("div:not(:has(.marker))").unwrap(), None));
    }

    #[test]
    fn attribute_case_insensitive() {
        let doc = Document::new();
        let input = doc.create_element("input", None);
        append_child(&doc.root(), &input).unwrap();
        set_attribute(&input, "data-state", "ACTIVE").unwrap();
        assert!(matches_list(
            &input,
            &parse_selector_list(r#"[data-state="active" i]"#).unwrap(),
            None
        ));
        assert!(!matches_list(
            &input,
            &parse_selector_list(r#"[data-state="active"]"#).unwrap(),
            None
        ));
    }
}
