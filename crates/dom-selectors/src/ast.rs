//! Parsed selector AST.
//!
//! [§ 3.7 Selector AST](https://dom.spec.whatwg.org/#selectors)
//!
//! A [`SelectorList`] is the disjunction a comma-separated selector parses
//! into; each [`ComplexSelector`] is a chain of [`CompoundSelector`]s joined
//! by [`Combinator`]s, stored subject-first (right-to-left) so the matcher
//! can walk outward from the candidate element without reversing anything.
//! All strings are owned: the tokenizer is zero-copy over the source, but the
//! AST itself is what the per-document cache shares as a reference-counted,
//! source-independent value.

/// [§ 16 Combinators](https://www.w3.org/TR/selectors-4/#combinators)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Whitespace: `A B`.
    Descendant,
    /// `A > B`.
    Child,
    /// `A + B`.
    AdjacentSibling,
    /// `A ~ B`.
    GeneralSibling,
}

/// [§ 6.4 Attribute selectors](https://www.w3.org/TR/selectors-4/#attribute-selectors)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOperator {
    /// `[attr]`
    Exists,
    /// `[attr=value]`
    Equals,
    /// `[attr~=value]`
    Includes,
    /// `[attr|=value]`
    DashMatch,
    /// `[attr^=value]`
    PrefixMatch,
    /// `[attr$=value]`
    SuffixMatch,
    /// `[attr*=value]`
    SubstringMatch,
}

/// A single `[name OP value i?]` attribute matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    /// The attribute's local name, as written in the selector.
    pub name: String,
    /// The operator relating name and value.
    pub operator: AttrOperator,
    /// The value operated against; absent for [`AttrOperator::Exists`].
    pub value: Option<String>,
    /// Whether the comparison is ASCII case-insensitive (trailing `i` flag).
    ///
    /// [§ 6.4.2](https://www.w3.org/TR/selectors-4/#attribute-case)
    pub case_insensitive: bool,
}

/// `an+b` as used by `:nth-child`, `:nth-last-child`, `:nth-of-type` and
/// `:nth-last-of-type`.
///
/// [§ 4.7 An+B microsyntax](https://www.w3.org/TR/selectors-4/#the-nth-child-pseudo)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnPlusB {
    /// The step.
    pub a: i64,
    /// The offset.
    pub b: i64,
}

impl AnPlusB {
    /// Whether the 1-based `position` satisfies `position = a*n + b` for
    /// some non-negative integer `n`.
    #[must_use]
    pub fn matches(&self, position: i64) -> bool {
        if self.a == 0 {
            return position == self.b;
        }
        let n = (position - self.b) as f64 / self.a as f64;
        n >= 0.0 && n.fract() == 0.0
    }
}

/// A simple selector: one condition evaluated against a single element.
///
/// [§ 3.7](https://dom.spec.whatwg.org/#selectors)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    /// `tag`
    Type(String),
    /// `*`
    Universal,
    /// `#id`
    Id(String),
    /// `.class`
    Class(String),
    /// `[...]`
    Attribute(AttributeSelector),
    /// `:pseudo-class(...)`
    PseudoClass(PseudoClass),
}

/// Structural and functional pseudo-classes.
///
/// [§ 3.7](https://dom.spec.whatwg.org/#selectors)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoClass {
    /// `:root`
    Root,
    /// `:empty`
    Empty,
    /// `:first-child`
    FirstChild,
    /// `:last-child`
    LastChild,
    /// `:only-child`
    OnlyChild,
    /// `:first-of-type`
    FirstOfType,
    /// `:last-of-type`
    LastOfType,
    /// `:only-of-type`
    OnlyOfType,
    /// `:nth-child(an+b)`
    NthChild(AnPlusB),
    /// `:nth-last-child(an+b)`
    NthLastChild(AnPlusB),
    /// `:nth-of-type(an+b)`
    NthOfType(AnPlusB),
    /// `:nth-last-of-type(an+b)`
    NthLastOfType(AnPlusB),
    /// `:lang(tag)`, matched per RFC 4647 basic filtering.
    Lang(String),
    /// `:scope`
    Scope,
    /// `:not(selector-list)`
    Not(SelectorList),
    /// `:is(selector-list)`
    Is(SelectorList),
    /// `:where(selector-list)`
    Where(SelectorList),
    /// `:has(selector-list)`, matched with the host element as `:scope`.
    Has(SelectorList),
}

/// [§ 4.2 Compound selectors](https://www.w3.org/TR/selectors-4/#compound)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompoundSelector {
    /// The simple selectors conjunctively applied. At most one
    /// [`SimpleSelector::Type`] or [`SimpleSelector::Universal`] may appear,
    /// and if present it is first.
    pub simple_selectors: Vec<SimpleSelector>,
}

/// [§ 4.3 Complex selectors](https://www.w3.org/TR/selectors-4/#complex)
///
/// Stored subject-first: `subject` is the rightmost compound (the one
/// matched against the candidate element), and `combinators` walks outward
/// from it, left to right in the chain but right-to-left in the original
/// source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    /// The rightmost compound selector.
    pub subject: CompoundSelector,
    /// `(combinator, compound)` pairs, outward from `subject`.
    pub combinators: Vec<(Combinator, CompoundSelector)>,
}

/// [§ 3.7](https://dom.spec.whatwg.org/#selectors) — a selector list is a
/// disjunction of complex selectors; it matches if any of them do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    /// The complex selectors, in source order.
    pub selectors: Vec<ComplexSelector>,
}

#[cfg(test)]
mod tests {
    use super::AnPlusB;

    #[test]
    fn an_plus_b_matches_arithmetic_progression() {
        let odd = AnPlusB { a: 2, b: 1 };
        assert!(odd.matches(1));
        assert!(!odd.matches(2));
        assert!(odd.matches(7));
    }

    #[test]
    fn an_plus_b_zero_a_matches_exactly_b() {
        let exact = AnPlusB { a: 0, b: 3 };
        assert!(exact.matches(3));
        assert!(!exact.matches(0));
        assert!(!exact.matches(6));
    }

    #[test]
    fn an_plus_b_never_matches_negative_n() {
        let later_only = AnPlusB { a: 3, b: 10 };
        assert!(!later_only.matches(1));
        assert!(later_only.matches(10));
        assert!(later_only.matches(13));
    }
}
