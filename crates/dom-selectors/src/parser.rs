//! Selector parser.
//!
//! [§ 4.5 Selector parser](https://dom.spec.whatwg.org/#parse-a-selector)
//!
//! Consumes the token stream [`crate::tokenizer::Tokenizer`] produces into
//! the [`crate::ast`] types. A run of whitespace tokens between compounds
//! collapses to the descendant combinator unless it is immediately followed
//! by an explicit `>`/`+`/`~`, in which case the explicit combinator wins and
//! the whitespace is absorbed, per `spec_full.md`'s reading of
//! [§ 16](https://www.w3.org/TR/selectors-4/#combinators).

use dom_common::error::SyntaxErrorKind;

use crate::ast::{
    AnPlusB, AttrOperator, AttributeSelector, Combinator, ComplexSelector, CompoundSelector,
    PseudoClass, SelectorList, SimpleSelector,
};
use crate::token::Token;
use crate::tokenizer::Tokenizer;

/// A parse failure: an internal syntax-error kind plus the byte offset of
/// the offending token, for aggregation into `DomError::Syntax` at the
/// public boundary.
///
/// [§ 6.2](https://dom.spec.whatwg.org/#interface-domexception)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError {
    /// What went wrong.
    pub kind: SyntaxErrorKind,
    /// Where, in bytes, it went wrong.
    pub offset: usize,
}

/// Parse `source` into a [`SelectorList`].
///
/// [§ 4.5](https://dom.spec.whatwg.org/#parse-a-selector)
///
/// # Errors
///
/// Returns [`ParseError`] with [`SyntaxErrorKind::InvalidSelector`] for an
/// empty (or all-whitespace) selector, and [`SyntaxErrorKind::UnexpectedToken`]
/// / [`SyntaxErrorKind::UnexpectedEof`] for malformed syntax, per
/// [§ 8](https://dom.spec.whatwg.org/#scenarios) ("Empty selector string →
/// `InvalidSelector`").
pub fn parse_selector_list(source: &str) -> Result<SelectorList, ParseError> {
    if source.trim().is_empty() {
        return Err(ParseError {
            kind: SyntaxErrorKind::InvalidSelector,
            offset: 0,
        });
    }
    let mut parser = Parser::new(source);
    let list = parser.parse_selector_list(false)?;
    parser.expect(&Token::Eof)?;
    Ok(list)
}

struct Parser<'a> {
    tokenizer: Tokenizer<'a>,
    source: &'a str,
    lookahead: Option<(Token<'a>, usize)>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            tokenizer: Tokenizer::new(source),
            source,
            lookahead: None,
        }
    }

    fn peek(&mut self) -> Result<&Token<'a>, ParseError> {
        if self.lookahead.is_none() {
            let spanned = self.tokenizer.next_token().map_err(|e| ParseError {
                kind: e.kind,
                offset: e.offset,
            })?;
            self.lookahead = Some((spanned.token, spanned.start));
        }
        Ok(&self.lookahead.as_ref().unwrap_or_else(|| unreachable!()).0)
    }

    fn peek_offset(&mut self) -> Result<usize, ParseError> {
        self.peek()?;
        Ok(self.lookahead.as_ref().unwrap_or_else(|| unreachable!()).1)
    }

    fn bump(&mut self) -> Result<Token<'a>, ParseError> {
        self.peek()?;
        let (token, _) = self.lookahead.take().unwrap_or_else(|| unreachable!());
        Ok(token)
    }

    fn expect(&mut self, expected: &Token<'a>) -> Result<(), ParseError> {
        let offset = self.peek_offset()?;
        if self.peek()? == expected {
            let _ = self.bump()?;
            Ok(())
        } else {
            Err(ParseError {
                kind: SyntaxErrorKind::UnexpectedToken,
                offset,
            })
        }
    }

    fn skip_whitespace(&mut self) -> Result<bool, ParseError> {
        let mut saw_any = false;
        while matches!(self.peek()?, Token::Whitespace) {
            let _ = self.bump()?;
            saw_any = true;
        }
        Ok(saw_any)
    }

    fn unexpected(&mut self) -> ParseError {
        let offset = self.peek_offset().unwrap_or(0);
        ParseError {
            kind: SyntaxErrorKind::UnexpectedToken,
            offset,
        }
    }

    /// Parse `:is()`/`:where()`'s forgiving selector list: an individual
    /// complex selector that fails to parse is dropped (with a one-time
    /// diagnostic) rather than invalidating the whole list, per
    /// [Selectors 4 §4.1](https://www.w3.org/TR/selectors-4/#forgiving-selector-list)
    /// ("this allows for a degree of forward-compatibility"). Unlike
    /// `:not()`/`:has()`, which take a strict, non-forgiving list and fail
    /// outright on any invalid member.
    fn parse_forgiving_selector_list(&mut self) -> Result<SelectorList, ParseError> {
        let mut selectors = Vec::new();
        loop {
            let _ = self.skip_whitespace()?;
            if matches!(self.peek()?, Token::RParen) {
                break;
            }
            let start_offset = self.peek_offset()?;
            match self.parse_complex_selector() {
                Ok(complex) => selectors.push(complex),
                Err(_) => {
                    dom_common::warning::warn_once(
                        "selectors",
                        &format!(
                            "dropping an unsupported selector at byte {start_offset} inside a forgiving selector list"
                        ),
                    );
                    self.recover_to_comma_or_close()?;
                }
            }
            let _ = self.skip_whitespace()?;
            if matches!(self.peek()?, Token::Comma) {
                let _ = self.bump()?;
                continue;
            }
            break;
        }
        self.expect(&Token::RParen)?;
        Ok(SelectorList { selectors })
    }

    /// Skip tokens until the comma or closing paren that ends the current
    /// forgiving-list member, tracking nested parens so an inner `(...)` in
    /// the dropped selector doesn't end recovery early.
    fn recover_to_comma_or_close(&mut self) -> Result<(), ParseError> {
        let mut depth: i32 = 0;
        loop {
            match self.peek()? {
                Token::Eof => {
                    return Err(ParseError {
                        kind: SyntaxErrorKind::UnexpectedEof,
                        offset: self.peek_offset()?,
                    })
                }
                Token::LParen => {
                    depth += 1;
                    let _ = self.bump()?;
                }
                Token::RParen if depth > 0 => {
                    depth -= 1;
                    let _ = self.bump()?;
                }
                Token::Comma if depth > 0 => {
                    let _ = self.bump()?;
                }
                Token::RParen | Token::Comma => return Ok(()),
                _ => {
                    let _ = self.bump()?;
                }
            }
        }
    }

    /// Parse a comma-separated list of complex selectors, stopping at `)` if
    /// `nested` (used for `:not()`/`:has()` arguments) or at end of input
    /// otherwise.
    fn parse_selector_list(&mut self, nested: bool) -> Result<SelectorList, ParseError> {
        let mut selectors = vec![self.parse_complex_selector()?];
        loop {
            let _ = self.skip_whitespace()?;
            if matches!(self.peek()?, Token::Comma) {
                let _ = self.bump()?;
                let _ = self.skip_whitespace()?;
                selectors.push(self.parse_complex_selector()?);
                continue;
            }
            break;
        }
        if nested {
            self.expect(&Token::RParen)?;
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex_selector(&mut self) -> Result<ComplexSelector, ParseError> {
        let _ = self.skip_whitespace()?;
        let mut compounds = vec![self.parse_compound_selector()?];
        let mut combinators_between = Vec::new();

        loop {
            let had_whitespace = self.skip_whitespace()?;
            match self.peek()? {
                Token::Comma | Token::RParen | Token::Eof => break,
                Token::Gt => {
                    let _ = self.bump()?;
                    let _ = self.skip_whitespace()?;
                    combinators_between.push(Combinator::Child);
                    compounds.push(self.parse_compound_selector()?);
                }
                Token::Plus => {
                    let _ = self.bump()?;
                    let _ = self.skip_whitespace()?;
                    combinators_between.push(Combinator::AdjacentSibling);
                    compounds.push(self.parse_compound_selector()?);
                }
                Token::Tilde => {
                    let _ = self.bump()?;
                    let _ = self.skip_whitespace()?;
                    combinators_between.push(Combinator::GeneralSibling);
                    compounds.push(self.parse_compound_selector()?);
                }
                _ if had_whitespace => {
                    combinators_between.push(Combinator::Descendant);
                    compounds.push(self.parse_compound_selector()?);
                }
                _ => return Err(self.unexpected()),
            }
        }

        // Reassemble subject-first: pop the rightmost compound, then zip the
        // remaining compounds with the combinators that followed them and
        // reverse, so `combinators` reads outward from `subject`.
        let subject = compounds.pop().unwrap_or_else(|| unreachable!());
        let mut combinators = Vec::with_capacity(combinators_between.len());
        for (compound, combinator) in compounds.into_iter().zip(combinators_between).rev() {
            combinators.push((combinator, compound));
        }
        Ok(ComplexSelector {
            subject,
            combinators,
        })
    }

    fn parse_compound_selector(&mut self) -> Result<CompoundSelector, ParseError> {
        let mut simple_selectors = Vec::new();

        match self.peek()? {
            Token::Ident(_) => {
                if let Token::Ident(name) = self.bump()? {
                    simple_selectors.push(SimpleSelector::Type(name.into_owned()));
                }
            }
            Token::Asterisk => {
                let _ = self.bump()?;
                simple_selectors.push(SimpleSelector::Universal);
            }
            _ => {}
        }

        loop {
            match self.peek()? {
                Token::Hash(_) => {
                    if let Token::Hash(value) = self.bump()? {
                        simple_selectors.push(SimpleSelector::Id(value.into_owned()));
                    }
                }
                Token::Dot => {
                    let _ = self.bump()?;
                    let name = self.expect_ident()?;
                    simple_selectors.push(SimpleSelector::Class(name));
                }
                Token::LBracket => {
                    simple_selectors.push(SimpleSelector::Attribute(self.parse_attribute()?));
                }
                Token::Colon => {
                    simple_selectors.push(SimpleSelector::PseudoClass(self.parse_pseudo_class()?));
                }
                _ => break,
            }
        }

        if simple_selectors.is_empty() {
            return Err(self.unexpected());
        }
        Ok(CompoundSelector { simple_selectors })
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.bump()? {
            Token::Ident(name) => Ok(name.into_owned()),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_attribute(&mut self) -> Result<AttributeSelector, ParseError> {
        self.expect(&Token::LBracket)?;
        let _ = self.skip_whitespace()?;
        let name = self.expect_ident()?;
        let _ = self.skip_whitespace()?;

        let (operator, value) = match self.peek()? {
            Token::RBracket => (AttrOperator::Exists, None),
            Token::Equals => {
                let _ = self.bump()?;
                let _ = self.skip_whitespace()?;
                (AttrOperator::Equals, Some(self.expect_attr_value()?))
            }
            Token::IncludesMatch => {
                let _ = self.bump()?;
                let _ = self.skip_whitespace()?;
                (AttrOperator::Includes, Some(self.expect_attr_value()?))
            }
            Token::DashMatch => {
                let _ = self.bump()?;
                let _ = self.skip_whitespace()?;
                (AttrOperator::DashMatch, Some(self.expect_attr_value()?))
            }
            Token::PrefixMatch => {
                let _ = self.bump()?;
                let _ = self.skip_whitespace()?;
                (AttrOperator::PrefixMatch, Some(self.expect_attr_value()?))
            }
            Token::SuffixMatch => {
                let _ = self.bump()?;
                let _ = self.skip_whitespace()?;
                (AttrOperator::SuffixMatch, Some(self.expect_attr_value()?))
            }
            Token::SubstringMatch => {
                let _ = self.bump()?;
                let _ = self.skip_whitespace()?;
                (AttrOperator::SubstringMatch, Some(self.expect_attr_value()?))
            }
            _ => return Err(self.unexpected()),
        };

        let _ = self.skip_whitespace()?;
        let mut case_insensitive = false;
        if value.is_some() {
            if let Token::Ident(flag) = self.peek()? {
                if flag.eq_ignore_ascii_case("i") || flag.eq_ignore_ascii_case("s") {
                    case_insensitive = flag.eq_ignore_ascii_case("i");
                    let _ = self.bump()?;
                    let _ = self.skip_whitespace()?;
                }
            }
        }
        self.expect(&Token::RBracket)?;

        Ok(AttributeSelector {
            name,
            operator,
            value,
            case_insensitive,
        })
    }

    fn expect_attr_value(&mut self) -> Result<String, ParseError> {
        match self.bump()? {
            Token::String(value) | Token::Ident(value) => Ok(value.into_owned()),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_pseudo_class(&mut self) -> Result<PseudoClass, ParseError> {
        self.expect(&Token::Colon)?;
        let name = self.expect_ident()?;
        let lower = name.to_ascii_lowercase();

        let has_args = matches!(self.peek()?, Token::LParen);

        match lower.as_str() {
            "root" if !has_args => Ok(PseudoClass::Root),
            "empty" if !has_args => Ok(PseudoClass::Empty),
            "first-child" if !has_args => Ok(PseudoClass::FirstChild),
            "last-child" if !has_args => Ok(PseudoClass::LastChild),
            "only-child" if !has_args => Ok(PseudoClass::OnlyChild),
            "first-of-type" if !has_args => Ok(PseudoClass::FirstOfType),
            "last-of-type" if !has_args => Ok(PseudoClass::LastOfType),
            "only-of-type" if !has_args => Ok(PseudoClass::OnlyOfType),
            "scope" if !has_args => Ok(PseudoClass::Scope),
            "nth-child" if has_args => Ok(PseudoClass::NthChild(self.parse_nth_arg()?)),
            "nth-last-child" if has_args => Ok(PseudoClass::NthLastChild(self.parse_nth_arg()?)),
            "nth-of-type" if has_args => Ok(PseudoClass::NthOfType(self.parse_nth_arg()?)),
            "nth-last-of-type" if has_args => Ok(PseudoClass::NthLastOfType(self.parse_nth_arg()?)),
            "lang" if has_args => {
                let _ = self.bump()?; // (
                let _ = self.skip_whitespace()?;
                let tag = self.expect_ident()?;
                let _ = self.skip_whitespace()?;
                self.expect(&Token::RParen)?;
                Ok(PseudoClass::Lang(tag))
            }
            "not" if has_args => {
                let _ = self.bump()?; // (
                let _ = self.skip_whitespace()?;
                let list = self.parse_selector_list(true)?;
                reject_has_inside_not(&list)?;
                Ok(PseudoClass::Not(list))
            }
            "is" if has_args => {
                let _ = self.bump()?;
                let _ = self.skip_whitespace()?;
                Ok(PseudoClass::Is(self.parse_forgiving_selector_list()?))
            }
            "where" if has_args => {
                let _ = self.bump()?;
                let _ = self.skip_whitespace()?;
                Ok(PseudoClass::Where(self.parse_forgiving_selector_list()?))
            }
            "has" if has_args => {
                let _ = self.bump()?;
                let _ = self.skip_whitespace()?;
                Ok(PseudoClass::Has(self.parse_selector_list(true)?))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Parse the raw `an+b` text between an already-peeked `(` and its
    /// matching `)`, per the tokenizer's ident-absorption note in
    /// `spec_full.md`: rather than stitching `an+b` back together from
    /// individual ident/plus/minus tokens, read the source slice directly
    /// and reposition the tokenizer at the closing paren.
    fn parse_nth_arg(&mut self) -> Result<AnPlusB, ParseError> {
        let _ = self.bump()?; // (
        let start = self.tokenizer.current_offset();
        let close = self.source[start..].find(')').ok_or(ParseError {
            kind: SyntaxErrorKind::UnexpectedEof,
            offset: start,
        })?;
        let raw = &self.source[start..start + close];
        let value = parse_an_plus_b(raw).ok_or(ParseError {
            kind: SyntaxErrorKind::InvalidSelector,
            offset: start,
        })?;
        self.tokenizer.set_offset(start + close);
        self.lookahead = None;
        self.expect(&Token::RParen)?;
        Ok(value)
    }
}

/// `:not()` may not nest `:has()` inside itself.
///
/// [§ 4.5](https://dom.spec.whatwg.org/#parse-a-selector)
fn reject_has_inside_not(list: &SelectorList) -> Result<(), ParseError> {
    fn compound_has_has(compound: &CompoundSelector) -> bool {
        compound.simple_selectors.iter().any(|simple| {
            matches!(simple, SimpleSelector::PseudoClass(PseudoClass::Has(_)))
        })
    }
    for complex in &list.selectors {
        if compound_has_has(&complex.subject) {
            return Err(ParseError {
                kind: SyntaxErrorKind::InvalidSelector,
                offset: 0,
            });
        }
        for (_, compound) in &complex.combinators {
            if compound_has_has(compound) {
                return Err(ParseError {
                    kind: SyntaxErrorKind::InvalidSelector,
                    offset: 0,
                });
            }
        }
    }
    Ok(())
}

/// Parse the `an+b` micro-syntax (or the `odd`/`even` keywords).
///
/// [§ 4.7](https://www.w3.org/TR/selectors-4/#the-nth-child-pseudo)
fn parse_an_plus_b(raw: &str) -> Option<AnPlusB> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let lower = compact.to_ascii_lowercase();
    if lower == "odd" {
        return Some(AnPlusB { a: 2, b: 1 });
    }
    if lower == "even" {
        return Some(AnPlusB { a: 2, b: 0 });
    }
    if let Some(n_index) = lower.find('n') {
        let (a_part, rest) = lower.split_at(n_index);
        let rest = &rest[1..];
        let a = parse_a_coefficient(a_part)?;
        let b = if rest.is_empty() { 0 } else { parse_signed_integer(rest)? };
        Some(AnPlusB { a, b })
    } else {
        Some(AnPlusB {
            a: 0,
            b: parse_signed_integer(&lower)?,
        })
    }
}

fn parse_a_coefficient(s: &str) -> Option<i64> {
    match s {
        "" | "+" => Some(1),
        "-" => Some(-1),
        _ => s.parse().ok(),
    }
}

fn parse_signed_integer(s: &str) -> Option<i64> {
    s.strip_prefix('+').unwrap_or(s).parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AttrOperator, Combinator, PseudoClass, SimpleSelector};

    #[test]
    fn empty_selector_is_invalid() {
        let err = parse_selector_list("").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::InvalidSelector);
    }

    #[test]
    fn whitespace_only_selector_is_invalid() {
        let err = parse_selector_list("   ").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::InvalidSelector);
    }

    #[test]
    fn parses_compound_with_combinator_child() {
        // [§ 8 S3](https://dom.spec.whatwg.org/#scenarios)
        let list = parse_selector_list(r#"div.active > a[href]:not(.disabled)"#).unwrap();
        assert_eq!(list.selectors.len(), 1);
        let complex = &list.selectors[0];
        assert_eq!(complex.combinators.len(), 1);
        assert_eq!(complex.combinators[0].0, Combinator::Child);
        assert!(complex.combinators[0]
            .1
            .simple_selectors
            .contains(&SimpleSelector::Type("div".to_owned())));
        assert!(complex.combinators[0]
            .1
            .simple_selectors
            .contains(&SimpleSelector::Class("active".to_owned())));
        assert!(complex
            .subject
            .simple_selectors
            .contains(&SimpleSelector::Type("a".to_owned())));
        assert!(complex.subject.simple_selectors.iter().any(|s| matches!(
            s,
            SimpleSelector::Attribute(AttributeSelector {
                operator: AttrOperator::Exists,
                ..
            })
        )));
        assert!(complex.subject.simple_selectors.iter().any(|s| matches!(
            s,
            SimpleSelector::PseudoClass(PseudoClass::Not(_))
        )));
    }

    #[test]
    fn parses_selector_list_with_comma() {
        let list = parse_selector_list("a, b").unwrap();
        assert_eq!(list.selectors.len(), 2);
    }

    #[test]
    fn nth_child_parses_an_plus_b() {
        let list = parse_selector_list(":nth-child(2n+1)").unwrap();
        match &list.selectors[0].subject.simple_selectors[0] {
            SimpleSelector::PseudoClass(PseudoClass::NthChild(an_b)) => {
                assert_eq!(an_b.a, 2);
                assert_eq!(an_b.b, 1);
            }
            other => panic!("unexpected selector: {other:?}"),
        }
    }

    #[test]
    fn nth_child_odd_keyword() {
        let list = parse_selector_list(":nth-child(odd)").unwrap();
        match &list.selectors[0].subject.simple_selectors[0] {
            SimpleSelector::PseudoClass(PseudoClass::NthChild(an_b)) => {
                assert_eq!(an_b.a, 2);
                assert_eq!(an_b.b, 1);
            }
            other => panic!("unexpected selector: {other:?}"),
        }
    }

    #[test]
    fn not_rejects_nested_has() {
        let err = parse_selector_list(":not(:has(.a))").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::InvalidSelector);
    }

    #[test]
    fn descendant_combinator_from_bare_whitespace() {
        let list = parse_selector_list("div span").unwrap();
        assert_eq!(list.selectors[0].combinators[0].0, Combinator::Descendant);
    }

    #[test]
    fn universal_selector_alone() {
        let list = parse_selector_list("*").unwrap();
        assert_eq!(
            list.selectors[0].subject.simple_selectors[0],
            SimpleSelector::Universal
        );
    }

    #[test]
    fn is_drops_an_unsupported_member_instead_of_failing_the_whole_list() {
        let list = parse_selector_list(":is(:bogus-pseudo, .a)").unwrap();
        match &list.selectors[0].subject.simple_selectors[0] {
            SimpleSelector::PseudoClass(PseudoClass::Is(inner)) => {
                assert_eq!(inner.selectors.len(), 1);
                assert_eq!(
                    inner.selectors[0].subject.simple_selectors[0],
                    SimpleSelector::Class("a".to_owned())
                );
            }
            other => panic!("unexpected selector: {other:?}"),
        }
    }

    #[test]
    fn where_with_only_unsupported_members_parses_to_an_empty_list() {
        let list = parse_selector_list(":where(:bogus-one, :bogus-two)").unwrap();
        match &list.selectors[0].subject.simple_selectors[0] {
            SimpleSelector::PseudoClass(PseudoClass::Where(inner)) => {
                assert!(inner.selectors.is_empty());
            }
            other => panic!("unexpected selector: {other:?}"),
        }
    }

    #[test]
    fn not_does_not_forgive_an_unsupported_member() {
        let err = parse_selector_list(":not(:bogus-pseudo)").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedToken);
    }

    #[test]
    fn attribute_case_insensitive_flag() {
        let list = parse_selector_list(r#"[data-x="Y" i]"#).unwrap();
        match &list.selectors[0].subject.simple_selectors[0] {
            SimpleSelector::Attribute(attr) => assert!(attr.case_insensitive),
            other => panic!("unexpected selector: {other:?}"),
        }
    }
}
