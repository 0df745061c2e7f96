//! Single-pass selector scanner.
//!
//! [§ 4.4 Selector tokenizer](https://dom.spec.whatwg.org/#parse-a-selector)
//!
//! Left-to-right, zero-copy over the common case (identifiers, punctuation):
//! tokens borrow directly from the input `&str` and only allocate when a
//! string literal contains a `\`-escape that must be unescaped.

use std::borrow::Cow;

use dom_common::error::SyntaxErrorKind;

use crate::token::{SpannedToken, Token};

/// Scans a selector source string into a stream of [`SpannedToken`]s.
///
/// [§ 4.4](https://dom.spec.whatwg.org/#parse-a-selector)
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

/// The tokenizer's own error report: an internal syntax-error kind together
/// with the byte offset it occurred at.
///
/// [§ 6.2](https://dom.spec.whatwg.org/#interface-domexception) — aggregates
/// to `DomError::Syntax` at the `dom-selectors` crate boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenizeError {
    /// What went wrong.
    pub kind: SyntaxErrorKind,
    /// Where, in bytes, it went wrong.
    pub offset: usize,
}

impl<'a> Tokenizer<'a> {
    /// Build a tokenizer over `input`, positioned at its start.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// The current byte offset into the source.
    #[must_use]
    pub const fn current_offset(&self) -> usize {
        self.pos
    }

    /// Reposition the scanner at `offset`, discarding any in-progress token.
    ///
    /// Used by the parser's `an+b` handling, which reads the raw source
    /// slice between a pseudo-class's parens directly rather than through
    /// the ordinary token stream, then fast-forwards the tokenizer past it.
    pub fn set_offset(&mut self, offset: usize) {
        self.pos = offset;
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_char_at(&self, skip: usize) -> Option<char> {
        self.rest().chars().nth(skip)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Scan and consume the next token, returning it together with the byte
    /// offset it started at.
    ///
    /// [§ 4.4](https://dom.spec.whatwg.org/#parse-a-selector)
    ///
    /// # Errors
    ///
    /// Returns [`TokenizeError`] on an unterminated string, an unbalanced
    /// combining-match operator (bare `^`, `$`, `|` not followed by `=`), or
    /// any other byte the selector grammar does not recognize.
    pub fn next_token(&mut self) -> Result<SpannedToken<'a>, TokenizeError> {
        let start = self.pos;
        let Some(c) = self.peek_char() else {
            return Ok(SpannedToken {
                token: Token::Eof,
                start,
            });
        };

        if c.is_whitespace() {
            while self.peek_char().is_some_and(char::is_whitespace) {
                self.bump();
            }
            return Ok(SpannedToken {
                token: Token::Whitespace,
                start,
            });
        }

        let token = match c {
            '.' => {
                self.bump();
                Token::Dot
            }
            ',' => {
                self.bump();
                Token::Comma
            }
            '>' => {
                self.bump();
                Token::Gt
            }
            '+' => {
                self.bump();
                Token::Plus
            }
            '~' => {
                self.bump();
                if self.peek_char() == Some('=') {
                    self.bump();
                    Token::IncludesMatch
                } else {
                    Token::Tilde
                }
            }
            '(' => {
                self.bump();
                Token::LParen
            }
            ')' => {
                self.bump();
                Token::RParen
            }
            '[' => {
                self.bump();
                Token::LBracket
            }
            ']' => {
                self.bump();
                Token::RBracket
            }
            ':' => {
                self.bump();
                Token::Colon
            }
            '=' => {
                self.bump();
                Token::Equals
            }
            '*' => {
                self.bump();
                if self.peek_char() == Some('=') {
                    self.bump();
                    Token::SubstringMatch
                } else {
                    Token::Asterisk
                }
            }
            '^' => {
                self.bump();
                if self.peek_char() == Some('=') {
                    self.bump();
                    Token::PrefixMatch
                } else {
                    return Err(TokenizeError {
                        kind: SyntaxErrorKind::UnexpectedToken,
                        offset: start,
                    });
                }
            }
            '$' => {
                self.bump();
                if self.peek_char() == Some('=') {
                    self.bump();
                    Token::SuffixMatch
                } else {
                    return Err(TokenizeError {
                        kind: SyntaxErrorKind::UnexpectedToken,
                        offset: start,
                    });
                }
            }
            '|' => {
                self.bump();
                if self.peek_char() == Some('=') {
                    self.bump();
                    Token::DashMatch
                } else {
                    return Err(TokenizeError {
                        kind: SyntaxErrorKind::UnexpectedToken,
                        offset: start,
                    });
                }
            }
            '"' | '\'' => self.scan_string(c)?,
            '#' => {
                self.bump();
                let value = self.scan_ident_text();
                if value.is_empty() {
                    return Err(TokenizeError {
                        kind: SyntaxErrorKind::UnexpectedToken,
                        offset: start,
                    });
                }
                Token::Hash(Cow::Borrowed(value))
            }
            c if is_ident_start(c) || (c == '-' && starts_ident_after_dash(self)) => {
                let text = self.scan_ident_text();
                Token::Ident(Cow::Borrowed(text))
            }
            c if c.is_ascii_digit() => {
                let text = self.scan_ident_text();
                Token::Ident(Cow::Borrowed(text))
            }
            _ => {
                return Err(TokenizeError {
                    kind: SyntaxErrorKind::UnexpectedToken,
                    offset: start,
                });
            }
        };

        Ok(SpannedToken { token, start })
    }

    /// Scan the identifier-class run starting at the current position
    /// (already known to be ident-start, a digit, or a leading `-`) and
    /// return the consumed slice.
    fn scan_ident_text(&mut self) -> &'a str {
        let start = self.pos;
        if self.peek_char() == Some('-') {
            self.bump();
        }
        while self.peek_char().is_some_and(is_ident_continue) {
            self.bump();
        }
        &self.input[start..self.pos]
    }

    fn scan_string(&mut self, quote: char) -> Result<Token<'a>, TokenizeError> {
        let start = self.pos;
        self.bump(); // opening quote
        let mut owned: Option<String> = None;
        let content_start = self.pos;
        loop {
            match self.peek_char() {
                None => {
                    return Err(TokenizeError {
                        kind: SyntaxErrorKind::UnexpectedEof,
                        offset: start,
                    });
                }
                Some(c) if c == quote => {
                    let end = self.pos;
                    self.bump();
                    return Ok(Token::String(match owned {
                        Some(s) => Cow::Owned(s),
                        None => Cow::Borrowed(&self.input[content_start..end]),
                    }));
                }
                Some('\\') => {
                    let buf = owned.get_or_insert_with(|| self.input[content_start..self.pos].to_owned());
                    self.bump(); // backslash
                    match self.bump() {
                        Some(escaped) => buf.push(escaped),
                        None => {
                            return Err(TokenizeError {
                                kind: SyntaxErrorKind::UnexpectedEof,
                                offset: start,
                            });
                        }
                    }
                }
                Some(c) => {
                    if let Some(buf) = owned.as_mut() {
                        buf.push(c);
                    }
                    self.bump();
                }
            }
        }
    }
}

/// Whether `c` can start an identifier.
///
/// [§ 4.3.10 ident-start code point](https://www.w3.org/TR/css-syntax-3/#ident-start-code-point)
const fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

/// Whether `c` can continue an already-started identifier.
///
/// [§ 4.3.9 ident code point](https://www.w3.org/TR/css-syntax-3/#ident-code-point)
const fn is_ident_continue(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || c == '-'
}

/// A `-` starts an identifier when followed by another `-`, an ident-start
/// character, or is otherwise consumed as a lone delimiter (never reached
/// here since `-` alone is not part of this grammar outside identifiers).
fn starts_ident_after_dash(tokenizer: &Tokenizer<'_>) -> bool {
    matches!(tokenizer.peek_char_at(1), Some(c) if is_ident_start(c) || c == '-' || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token<'_>> {
        let mut tokenizer = Tokenizer::new(input);
        let mut out = Vec::new();
        loop {
            let spanned = tokenizer.next_token().unwrap();
            let done = spanned.token == Token::Eof;
            out.push(spanned.token);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn tokenizes_substring_attribute_selector() {
        // [§ 8 S5](https://dom.spec.whatwg.org/#scenarios)
        assert_eq!(
            tokens(r#"[attr*="val"]"#),
            vec![
                Token::LBracket,
                Token::Ident(Cow::Borrowed("attr")),
                Token::SubstringMatch,
                Token::String(Cow::Borrowed("val")),
                Token::RBracket,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn bare_caret_without_equals_is_an_error() {
        let mut tokenizer = Tokenizer::new("[attr^foo]");
        tokenizer.next_token().unwrap(); // [
        tokenizer.next_token().unwrap(); // attr
        let err = tokenizer.next_token().unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedToken);
    }

    #[test]
    fn unterminated_string_is_unexpected_eof() {
        let mut tokenizer = Tokenizer::new(r#"[attr="val]"#);
        tokenizer.next_token().unwrap();
        tokenizer.next_token().unwrap();
        tokenizer.next_token().unwrap();
        let err = tokenizer.next_token().unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedEof);
    }

    #[test]
    fn digit_run_followed_by_ident_chars_is_one_token() {
        assert_eq!(
            tokens("2n+1"),
            vec![
                Token::Ident(Cow::Borrowed("2n")),
                Token::Plus,
                Token::Ident(Cow::Borrowed("1")),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn escaped_quote_inside_string_is_unescaped() {
        assert_eq!(
            tokens(r#"[title="a\"b"]"#),
            vec![
                Token::LBracket,
                Token::Ident(Cow::Borrowed("title")),
                Token::Equals,
                Token::String(Cow::Owned("a\"b".to_owned())),
                Token::RBracket,
                Token::Eof,
            ]
        );
    }
}
