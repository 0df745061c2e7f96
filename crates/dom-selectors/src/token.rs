//! Selector token types.
//!
//! [§ 4.4 Selector tokenizer](https://dom.spec.whatwg.org/#parse-a-selector)
//!
//! This is a narrower vocabulary than a general CSS Syntax Level 3 tokenizer:
//! just the tokens [Selectors Level 4](https://www.w3.org/TR/selectors-4/)
//! grammar productions need. A run of digits immediately followed by
//! identifier characters tokenizes as a single [`Token::Ident`] (so
//! `2n+1`'s `2n` is one token), per `spec_full.md` §B's `an+b` micro-syntax
//! note; the parser reassembles `an+b` from the raw source slice rather than
//! from individual tokens, since the sign and offset are easiest to read back
//! out of the original text.

use std::borrow::Cow;

/// A single selector token, carrying a borrowed or owned (only when an
/// escape sequence forced unescaping) string payload where relevant.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// `[A-Za-z_]`, a non-ASCII byte, or `-`-prefixed identifier; also a
    /// digit run optionally followed by identifier characters (`2n`, `3`).
    Ident(Cow<'a, str>),
    /// `#` followed immediately by an identifier (no separating whitespace).
    Hash(Cow<'a, str>),
    /// A `"..."` or `'...'` string literal, already unescaped.
    String(Cow<'a, str>),
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `>`
    Gt,
    /// `+`
    Plus,
    /// `~`
    Tilde,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `:`
    Colon,
    /// `=`
    Equals,
    /// `^=`
    PrefixMatch,
    /// `$=`
    SuffixMatch,
    /// `*=`
    SubstringMatch,
    /// `~=`
    IncludesMatch,
    /// `|=`
    DashMatch,
    /// `*`
    Asterisk,
    /// One or more contiguous whitespace characters. Significant: an
    /// unadorned run of whitespace between compounds is the descendant
    /// combinator.
    Whitespace,
    /// End of input.
    Eof,
}

impl Token<'_> {
    /// A short, human-readable name for diagnostics.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Ident(_) => "identifier",
            Self::Hash(_) => "hash",
            Self::String(_) => "string",
            Self::Dot => "'.'",
            Self::Comma => "','",
            Self::Gt => "'>'",
            Self::Plus => "'+'",
            Self::Tilde => "'~'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Colon => "':'",
            Self::Equals => "'='",
            Self::PrefixMatch => "'^='",
            Self::SuffixMatch => "'$='",
            Self::SubstringMatch => "'*='",
            Self::IncludesMatch => "'~='",
            Self::DashMatch => "'|='",
            Self::Asterisk => "'*'",
            Self::Whitespace => "whitespace",
            Self::Eof => "end of input",
        }
    }
}

/// A token together with the 0-based byte offset in the source it started
/// at, for [§ 7](https://dom.spec.whatwg.org/#error-names)'s "selector syntax
/// errors include a 0-based byte offset pointing at the first invalid token".
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken<'a> {
    /// The token itself.
    pub token: Token<'a>,
    /// Its starting byte offset in the selector source.
    pub start: usize,
}
