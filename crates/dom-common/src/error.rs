//! The public error taxonomy.
//!
//! [§ 6.2 Error taxonomy](https://dom.spec.whatwg.org/#interface-domexception)
//!
//! Every fallible operation in this engine returns a [`DomResult`] carrying a
//! [`DomError`] variant. The variants map one-to-one onto the WHATWG
//! `DOMException` names used by the public, language-neutral surface: callers
//! at the embedding boundary translate these into their host's native
//! exception type.

use std::fmt;

/// A convenience alias for `Result<T, DomError>`.
pub type DomResult<T> = Result<T, DomError>;

/// The error taxonomy surfaced by every fallible public operation.
///
/// [§ 7 Error handling design](https://dom.spec.whatwg.org/#error-names)
///
/// No operation in this crate panics for caller-induced conditions; panics
/// are reserved for internal invariant violations (unreachable code paths).
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DomError {
    /// [§ 4.2.1 Insert](https://dom.spec.whatwg.org/#concept-node-ensure-pre-insertion-validity)
    ///
    /// Raised when a mutation would violate tree hierarchy invariants: a node
    /// is inserted into its own descendant, a non-element/document parent is
    /// given a second document element, and so on.
    #[error("hierarchy request error: {0}")]
    HierarchyRequest(String),

    /// Raised when a lookup (child, attribute, registered observer, ...)
    /// fails to find the thing being referenced.
    #[error("not found: {0}")]
    NotFound(String),

    /// Raised when a name or value contains characters not permitted for its
    /// role (e.g. an XML name with invalid syntax).
    #[error("invalid character: {0}")]
    InvalidCharacter(String),

    /// Raised when an operation is attempted on a node or object that is not
    /// in a state that permits it (e.g. re-registering an already detached
    /// iterator in a way the API forbids).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// [§ 6.2 Error taxonomy](https://dom.spec.whatwg.org/#interface-domexception)
    ///
    /// Raised for CSS selector parse failures. Carries the 0-based byte
    /// offset of the first invalid token, per [§ 7](https://dom.spec.whatwg.org/#error-names)
    /// ("selector syntax errors include a 0-based byte offset pointing at the
    /// first invalid token").
    #[error("syntax error at byte {offset}: {message}")]
    Syntax {
        /// 0-based byte offset into the selector source.
        offset: usize,
        /// Human readable description of the failure.
        message: String,
    },

    /// Raised when a qualified name's namespace/prefix combination is
    /// invalid (e.g. a prefix used without a corresponding namespace URI).
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Raised when the requested operation is recognized but not supported
    /// by this implementation.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Raised when a node is used in a context owned by a different
    /// `Document` than the one it belongs to, and no adoption took place.
    #[error("wrong document: {0}")]
    WrongDocument(String),

    /// Raised when an `Attr` already associated with one element is used as
    /// though it is free to associate with another.
    #[error("attribute in use: {0}")]
    InUseAttribute(String),
}

impl DomError {
    /// The stable WHATWG `DOMException` name for this error, as surfaced at
    /// the public, language-neutral boundary.
    #[must_use]
    pub const fn exception_name(&self) -> &'static str {
        match self {
            Self::HierarchyRequest(_) => "HierarchyRequestError",
            Self::NotFound(_) => "NotFoundError",
            Self::InvalidCharacter(_) => "InvalidCharacterError",
            Self::InvalidState(_) => "InvalidStateError",
            Self::Syntax { .. } => "SyntaxError",
            Self::Namespace(_) => "NamespaceError",
            Self::NotSupported(_) => "NotSupportedError",
            Self::WrongDocument(_) => "WrongDocumentError",
            Self::InUseAttribute(_) => "InUseAttributeError",
        }
    }
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedToken => write!(f, "unexpected token"),
            Self::UnexpectedEof => write!(f, "unexpected end of input"),
            Self::InvalidSelector => write!(f, "invalid selector"),
        }
    }
}

/// Internal selector-subsystem error kinds.
///
/// [§ 6.2](https://dom.spec.whatwg.org/#interface-domexception)
/// "The selector subsystem additionally distinguishes internal variants
/// `UnexpectedToken`, `UnexpectedEOF`, `InvalidSelector` which aggregate to
/// `SyntaxError` at the public boundary."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// The tokenizer or parser encountered a token it did not expect here.
    UnexpectedToken,
    /// The input ended while a token or grammar production was incomplete.
    UnexpectedEof,
    /// The input, though tokenized without incident, does not form a valid
    /// selector (e.g. it was empty).
    InvalidSelector,
}
