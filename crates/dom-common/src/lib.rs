//! Shared error taxonomy and diagnostics for the DOM engine.
//!
//! This crate provides the infrastructure every other crate in the workspace
//! builds on:
//! - **Error taxonomy** - the [`DomError`] enum, mapping one-to-one onto the
//!   WHATWG `DOMException` names used by the public surface.
//! - **Diagnostics** - deduplicated, non-fatal warnings for conditions that
//!   should not abort an operation (e.g. a selector pseudo-class that is
//!   recognized but intentionally unsupported).

pub mod error;
pub mod warning;

pub use error::{DomError, DomResult};
