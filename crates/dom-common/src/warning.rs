//! Deduplicated, non-fatal diagnostics.
//!
//! Several operations recognize a construct but intentionally do not fully
//! support it (an unsupported pseudo-class, a selector combinator the
//! matcher falls back on, ...). Rather than failing the whole operation,
//! such cases are reported once via [`warn_once`] and otherwise proceed.

use std::collections::HashSet;
use std::sync::Mutex;

/// ANSI color codes for terminal output.
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Global set of warnings already printed, to deduplicate repeated noise from
/// hot paths like selector matching over large trees.
static WARNED: Mutex<Option<HashSet<String>>> = Mutex::new(None);

/// Warn about a recognized-but-unsupported construct (prints once per unique
/// message).
///
/// # Panics
///
/// Panics if the global warning set mutex is poisoned.
pub fn warn_once(component: &str, message: &str) {
    let key = format!("[{component}] {message}");
    let should_print = WARNED
        .lock()
        .unwrap()
        .get_or_insert_with(HashSet::new)
        .insert(key);

    if should_print {
        eprintln!("{YELLOW}[dom:{component}] warning: {message}{RESET}");
    }
}

/// Clear all recorded warnings (useful between independent test cases or
/// documents sharing a process).
///
/// # Panics
///
/// Panics if the global warning set mutex is poisoned.
pub fn clear_warnings() {
    let mut guard = WARNED.lock().unwrap();
    if let Some(set) = guard.as_mut() {
        set.clear();
    }
}
