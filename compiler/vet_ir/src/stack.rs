//! Stack growth for recursive descriptor walks.
//!
//! Descriptors are user-built trees of arbitrary depth. Formatting,
//! canonicalization and schema compilation walk them recursively, so every
//! recursive step goes through [`ensure_sufficient_stack`].
//!
//! Evaluation of values does not use this: it runs on an explicit work stack.

/// Remaining stack below which a new segment is allocated (128KB).
const RED_ZONE: usize = 128 * 1024;

/// Size of each freshly allocated stack segment (1MB).
const SEGMENT_SIZE: usize = 1024 * 1024;

/// Run `f`, growing the stack first if it is close to exhausted.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// WASM manages its own stack; call straight through.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
