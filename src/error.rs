//! The allocator's public entry points (`init`, `malloc`, `free`, `realloc`)
//! keep a narrow null-return contract: they never hand a typed error to the
//! caller. `AllocError` exists one layer down, at the seam between the
//! façade and the arena provider, so `ArenaProvider` impls and the
//! `GlobalAlloc` adapter's construction path have something more
//! descriptive than a bare `Option` to propagate before it collapses to
//! null at the façade boundary.

use std::fmt;

/// The two failure modes this crate distinguishes at the arena seam: the
/// host refusing to extend the arena further, and a caller asking for a
/// zero-size block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  /// The arena provider's extension primitive failed.
  ArenaExhausted,
  /// `malloc`/`realloc` was asked for zero bytes.
  ZeroSizeRequest,
}

impl fmt::Display for AllocError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AllocError::ArenaExhausted => write!(f, "arena provider could not extend the heap"),
      AllocError::ZeroSizeRequest => write!(f, "zero-size allocation request"),
    }
  }
}

impl std::error::Error for AllocError {}
