//! The arena interface: the allocator's only window onto the host environment.
//!
//! `ArenaProvider` abstracts the host's "extend the break by N bytes"
//! primitive plus the arena's current bounds. The façade in `allocator.rs`
//! never calls `sbrk` or touches a backing buffer directly — it only ever
//! goes through this trait, which is what makes it possible to run the
//! same façade logic against real process memory in production and against
//! an isolated in-memory buffer in tests.

use crate::error::AllocError;
use libc::{c_void, intptr_t, sbrk};
use std::ptr;

/// A host environment capable of extending a single, monotonically growing
/// byte arena and reporting its current bounds.
///
/// Implementations only ever grow the arena; there is no `shrink`. `lo()`
/// and `hi()` need not be cheap to call often in hot paths, but the audit
/// (the only caller) runs them at most once per bucket scan.
pub trait ArenaProvider {
  /// Extends the arena by exactly `n_bytes` (already rounded to an even
  /// number of words by the caller) and returns the address the arena
  /// previously ended at — i.e. the start of the newly available region.
  fn extend(&mut self, n_bytes: usize) -> Result<*mut u8, AllocError>;

  /// Inclusive lower bound of the arena observed so far.
  fn lo(&self) -> *mut u8;

  /// Inclusive upper bound of the arena observed so far.
  fn hi(&self) -> *mut u8;
}

/// The production arena: the process's data segment, extended via the
/// POSIX `sbrk(2)` call.
///
/// `sbrk` is shared global process state, so only one `SbrkArena` should
/// be in active use within a process at a time — the same restriction
/// that applies to the allocator itself: single-threaded, one façade
/// instance.
pub struct SbrkArena {
  lo: *mut u8,
  hi: *mut u8,
}

impl SbrkArena {
  /// Creates a provider with no observed bounds yet; the first successful
  /// `extend` call establishes `lo`.
  pub fn new() -> Self {
    Self { lo: ptr::null_mut(), hi: ptr::null_mut() }
  }
}

impl Default for SbrkArena {
  fn default() -> Self {
    Self::new()
  }
}

// `sbrk` operates on process-global state rather than anything owned by
// `self`, so moving a `SbrkArena` across threads is sound; the single
// active instance still has to be externally serialized (by the
// single-façade-at-a-time discipline, or by `GlobalSegAlloc`'s `Mutex`),
// which this impl does not itself provide.
unsafe impl Send for SbrkArena {}

impl ArenaProvider for SbrkArena {
  fn extend(&mut self, n_bytes: usize) -> Result<*mut u8, AllocError> {
    let base = unsafe { sbrk(n_bytes as intptr_t) };
    if base == usize::MAX as *mut c_void {
      return Err(AllocError::ArenaExhausted);
    }
    let base = base as *mut u8;
    if self.lo.is_null() {
      self.lo = base;
    }
    self.hi = unsafe { base.add(n_bytes) };
    Ok(base)
  }

  fn lo(&self) -> *mut u8 {
    self.lo
  }

  fn hi(&self) -> *mut u8 {
    self.hi
  }
}

/// An in-memory arena backed by a fixed-capacity owned buffer, used by the
/// test suite so allocator traces never perturb the real process break.
///
/// The buffer is allocated once at a fixed capacity and never moved or
/// resized, so pointers handed out by `extend` stay valid for the whole
/// lifetime of the `TestArena`.
pub struct TestArena {
  storage: Box<[u8]>,
  used: usize,
}

impl TestArena {
  /// Creates an arena with `capacity` bytes of backing storage. Extension
  /// past `capacity` fails with [`AllocError::ArenaExhausted`], simulating
  /// a host that has run out of memory to hand out.
  pub fn new(capacity: usize) -> Self {
    Self { storage: vec![0u8; capacity].into_boxed_slice(), used: 0 }
  }
}

impl ArenaProvider for TestArena {
  fn extend(&mut self, n_bytes: usize) -> Result<*mut u8, AllocError> {
    if self.used + n_bytes > self.storage.len() {
      return Err(AllocError::ArenaExhausted);
    }
    let base = unsafe { self.storage.as_mut_ptr().add(self.used) };
    self.used += n_bytes;
    Ok(base)
  }

  fn lo(&self) -> *mut u8 {
    self.storage.as_ptr() as *mut u8
  }

  fn hi(&self) -> *mut u8 {
    unsafe { self.storage.as_ptr().add(self.used) as *mut u8 }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_arena_extends_monotonically_within_capacity() {
    let mut arena = TestArena::new(4096);
    let a = arena.extend(64).unwrap();
    let b = arena.extend(64).unwrap();
    assert_eq!(unsafe { a.add(64) }, b);
  }

  #[test]
  fn test_arena_reports_exhaustion() {
    let mut arena = TestArena::new(128);
    assert!(arena.extend(64).is_ok());
    assert!(arena.extend(64).is_ok());
    assert_eq!(arena.extend(1), Err(AllocError::ArenaExhausted));
  }

  #[test]
  fn test_arena_bounds_track_usage() {
    let mut arena = TestArena::new(256);
    let lo = arena.lo();
    arena.extend(32).unwrap();
    assert_eq!(arena.lo(), lo);
    assert_eq!(unsafe { arena.hi().offset_from(lo) }, 32);
  }
}
