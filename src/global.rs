//! `GlobalAlloc` adapter: lets this allocator be installed as a process's
//! global allocator with `#[global_allocator]`.
//!
//! This is the one port outside the allocator's single-threaded model — the
//! Rust allocation machinery calls `alloc`/`dealloc`/`realloc` from
//! whichever thread happens to be allocating, so a `Mutex` here serializes
//! access to one lazily-initialized [`Allocator`]. The façade underneath
//! still runs one call to completion before the next, same as always; the
//! mutex just decides who gets to make that call.

use crate::allocator::Allocator;
use crate::arena::{ArenaProvider, SbrkArena};
use crate::block::DSIZE;
use std::alloc::{GlobalAlloc, Layout};
use std::ptr;
use std::sync::Mutex;

/// A `GlobalAlloc` wrapping this crate's façade over an arbitrary
/// [`ArenaProvider`], defaulting to the `sbrk`-backed [`SbrkArena`].
///
/// The arena is built lazily, via `factory`, on the first allocation
/// request — `Allocator::init` needs to call into the provider (e.g.
/// `sbrk`) and cannot run inside a `const fn`. Generic over `A` so the test
/// suite can install this adapter over an in-memory [`TestArena`] instead
/// of perturbing the real process break (see `arena::TestArena`'s docs).
///
/// ```rust,ignore
/// use segalloc::GlobalSegAlloc;
///
/// #[global_allocator]
/// static ALLOCATOR: GlobalSegAlloc = GlobalSegAlloc::new();
/// ```
pub struct GlobalSegAlloc<A: ArenaProvider = SbrkArena> {
  state: Mutex<Option<Allocator<A>>>,
  factory: fn() -> A,
}

impl GlobalSegAlloc<SbrkArena> {
  /// Creates an uninitialized adapter over the real process heap.
  pub const fn new() -> Self {
    Self::with_factory(SbrkArena::new)
  }
}

impl<A: ArenaProvider> GlobalSegAlloc<A> {
  /// Creates an uninitialized adapter that builds its arena with `factory`
  /// on first use. `factory` must be a non-capturing function (not a
  /// closure over external state), since it is stored as a bare fn pointer.
  pub const fn with_factory(factory: fn() -> A) -> Self {
    Self { state: Mutex::new(None), factory }
  }

  fn with_allocator<R>(&self, f: impl FnOnce(&mut Allocator<A>) -> R) -> Option<R> {
    let mut guard = self.state.lock().ok()?;
    if guard.is_none() {
      *guard = Some(Allocator::init((self.factory)()).ok()?);
    }
    Some(f(guard.as_mut().expect("just initialized above")))
  }
}

impl Default for GlobalSegAlloc<SbrkArena> {
  fn default() -> Self {
    Self::new()
  }
}

// SAFETY: every entry point below either hands the request straight to the
// façade (which itself only ever promises DSIZE alignment) or rejects it
// with null before touching the façade. The façade's own internal bookkeeping
// does not depend on the `Layout` beyond its size.
unsafe impl<A: ArenaProvider + Send> GlobalAlloc for GlobalSegAlloc<A> {
  unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
    if layout.align() > DSIZE {
      return ptr::null_mut();
    }
    self.with_allocator(|a| a.malloc(layout.size())).unwrap_or(ptr::null_mut())
  }

  unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
    self.with_allocator(|a| a.free(ptr));
  }

  unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
    if layout.align() > DSIZE {
      return ptr::null_mut();
    }
    self.with_allocator(|a| a.realloc(ptr, new_size)).unwrap_or(ptr::null_mut())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::arena::TestArena;

  const TEST_ARENA_CAP: usize = 1 << 16;

  fn test_factory() -> TestArena {
    TestArena::new(TEST_ARENA_CAP)
  }

  #[test]
  fn alloc_rejects_overly_strict_alignment() {
    let g = GlobalSegAlloc::with_factory(test_factory);
    let layout = Layout::from_size_align(16, DSIZE * 4).unwrap();
    let p = unsafe { g.alloc(layout) };
    assert!(p.is_null());
  }

  #[test]
  fn alloc_and_dealloc_roundtrip() {
    let g = GlobalSegAlloc::with_factory(test_factory);
    let layout = Layout::from_size_align(64, DSIZE).unwrap();
    unsafe {
      let p = g.alloc(layout);
      assert!(!p.is_null());
      p.write_bytes(0x11, 64);
      g.dealloc(p, layout);
    }
  }
}
