//! # segalloc - a segregated-free-list memory allocator
//!
//! This crate provides a general-purpose dynamic memory allocator over a
//! single, monotonically extensible byte arena. It implements the classical
//! `malloc`/`free`/`realloc` triple plus an `init` entry point and a
//! self-consistency audit, using a boundary-tag, segregated free-list
//! design: sixteen segregated free lists, deferred coalescing, first-fit
//! placement with splitting, and a handful of in-place `realloc` fast paths
//! before falling back to copy.
//!
//! ## Overview
//!
//! ```text
//!   Arena (grows only upward, never shrinks):
//!
//!   ┌──────┬──────────┬──────────┬────────────────────────┬──────────┐
//!   │ pad  │ prologue │  block   │          ...            │ epilogue │
//!   │ 1w   │  2w      │ hdr/payload/ftr                    │ 1w (sz=0)│
//!   └──────┴──────────┴──────────┴────────────────────────┴──────────┘
//! ```
//!
//! Every block carries a header and footer word of `size | alloc_bit`.
//! Free blocks additionally store a forward and backward link in their
//! payload area, so they can live in one of 16 segregated buckets without
//! any separate allocation for list nodes. See `SPEC_FULL.md` and
//! `DESIGN.md` in the repository root for the full design rationale.
//!
//! ## Crate structure
//!
//! ```text
//!   segalloc
//!   ├── align      - word-rounding helpers used by arena extension
//!   ├── block      - boundary-tag layout: header/footer, neighbor pointers
//!   ├── freelist   - the 16-bucket segregated free-list directory
//!   ├── coalesce   - boundary-tag coalescing of a freed block
//!   ├── arena      - the ArenaProvider trait, sbrk-backed and in-memory impls
//!   ├── allocator  - the facade: init, malloc, free, realloc, audit
//!   ├── global     - a GlobalAlloc adapter for #[global_allocator] use
//!   └── error      - the narrow AllocError surface at the arena seam
//! ```
//!
//! ## Quick start
//!
//! This example runs against [`TestArena`], the in-memory stand-in for the
//! real `sbrk`-backed arena — see its docs for why the doctest suite never
//! drives the real process break. Swap in [`SbrkArena::new()`] to install
//! this allocator over the actual process heap.
//!
//! ```rust
//! use segalloc::{Allocator, TestArena};
//!
//! let mut heap = Allocator::init(TestArena::new(1 << 16)).expect("arena provider available");
//!
//! unsafe {
//!     let p = heap.malloc(64) as *mut u64;
//!     assert!(!p.is_null());
//!     p.write(42);
//!     assert_eq!(p.read(), 42);
//!     heap.free(p as *mut u8);
//! }
//!
//! assert!(heap.audit());
//! ```
//!
//! ## Concurrency
//!
//! Single-threaded by design: a public call runs to completion before the
//! next, and nothing here is `Sync`. [`GlobalSegAlloc`] is the one place a
//! lock appears, because installing a type as `#[global_allocator]` means
//! the Rust runtime will call into it from whichever thread is allocating.
//!
//! ## Safety
//!
//! This crate manages memory by hand: raw pointer arithmetic over an
//! untyped byte arena, with every invariant (header equals footer, bucket
//! membership, physical adjacency) enforced by convention rather than the
//! type system. [`Allocator::audit`] catches the consequences of a broken
//! invariant after the fact; it does not prevent undefined behavior from an
//! invalid precondition (double free, use-after-free, aliased pointers) in
//! the first place.

pub mod align;
mod allocator;
mod arena;
mod block;
mod coalesce;
mod error;
mod freelist;
mod global;

pub use allocator::Allocator;
pub use arena::{ArenaProvider, SbrkArena, TestArena};
pub use error::AllocError;
pub use global::GlobalSegAlloc;
