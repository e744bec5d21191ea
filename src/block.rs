//! Boundary-tag block layout.
//!
//! Every block in the arena is a run of bytes shaped like this:
//!
//! ```text
//!   block pointer (bp)
//!        │
//!        ▼
//!   ┌─────────┬──────────────────────────────┬─────────┐
//!   │ header  │     payload / link area       │ footer  │
//!   │ (1 word)│      (size - 2 words)         │ (1 word)│
//!   └─────────┴──────────────────────────────┴─────────┘
//!   bp - 1w                                   bp + size - 2w
//! ```
//!
//! `bp` always points at the first byte *after* the header, matching the
//! pointer convention returned to callers of `malloc`. Header and footer
//! hold the same packed word: the block size (a multiple of [`DSIZE`],
//! including header and footer) with the allocation bit folded into bit 0.
//! This module has no notion of free lists or coalescing; it only knows how
//! to read, write, and step between blocks.

use std::mem;

/// Machine word size in bytes.
pub(crate) const WSIZE: usize = mem::size_of::<usize>();
/// Double-word size: the allocator's granularity and alignment.
pub(crate) const DSIZE: usize = 2 * WSIZE;
/// Smallest size a free block may have (header + fwd link + back link + footer).
pub(crate) const MIN_FREE_BLOCK: usize = 4 * WSIZE;
/// Heap extension amount requested when `find_fit` comes up empty.
pub(crate) const CHUNKSIZE: usize = 128;

/// Packs a size and allocation bit into a single header/footer word.
#[inline]
pub(crate) fn pack(size: usize, alloc: bool) -> usize {
  size | (alloc as usize)
}

#[inline]
pub(crate) fn size_of_word(word: usize) -> usize {
  word & !(DSIZE - 1)
}

#[inline]
pub(crate) fn alloc_of_word(word: usize) -> bool {
  word & 0x1 == 0x1
}

/// Reads the word at `p`.
///
/// # Safety
/// `p` must be valid for reads of one `usize`, word-aligned.
#[inline]
pub(crate) unsafe fn get(p: *mut u8) -> usize {
  unsafe { (p as *mut usize).read() }
}

/// Writes `val` as the word at `p`.
///
/// # Safety
/// `p` must be valid for writes of one `usize`, word-aligned.
#[inline]
pub(crate) unsafe fn put(p: *mut u8, val: usize) {
  unsafe { (p as *mut usize).write(val) };
}

/// Address of `bp`'s header: one word before the block pointer.
///
/// # Safety
/// `bp` must point one word past the start of a live block.
#[inline]
pub(crate) unsafe fn hdrp(bp: *mut u8) -> *mut u8 {
  unsafe { bp.sub(WSIZE) }
}

/// Address of `bp`'s footer, computed from `bp`'s *current* header.
///
/// # Safety
/// `bp`'s header must already hold a valid packed size.
#[inline]
pub(crate) unsafe fn ftrp(bp: *mut u8) -> *mut u8 {
  unsafe { bp.add(size_of_block(bp) - DSIZE) }
}

/// Reads the size recorded in `bp`'s header.
///
/// # Safety
/// `bp` must point at a live block with a valid header.
#[inline]
pub(crate) unsafe fn size_of_block(bp: *mut u8) -> usize {
  unsafe { size_of_word(get(hdrp(bp))) }
}

/// Reads the allocation bit recorded in `bp`'s header.
///
/// # Safety
/// `bp` must point at a live block with a valid header.
#[inline]
pub(crate) unsafe fn alloc_of_block(bp: *mut u8) -> bool {
  unsafe { alloc_of_word(get(hdrp(bp))) }
}

/// Writes `size`/`alloc` into both the header and footer of `bp`.
///
/// The header is written first so that [`ftrp`] (which reads the header
/// to locate the footer) resolves to the footer position implied by
/// `size`, not whatever size the block held previously.
///
/// # Safety
/// `bp` must be within the arena and have room for a block of `size` bytes.
pub(crate) unsafe fn write_block(bp: *mut u8, size: usize, alloc: bool) {
  unsafe {
    put(hdrp(bp), pack(size, alloc));
    put(ftrp(bp), pack(size, alloc));
  }
}

/// Steps to the next physical block, using `bp`'s current header size.
///
/// # Safety
/// `bp` must not be the epilogue (size-0 header).
#[inline]
pub(crate) unsafe fn next_blkp(bp: *mut u8) -> *mut u8 {
  unsafe { bp.add(size_of_block(bp)) }
}

/// Steps to the previous physical block, using its footer (one word
/// before `bp`'s header).
///
/// # Safety
/// `bp` must not be the prologue.
#[inline]
pub(crate) unsafe fn prev_blkp(bp: *mut u8) -> *mut u8 {
  unsafe { bp.sub(size_of_word(get(bp.sub(DSIZE)))) }
}

/// Computes `asize`: the block size (header + payload + footer, rounded up
/// to a multiple of [`DSIZE`]) needed to satisfy a `size`-byte request.
///
/// `size == 0` is the caller's responsibility to reject before calling this;
/// this function only does the minimum-size and alignment rounding.
pub(crate) fn adjusted_size(size: usize) -> usize {
  if size <= DSIZE {
    2 * DSIZE
  } else {
    DSIZE * ((size + DSIZE + (DSIZE - 1)) / DSIZE)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn adjusted_size_has_minimum_and_rounds_up() {
    assert_eq!(adjusted_size(0), 4 * WSIZE);
    assert_eq!(adjusted_size(1), 4 * WSIZE);
    assert_eq!(adjusted_size(DSIZE), 4 * WSIZE);
    assert_eq!(adjusted_size(DSIZE + 1), 6 * WSIZE);
    for n in 1..256usize {
      assert_eq!(adjusted_size(n) % DSIZE, 0);
      assert!(adjusted_size(n) >= n + DSIZE);
    }
  }

  #[test]
  fn pack_roundtrips_size_and_alloc_bit() {
    let w = pack(64, true);
    assert_eq!(size_of_word(w), 64);
    assert!(alloc_of_word(w));

    let w = pack(64, false);
    assert_eq!(size_of_word(w), 64);
    assert!(!alloc_of_word(w));
  }
}
