//! Boundary-tag coalescing of a newly freed block with its immediate
//! physical neighbors.
//!
//! `mm_free` (in `allocator.rs`) clears a block's allocation tag and then
//! hands it here. The prologue and epilogue sentinels are always marked
//! allocated, so a block at either end of the live heap naturally coalesces
//! with nothing on that side — no special-casing needed.

use crate::block;
use crate::freelist::FreeListDirectory;

/// Merges `bp` with any free physical neighbor, then inserts the result
/// into the directory. Returns the (possibly different) address of the
/// merged block.
///
/// # Safety
/// `bp` must be a block whose header/footer already reflect `alloc = 0`,
/// not yet present in any bucket. Its neighbors must be valid blocks
/// (prologue/epilogue included).
pub(crate) unsafe fn coalesce(dir: &mut FreeListDirectory, bp: *mut u8) -> *mut u8 {
  unsafe {
    let prev_alloc = block::alloc_of_block(block::prev_blkp(bp));
    let next_alloc = block::alloc_of_block(block::next_blkp(bp));
    let mut size = block::size_of_block(bp);

    match (prev_alloc, next_alloc) {
      (true, true) => {
        dir.insert(bp, size);
        bp
      }
      (true, false) => {
        let next = block::next_blkp(bp);
        let next_size = block::size_of_block(next);
        dir.remove(next, next_size);
        size += next_size;
        block::write_block(bp, size, false);
        dir.insert(bp, size);
        bp
      }
      (false, true) => {
        let prev = block::prev_blkp(bp);
        let prev_size = block::size_of_block(prev);
        dir.remove(prev, prev_size);
        size += prev_size;
        block::write_block(prev, size, false);
        dir.insert(prev, size);
        prev
      }
      (false, false) => {
        let prev = block::prev_blkp(bp);
        let next = block::next_blkp(bp);
        let prev_size = block::size_of_block(prev);
        let next_size = block::size_of_block(next);
        dir.remove(prev, prev_size);
        dir.remove(next, next_size);
        size += prev_size + next_size;
        block::write_block(prev, size, false);
        dir.insert(prev, size);
        prev
      }
    }
  }
}
