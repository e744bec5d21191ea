//! Word-granularity rounding used when the arena is extended.
//!
//! The allocator never hands the arena provider an odd number of words:
//! every `extend` call is rounded up to an even word count before it
//! leaves this crate, so the provider never has to reason about alignment
//! itself.

/// Rounds `$value` up to the next multiple of the machine word size.
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use segalloc::round_up_word;
///
/// match mem::size_of::<usize>() {
///     8 => assert_eq!(round_up_word!(13), 16),
///     4 => assert_eq!(round_up_word!(11), 12),
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! round_up_word {
  ($value:expr) => {
    ($value + ::std::mem::size_of::<usize>() - 1) & !(::std::mem::size_of::<usize>() - 1)
  };
}

/// Rounds a byte count up to an even number of `word_size`-sized words.
///
/// `extend_heap` and the in-place `realloc` growth path both use this: the
/// arena provider is only ever asked to extend by an even number of words,
/// preserving double-word alignment of every block boundary.
pub(crate) fn round_up_even_words(word_size: usize, n_bytes: usize) -> usize {
  let words = n_bytes.div_ceil(word_size);
  let words = if words % 2 != 0 { words + 1 } else { words };
  words * word_size
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::mem;

  #[test]
  fn test_round_up_word() {
    let ptr_size = mem::size_of::<usize>();

    for i in 0..10 {
      let sizes = (ptr_size * i + 1)..=(ptr_size * (i + 1));
      let expected = ptr_size * (i + 1);

      for size in sizes {
        assert_eq!(expected, round_up_word!(size));
      }
    }
  }

  #[test]
  fn test_round_up_even_words() {
    let w = mem::size_of::<usize>();
    assert_eq!(round_up_even_words(w, 1), 2 * w);
    assert_eq!(round_up_even_words(w, w), 2 * w);
    assert_eq!(round_up_even_words(w, w + 1), 3 * w);
    assert_eq!(round_up_even_words(w, 2 * w), 2 * w);
  }
}
