// src/internal/cache_padded.rs

//! Utility for cache line padding.

use core::fmt;
use core::ops::{Deref, DerefMut};

// 64 bytes is the line size on every architecture we target; must stay in
// sync with the `align` attribute below, which cannot take a const argument.
const CACHE_LINE: usize = 64;

#[repr(C)]
#[repr(align(64))]
#[derive(Clone, Copy, Default, Hash, PartialEq, Eq)]
struct Aligned<T> {
  value: T,
}

/// A type `T` padded to the length of a cache line, so that two adjacent
/// padded values never share a line and cannot false-share.
#[derive(Clone, Copy, Default, Hash, PartialEq, Eq)]
pub(crate) struct CachePadded<T> {
  inner: Aligned<T>,
}

impl<T> CachePadded<T> {
  /// Creates a new cache-padded value.
  #[inline]
  pub(crate) const fn new(value: T) -> Self {
    CachePadded {
      inner: Aligned { value },
    }
  }

  /// The alignment used for padding on the current architecture.
  #[inline]
  pub(crate) const fn alignment_value() -> usize {
    CACHE_LINE
  }
}

impl<T> Deref for CachePadded<T> {
  type Target = T;
  #[inline]
  fn deref(&self) -> &T {
    &self.inner.value
  }
}

impl<T> DerefMut for CachePadded<T> {
  #[inline]
  fn deref_mut(&mut self) -> &mut T {
    &mut self.inner.value
  }
}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CachePadded")
      .field("value", &self.inner.value)
      .field("alignment", &Self::alignment_value())
      .finish()
  }
}

unsafe impl<T: Send> Send for CachePadded<T> {}
unsafe impl<T: Sync> Sync for CachePadded<T> {}

#[cfg(test)]
mod tests {
  use super::*;
  use core::mem;

  #[test]
  fn alignment_check() {
    let padded = CachePadded::new(0u64);
    let ptr = &padded as *const _ as usize;
    let expected = CachePadded::<u64>::alignment_value();
    assert_eq!(mem::align_of_val(&padded), expected);
    assert_eq!(ptr % expected, 0);
    assert!(mem::size_of_val(&padded) >= expected);
  }

  #[test]
  fn const_constructor() {
    static PADDED: CachePadded<u32> = CachePadded::new(42);
    assert_eq!(*PADDED, 42);
  }

  #[test]
  fn deref_mut_works() {
    let mut p = CachePadded::new(String::from("hello"));
    p.push_str(" world");
    assert_eq!(*p, "hello world");
  }
}
