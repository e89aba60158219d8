use crate::error::{RecvError, SendError, TryRecvError};
use crate::internal::cache_padded::CachePadded;
use crate::sync_util;

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};

use parking_lot::Mutex;

/// A node in the lock-free linked list.
struct Node<T> {
  next: AtomicPtr<Node<T>>,
  value: UnsafeCell<Option<T>>,
}

/// The shared state of the MPSC channel.
pub(crate) struct MpscShared<T> {
  head: CachePadded<AtomicPtr<Node<T>>>,
  tail: CachePadded<UnsafeCell<*mut Node<T>>>,

  // Consumer waiting state.
  consumer_parked: AtomicBool,
  consumer_thread: Mutex<Option<Thread>>,

  receiver_dropped: AtomicBool,
  sender_count: AtomicUsize,
  len: AtomicUsize,
}

impl<T> fmt::Debug for MpscShared<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MpscShared")
      .field("head", &self.head.load(Ordering::Relaxed))
      .field("tail", &"<UnsafeCell>")
      .field(
        "consumer_parked",
        &self.consumer_parked.load(Ordering::Relaxed),
      )
      .field("sender_count", &self.sender_count.load(Ordering::Relaxed))
      .field("len", &self.len.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}

// It is safe to share MpscShared across threads if T is Send: the `tail` cell
// is only ever touched by the single consumer.
unsafe impl<T: Send> Send for MpscShared<T> {}
unsafe impl<T: Send> Sync for MpscShared<T> {}

impl<T: Send> MpscShared<T> {
  /// Creates a new, empty channel around a stub node.
  pub(crate) fn new() -> Self {
    let stub = Box::new(Node {
      next: AtomicPtr::new(ptr::null_mut()),
      value: UnsafeCell::new(None),
    });
    let stub_ptr = Box::into_raw(stub);

    MpscShared {
      head: CachePadded::new(AtomicPtr::new(stub_ptr)),
      tail: CachePadded::new(UnsafeCell::new(stub_ptr)),
      consumer_parked: AtomicBool::new(false),
      consumer_thread: Mutex::new(None),
      receiver_dropped: AtomicBool::new(false),
      sender_count: AtomicUsize::new(1),
      len: AtomicUsize::new(0),
    }
  }

  /// Wakes the consumer if it is parked.
  #[inline]
  fn wake_consumer(&self) {
    if self.consumer_parked.load(Ordering::Acquire) {
      if self
        .consumer_parked
        .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
        .is_ok()
      {
        if let Some(thread_handle) = self.consumer_thread.lock().take() {
          sync_util::unpark_thread(&thread_handle);
        }
      }
    }
  }

  /// The core non-blocking receive logic. Must only be called by the
  /// single consumer.
  fn try_recv_internal(&self) -> Result<T, TryRecvError> {
    unsafe {
      let tail_ptr = *self.tail.get();
      let next_ptr = (*tail_ptr).next.load(Ordering::Acquire);

      if next_ptr.is_null() {
        if self.sender_count.load(Ordering::Acquire) == 0 {
          Err(TryRecvError::Disconnected)
        } else {
          Err(TryRecvError::Empty)
        }
      } else {
        let value = (*(*next_ptr).value.get()).take().unwrap();
        *self.tail.get() = next_ptr;
        drop(Box::from_raw(tail_ptr));
        self.len.fetch_sub(1, Ordering::Release);
        Ok(value)
      }
    }
  }
}

impl<T> Drop for MpscShared<T> {
  fn drop(&mut self) {
    let mut current = *self.tail.get_mut();
    while !current.is_null() {
      let node = unsafe { Box::from_raw(current) };
      current = node.next.load(Ordering::Relaxed);
    }
  }
}

fn send_internal<T: Send>(shared: &Arc<MpscShared<T>>, value: T) -> Result<(), SendError> {
  if shared.receiver_dropped.load(Ordering::Acquire) {
    return Err(SendError::Closed);
  }

  let new_node = Box::new(Node {
    next: AtomicPtr::new(ptr::null_mut()),
    value: UnsafeCell::new(Some(value)),
  });
  let new_node_ptr = Box::into_raw(new_node);

  // Incremented before the node is linked so that `len` can only ever
  // overcount; an undercount would let an idle consumer conclude the
  // channel is empty while a value is mid-publish.
  shared.len.fetch_add(1, Ordering::Release);
  let old_head_ptr = shared.head.swap(new_node_ptr, Ordering::AcqRel);
  unsafe {
    (*old_head_ptr).next.store(new_node_ptr, Ordering::Release);
  }

  shared.wake_consumer();
  Ok(())
}

/// The sending half of the channel. Clonable; every producer thread holds one.
#[derive(Debug)]
pub struct Sender<T: Send> {
  pub(crate) shared: Arc<MpscShared<T>>,
}

impl<T: Send> Sender<T> {
  /// Enqueues a value. Never blocks; fails only once the receiver is gone.
  pub fn send(&self, value: T) -> Result<(), SendError> {
    send_internal(&self.shared, value)
  }

  /// Approximate number of queued values.
  pub fn len(&self) -> usize {
    self.shared.len.load(Ordering::Acquire)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<T: Send> Clone for Sender<T> {
  fn clone(&self) -> Self {
    self.shared.sender_count.fetch_add(1, Ordering::Relaxed);
    Sender {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T: Send> Drop for Sender<T> {
  fn drop(&mut self) {
    if self.shared.sender_count.fetch_sub(1, Ordering::AcqRel) == 1 {
      self.shared.wake_consumer();
    }
  }
}

/// The receiving half of the channel. Exactly one exists per channel.
#[derive(Debug)]
pub struct Receiver<T: Send> {
  pub(crate) shared: Arc<MpscShared<T>>,
  pub(crate) _not_sync: PhantomData<*mut ()>,
}

// The receiver may move between threads, but `PhantomData<*mut ()>` keeps it
// !Sync so only one thread can pop at a time.
unsafe impl<T: Send> Send for Receiver<T> {}

impl<T: Send> Receiver<T> {
  /// Pops the oldest value without blocking.
  pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
    self.shared.try_recv_internal()
  }

  /// Pops the oldest value, parking the thread while the channel is empty.
  pub fn recv(&mut self) -> Result<T, RecvError> {
    loop {
      match self.try_recv() {
        Ok(value) => return Ok(value),
        Err(TryRecvError::Disconnected) => return Err(RecvError::Disconnected),
        Err(TryRecvError::Empty) => {
          *self.shared.consumer_thread.lock() = Some(thread::current());
          self.shared.consumer_parked.store(true, Ordering::Release);

          // Re-check after registering, otherwise a send racing with the
          // registration could be missed and the park would be lost.
          if let Ok(value) = self.try_recv() {
            self.clear_parked();
            return Ok(value);
          }
          if self.shared.sender_count.load(Ordering::Acquire) == 0 {
            self.clear_parked();
            return Err(RecvError::Disconnected);
          }
          sync_util::park_thread();
          self.clear_parked();
        }
      }
    }
  }

  fn clear_parked(&self) {
    if self
      .shared
      .consumer_parked
      .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
      .is_ok()
    {
      *self.shared.consumer_thread.lock() = None;
    }
  }

  /// Approximate number of queued values.
  pub fn len(&self) -> usize {
    self.shared.len.load(Ordering::Acquire)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<T: Send> Drop for Receiver<T> {
  fn drop(&mut self) {
    self.shared.receiver_dropped.store(true, Ordering::Release);
    while self.try_recv().is_ok() {}
  }
}
