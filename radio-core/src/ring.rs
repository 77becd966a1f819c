//! # Ring Channel Implementation
//!
//! This module provides the lock-free, statically-sized byte ring used on both
//! sides of the wired link:
//!
//! - **wired-in**: the UART receive interrupt produces, the bridge tick consumes
//! - **wired-out**: the radio receive callback produces, the UART transmit
//!   interrupt consumes
//!
//! ## Design Principles
//!
//! 1. **Fixed Capacity**: `N` is a compile-time power of two so wraparound is a
//!    mask, never a division. Non power-of-two capacities fail to compile.
//!
//! 2. **Split Ownership**: [`RingChannel::split`] hands out exactly one
//!    [`Producer`] and one [`Consumer`]. The producer is the only writer of
//!    `head`, the consumer the only writer of `tail`.
//!
//! 3. **Lossy Overflow**: a full ring drops the incoming bytes and counts them.
//!    There is no backpressure towards the byte source.
//!
//! ## Memory Layout
//!
//! ```text
//! ┌──────────┬───────────────────────┬──────────────────────────┐
//! │   free   │    readable bytes     │           free           │
//! └──────────┴───────────────────────┴──────────────────────────┘
//!            ▲                       ▲
//!          tail                    head
//!      (consumer)               (producer)
//! ```
//!
//! `head == tail` is empty and `head + 1 == tail` (mod N) is full, so one slot
//! always stays unused and the usable capacity is `N - 1`.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::traits::{ByteSink, ByteSource};

/// A read-only view of the readable region, split at the wrap point
#[derive(Debug)]
pub struct RingSlice<'a> {
    /// First contiguous chunk (before wrap-around)
    pub first: &'a [u8],
    /// Second contiguous chunk (after wrap-around, may be empty)
    pub second: &'a [u8],
}

impl<'a> RingSlice<'a> {
    /// Total length across both chunks
    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    /// Check if the view is empty
    pub fn is_empty(&self) -> bool {
        self.first.is_empty() && self.second.is_empty()
    }
}

/// Single-producer single-consumer byte ring of capacity `N`
///
/// # Example
///
/// ```rust
/// use radio_core::ring::RingChannel;
///
/// let mut ring = RingChannel::<16>::new();
/// let (mut tx, mut rx) = ring.split();
///
/// assert_eq!(tx.write(b"hello"), 5);
///
/// let mut buf = [0u8; 8];
/// let n = rx.read(&mut buf);
/// assert_eq!(&buf[..n], b"hello");
/// ```
pub struct RingChannel<const N: usize> {
    /// Byte storage. Slots between `tail` and `head` belong to the consumer,
    /// all others to the producer.
    storage: UnsafeCell<[u8; N]>,

    /// Next slot to write. Stored only by the producer.
    head: AtomicUsize,

    /// Next slot to read. Stored only by the consumer.
    tail: AtomicUsize,

    /// Bytes dropped because the ring was full
    overflow: AtomicU32,
}

// SAFETY: the producer only touches free slots and publishes them with a
// Release store of `head`; the consumer only touches readable slots and
// releases them with a Release store of `tail`. Each side Acquire-loads the
// other's index before using the slots it covers, so a slot is never accessed
// by both sides at once.
unsafe impl<const N: usize> Sync for RingChannel<N> {}

impl<const N: usize> RingChannel<N> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "RingChannel capacity must be a power of two");
        assert!(N >= 2, "RingChannel capacity must be at least 2");
        N - 1
    };

    /// Create an empty ring
    pub const fn new() -> Self {
        let _ = Self::MASK;
        Self {
            storage: UnsafeCell::new([0u8; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            overflow: AtomicU32::new(0),
        }
    }

    /// Total slot count (`N`). One slot is always kept free.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of bytes ready to read
    #[inline]
    pub fn available(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail) & Self::MASK
    }

    /// Number of bytes that can be written before the ring is full
    #[inline]
    pub fn free(&self) -> usize {
        Self::MASK - self.available()
    }

    /// Bytes dropped since creation or the last reset
    pub fn overflow_count(&self) -> u32 {
        self.overflow.load(Ordering::Relaxed)
    }

    /// Reset the overflow counter (diagnostic command)
    pub fn reset_overflow_count(&self) {
        self.overflow.store(0, Ordering::Relaxed);
    }

    /// Split the ring into its producer and consumer halves
    ///
    /// Taking `&mut self` guarantees the halves are handed out once per borrow.
    /// For rings that live for the whole program, split a `&'static mut`.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let ring: &Self = self;
        (Producer { ring }, Consumer { ring })
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        self.storage.get().cast::<u8>()
    }
}

impl<const N: usize> Default for RingChannel<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writing half of a [`RingChannel`]
pub struct Producer<'a, const N: usize> {
    ring: &'a RingChannel<N>,
}

impl<'a, const N: usize> Producer<'a, N> {
    /// Copy as many bytes as fit, dropping (and counting) the rest
    ///
    /// Returns the number of bytes actually stored.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let ring = self.ring;
        let head = ring.head.load(Ordering::Relaxed);
        let tail = ring.tail.load(Ordering::Acquire);
        let free = RingChannel::<N>::MASK - (head.wrapping_sub(tail) & RingChannel::<N>::MASK);

        let len = data.len().min(free);
        let dropped = data.len() - len;

        if len > 0 {
            let first_len = len.min(N - head);
            // SAFETY: `free` slots starting at `head` are owned by the producer
            // until `head` is published below; the consumer never reads them.
            unsafe {
                let base = ring.base();
                core::ptr::copy_nonoverlapping(data.as_ptr(), base.add(head), first_len);
                core::ptr::copy_nonoverlapping(
                    data.as_ptr().add(first_len),
                    base,
                    len - first_len,
                );
            }
            ring.head
                .store((head + len) & RingChannel::<N>::MASK, Ordering::Release);
        }

        if dropped > 0 {
            ring.overflow.fetch_add(dropped as u32, Ordering::Relaxed);
        }

        len
    }

    /// Queue a single byte; `false` if it was dropped
    pub fn write_byte(&mut self, byte: u8) -> bool {
        self.write(&[byte]) == 1
    }

    /// Free space left for this producer
    pub fn free(&self) -> usize {
        self.ring.free()
    }

    /// Overflow counter of the underlying ring
    pub fn overflow_count(&self) -> u32 {
        self.ring.overflow_count()
    }

    /// The shared ring, for counters and occupancy only
    pub fn channel(&self) -> &'a RingChannel<N> {
        self.ring
    }
}

/// Reading half of a [`RingChannel`]
pub struct Consumer<'a, const N: usize> {
    ring: &'a RingChannel<N>,
}

impl<'a, const N: usize> Consumer<'a, N> {
    /// Bytes ready to read
    #[inline]
    pub fn available(&self) -> usize {
        self.ring.available()
    }

    /// Move up to `buf.len()` bytes out of the ring
    ///
    /// Returns 0 immediately if the ring is empty.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let view = self.peek();
        let len = buf.len().min(view.len());
        if len == 0 {
            return 0;
        }

        let first_len = len.min(view.first.len());
        buf[..first_len].copy_from_slice(&view.first[..first_len]);
        buf[first_len..len].copy_from_slice(&view.second[..len - first_len]);

        self.consume(len);
        len
    }

    /// Take a single byte, if any
    pub fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        (self.read(&mut byte) == 1).then_some(byte[0])
    }

    /// Borrow every readable byte without removing it
    ///
    /// The view covers the bytes published when it was taken; later writes by
    /// the producer land outside it. Call [`Consumer::consume`] afterwards.
    pub fn peek(&self) -> RingSlice<'_> {
        let ring = self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);
        let head = ring.head.load(Ordering::Acquire);
        let len = head.wrapping_sub(tail) & RingChannel::<N>::MASK;

        let first_len = len.min(N - tail);
        // SAFETY: slots in [tail, tail + len) were published by the producer's
        // Release store of `head` and stay untouched until `tail` moves past.
        unsafe {
            let base = ring.base() as *const u8;
            RingSlice {
                first: core::slice::from_raw_parts(base.add(tail), first_len),
                second: core::slice::from_raw_parts(base, len - first_len),
            }
        }
    }

    /// Release `len` bytes back to the producer
    ///
    /// Clamped to the readable length.
    pub fn consume(&mut self, len: usize) {
        let ring = self.ring;
        let len = len.min(ring.available());
        let tail = ring.tail.load(Ordering::Relaxed);
        ring.tail
            .store((tail + len) & RingChannel::<N>::MASK, Ordering::Release);
    }

    /// Drop everything currently readable
    pub fn clear(&mut self) {
        let available = self.available();
        self.consume(available);
    }
}

impl<const N: usize> ByteSource for Consumer<'_, N> {
    fn available(&self) -> usize {
        Consumer::available(self)
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        Consumer::read(self, buf)
    }
}

impl<const N: usize> ByteSink for Producer<'_, N> {
    fn write(&mut self, data: &[u8]) -> usize {
        Producer::write(self, data)
    }
}
