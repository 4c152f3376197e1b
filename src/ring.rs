//! SPSC byte ring buffer (C1).
//!
//! Power-of-two capacity; one slot is always reserved so `used == 0` and
//! `used == capacity` are distinguishable without a separate "full" flag.
//! The producer advances `head` after publishing bytes; the consumer reads
//! `head` to learn `used`, then advances `tail` after consuming. Each index
//! has exactly one writer, which is what makes this safe without locks
//! across the ISR/main-loop boundary (see [`crate::traits`] and the crate
//! docs for which side owns which index).

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

/// A fixed-capacity, power-of-two SPSC byte ring.
///
/// `head` is written by the producer and read by the consumer; `tail` is
/// written by the consumer and read by the producer. Both are atomic so the
/// ISR-side producer and main-loop-side consumer can share this buffer
/// without locks. The backing bytes live behind an `UnsafeCell` — the
/// producer's single writer to any given index is guaranteed by the
/// head/tail protocol below, not by Rust's aliasing rules, so the interior
/// mutability has to be explicit.
pub struct Ring<const N: usize> {
    buf: UnsafeCell<[u8; N]>,
    head: AtomicU16,
    tail: AtomicU16,
    rejected: AtomicU32,
    highwater: AtomicU16,
}

// SAFETY: `buf` is only ever written by the single producer (bytes behind
// the not-yet-published `head`) and only ever read by the single consumer
// (bytes behind `tail`, which the producer never touches); the atomic
// head/tail handoff is what makes sharing `&Ring` across the ISR/main-loop
// boundary sound.
unsafe impl<const N: usize> Sync for Ring<N> {}

impl<const N: usize> Default for Ring<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Ring<N> {
    /// Build an empty ring. `N` must be a non-zero power of two, `<= 32768`
    /// so `capacity()`'s `u16` can represent it.
    pub const fn new() -> Self {
        const {
            assert!(
                N > 0 && N <= 32768 && (N & (N - 1)) == 0,
                "ring capacity must be a non-zero power of two (<=32768)"
            )
        };
        Self {
            buf: UnsafeCell::new([0u8; N]),
            head: AtomicU16::new(0),
            tail: AtomicU16::new(0),
            rejected: AtomicU32::new(0),
            highwater: AtomicU16::new(0),
        }
    }

    #[inline]
    fn mask(idx: u16) -> usize {
        (idx as usize) & (N - 1)
    }

    /// Total capacity in bytes (power of two). Usable capacity is `capacity() - 1`.
    #[inline]
    pub const fn capacity(&self) -> u16 {
        N as u16
    }

    /// Bytes currently stored (available to read).
    #[inline]
    pub fn used(&self) -> u16 {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail) & ((N - 1) as u16)
    }

    /// Free space in bytes that can be written without dropping anything.
    #[inline]
    pub fn free(&self) -> u16 {
        (self.capacity() - 1).wrapping_sub(self.used())
    }

    /// Drop all pending data; counters (`rejected`, `highwater`) are kept.
    pub fn clear(&self) {
        let head = self.head.load(Ordering::Acquire);
        self.tail.store(head, Ordering::Release);
    }

    /// Total bytes rejected by [`Ring::write_try`] since init.
    #[inline]
    pub fn rejected(&self) -> u32 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Highest `used()` watermark observed since init.
    #[inline]
    pub fn highwater(&self) -> u16 {
        self.highwater.load(Ordering::Relaxed)
    }

    /// Append `src` iff `free() >= src.len()` and `src.len() <= capacity() - 1`.
    /// Returns the number of bytes written: either `src.len()` on success, or
    /// `0` on rejection (in which case `rejected` increases by `src.len()`).
    pub fn write_try(&self, src: &[u8]) -> u16 {
        let len = src.len() as u16;
        if src.is_empty() || len > self.capacity() - 1 || self.free() < len {
            self.rejected.fetch_add(src.len() as u32, Ordering::Relaxed);
            return 0;
        }

        // SAFETY: single producer; no concurrent writer touches `buf` for
        // the region being written (the consumer only ever reads bytes
        // behind `tail`, which this call does not move).
        let head = self.head.load(Ordering::Relaxed);
        let buf_ptr = self.buf.get() as *mut u8;
        for (i, &b) in src.iter().enumerate() {
            let idx = Self::mask(head.wrapping_add(i as u16));
            unsafe { buf_ptr.add(idx).write(b) };
        }
        self.head.store(head.wrapping_add(len), Ordering::Release);

        let used = self.used();
        if used > self.highwater.load(Ordering::Relaxed) {
            self.highwater.store(used, Ordering::Relaxed);
        }
        len
    }

    /// Pointer + length of the largest contiguous region at the tail,
    /// without consuming it. Returns `(ptr, 0)`-equivalent empty slice if
    /// the ring is empty.
    pub fn peek_linear(&self) -> &[u8] {
        let used = self.used();
        if used == 0 {
            return &[];
        }
        let tail = self.tail.load(Ordering::Relaxed);
        let start = Self::mask(tail);
        let contiguous = core::cmp::min(used as usize, N - start);
        // SAFETY: `start..start+contiguous` lies entirely behind `tail`,
        // which only the consumer (this call's caller) advances; the
        // producer never writes bytes the consumer hasn't released yet.
        let buf_ptr = self.buf.get() as *const u8;
        unsafe { core::slice::from_raw_parts(buf_ptr.add(start), contiguous) }
    }

    /// Non-destructive, wrap-aware copy of up to `dst.len()` bytes from the
    /// tail. Returns the number of bytes actually copied (clamped to `used()`).
    pub fn copy_from_tail(&self, dst: &mut [u8]) -> u16 {
        let used = self.used();
        let n = core::cmp::min(dst.len() as u16, used) as usize;
        if n == 0 {
            return 0;
        }
        let tail = self.tail.load(Ordering::Relaxed);
        // SAFETY: every index read here lies behind `tail`, i.e. already
        // published by the producer and not yet reclaimed by the consumer.
        let buf_ptr = self.buf.get() as *const u8;
        for i in 0..n {
            let idx = Self::mask(tail.wrapping_add(i as u16));
            dst[i] = unsafe { *buf_ptr.add(idx) };
        }
        n as u16
    }

    /// Advance the tail by `n` bytes (caller guarantees `n <= used()`).
    pub fn pop(&self, n: u16) {
        let n = core::cmp::min(n, self.used());
        let tail = self.tail.load(Ordering::Relaxed);
        self.tail.store(tail.wrapping_add(n), Ordering::Release);
    }
}

/// Capability set implemented by [`Ring`], used by the TX/RX engines so
/// their frame-aware drop/pump logic can be exercised against a fake in
/// tests without pulling in a concrete ring size. The Rust analogue of the
/// original firmware's `ps_buffer_if_t` vtable.
pub trait RingOps {
    fn capacity(&self) -> u16;
    fn used(&self) -> u16;
    fn free(&self) -> u16;
    fn clear(&self);
    fn write_try(&self, src: &[u8]) -> u16;
    fn peek_linear(&self) -> &[u8];
    fn copy_from_tail(&self, dst: &mut [u8]) -> u16;
    fn pop(&self, n: u16);
}

impl<const N: usize> RingOps for Ring<N> {
    fn capacity(&self) -> u16 {
        Ring::capacity(self)
    }
    fn used(&self) -> u16 {
        Ring::used(self)
    }
    fn free(&self) -> u16 {
        Ring::free(self)
    }
    fn clear(&self) {
        Ring::clear(self)
    }
    fn write_try(&self, src: &[u8]) -> u16 {
        Ring::write_try(self, src)
    }
    fn peek_linear(&self) -> &[u8] {
        Ring::peek_linear(self)
    }
    fn copy_from_tail(&self, dst: &mut [u8]) -> u16 {
        Ring::copy_from_tail(self, dst)
    }
    fn pop(&self, n: u16) {
        Ring::pop(self, n)
    }
}
