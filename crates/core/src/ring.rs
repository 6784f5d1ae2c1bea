//! Lockless MPMC ring buffer bridging the audio I/O threads and the modem thread.
//!
//! Protocol mirrors a fixed-size lockless ring buffer design: two pairs of
//! free-running cursors (`whead`/`wtail` for writers, `rhead`/`rtail` for
//! readers), a CAS loop to reserve a contiguous region before copying into
//! it, and a `finish` step that waits for earlier reservations to commit
//! before publishing the new cursor. Single-writer and single-reader usage
//! can skip the CAS loop and publish the cursor directly.

use crate::{CoreError, Result};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

bitflags::bitflags! {
    /// Concurrency hints matching the original ring buffer's optimization flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RingFlags: u32 {
        /// Only one thread ever calls `read_begin`/`read_finish`.
        const ONE_READER = 0x1;
        /// Only one thread ever calls `write_begin`/`write_finish`.
        const ONE_WRITER = 0x2;
    }
}

/// Opaque reservation handle returned by `write_begin`/`read_begin` and
/// consumed by the matching `*_finish` call.
#[derive(Clone, Copy, Debug)]
pub struct RingHead {
    old: usize,
    new: usize,
}

struct Slot<T>(UnsafeCell<T>);

// SAFETY: access to each `Slot` is serialized by the ring's cursor protocol:
// a slot is only touched by the writer that reserved it (until `write_finish`
// publishes `wtail`) and then only by the reader that subsequently reserves
// the same region (after `rhead` passes it). No two threads ever hold a
// reservation over the same slot at the same time.
unsafe impl<T: Send> Sync for Slot<T> {}

/// Fixed-capacity lockless ring buffer of `T`, safe for one writer and one
/// reader thread operating concurrently (the only configuration the modem
/// pipeline needs: the audio callback writes, the modem thread reads, and
/// vice versa on the transmit side).
pub struct Ring<T> {
    data: Box<[Slot<T>]>,
    mask: usize,
    flags: RingFlags,
    whead: AtomicUsize,
    wtail: AtomicUsize,
    rhead: AtomicUsize,
    rtail: AtomicUsize,
}

impl<T: Copy + Default> Ring<T> {
    /// Allocate a ring with at least `capacity` slots, rounded up to the
    /// next power of two.
    pub fn new(capacity: usize, flags: RingFlags) -> Result<Self> {
        if capacity == 0 {
            return Err(CoreError::RingError {
                msg: "ring capacity must be greater than 0".to_string(),
            });
        }
        let cap = capacity.next_power_of_two();
        let mut data = Vec::with_capacity(cap);
        data.resize_with(cap, || Slot(UnsafeCell::new(T::default())));

        Ok(Self {
            data: data.into_boxed_slice(),
            mask: cap - 1,
            flags,
            whead: AtomicUsize::new(0),
            wtail: AtomicUsize::new(0),
            rhead: AtomicUsize::new(0),
            rtail: AtomicUsize::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Number of slots currently holding committed, unread data.
    pub fn len(&self) -> usize {
        self.wtail.load(Ordering::Acquire) - self.rtail.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&self) {
        self.whead.store(0, Ordering::Relaxed);
        self.wtail.store(0, Ordering::Relaxed);
        self.rhead.store(0, Ordering::Relaxed);
        self.rtail.store(0, Ordering::Relaxed);
    }

    /// Reserve up to `n` contiguous slots for writing. Returns the handle to
    /// pass to `write_finish` along with the number of slots actually
    /// reserved (0 if the ring is full).
    fn write_begin(&self, n: usize) -> (RingHead, usize) {
        loop {
            let old = self.whead.load(Ordering::Relaxed);
            std::sync::atomic::fence(Ordering::Acquire);
            let rtail = self.rtail.load(Ordering::Relaxed);
            let free = self.capacity() + rtail - old;
            if free == 0 {
                return (RingHead { old, new: old }, 0);
            }

            let i = old & self.mask;
            let mut nc = n.min(free);
            if i + nc > self.capacity() {
                nc = self.capacity() - i;
            }
            let new = old + nc;

            if self.flags.contains(RingFlags::ONE_WRITER) {
                self.whead.store(new, Ordering::Relaxed);
                return (RingHead { old, new }, nc);
            }
            if self
                .whead
                .compare_exchange(old, new, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return (RingHead { old, new }, nc);
            }
        }
    }

    fn write_finish(&self, wh: RingHead) {
        if !self.flags.contains(RingFlags::ONE_WRITER) {
            while self.wtail.load(Ordering::Relaxed) != wh.old {
                std::hint::spin_loop();
            }
        }
        std::sync::atomic::fence(Ordering::Release);
        self.wtail.store(wh.new, Ordering::Relaxed);
    }

    /// Copy as many samples from `src` as fit in one contiguous free region.
    /// Returns the number of samples written; a short write means the caller
    /// should retry with the remainder (the region may have wrapped).
    pub fn write(&self, src: &[T]) -> usize {
        if src.is_empty() {
            return 0;
        }
        let (wh, n) = self.write_begin(src.len());
        if n == 0 {
            return 0;
        }
        let start = wh.old & self.mask;
        for (offset, value) in src[..n].iter().enumerate() {
            let slot = &self.data[(start + offset) & self.mask];
            unsafe { *slot.0.get() = *value };
        }
        self.write_finish(wh);
        n
    }

    /// Write the entire slice, looping over `write` until every sample is
    /// committed or the ring cannot make further progress (full).
    pub fn write_all(&self, src: &[T]) -> usize {
        let mut total = 0;
        while total < src.len() {
            let n = self.write(&src[total..]);
            if n == 0 {
                break;
            }
            total += n;
        }
        total
    }

    fn read_begin(&self, n: usize) -> (RingHead, usize) {
        loop {
            let old = self.rhead.load(Ordering::Relaxed);
            std::sync::atomic::fence(Ordering::Acquire);
            let wtail = self.wtail.load(Ordering::Relaxed);
            let used = wtail - old;
            if used == 0 {
                return (RingHead { old, new: old }, 0);
            }

            let i = old & self.mask;
            let mut nc = n.min(used);
            if i + nc > self.capacity() {
                nc = self.capacity() - i;
            }
            let new = old + nc;

            if self.flags.contains(RingFlags::ONE_READER) {
                self.rhead.store(new, Ordering::Relaxed);
                std::sync::atomic::fence(Ordering::Acquire);
                return (RingHead { old, new }, nc);
            }
            if self
                .rhead
                .compare_exchange(old, new, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return (RingHead { old, new }, nc);
            }
        }
    }

    fn read_finish(&self, rh: RingHead) {
        if !self.flags.contains(RingFlags::ONE_READER) {
            while self.rtail.load(Ordering::Relaxed) != rh.old {
                std::hint::spin_loop();
            }
        }
        self.rtail.store(rh.new, Ordering::Release);
    }

    /// Copy as many samples into `dst` as are available in one contiguous
    /// committed region. Returns the number of samples read.
    pub fn read(&self, dst: &mut [T]) -> usize {
        if dst.is_empty() {
            return 0;
        }
        let (rh, n) = self.read_begin(dst.len());
        if n == 0 {
            return 0;
        }
        let start = rh.old & self.mask;
        for (offset, slot_out) in dst[..n].iter_mut().enumerate() {
            let slot = &self.data[(start + offset) & self.mask];
            *slot_out = unsafe { *slot.0.get() };
        }
        self.read_finish(rh);
        n
    }

    /// Read until `dst` is full or the ring runs dry.
    pub fn read_all(&self, dst: &mut [T]) -> usize {
        let mut total = 0;
        while total < dst.len() {
            let n = self.read(&mut dst[total..]);
            if n == 0 {
                break;
            }
            total += n;
        }
        total
    }

    /// Discard all currently committed data without examining it.
    pub fn discard(&self) -> usize {
        let mut scratch = vec![T::default(); self.capacity()];
        self.read(&mut scratch)
    }
}

// SAFETY: `Ring` serializes access to its slots via the atomic cursors above.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_threaded_round_trip() {
        let ring: Ring<f64> = Ring::new(8, RingFlags::ONE_WRITER | RingFlags::ONE_READER).unwrap();
        assert_eq!(ring.capacity(), 8);

        let written = ring.write(&[1.0, 2.0, 3.0]);
        assert_eq!(written, 3);
        assert_eq!(ring.len(), 3);

        let mut out = [0.0; 3];
        let read = ring.read(&mut out);
        assert_eq!(read, 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert!(ring.is_empty());
    }

    #[test]
    fn write_wraps_around() {
        let ring: Ring<i32> = Ring::new(4, RingFlags::ONE_WRITER | RingFlags::ONE_READER).unwrap();
        assert_eq!(ring.write_all(&[1, 2, 3]), 3);
        let mut out = [0; 2];
        assert_eq!(ring.read(&mut out), 2);
        assert_eq!(out, [1, 2]);

        // Now whead/rtail have advanced; writing again should wrap.
        assert_eq!(ring.write_all(&[4, 5, 6]), 3);
        let mut out = [0; 4];
        assert_eq!(ring.read_all(&mut out), 4);
        assert_eq!(out, [3, 4, 5, 6]);
    }

    #[test]
    fn full_ring_rejects_write() {
        let ring: Ring<u8> = Ring::new(4, RingFlags::ONE_WRITER | RingFlags::ONE_READER).unwrap();
        assert_eq!(ring.write_all(&[1, 2, 3, 4]), 4);
        assert_eq!(ring.write(&[5]), 0);
    }

    #[test]
    fn empty_ring_rejects_read() {
        let ring: Ring<u8> = Ring::new(4, RingFlags::ONE_WRITER | RingFlags::ONE_READER).unwrap();
        let mut out = [0u8; 1];
        assert_eq!(ring.read(&mut out), 0);
    }

    #[test]
    fn mpmc_threaded_transfer() {
        use std::sync::Arc;
        use std::thread;

        let ring: Arc<Ring<u32>> = Arc::new(Ring::new(16, RingFlags::empty()).unwrap());
        let total = 4000u32;

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..(total / 4) {
                        let v = p * (total / 4) + i;
                        loop {
                            if ring.write(&[v]) == 1 {
                                break;
                            }
                            std::hint::spin_loop();
                        }
                    }
                })
            })
            .collect();

        let ring_reader = Arc::clone(&ring);
        let reader = thread::spawn(move || {
            let mut received = Vec::with_capacity(total as usize);
            let mut buf = [0u32; 1];
            while received.len() < total as usize {
                if ring_reader.read(&mut buf) == 1 {
                    received.push(buf[0]);
                }
            }
            received
        });

        for p in producers {
            p.join().unwrap();
        }
        let mut received = reader.join().unwrap();
        received.sort_unstable();
        let expected: Vec<u32> = (0..total).collect();
        assert_eq!(received, expected);
    }

    /// Single-writer/single-reader usage is linearizable: draining a ring
    /// right after writing some values always yields exactly those values,
    /// in order, no matter the capacity or how the write is chunked.
    #[quickcheck_macros::quickcheck]
    fn single_threaded_writes_read_back_in_order(values: Vec<u8>, capacity_hint: u8) -> bool {
        if values.len() > 4096 {
            return true;
        }
        let capacity = (capacity_hint as usize).max(1);
        let Ok(ring) = Ring::<u8>::new(capacity, RingFlags::ONE_WRITER | RingFlags::ONE_READER) else {
            return false;
        };

        let mut written = 0;
        while written < values.len() {
            let n = ring.write_all(&values[written..]);
            if n == 0 {
                break;
            }
            written += n;
            let mut out = vec![0u8; n];
            if ring.read_all(&mut out) != n {
                return false;
            }
            if out != values[written - n..written] {
                return false;
            }
        }
        true
    }
}
